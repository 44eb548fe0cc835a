#![no_main]
use libfuzzer_sys::fuzz_target;
use regula_engine::FieldSpec;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(spec) = s.parse::<FieldSpec>() {
            // Printing must reparse to the same spec.
            let reparsed: FieldSpec = spec.to_string().parse().unwrap();
            assert_eq!(reparsed, spec);
            if spec.free_width() <= 12 {
                for (index, word) in spec.iter().enumerate() {
                    assert!(spec.matches(word));
                    assert_eq!(spec.variable_slice(word), index as u64);
                }
            }
        }
    }
});
