#![no_main]
use libfuzzer_sys::fuzz_target;
use regula_engine::sensitivity::{Sensitivity, SensitivityList};
use regula_engine::{ShapeCatalog, SweepFile};

fuzz_target!(|data: &[u8]| {
    let Ok(sweep) = serde_json::from_slice::<SweepFile>(data) else {
        return;
    };
    if sweep.width > 10 {
        return;
    }
    let _ = sweep.field_spec();
    if let Ok(table) = sweep.table() {
        // Without a solver, treat every bit as relevant; the catalog must
        // then either reject the table or cover every pattern.
        let list = SensitivityList::from_tags(vec![Sensitivity::Relevant; table.width() as usize]);
        if let Ok(catalog) = ShapeCatalog::build(&table, &list) {
            let covered: usize = catalog
                .shapes()
                .map(|s| catalog.patterns_of(s).map_or(0, <[u64]>::len))
                .sum();
            assert_eq!(covered as u64, 1u64 << table.width());
        }
    }
});
