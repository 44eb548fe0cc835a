//! Property tests against brute-force ground truth.

use std::collections::HashSet;
use std::env;

use proptest::prelude::*;
use proptest::test_runner::{
    Config as ProptestConfig, FileFailurePersistence, RngAlgorithm, RngSeed,
};
use regula_engine::oracle::OracleTable;
use regula_engine::sensitivity::{Sensitivity, SensitivityAnalyzer, SensitivityList};
use regula_engine::Z3Factory;

fn property_cases() -> u32 {
    env::var("REGULA_PROPTEST_CASES")
        .ok()
        .or_else(|| env::var("PROPTEST_CASES").ok())
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(24)
}

fn proptest_config(source_file: &'static str) -> ProptestConfig {
    ProptestConfig {
        cases: property_cases(),
        source_file: Some(source_file),
        failure_persistence: Some(Box::new(FileFailurePersistence::WithSource(
            "proptest-regressions",
        ))),
        rng_algorithm: RngAlgorithm::ChaCha,
        rng_seed: RngSeed::Fixed(0x5EED_B175),
        ..ProptestConfig::default()
    }
}

/// Bit `i` is irrelevant iff flipping it never changes the output.
fn brute_force(outputs: &[u8], width: u32) -> Vec<Sensitivity> {
    (0..width)
        .map(|i| {
            let flips = (0..outputs.len()).any(|x| outputs[x] != outputs[x ^ (1 << i)]);
            if flips {
                Sensitivity::Relevant
            } else {
                Sensitivity::Irrelevant
            }
        })
        .collect()
}

fn resolved_tags() -> impl Strategy<Value = Vec<Sensitivity>> {
    prop::collection::vec(
        prop_oneof![Just(Sensitivity::Relevant), Just(Sensitivity::Irrelevant)],
        1..=8,
    )
}

proptest! {
    #![proptest_config(proptest_config(file!()))]

    #[test]
    fn analyzer_matches_ground_truth(outputs in prop::collection::vec(0u8..3, 8)) {
        let table = OracleTable::tabulate(3, |e| (outputs[e as usize].to_string(), vec![]))
            .expect("3-bit table");
        let list = SensitivityAnalyzer::new(&Z3Factory::new(20))
            .analyze(&table)
            .expect("sensitivity analysis");
        let expected = brute_force(&outputs, 3);
        prop_assert_eq!(list.tags(), expected.as_slice());
        prop_assert_eq!(list.is_insensitive(), list.entropy() == 0);
    }

    #[test]
    fn field_spec_enumerates_each_slice_once(tags in resolved_tags()) {
        let list = SensitivityList::from_tags(tags);
        let spec = list.as_field_spec().expect("resolved list");
        let encodings: Vec<u64> = spec.iter().collect();
        prop_assert_eq!(encodings.len() as u64, 1u64 << list.entropy());

        let distinct: HashSet<u64> = encodings.iter().copied().collect();
        prop_assert_eq!(distinct.len(), encodings.len());

        let slices: HashSet<u64> = encodings
            .iter()
            .map(|e| list.significant_slice(*e).expect("resolved list"))
            .collect();
        prop_assert_eq!(slices.len(), encodings.len());
        prop_assert!(slices.iter().all(|s| *s < 1u64 << list.entropy()));
    }
}
