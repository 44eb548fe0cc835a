//! Worked scenarios for sensitivity, catalog, flock and operand analyses.

use regula_engine::flock::{FlockFactorizer, FlockOutcome, Flocking};
use regula_engine::oracle::{OracleRecord, OracleTable, ShapeId};
use regula_engine::sensitivity::Sensitivity::{Irrelevant as X, Relevant as R};
use regula_engine::sensitivity::SensitivityAnalyzer;
use regula_engine::session::take_solve_profile;
use regula_engine::{
    AnalysisError, OperandFormulaSynthesizer, Partitioning, ShapeAnalysis, ShapeCatalog,
    SolverFactory, SweepFile, Z3Factory,
};
use regula_smt::solver::{ModelValue, SatResult, SmtSolver};
use regula_smt::sorts::{FunSignature, SmtSort};
use regula_smt::terms::SmtTerm;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn factory() -> Z3Factory {
    Z3Factory::new(20)
}

fn catalog_for(table: &OracleTable) -> Result<ShapeCatalog, AnalysisError> {
    let list = SensitivityAnalyzer::new(&factory()).analyze(table)?;
    ShapeCatalog::build(table, &list)
}

/// Bits 3-2 are the left value, bits 1-0 the right value; right pattern 01
/// selects a per-left variant, everything else shares one of two shapes.
fn selector_table() -> OracleTable {
    OracleTable::tabulate(4, |e| {
        let (l, r) = (e >> 2, e & 0b11);
        if r == 0b01 {
            (format!("sel{l}"), vec![])
        } else {
            (format!("base{}", l & 1), vec![])
        }
    })
    .unwrap()
}

#[test]
fn scenario_a_only_the_high_bit_matters() -> TestResult {
    let table = OracleTable::tabulate(2, |e| (if e < 2 { "0" } else { "1" }, vec![]))?;
    let list = SensitivityAnalyzer::new(&factory()).analyze(&table)?;
    assert_eq!(list.tags(), &[X, R]);
    assert_eq!(list.entropy(), 1);
    assert!(!list.is_insensitive());
    Ok(())
}

#[test]
fn scenario_b_middle_bit_of_a_conjunction_is_irrelevant() -> TestResult {
    let table = OracleTable::tabulate(3, |e| {
        let and = (e >> 2) & e & 1;
        (and.to_string(), vec![])
    })?;
    let list = SensitivityAnalyzer::new(&factory()).analyze(&table)?;
    assert_eq!(list.tags(), &[R, X, R]);
    assert_eq!(list.entropy(), 2);
    assert_eq!(list.to_string(), "«!x!»");
    Ok(())
}

#[test]
fn scenario_c_classifier_names_the_single_selecting_pattern() -> TestResult {
    let table = selector_table();
    let catalog = catalog_for(&table)?;
    assert_eq!(catalog.entropy(), 4);

    let factory = factory();
    let factorizer = FlockFactorizer::new(&factory, &catalog);
    let flocking = Flocking::new(0b0011, 4)?;
    let decomposition = factorizer.factorize(flocking)?;
    assert_eq!(decomposition.classifier.entries, vec![(0b01, true)]);
    assert!(!decomposition.classifier.default);
    assert_eq!(decomposition.classifier.selected(), Some(0b01));

    for l in 0..4 {
        for r in 0..4 {
            let truth = catalog.shape_of(flocking.combine(l, r)?)?;
            assert_eq!(decomposition.predict(l, r), Some(truth), "l={l} r={r}");
        }
    }
    Ok(())
}

#[test]
fn sensitivity_is_deterministic() -> TestResult {
    let table = selector_table();
    let factory = factory();
    let analyzer = SensitivityAnalyzer::new(&factory);
    let first = analyzer.analyze(&table)?;
    let second = analyzer.analyze(&table)?;
    assert_eq!(first, second);
    assert_eq!(
        first.entropy(),
        first.width() - first.tags().iter().filter(|t| **t == X).count() as u32
    );
    Ok(())
}

#[test]
fn weight_one_split_is_found_before_any_wider_one() -> TestResult {
    // bit 0 selects "sel"; otherwise bits 2-1 pick one of four shapes
    let table = OracleTable::tabulate(3, |e| {
        if e & 1 == 1 {
            ("sel".to_string(), vec![])
        } else {
            (format!("op{}", e >> 1), vec![])
        }
    })?;
    let catalog = catalog_for(&table)?;
    let factory = factory();
    let factorizer = FlockFactorizer::new(&factory, &catalog);

    let first = factorizer.search(true)?;
    assert_eq!(first.attempts.len(), 1);
    assert_eq!(first.attempts[0].flocking.mask, 0b001);
    assert_eq!(first.attempts[0].outcome, FlockOutcome::Accepted);
    let accepted = &first.accepted[0];
    assert!(accepted.classifier.selected().is_some());
    for l in 0..4 {
        for r in 0..2 {
            let truth = catalog.shape_of(accepted.flocking.combine(l, r)?)?;
            assert_eq!(accepted.predict(l, r), Some(truth));
        }
    }

    let full = factorizer.search(false)?;
    let weights: Vec<u32> = full.attempts.iter().map(|a| a.flocking.mask.count_ones()).collect();
    assert_eq!(weights, vec![1, 1, 1, 2, 2, 2]);
    Ok(())
}

#[test]
fn injective_shapes_reject_wide_right_groups() -> TestResult {
    let table = OracleTable::tabulate(3, |e| (e.to_string(), vec![]))?;
    let catalog = catalog_for(&table)?;
    let factory = factory();
    let err = FlockFactorizer::new(&factory, &catalog)
        .factorize(Flocking::new(0b011, 3)?)
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Unsatisfiable(_)));
    assert!(err.is_recoverable());
    Ok(())
}

#[test]
fn balanced_classifiers_are_degenerate() -> TestResult {
    // shape depends on the right group only through r1 xor r0
    let table = OracleTable::tabulate(3, |e| {
        let parity = (e >> 1 ^ e) & 1;
        (format!("{}{}", e >> 2, parity), vec![])
    })?;
    let catalog = catalog_for(&table)?;
    assert_eq!(catalog.entropy(), 3);
    let factory = factory();
    let err = FlockFactorizer::new(&factory, &catalog)
        .factorize(Flocking::new(0b011, 3)?)
        .unwrap_err();
    assert!(matches!(err, AnalysisError::DegenerateClassifier { entries: 2 }));
    Ok(())
}

#[test]
fn incomplete_tables_are_rejected_before_solving() -> TestResult {
    let mut table = OracleTable::new(2)?;
    for e in [0, 1, 3] {
        table.record(e, "x", vec![])?;
    }
    let err = SensitivityAnalyzer::new(&factory()).analyze(&table).unwrap_err();
    assert!(matches!(err, AnalysisError::OracleIncomplete { encoding: 2 }));
    assert!(!err.is_recoverable());
    Ok(())
}

#[test]
fn affine_fit_is_exact_on_every_sample() -> TestResult {
    // bits 2-1 carry an immediate; bits 3 and 0 never matter
    let table = OracleTable::tabulate(4, |e| ("imm", vec![((e >> 1) & 0b11) as i64 * 3 - 5]))?;
    let factory = factory();
    let formula = OperandFormulaSynthesizer::new(&factory, &table).formula_for(0, ShapeId(0))?;
    assert_eq!(formula.sensitivity.tags(), &[X, R, R, X]);
    assert_eq!((formula.slope, formula.intercept), (3, -5));
    assert_eq!(formula.samples.len(), 4);
    for (x, y) in &formula.samples {
        assert_eq!(formula.slope * *x as i64 + formula.intercept, *y);
    }
    for e in 0..16 {
        assert_eq!(formula.predict(e)?, table.operand(e, 0)?);
    }
    Ok(())
}

#[test]
fn full_report_serializes() -> TestResult {
    let table = selector_table();
    let factory = factory();
    let mut analysis = ShapeAnalysis::new(&factory, &table);
    let report = analysis.report()?;
    assert_eq!(report.entropy, 4);
    assert_eq!(report.relevant_bits, "!!!!");
    assert!(matches!(report.partitioning, Partitioning::Flocks(_)));
    assert!(report.solver.sessions_opened >= 4);

    let json = serde_json::to_value(&report)?;
    assert_eq!(json["partitioning"]["kind"], "flocks");
    assert_eq!(json["shapes"].as_array().map(Vec::len), Some(table.shape_count()));
    Ok(())
}

#[test]
fn sweep_listing_an_encoding_twice_is_rejected() -> TestResult {
    let point = |encoding, signature: &str, operands: Vec<i64>| OracleRecord {
        encoding,
        signature: signature.to_string(),
        operands,
    };
    let sweep = SweepFile {
        spec: None,
        width: 1,
        points: vec![
            point(0, "stale", vec![99]),
            point(0, "mov", vec![7]),
            point(1, "mov", vec![7]),
        ],
    };
    let err = sweep.table().unwrap_err();
    assert!(matches!(err, AnalysisError::DuplicateEncoding { encoding: 0 }));
    assert!(!err.is_recoverable());
    Ok(())
}

/// A backend that gives up on every query.
struct GivesUp;

impl SmtSolver for GivesUp {
    type Error = std::io::Error;

    fn declare_var(&mut self, _name: &str, _sort: &SmtSort) -> Result<(), Self::Error> {
        Ok(())
    }

    fn declare_fun(&mut self, _name: &str, _sig: &FunSignature) -> Result<(), Self::Error> {
        Ok(())
    }

    fn assert(&mut self, _term: &SmtTerm) -> Result<(), Self::Error> {
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Self::Error> {
        Ok(SatResult::Unknown("resource limit".to_string()))
    }

    fn eval(&mut self, _term: &SmtTerm) -> Result<Option<ModelValue>, Self::Error> {
        Ok(None)
    }
}

struct GivesUpFactory;

impl SolverFactory for GivesUpFactory {
    type Solver = GivesUp;

    fn create(&self) -> Result<GivesUp, AnalysisError> {
        Ok(GivesUp)
    }
}

#[test]
fn inconclusive_sensitivity_check_surfaces_as_timeout() -> TestResult {
    let table = OracleTable::tabulate(2, |e| (if e < 2 { "0" } else { "1" }, vec![]))?;
    let _ = take_solve_profile();
    let err = SensitivityAnalyzer::new(&GivesUpFactory)
        .analyze(&table)
        .unwrap_err();
    assert!(matches!(err, AnalysisError::SolverTimeout(_)));
    assert!(err.is_recoverable());
    assert_eq!(take_solve_profile().inconclusive, 1);
    Ok(())
}

#[test]
fn inconclusive_flock_candidates_are_recorded_and_skipped() -> TestResult {
    let table = selector_table();
    let catalog = catalog_for(&table)?;
    let factorizer = FlockFactorizer::new(&GivesUpFactory, &catalog);

    let err = factorizer.factorize(Flocking::new(0b0011, 4)?).unwrap_err();
    assert!(matches!(err, AnalysisError::SolverTimeout(_)));
    assert!(err.is_recoverable());

    let search = factorizer.search(true)?;
    assert!(search.accepted.is_empty());
    assert_eq!(search.attempts.len(), 14);
    assert!(search
        .attempts
        .iter()
        .all(|a| a.outcome == FlockOutcome::Inconclusive));
    Ok(())
}

#[test]
fn inconclusive_operand_fits_are_reported_per_slot() -> TestResult {
    let table = OracleTable::tabulate(2, |e| ("imm", vec![e as i64]))?;
    let analysis = ShapeAnalysis::new(&GivesUpFactory, &table);
    let outcomes = analysis.formulas()?;
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].formula.is_none());
    assert!(outcomes[0]
        .failure
        .as_deref()
        .is_some_and(|f| f.starts_with("Solver inconclusive")));
    Ok(())
}
