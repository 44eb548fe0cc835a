//! End-to-end analysis of one oracle table.
//!
//! Results are computed on first use and cached: the sensitivity list feeds
//! the catalog, the catalog feeds partitioning. Each underlying probe still
//! runs in its own solver session.

use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::ShapeCatalog;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::fieldspec::FieldSpec;
use crate::flock::{FlockFactorizer, FlockSearch};
use crate::operand::{OperandFormula, OperandFormulaSynthesizer};
use crate::oracle::{OracleTable, ShapeId};
use crate::sensitivity::{SensitivityAnalyzer, SensitivityList};
use crate::session::{take_solve_profile, SolveProfile, SolverFactory};

/// A shape together with the significant patterns producing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShapeGroup {
    pub shape: ShapeId,
    pub patterns: Vec<u64>,
}

/// How the shapes divide the significant-pattern space.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Partitioning {
    /// A single shape.
    Regular { shape: ShapeId },
    /// Two shapes; `narrow` has no more patterns than `wide`.
    Fork {
        narrow: ShapeGroup,
        wide: ShapeGroup,
        /// The narrow shape is a single pattern.
        easily_normalizable: bool,
    },
    /// More than two shapes, with the flock search that was run on them.
    Flocks(FlockSearch),
}

pub struct ShapeAnalysis<'a, F: SolverFactory> {
    factory: &'a F,
    table: &'a OracleTable,
    spec: Option<FieldSpec>,
    stop_at_first_flock: bool,
    sensitivity: Option<SensitivityList>,
    catalog: Option<ShapeCatalog>,
}

impl<'a, F: SolverFactory> ShapeAnalysis<'a, F> {
    pub fn new(factory: &'a F, table: &'a OracleTable) -> Self {
        Self {
            factory,
            table,
            spec: None,
            stop_at_first_flock: true,
            sensitivity: None,
            catalog: None,
        }
    }

    pub fn with_config(mut self, config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        if self.table.width() > config.max_width {
            return Err(AnalysisError::WidthTooLarge {
                width: self.table.width(),
                max: config.max_width,
            });
        }
        self.stop_at_first_flock = config.stop_at_first_flock;
        Ok(self)
    }

    /// Attach the field spec of the full word; its free bits are the table
    /// index.
    pub fn with_spec(mut self, spec: FieldSpec) -> Result<Self, AnalysisError> {
        if spec.free_width() != self.table.width() {
            return Err(AnalysisError::DimensionMismatch(format!(
                "spec '{spec}' has {} free bits, table is {} bits wide",
                spec.free_width(),
                self.table.width()
            )));
        }
        self.spec = Some(spec);
        Ok(self)
    }

    pub fn table(&self) -> &OracleTable {
        self.table
    }

    pub fn sensitivity(&mut self) -> Result<&SensitivityList, AnalysisError> {
        let list = match self.sensitivity.take() {
            Some(list) => list,
            None => {
                info!(width = self.table.width(), shapes = self.table.shape_count(), "sensitivity analysis");
                SensitivityAnalyzer::new(self.factory).analyze(self.table)?
            }
        };
        Ok(self.sensitivity.insert(list))
    }

    pub fn catalog(&mut self) -> Result<&ShapeCatalog, AnalysisError> {
        let catalog = match self.catalog.take() {
            Some(catalog) => catalog,
            None => {
                let table = self.table;
                ShapeCatalog::build(table, self.sensitivity()?)?
            }
        };
        Ok(self.catalog.insert(catalog))
    }

    pub fn partitioning(&mut self) -> Result<Partitioning, AnalysisError> {
        let factory = self.factory;
        let stop_at_first = self.stop_at_first_flock;
        let catalog = self.catalog()?;
        let mut groups = catalog
            .shapes()
            .map(|shape| {
                Ok(ShapeGroup {
                    shape,
                    patterns: catalog.patterns_of(shape)?.to_vec(),
                })
            })
            .collect::<Result<Vec<_>, AnalysisError>>()?;

        let partitioning = match groups.len() {
            0 | 1 => Partitioning::Regular {
                shape: groups.first().map_or(ShapeId(0), |g| g.shape),
            },
            2 => {
                groups.sort_by_key(|g| (g.patterns.len(), g.shape));
                let wide = groups.remove(1);
                let narrow = groups.remove(0);
                Partitioning::Fork {
                    easily_normalizable: narrow.patterns.len() == 1,
                    narrow,
                    wide,
                }
            }
            _ => Partitioning::Flocks(FlockFactorizer::new(factory, catalog).search(stop_at_first)?),
        };
        Ok(partitioning)
    }

    pub fn formula_for(&self, operand: usize, shape: ShapeId) -> Result<OperandFormula, AnalysisError> {
        OperandFormulaSynthesizer::new(self.factory, self.table).formula_for(operand, shape)
    }

    /// Formulas for every operand slot of every shape. Recoverable failures
    /// are reported per slot.
    pub fn formulas(&self) -> Result<Vec<FormulaOutcome>, AnalysisError> {
        let mut outcomes = Vec::new();
        for shape in self.table.shapes() {
            for operand in 0..self.table.operand_count(shape)? {
                let outcome = match self.formula_for(operand, shape) {
                    Ok(formula) => FormulaOutcome {
                        operand,
                        shape,
                        text: Some(formula.to_string()),
                        formula: Some(formula),
                        failure: None,
                    },
                    Err(e) if e.is_recoverable() => {
                        warn!(operand, %shape, error = %e, "no operand formula");
                        FormulaOutcome {
                            operand,
                            shape,
                            text: None,
                            formula: None,
                            failure: Some(e.to_string()),
                        }
                    }
                    Err(e) => return Err(e),
                };
                outcomes.push(outcome);
            }
        }
        Ok(outcomes)
    }

    /// Absolute word positions of the relevant bits, most significant first.
    pub fn relevant_bit_positions(&mut self) -> Result<Vec<u32>, AnalysisError> {
        let width = self.table.width();
        let var_positions = match &self.spec {
            Some(spec) => spec.var_bit_positions(),
            None => (0..width).rev().collect(),
        };
        let relevant = self.sensitivity()?.relevant_positions()?;
        // index bit k is the k-th free bit counting from the bottom
        Ok(relevant
            .into_iter()
            .rev()
            .map(|k| var_positions[(width - 1 - k) as usize])
            .collect())
    }

    /// The word MSB-first, `!` at relevant bits and `.` elsewhere.
    pub fn relevant_bits_string(&mut self) -> Result<String, AnalysisError> {
        let word_width = self
            .spec
            .as_ref()
            .map_or(self.table.width(), FieldSpec::width);
        let positions = self.relevant_bit_positions()?;
        Ok((0..word_width)
            .rev()
            .map(|i| if positions.contains(&i) { '!' } else { '.' })
            .collect())
    }

    /// Run every analysis and collect the results.
    pub fn report(&mut self) -> Result<AnalysisReport, AnalysisError> {
        let _ = take_solve_profile();
        let sensitivity = self.sensitivity()?.clone();
        let relevant_bits = self.relevant_bits_string()?;
        let table = self.table;
        let shapes = table
            .shapes()
            .map(|shape| {
                Ok(ShapeSummary {
                    shape,
                    signature: table.signature(shape)?.to_string(),
                    specimen: table.specimen(shape)?,
                    specimen_word: match &self.spec {
                        Some(spec) => Some(spec.instantiate(table.specimen(shape)?)?),
                        None => None,
                    },
                    operands: table.specimen_operands(shape)?.to_vec(),
                })
            })
            .collect::<Result<Vec<_>, AnalysisError>>()?;
        let partitioning = self.partitioning()?;
        let formulas = self.formulas()?;
        Ok(AnalysisReport {
            width: table.width(),
            spec: self.spec.as_ref().map(ToString::to_string),
            sensitivity: sensitivity.to_string(),
            entropy: sensitivity.entropy(),
            relevant_bits,
            shapes,
            partitioning,
            formulas,
            solver: take_solve_profile(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ShapeSummary {
    pub shape: ShapeId,
    pub signature: String,
    pub specimen: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specimen_word: Option<u64>,
    pub operands: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormulaOutcome {
    pub operand: usize,
    pub shape: ShapeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<OperandFormula>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub width: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    pub sensitivity: String,
    pub entropy: u32,
    pub relevant_bits: String,
    pub shapes: Vec<ShapeSummary>,
    pub partitioning: Partitioning,
    pub formulas: Vec<FormulaOutcome>,
    pub solver: SolveProfile,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Z3Factory;

    #[test]
    fn spec_width_must_match_table() -> Result<(), AnalysisError> {
        let table = OracleTable::tabulate(2, |_| ("k", vec![]))?;
        let factory = Z3Factory::new(5);
        let spec: FieldSpec = "0b1 3".parse()?;
        assert!(matches!(
            ShapeAnalysis::new(&factory, &table).with_spec(spec),
            Err(AnalysisError::DimensionMismatch(_))
        ));
        Ok(())
    }

    #[test]
    fn config_width_limit_applies() -> Result<(), AnalysisError> {
        let table = OracleTable::tabulate(3, |_| ("k", vec![]))?;
        let factory = Z3Factory::new(5);
        let config = AnalysisConfig {
            max_width: 2,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            ShapeAnalysis::new(&factory, &table).with_config(&config),
            Err(AnalysisError::WidthTooLarge { width: 3, max: 2 })
        ));
        Ok(())
    }

    #[test]
    fn relevant_bits_map_through_the_spec() -> Result<(), AnalysisError> {
        // index bit 1 (the upper free bit, word bit 3) decides the shape
        let table = OracleTable::tabulate(2, |e| (if e & 0b10 != 0 { "a" } else { "b" }, vec![]))?;
        let factory = Z3Factory::new(10);
        let spec: FieldSpec = "0b1 1 0b00 1".parse()?;
        let mut analysis = ShapeAnalysis::new(&factory, &table).with_spec(spec)?;
        assert_eq!(analysis.relevant_bit_positions()?, vec![3]);
        assert_eq!(analysis.relevant_bits_string()?, ".!...");
        Ok(())
    }

    #[test]
    fn two_shapes_form_a_fork() -> Result<(), AnalysisError> {
        let table = OracleTable::tabulate(2, |e| (if e == 3 { "rare" } else { "common" }, vec![]))?;
        let factory = Z3Factory::new(10);
        let mut analysis = ShapeAnalysis::new(&factory, &table);
        match analysis.partitioning()? {
            Partitioning::Fork {
                narrow,
                wide,
                easily_normalizable,
            } => {
                assert_eq!(narrow.shape, ShapeId(1));
                assert_eq!(narrow.patterns, vec![0b11]);
                assert_eq!(wide.patterns.len(), 3);
                assert!(easily_normalizable);
            }
            other => panic!("expected a fork, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn single_shape_is_regular() -> Result<(), AnalysisError> {
        let table = OracleTable::tabulate(2, |_| ("only", vec![1]))?;
        let factory = Z3Factory::new(10);
        let mut analysis = ShapeAnalysis::new(&factory, &table);
        assert!(matches!(
            analysis.partitioning()?,
            Partitioning::Regular { shape: ShapeId(0) }
        ));
        assert!(analysis.sensitivity()?.is_insensitive());
        Ok(())
    }
}
