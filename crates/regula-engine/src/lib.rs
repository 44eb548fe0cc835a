#![doc = include_str!("../README.md")]

pub mod analysis;
pub mod bits;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fieldspec;
pub mod flock;
pub mod operand;
pub mod oracle;
pub mod sensitivity;
pub mod session;
pub mod sweep;

pub use analysis::{AnalysisReport, Partitioning, ShapeAnalysis};
pub use catalog::ShapeCatalog;
pub use config::{AnalysisConfig, ConfigError, SolverChoice};
pub use error::AnalysisError;
pub use fieldspec::{FieldElement, FieldSpec};
pub use flock::{Classifier, FlockDecomposition, FlockFactorizer, Flocking};
pub use operand::{OperandFormula, OperandFormulaSynthesizer};
pub use oracle::{OracleRecord, OracleTable, ShapeId};
pub use sensitivity::{Sensitivity, SensitivityAnalyzer, SensitivityList};
pub use session::{Cvc5Factory, SolverFactory, Z3Factory};
pub use sweep::SweepFile;
