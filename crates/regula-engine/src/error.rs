use thiserror::Error;

use crate::oracle::ShapeId;

/// Failures of the analysis core.
///
/// Unsatisfiable, DegenerateClassifier and SolverTimeout are recoverable:
/// they reject one hypothesis and searches move on to the next. All other
/// variants abort the analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Oracle table has no entry for encoding {encoding:#x}")]
    OracleIncomplete { encoding: u64 },
    #[error("Oracle table has two entries for encoding {encoding:#x}")]
    DuplicateEncoding { encoding: u64 },
    #[error("Sensitivity of bit {position} is still unknown")]
    UnknownSensitivityAtFinalization { position: u32 },
    #[error("Sensitivity of bit {position} is already resolved")]
    SensitivityAlreadyResolved { position: u32 },
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("Unsatisfiable: {0}")]
    Unsatisfiable(String),
    #[error("Degenerate classifier: {entries} named entries instead of 1")]
    DegenerateClassifier { entries: usize },
    #[error("Two-point sampling requested on an insensitive function")]
    InsensitiveDecompositionRequested,
    #[error("Solver inconclusive: {0}")]
    SolverTimeout(String),
    #[error("Width {width} exceeds the supported maximum of {max} bits")]
    WidthTooLarge { width: u32, max: u32 },
    #[error("Encoding {encoding:#x} does not fit in {width} bits")]
    EncodingOutOfRange { encoding: u64, width: u32 },
    #[error("Encoding {encoding:#x} has no operand at index {index}")]
    OperandOutOfRange { encoding: u64, index: usize },
    #[error("Unknown shape {0}")]
    UnknownShape(ShapeId),
    #[error("Invalid field spec: {0}")]
    FieldSpec(String),
    #[error("Solver error: {0}")]
    Solver(String),
}

impl AnalysisError {
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AnalysisError::Unsatisfiable(_)
                | AnalysisError::DegenerateClassifier { .. }
                | AnalysisError::SolverTimeout(_)
        )
    }
}
