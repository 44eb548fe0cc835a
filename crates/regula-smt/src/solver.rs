use crate::sorts::{FunSignature, SmtSort};
use crate::terms::SmtTerm;

/// Result of a satisfiability check.
#[derive(Debug, Clone, PartialEq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown(String),
}

/// A literal read back from a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValue {
    Int(i64),
    Bool(bool),
    BitVec { value: u64, width: u32 },
}

impl ModelValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ModelValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ModelValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Abstract SMT solver interface.
///
/// A solver instance serves a single query: declarations and assertions
/// accumulate until `check_sat`, after which `eval` reads the model.
pub trait SmtSolver {
    type Error: std::error::Error;

    /// Declare a new constant.
    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Self::Error>;

    /// Declare an uninterpreted function.
    fn declare_fun(&mut self, name: &str, signature: &FunSignature) -> Result<(), Self::Error>;

    /// Assert a constraint.
    fn assert(&mut self, term: &SmtTerm) -> Result<(), Self::Error>;

    /// Check satisfiability.
    fn check_sat(&mut self) -> Result<SatResult, Self::Error>;

    /// Evaluate a ground term in the model of the last SAT check, completing
    /// unconstrained parts of the model as needed.
    ///
    /// Returns `None` when there is no model or the value is not a literal.
    fn eval(&mut self, term: &SmtTerm) -> Result<Option<ModelValue>, Self::Error>;
}
