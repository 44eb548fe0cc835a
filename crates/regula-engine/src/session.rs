//! Scoped solver sessions.
//!
//! Every probe opens its own [`Session`] from a [`SolverFactory`] and drops it
//! when the probe returns, so no solver state survives between probes.

use std::cell::RefCell;
use std::fmt::Display;
use std::time::Instant;

use regula_smt::backends::cvc5_backend::Cvc5Solver;
use regula_smt::backends::z3_backend::Z3Solver;
use regula_smt::solver::{ModelValue, SatResult, SmtSolver};
use regula_smt::sorts::{FunSignature, SmtSort};
use regula_smt::terms::SmtTerm;
use serde::Serialize;
use tracing::warn;

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;

/// Creates fresh solver instances.
pub trait SolverFactory {
    type Solver: SmtSolver;

    fn create(&self) -> Result<Self::Solver, AnalysisError>;

    /// Open a session labelled with the probe it serves.
    fn open(&self, context: &str) -> Result<Session<Self::Solver>, AnalysisError> {
        let solver = self.create()?;
        SOLVE_PROFILE.with(|cell| cell.borrow_mut().sessions_opened += 1);
        Ok(Session {
            solver,
            context: context.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Z3Factory {
    pub timeout_secs: u64,
}

impl Z3Factory {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.timeout_secs)
    }
}

impl SolverFactory for Z3Factory {
    type Solver = Z3Solver;

    fn create(&self) -> Result<Z3Solver, AnalysisError> {
        Ok(Z3Solver::with_timeout_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone)]
pub struct Cvc5Factory {
    pub command: String,
    pub timeout_secs: u64,
}

impl Cvc5Factory {
    pub fn new(command: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            command: command.into(),
            timeout_secs,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.cvc5_command.clone(), config.timeout_secs)
    }
}

impl SolverFactory for Cvc5Factory {
    type Solver = Cvc5Solver;

    fn create(&self) -> Result<Cvc5Solver, AnalysisError> {
        Cvc5Solver::with_command_and_timeout_secs(&self.command, self.timeout_secs)
            .map_err(solver_error)
    }
}

pub(crate) fn solver_error(e: impl Display) -> AnalysisError {
    AnalysisError::Solver(e.to_string())
}

/// One solver instance owned by a single probe.
pub struct Session<S: SmtSolver> {
    solver: S,
    context: String,
}

impl<S: SmtSolver> Session<S> {
    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), AnalysisError> {
        self.solver.declare_var(name, sort).map_err(solver_error)
    }

    pub fn declare_fun(
        &mut self,
        name: &str,
        signature: &FunSignature,
    ) -> Result<(), AnalysisError> {
        self.solver.declare_fun(name, signature).map_err(solver_error)
    }

    pub fn assert(&mut self, term: &SmtTerm) -> Result<(), AnalysisError> {
        self.solver.assert(term).map_err(solver_error)
    }

    /// Check satisfiability; an inconclusive answer becomes
    /// [`AnalysisError::SolverTimeout`].
    pub fn check(&mut self) -> Result<SatResult, AnalysisError> {
        let started = Instant::now();
        let result = self.solver.check_sat().map_err(solver_error);
        let elapsed_ms = started.elapsed().as_millis();
        SOLVE_PROFILE.with(|cell| {
            let mut profile = cell.borrow_mut();
            profile.solve_calls += 1;
            profile.solve_elapsed_ms += elapsed_ms;
        });
        match result? {
            SatResult::Unknown(reason) => {
                warn!(context = %self.context, reason = %reason, "solver inconclusive");
                SOLVE_PROFILE.with(|cell| cell.borrow_mut().inconclusive += 1);
                Err(AnalysisError::SolverTimeout(format!(
                    "{}: {reason}",
                    self.context
                )))
            }
            verdict => Ok(verdict),
        }
    }

    /// Evaluate a ground term in the last model.
    pub fn eval(&mut self, term: &SmtTerm) -> Result<ModelValue, AnalysisError> {
        self.solver
            .eval(term)
            .map_err(solver_error)?
            .ok_or_else(|| {
                AnalysisError::Solver(format!("{}: model has no value for {term:?}", self.context))
            })
    }

    pub fn eval_bool(&mut self, term: &SmtTerm) -> Result<bool, AnalysisError> {
        let value = self.eval(term)?;
        value
            .as_bool()
            .ok_or_else(|| AnalysisError::Solver(format!("expected a boolean, got {value:?}")))
    }

    pub fn eval_int(&mut self, term: &SmtTerm) -> Result<i64, AnalysisError> {
        let value = self.eval(term)?;
        value
            .as_int()
            .ok_or_else(|| AnalysisError::Solver(format!("expected an integer, got {value:?}")))
    }
}

/// Solver usage counters for the current thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SolveProfile {
    pub sessions_opened: u64,
    pub solve_calls: u64,
    pub solve_elapsed_ms: u128,
    pub inconclusive: u64,
}

thread_local! {
    static SOLVE_PROFILE: RefCell<SolveProfile> = RefCell::new(SolveProfile::default());
}

/// Return and clear the current thread's solver counters.
pub fn take_solve_profile() -> SolveProfile {
    SOLVE_PROFILE.with(|cell| std::mem::take(&mut *cell.borrow_mut()))
}
