//! Affine operand formulas: `operand = a·x + b` where `x` is the operand's
//! own significant bits read as an unsigned integer.

use std::fmt;

use regula_smt::solver::SatResult;
use regula_smt::sorts::{FunSignature, SmtSort};
use regula_smt::terms::SmtTerm;
use serde::Serialize;
use tracing::{debug, info};

use crate::bits::domain_size;
use crate::error::AnalysisError;
use crate::oracle::{OracleTable, ShapeId};
use crate::sensitivity::{SensitivityAnalyzer, SensitivityList};
use crate::session::SolverFactory;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperandFormula {
    pub operand: usize,
    pub shape: ShapeId,
    /// Sensitivity of the operand restricted to `shape`.
    pub sensitivity: SensitivityList,
    pub slope: i64,
    pub intercept: i64,
    /// The `(x, y)` pairs the formula was fitted to.
    pub samples: Vec<(u64, i64)>,
}

impl OperandFormula {
    pub fn is_constant(&self) -> bool {
        self.sensitivity.is_insensitive()
    }

    pub fn apply(&self, x: u64) -> i64 {
        self.slope
            .wrapping_mul(x as i64)
            .wrapping_add(self.intercept)
    }

    /// Operand value predicted for a full encoding.
    pub fn predict(&self, encoding: u64) -> Result<i64, AnalysisError> {
        Ok(self.apply(self.sensitivity.significant_slice(encoding)?))
    }
}

impl fmt::Display for OperandFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_constant() {
            return write!(f, "{} {}", self.sensitivity, self.intercept);
        }
        write!(f, "{} {}·x", self.sensitivity, self.slope)?;
        match self.intercept {
            0 => Ok(()),
            b if b < 0 => write!(f, " - {}", b.unsigned_abs()),
            b => write!(f, " + {b}"),
        }
    }
}

/// Fits operand formulas per (operand slot, shape).
pub struct OperandFormulaSynthesizer<'a, F: SolverFactory> {
    factory: &'a F,
    table: &'a OracleTable,
}

impl<'a, F: SolverFactory> OperandFormulaSynthesizer<'a, F> {
    pub fn new(factory: &'a F, table: &'a OracleTable) -> Self {
        Self { factory, table }
    }

    pub fn formula_for(&self, operand: usize, shape: ShapeId) -> Result<OperandFormula, AnalysisError> {
        let projection = self.table.project(operand, shape)?;
        let sensitivity = SensitivityAnalyzer::new(self.factory).analyze(&projection)?;

        if sensitivity.is_insensitive() {
            let value = self.table.operand(self.table.specimen(shape)?, operand)?;
            debug!(operand, %shape, value, "constant operand");
            return Ok(OperandFormula {
                operand,
                shape,
                sensitivity,
                slope: 0,
                intercept: value,
                samples: vec![(0, value)],
            });
        }

        let samples = self.samples(operand, shape, &sensitivity)?;
        let (slope, intercept) = self.fit(operand, shape, sensitivity.entropy(), &samples)?;
        info!(operand, %shape, slope, intercept, list = %sensitivity, "operand formula");
        Ok(OperandFormula {
            operand,
            shape,
            sensitivity,
            slope,
            intercept,
            samples,
        })
    }

    /// One `(x, y)` pair per significant combination that occurs in `shape`.
    fn samples(
        &self,
        operand: usize,
        shape: ShapeId,
        sensitivity: &SensitivityList,
    ) -> Result<Vec<(u64, i64)>, AnalysisError> {
        let mut samples = Vec::new();
        for x in 0..domain_size(sensitivity.entropy()) {
            for encoding in sensitivity.fiber(x)? {
                if self.table.shape(encoding)? == shape {
                    samples.push((x, self.table.operand(encoding, operand)?));
                    break;
                }
            }
        }
        Ok(samples)
    }

    fn fit(
        &self,
        operand: usize,
        shape: ShapeId,
        width: u32,
        samples: &[(u64, i64)],
    ) -> Result<(i64, i64), AnalysisError> {
        let mut session = self.factory.open(&format!("affine fit of operand {operand} in {shape}"))?;
        let bv = SmtSort::bv(width);
        session.declare_fun("Y", &FunSignature::new(vec![bv.clone()], SmtSort::Int))?;
        session.declare_fun("Q", &FunSignature::new(vec![bv.clone()], SmtSort::Bool))?;
        session.declare_var("a", &SmtSort::Int)?;
        session.declare_var("b", &SmtSort::Int)?;

        let line = |x: SmtTerm| SmtTerm::var("a").mul(x).add(SmtTerm::var("b"));
        let mut recorded = samples.iter().peekable();
        for x in 0..domain_size(width) {
            let point = SmtTerm::bv(x, width);
            let q = SmtTerm::app("Q", vec![point.clone()]);
            match recorded.next_if(|(sx, _)| *sx == x) {
                Some(&(_, y)) => {
                    session.assert(&q)?;
                    session.assert(&SmtTerm::app("Y", vec![point]).eq(SmtTerm::int(y)))?;
                    session.assert(&line(SmtTerm::int(x as i64)).eq(SmtTerm::int(y)))?;
                }
                None => session.assert(&q.not())?,
            }
        }
        session.assert(&SmtTerm::forall(
            vec![("x".into(), bv)],
            SmtTerm::app("Q", vec![SmtTerm::var("x")]).implies(
                SmtTerm::app("Y", vec![SmtTerm::var("x")]).eq(line(SmtTerm::var("x").bv2int())),
            ),
        ))?;

        if session.check()? == SatResult::Unsat {
            return Err(AnalysisError::Unsatisfiable(format!(
                "operand {operand} of shape {shape} is not affine in its significant bits"
            )));
        }
        let slope = session.eval_int(&SmtTerm::var("a"))?;
        let intercept = session.eval_int(&SmtTerm::var("b"))?;
        if let Some((x, y)) = samples
            .iter()
            .find(|(x, y)| slope.wrapping_mul(*x as i64).wrapping_add(intercept) != *y)
        {
            return Err(AnalysisError::Solver(format!(
                "model {slope}·x + {intercept} misses sample ({x}, {y})"
            )));
        }
        Ok((slope, intercept))
    }
}
