use std::collections::HashMap;

use thiserror::Error;
use z3::ast::{Ast, Bool, Int, BV};
use z3::{FuncDecl, SatResult as Z3SatResult, Sort};

use crate::solver::{ModelValue, SatResult, SmtSolver};
use crate::sorts::{FunSignature, SmtSort};
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum Z3Error {
    #[error("Z3 error: {0}")]
    Internal(String),
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
    #[error("Function {name} expects {expected} arguments, got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },
}

/// In-process Z3 backend.
///
/// Constants and functions live in name-keyed tables; quantifier bindings
/// shadow them while the quantifier body is translated. The model of the
/// last SAT check is retained for [`SmtSolver::eval`].
pub struct Z3Solver {
    solver: z3::Solver,
    vars: HashMap<String, Z3Term>,
    funs: HashMap<String, (FuncDecl, FunSignature)>,
    model: Option<z3::Model>,
}

type Bindings = HashMap<String, Z3Term>;

impl Z3Solver {
    pub fn new() -> Self {
        Self::with_solver(z3::Solver::new())
    }

    /// A solver whose every check gives up after `timeout_secs`; zero means
    /// no limit. Limits beyond `u32::MAX` milliseconds are clamped.
    pub fn with_timeout_secs(timeout_secs: u64) -> Self {
        if timeout_secs == 0 {
            return Self::new();
        }
        let solver = z3::Solver::new();
        let mut params = z3::Params::new();
        let limit_ms = timeout_ms(timeout_secs);
        params.set_u32("timeout", limit_ms);
        params.set_u32("solver2_timeout", limit_ms);
        solver.set_params(&params);
        Self::with_solver(solver)
    }

    fn with_solver(solver: z3::Solver) -> Self {
        Self {
            solver,
            vars: HashMap::new(),
            funs: HashMap::new(),
            model: None,
        }
    }

    fn fresh_const(name: &str, sort: &SmtSort) -> Z3Term {
        match sort {
            SmtSort::Int => Z3Term::Int(Int::new_const(name)),
            SmtSort::Bool => Z3Term::Bool(Bool::new_const(name)),
            SmtSort::BitVec(w) => Z3Term::Bv(BV::new_const(name, *w)),
        }
    }

    fn translate_term(&self, term: &SmtTerm, bound: &Bindings) -> Result<Z3Term, Z3Error> {
        match term {
            SmtTerm::Var(name) => bound
                .get(name)
                .or_else(|| self.vars.get(name))
                .cloned()
                .ok_or_else(|| Z3Error::UnknownVariable(name.clone())),
            SmtTerm::IntLit(n) => Ok(Z3Term::Int(Int::from_i64(*n))),
            SmtTerm::BoolLit(b) => Ok(Z3Term::Bool(Bool::from_bool(*b))),
            SmtTerm::BvLit { value, width } => Ok(Z3Term::Bv(BV::from_u64(*value, *width))),
            SmtTerm::Add(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_int()?;
                let r = self.translate_term(rhs, bound)?.into_int()?;
                Ok(Z3Term::Int(&l + &r))
            }
            SmtTerm::Mul(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_int()?;
                let r = self.translate_term(rhs, bound)?.into_int()?;
                Ok(Z3Term::Int(&l * &r))
            }
            SmtTerm::Eq(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?;
                let r = self.translate_term(rhs, bound)?;
                match (l, r) {
                    (Z3Term::Int(li), Z3Term::Int(ri)) => Ok(Z3Term::Bool(li.eq(&ri))),
                    (Z3Term::Bool(lb), Z3Term::Bool(rb)) => Ok(Z3Term::Bool(lb.eq(&rb))),
                    (Z3Term::Bv(lv), Z3Term::Bv(rv)) => Ok(Z3Term::Bool(lv.eq(&rv))),
                    _ => Err(Z3Error::Internal("Sort mismatch in Eq".into())),
                }
            }
            SmtTerm::Not(inner) => {
                let b = self.translate_term(inner, bound)?.into_bool()?;
                Ok(Z3Term::Bool(b.not()))
            }
            SmtTerm::Implies(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_bool()?;
                let r = self.translate_term(rhs, bound)?.into_bool()?;
                Ok(Z3Term::Bool(l.implies(&r)))
            }
            SmtTerm::Extract { hi, lo, term } => {
                let bv = self.translate_term(term, bound)?.into_bv()?;
                Ok(Z3Term::Bv(bv.extract(*hi, *lo)))
            }
            SmtTerm::Concat(hi, lo) => {
                let h = self.translate_term(hi, bound)?.into_bv()?;
                let l = self.translate_term(lo, bound)?.into_bv()?;
                Ok(Z3Term::Bv(h.concat(&l)))
            }
            SmtTerm::BvToInt(inner) => {
                let bv = self.translate_term(inner, bound)?.into_bv()?;
                Ok(Z3Term::Int(bv.to_int(false)))
            }
            SmtTerm::App(name, args) => self.translate_app(name, args, bound),
            SmtTerm::ForAll(bindings, body) => {
                let mut scope = bound.clone();
                let mut consts = Vec::with_capacity(bindings.len());
                for (name, sort) in bindings {
                    let c = Self::fresh_const(name, sort);
                    scope.insert(name.clone(), c.clone());
                    consts.push(c);
                }
                let body = self.translate_term(body, &scope)?.into_bool()?;
                let refs: Vec<&dyn Ast> = consts.iter().map(Z3Term::as_ast).collect();
                Ok(Z3Term::Bool(z3::ast::forall_const(&refs, &[], &body)))
            }
        }
    }

    fn translate_app(
        &self,
        name: &str,
        args: &[SmtTerm],
        bound: &Bindings,
    ) -> Result<Z3Term, Z3Error> {
        let (decl, signature) = self
            .funs
            .get(name)
            .ok_or_else(|| Z3Error::UnknownFunction(name.to_string()))?;
        if signature.domain.len() != args.len() {
            return Err(Z3Error::Arity {
                name: name.to_string(),
                expected: signature.domain.len(),
                got: args.len(),
            });
        }
        let translated = args
            .iter()
            .map(|a| self.translate_term(a, bound))
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&dyn Ast> = translated.iter().map(Z3Term::as_ast).collect();
        let applied = decl.apply(&refs);
        let out = match signature.range {
            SmtSort::Int => applied.as_int().map(Z3Term::Int),
            SmtSort::Bool => applied.as_bool().map(Z3Term::Bool),
            SmtSort::BitVec(_) => applied.as_bv().map(Z3Term::Bv),
        };
        out.ok_or_else(|| Z3Error::Internal(format!("Sort mismatch applying {name}")))
    }

    fn capture_model(&mut self, result: &Z3SatResult) {
        self.model = match result {
            Z3SatResult::Sat => self.solver.get_model(),
            _ => None,
        };
    }
}

#[derive(Clone)]
enum Z3Term {
    Int(Int),
    Bool(Bool),
    Bv(BV),
}

impl Z3Term {
    fn into_int(self) -> Result<Int, Z3Error> {
        match self {
            Z3Term::Int(i) => Ok(i),
            _ => Err(Z3Error::Internal("Expected Int".into())),
        }
    }

    fn into_bool(self) -> Result<Bool, Z3Error> {
        match self {
            Z3Term::Bool(b) => Ok(b),
            _ => Err(Z3Error::Internal("Expected Bool".into())),
        }
    }

    fn into_bv(self) -> Result<BV, Z3Error> {
        match self {
            Z3Term::Bv(v) => Ok(v),
            _ => Err(Z3Error::Internal("Expected BitVec".into())),
        }
    }

    fn as_ast(&self) -> &dyn Ast {
        match self {
            Z3Term::Int(i) => i,
            Z3Term::Bool(b) => b,
            Z3Term::Bv(v) => v,
        }
    }
}

fn z3_sort(sort: &SmtSort) -> Sort {
    match sort {
        SmtSort::Int => Sort::int(),
        SmtSort::Bool => Sort::bool(),
        SmtSort::BitVec(w) => Sort::bitvector(*w),
    }
}

fn timeout_ms(timeout_secs: u64) -> u32 {
    u32::try_from(timeout_secs.saturating_mul(1000)).unwrap_or(u32::MAX)
}

fn convert_result(result: Z3SatResult) -> SatResult {
    match result {
        Z3SatResult::Sat => SatResult::Sat,
        Z3SatResult::Unsat => SatResult::Unsat,
        Z3SatResult::Unknown => SatResult::Unknown("Z3 returned unknown".into()),
    }
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtSolver for Z3Solver {
    type Error = Z3Error;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Z3Error> {
        self.vars
            .insert(name.to_string(), Self::fresh_const(name, sort));
        Ok(())
    }

    fn declare_fun(&mut self, name: &str, signature: &FunSignature) -> Result<(), Z3Error> {
        let domain: Vec<Sort> = signature.domain.iter().map(z3_sort).collect();
        let domain_refs: Vec<&Sort> = domain.iter().collect();
        let decl = FuncDecl::new(name, &domain_refs, &z3_sort(&signature.range));
        self.funs
            .insert(name.to_string(), (decl, signature.clone()));
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Z3Error> {
        let z3_term = self.translate_term(term, &Bindings::new())?.into_bool()?;
        self.solver.assert(&z3_term);
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Z3Error> {
        let result = self.solver.check();
        self.capture_model(&result);
        Ok(convert_result(result))
    }

    fn eval(&mut self, term: &SmtTerm) -> Result<Option<ModelValue>, Z3Error> {
        let Some(model) = &self.model else {
            return Ok(None);
        };
        let value = match self.translate_term(term, &Bindings::new())? {
            Z3Term::Int(i) => model
                .eval(&i, true)
                .and_then(|v| v.as_i64())
                .map(ModelValue::Int),
            Z3Term::Bool(b) => model
                .eval(&b, true)
                .and_then(|v| v.as_bool())
                .map(ModelValue::Bool),
            Z3Term::Bv(bv) => {
                let width = bv.get_size();
                model
                    .eval(&bv, true)
                    .and_then(|v| v.as_u64())
                    .map(|value| ModelValue::BitVec { value, width })
            }
        };
        Ok(value)
    }
}
