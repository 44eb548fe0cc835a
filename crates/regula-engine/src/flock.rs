//! Flock factorization: splitting the relevant bits into a left and a right
//! group so that `shape(l, r) = f(t(l), s(r))`, where `s` is a boolean
//! classifier true at exactly one right pattern.
//!
//! Accepting only classifiers with a single named entry is an assumed
//! contract carried over from the way encodings are usually laid out (one
//! right pattern selects a variant), not a necessary condition for a
//! decomposition to exist.

use regula_smt::solver::SatResult;
use regula_smt::sorts::{FunSignature, SmtSort};
use regula_smt::terms::SmtTerm;
use serde::Serialize;
use tracing::{debug, info};

use crate::bits::{domain_size, interleave, low_mask, to_bit_string};
use crate::catalog::ShapeCatalog;
use crate::error::AnalysisError;
use crate::oracle::ShapeId;
use crate::session::SolverFactory;

/// A split of `width` relevant bits; set bits of `mask` form the right group.
///
/// Bit `k` of the mask refers to the `k`-th relevant position, matching the
/// layout of significant slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Flocking {
    pub mask: u64,
    pub width: u32,
}

impl Flocking {
    pub fn new(mask: u64, width: u32) -> Result<Self, AnalysisError> {
        if mask == 0 || mask & !low_mask(width) != 0 || mask == low_mask(width) {
            return Err(AnalysisError::DimensionMismatch(format!(
                "mask {mask:#b} is not a proper split of {width} bits"
            )));
        }
        Ok(Self { mask, width })
    }

    pub fn right_width(&self) -> u32 {
        self.mask.count_ones()
    }

    pub fn left_width(&self) -> u32 {
        self.width - self.right_width()
    }

    /// The relevant-bit pattern formed by left value `l` and right value `r`.
    pub fn combine(&self, left: u64, right: u64) -> Result<u64, AnalysisError> {
        interleave(
            left,
            self.left_width(),
            right,
            self.right_width(),
            self.mask,
            self.width,
        )
    }
}

impl std::fmt::Display for Flocking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", to_bit_string(self.mask, self.width))
    }
}

/// Every proper split of `width` bits, fewest right bits first and in
/// ascending numeric order within a population count.
#[derive(Debug, Clone)]
pub struct FlockCandidates {
    width: u32,
    weight: u32,
    next: u64,
}

impl FlockCandidates {
    pub fn new(width: u32) -> Self {
        Self {
            width,
            weight: 1,
            next: 1,
        }
    }
}

impl Iterator for FlockCandidates {
    type Item = Flocking;

    fn next(&mut self) -> Option<Flocking> {
        while self.weight < self.width {
            if self.next < domain_size(self.width) {
                let mask = self.next;
                self.next = next_with_same_weight(mask);
                return Some(Flocking {
                    mask,
                    width: self.width,
                });
            }
            self.weight += 1;
            self.next = low_mask(self.weight);
        }
        None
    }
}

/// Smallest integer above `x` with the same number of set bits.
fn next_with_same_weight(x: u64) -> u64 {
    let lowest = x & x.wrapping_neg();
    let ripple = x + lowest;
    (((ripple ^ x) >> 2) / lowest) | ripple
}

/// A nearly-constant boolean function over the right group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classifier {
    pub width: u32,
    /// Points whose value differs from `default`.
    pub entries: Vec<(u64, bool)>,
    pub default: bool,
}

impl Classifier {
    /// Summarise a full value table as a default plus explicit exceptions.
    ///
    /// The default is the majority value, `false` on a tie.
    pub fn from_values(width: u32, values: &[bool]) -> Self {
        let trues = values.iter().filter(|v| **v).count();
        let default = trues * 2 > values.len();
        let entries = values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != default)
            .map(|(p, v)| (p as u64, *v))
            .collect();
        Self {
            width,
            entries,
            default,
        }
    }

    pub fn eval(&self, point: u64) -> bool {
        self.entries
            .iter()
            .find(|(p, _)| *p == point)
            .map_or(self.default, |(_, v)| *v)
    }

    pub fn complement(&self) -> Self {
        Self {
            width: self.width,
            entries: self.entries.iter().map(|(p, v)| (*p, !v)).collect(),
            default: !self.default,
        }
    }

    /// The single right pattern the classifier selects, if it has exactly one
    /// entry mapped to `true`.
    pub fn selected(&self) -> Option<u64> {
        match self.entries.as_slice() {
            [(p, true)] if !self.default => Some(*p),
            _ => None,
        }
    }
}

/// One value of the combining function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CombineEntry {
    pub code: i64,
    pub selected: bool,
    pub shape: ShapeId,
}

/// An accepted flock: `shape(l, r) = combine(left_codes[l], classifier(r))`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlockDecomposition {
    pub flocking: Flocking,
    pub classifier: Classifier,
    pub left_codes: Vec<i64>,
    pub combine: Vec<CombineEntry>,
}

impl FlockDecomposition {
    pub fn predict(&self, left: u64, right: u64) -> Option<ShapeId> {
        let code = *self.left_codes.get(left as usize)?;
        let selected = self.classifier.eval(right);
        self.combine
            .iter()
            .find(|e| e.code == code && e.selected == selected)
            .map(|e| e.shape)
    }
}

/// How a single candidate fared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FlockOutcome {
    Accepted,
    Unsatisfiable,
    Degenerate { entries: usize },
    Inconclusive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlockAttempt {
    pub flocking: Flocking,
    #[serde(flatten)]
    pub outcome: FlockOutcome,
}

/// Result of a candidate search.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlockSearch {
    pub accepted: Vec<FlockDecomposition>,
    pub attempts: Vec<FlockAttempt>,
}

/// Tests flock hypotheses against a [`ShapeCatalog`].
pub struct FlockFactorizer<'a, F: SolverFactory> {
    factory: &'a F,
    catalog: &'a ShapeCatalog,
}

impl<'a, F: SolverFactory> FlockFactorizer<'a, F> {
    pub fn new(factory: &'a F, catalog: &'a ShapeCatalog) -> Self {
        Self { factory, catalog }
    }

    pub fn candidates(&self) -> FlockCandidates {
        FlockCandidates::new(self.catalog.entropy())
    }

    /// Try candidates in order, recording each attempt. Recoverable failures
    /// reject the candidate; anything else aborts the search.
    pub fn search(&self, stop_at_first: bool) -> Result<FlockSearch, AnalysisError> {
        info!(entropy = self.catalog.entropy(), "flock search started");
        let mut search = FlockSearch::default();
        for flocking in self.candidates() {
            let outcome = match self.factorize(flocking) {
                Ok(decomposition) => {
                    search.accepted.push(decomposition);
                    FlockOutcome::Accepted
                }
                Err(AnalysisError::Unsatisfiable(_)) => FlockOutcome::Unsatisfiable,
                Err(AnalysisError::DegenerateClassifier { entries }) => {
                    FlockOutcome::Degenerate { entries }
                }
                Err(AnalysisError::SolverTimeout(_)) => FlockOutcome::Inconclusive,
                Err(fatal) => return Err(fatal),
            };
            debug!(mask = %flocking, ?outcome, "flock candidate");
            let accepted = outcome == FlockOutcome::Accepted;
            search.attempts.push(FlockAttempt { flocking, outcome });
            if accepted && stop_at_first {
                break;
            }
        }
        info!(
            attempts = search.attempts.len(),
            accepted = search.accepted.len(),
            "flock search finished"
        );
        Ok(search)
    }

    /// The first accepted decomposition, if any.
    pub fn first(&self) -> Result<Option<FlockDecomposition>, AnalysisError> {
        Ok(self.search(true)?.accepted.into_iter().next())
    }

    /// Test one split. Fails with `Unsatisfiable` when no `f`, `t`, `s`
    /// exist and with `DegenerateClassifier` when the model's `s` is not
    /// true at exactly one point.
    pub fn factorize(&self, flocking: Flocking) -> Result<FlockDecomposition, AnalysisError> {
        let flocking = Flocking::new(flocking.mask, flocking.width)?;
        if flocking.width != self.catalog.entropy() {
            return Err(AnalysisError::DimensionMismatch(format!(
                "{}-bit flocking for entropy {}",
                flocking.width,
                self.catalog.entropy()
            )));
        }
        let (lw, rw) = (flocking.left_width(), flocking.right_width());
        let (left_sort, right_sort) = (SmtSort::bv(lw), SmtSort::bv(rw));

        let mut session = self.factory.open(&format!("flock {flocking}"))?;
        session.declare_fun(
            "sh",
            &FunSignature::new(vec![left_sort.clone(), right_sort.clone()], SmtSort::Int),
        )?;
        session.declare_fun(
            "f",
            &FunSignature::new(vec![SmtSort::Int, SmtSort::Bool], SmtSort::Int),
        )?;
        session.declare_fun("t", &FunSignature::new(vec![left_sort.clone()], SmtSort::Int))?;
        session.declare_fun("s", &FunSignature::new(vec![right_sort.clone()], SmtSort::Bool))?;

        let law = |l: SmtTerm, r: SmtTerm| {
            SmtTerm::app("sh", vec![l.clone(), r.clone()]).eq(SmtTerm::app(
                "f",
                vec![SmtTerm::app("t", vec![l]), SmtTerm::app("s", vec![r])],
            ))
        };
        session.assert(&SmtTerm::forall(
            vec![("l".into(), left_sort), ("r".into(), right_sort)],
            law(SmtTerm::var("l"), SmtTerm::var("r")),
        ))?;
        for l in 0..domain_size(lw) {
            for r in 0..domain_size(rw) {
                let shape = self.catalog.shape_of(flocking.combine(l, r)?)?;
                let (lt, rt) = (SmtTerm::bv(l, lw), SmtTerm::bv(r, rw));
                session.assert(
                    &SmtTerm::app("sh", vec![lt.clone(), rt.clone()])
                        .eq(SmtTerm::int(i64::from(shape.0))),
                )?;
                session.assert(&law(lt, rt))?;
            }
        }

        if session.check()? == SatResult::Unsat {
            return Err(AnalysisError::Unsatisfiable(format!(
                "no flock decomposition for mask {flocking}"
            )));
        }

        let mut values = Vec::with_capacity(domain_size(rw) as usize);
        for r in 0..domain_size(rw) {
            values.push(session.eval_bool(&SmtTerm::app("s", vec![SmtTerm::bv(r, rw)]))?);
        }
        let raw = Classifier::from_values(rw, &values);
        if raw.entries.len() != 1 {
            return Err(AnalysisError::DegenerateClassifier {
                entries: raw.entries.len(),
            });
        }
        let complemented = raw.default;
        let classifier = if complemented { raw.complement() } else { raw };

        let mut left_codes = Vec::with_capacity(domain_size(lw) as usize);
        for l in 0..domain_size(lw) {
            left_codes.push(session.eval_int(&SmtTerm::app("t", vec![SmtTerm::bv(l, lw)]))?);
        }
        let mut codes = left_codes.clone();
        codes.sort_unstable();
        codes.dedup();

        let mut combine = Vec::with_capacity(codes.len() * 2);
        for code in codes {
            for selected in [false, true] {
                let raw_key = selected != complemented;
                let value = session.eval_int(&SmtTerm::app(
                    "f",
                    vec![SmtTerm::int(code), SmtTerm::bool(raw_key)],
                ))?;
                let shape = u32::try_from(value).map(ShapeId).map_err(|_| {
                    AnalysisError::Solver(format!("combining function returned {value}"))
                })?;
                combine.push(CombineEntry {
                    code,
                    selected,
                    shape,
                });
            }
        }

        Ok(FlockDecomposition {
            flocking,
            classifier,
            left_codes,
            combine,
        })
    }
}
