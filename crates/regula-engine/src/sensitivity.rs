//! Bit sensitivity: which encoding bits can change a function's output.

use std::collections::BTreeMap;
use std::fmt;

use regula_smt::solver::SatResult;
use regula_smt::sorts::{FunSignature, SmtSort};
use regula_smt::terms::{bits_except, SmtTerm};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bits::{check_width, domain_size, gather, low_mask, scatter};
use crate::error::AnalysisError;
use crate::fieldspec::{FieldElement, FieldSpec};
use crate::oracle::TableFunction;
use crate::session::SolverFactory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Unknown,
    Relevant,
    Irrelevant,
}

impl Sensitivity {
    fn glyph(self) -> char {
        match self {
            Sensitivity::Unknown => '?',
            Sensitivity::Relevant => '!',
            Sensitivity::Irrelevant => 'x',
        }
    }
}

/// Per-position sensitivity tags, indexed by bit position (bit 0 first).
///
/// A tag moves from `Unknown` to a verdict once and never changes again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitivityList {
    tags: Vec<Sensitivity>,
}

impl SensitivityList {
    pub fn unknown(width: u32) -> Self {
        Self {
            tags: vec![Sensitivity::Unknown; width as usize],
        }
    }

    pub fn from_tags(tags: Vec<Sensitivity>) -> Self {
        Self { tags }
    }

    pub fn width(&self) -> u32 {
        self.tags.len() as u32
    }

    pub fn tags(&self) -> &[Sensitivity] {
        &self.tags
    }

    pub fn get(&self, position: u32) -> Option<Sensitivity> {
        self.tags.get(position as usize).copied()
    }

    /// Resolve `position`. Only unknown tags may be set, and only to a verdict.
    pub fn set(&mut self, position: u32, verdict: Sensitivity) -> Result<(), AnalysisError> {
        let len = self.tags.len();
        let tag = self.tags.get_mut(position as usize).ok_or_else(|| {
            AnalysisError::DimensionMismatch(format!(
                "bit {position} outside a {}-bit list",
                len
            ))
        })?;
        if *tag != Sensitivity::Unknown {
            return Err(AnalysisError::SensitivityAlreadyResolved { position });
        }
        if verdict == Sensitivity::Unknown {
            return Err(AnalysisError::DimensionMismatch(format!(
                "bit {position} cannot be reset to unknown"
            )));
        }
        *tag = verdict;
        Ok(())
    }

    pub fn next_unknown(&self) -> Option<u32> {
        self.tags
            .iter()
            .position(|t| *t == Sensitivity::Unknown)
            .map(|p| p as u32)
    }

    pub fn is_resolved(&self) -> bool {
        self.next_unknown().is_none()
    }

    pub fn ensure_resolved(&self) -> Result<(), AnalysisError> {
        match self.next_unknown() {
            Some(position) => Err(AnalysisError::UnknownSensitivityAtFinalization { position }),
            None => Ok(()),
        }
    }

    /// Number of relevant positions.
    pub fn entropy(&self) -> u32 {
        self.tags
            .iter()
            .filter(|t| **t == Sensitivity::Relevant)
            .count() as u32
    }

    pub fn is_insensitive(&self) -> bool {
        self.entropy() == 0
    }

    /// Relevant positions in ascending order.
    pub fn relevant_positions(&self) -> Result<Vec<u32>, AnalysisError> {
        self.ensure_resolved()?;
        Ok(self
            .tags
            .iter()
            .enumerate()
            .filter(|(_, t)| **t == Sensitivity::Relevant)
            .map(|(i, _)| i as u32)
            .collect())
    }

    pub fn relevant_mask(&self) -> Result<u64, AnalysisError> {
        Ok(self
            .relevant_positions()?
            .into_iter()
            .fold(0u64, |mask, p| mask | 1 << p))
    }

    /// Keep the items at relevant positions; `items[i]` belongs to bit `i`.
    pub fn filter_relevant<T: Clone>(&self, items: &[T]) -> Result<Vec<T>, AnalysisError> {
        if items.len() != self.tags.len() {
            return Err(AnalysisError::DimensionMismatch(format!(
                "{} items for a {}-bit list",
                items.len(),
                self.tags.len()
            )));
        }
        self.ensure_resolved()?;
        Ok(items
            .iter()
            .zip(&self.tags)
            .filter(|(_, t)| **t == Sensitivity::Relevant)
            .map(|(item, _)| item.clone())
            .collect())
    }

    /// The relevant bits of `encoding` packed into an `entropy()`-bit value,
    /// lowest relevant position in bit 0.
    pub fn significant_slice(&self, encoding: u64) -> Result<u64, AnalysisError> {
        Ok(gather(encoding, self.relevant_mask()?))
    }

    /// Field spec enumerating one encoding per significant combination, with
    /// irrelevant positions held at zero.
    pub fn as_field_spec(&self) -> Result<FieldSpec, AnalysisError> {
        self.ensure_resolved()?;
        let elements = self
            .tags
            .iter()
            .rev()
            .map(|t| match t {
                Sensitivity::Relevant => FieldElement::Free(1),
                _ => FieldElement::zeros(1),
            })
            .collect();
        FieldSpec::new(elements)
    }

    /// Every encoding whose significant slice is `slice`.
    pub fn fiber(&self, slice: u64) -> Result<Vec<u64>, AnalysisError> {
        let relevant = self.relevant_mask()?;
        let entropy = self.entropy();
        if slice & !low_mask(entropy) != 0 {
            return Err(AnalysisError::EncodingOutOfRange {
                encoding: slice,
                width: entropy,
            });
        }
        let base = scatter(slice, relevant);
        let irrelevant = !relevant & low_mask(self.width());
        Ok((0..domain_size(self.width() - entropy))
            .map(|k| base | scatter(k, irrelevant))
            .collect())
    }

    /// The first two encodings of the field-spec enumeration.
    pub fn two_points(&self) -> Result<(u64, u64), AnalysisError> {
        self.ensure_resolved()?;
        if self.is_insensitive() {
            return Err(AnalysisError::InsensitiveDecompositionRequested);
        }
        let spec = self.as_field_spec()?;
        let mut points = spec.iter();
        match (points.next(), points.next()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(AnalysisError::InsensitiveDecompositionRequested),
        }
    }
}

impl fmt::Display for SensitivityList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let glyphs: String = self.tags.iter().rev().map(|t| t.glyph()).collect();
        write!(f, "«{glyphs}»")
    }
}

/// Decides bit relevance with one solver probe per position.
pub struct SensitivityAnalyzer<'f, F: SolverFactory> {
    factory: &'f F,
}

impl<'f, F: SolverFactory> SensitivityAnalyzer<'f, F> {
    pub fn new(factory: &'f F) -> Self {
        Self { factory }
    }

    /// Resolve the sensitivity of every bit of `function`.
    ///
    /// The function is read over its whole domain up front, so an incomplete
    /// table fails before any solver runs.
    pub fn analyze<T: TableFunction>(&self, function: &T) -> Result<SensitivityList, AnalysisError> {
        let width = function.width();
        check_width(width)?;
        let codes = dense_codes(function)?;
        let mut list = SensitivityList::unknown(width);
        while let Some(position) = list.next_unknown() {
            let verdict = self.probe(&codes, width, position)?;
            debug!(position, ?verdict, "bit sensitivity");
            list.set(position, verdict)?;
        }
        info!(width, entropy = list.entropy(), list = %list, "sensitivity resolved");
        Ok(list)
    }

    /// Bit `position` is irrelevant iff no two encodings that agree on every
    /// other bit map to different outputs.
    fn probe(&self, codes: &[i64], width: u32, position: u32) -> Result<Sensitivity, AnalysisError> {
        let mut session = self.factory.open(&format!("sensitivity of bit {position}"))?;
        let bv = SmtSort::bv(width);
        session.declare_fun("P", &FunSignature::new(vec![bv.clone()], SmtSort::Int))?;
        for (x, code) in codes.iter().enumerate() {
            let fact = SmtTerm::app("P", vec![SmtTerm::bv(x as u64, width)]).eq(SmtTerm::int(*code));
            session.assert(&fact)?;
        }
        session.declare_var("v1", &bv)?;
        session.declare_var("v2", &bv)?;

        let outputs_differ = SmtTerm::app("P", vec![SmtTerm::var("v1")])
            .ne(SmtTerm::app("P", vec![SmtTerm::var("v2")]));
        let rest_differs = if width < 2 {
            SmtTerm::bool(false)
        } else {
            bits_except(SmtTerm::var("v1"), width, position)
                .ne(bits_except(SmtTerm::var("v2"), width, position))
        };
        session.assert(&outputs_differ.implies(rest_differs).not())?;
        match session.check()? {
            SatResult::Unsat => Ok(Sensitivity::Irrelevant),
            _ => Ok(Sensitivity::Relevant),
        }
    }
}

/// Map each output to a small integer, distinct outputs to distinct codes.
fn dense_codes<T: TableFunction>(function: &T) -> Result<Vec<i64>, AnalysisError> {
    let mut index: BTreeMap<T::Output, i64> = BTreeMap::new();
    let mut codes = Vec::with_capacity(domain_size(function.width()) as usize);
    for x in 0..domain_size(function.width()) {
        let output = function.value_at(x)?;
        let next = index.len() as i64;
        codes.push(*index.entry(output).or_insert(next));
    }
    Ok(codes)
}
