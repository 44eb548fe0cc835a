//! Field specs: MSB-first templates of fixed and free bit runs.
//!
//! A spec such as `0b0111 4 0b0 3` describes 9-bit words whose top four bits
//! are `0111`, followed by four free bits, a fixed `0` and three more free
//! bits. The free bits, read MSB-first, form the variable slice of a word.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bits::{gather, low_mask, scatter, to_bit_string};
use crate::error::AnalysisError;

const MAX_SPEC_WIDTH: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldElement {
    /// A literal run of `width` bits.
    Fixed { value: u64, width: u32 },
    /// A run of free bits.
    Free(u32),
}

impl FieldElement {
    pub fn width(&self) -> u32 {
        match self {
            FieldElement::Fixed { width, .. } => *width,
            FieldElement::Free(n) => *n,
        }
    }

    pub fn zeros(width: u32) -> Self {
        FieldElement::Fixed { value: 0, width }
    }

    fn join(self, low: FieldElement) -> Option<FieldElement> {
        match (self, low) {
            (FieldElement::Free(n), FieldElement::Free(m)) => {
                n.checked_add(m).map(FieldElement::Free)
            }
            (
                FieldElement::Fixed { value, width },
                FieldElement::Fixed {
                    value: low_value,
                    width: low_width,
                },
            ) => match width.checked_add(low_width) {
                Some(joined) if joined <= MAX_SPEC_WIDTH => Some(FieldElement::Fixed {
                    value: (value << low_width) | low_value,
                    width: joined,
                }),
                _ => None,
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<FieldElement>", into = "Vec<FieldElement>")]
pub struct FieldSpec {
    elements: Vec<FieldElement>,
}

impl TryFrom<Vec<FieldElement>> for FieldSpec {
    type Error = AnalysisError;

    fn try_from(elements: Vec<FieldElement>) -> Result<Self, AnalysisError> {
        FieldSpec::new(elements)
    }
}

impl From<FieldSpec> for Vec<FieldElement> {
    fn from(spec: FieldSpec) -> Self {
        spec.elements
    }
}

impl FieldSpec {
    /// Build a spec, merging adjacent runs of the same kind and dropping
    /// empty ones.
    pub fn new(elements: Vec<FieldElement>) -> Result<Self, AnalysisError> {
        let mut merged: Vec<FieldElement> = Vec::with_capacity(elements.len());
        let mut total = 0u32;
        for element in elements {
            if element.width() == 0 {
                continue;
            }
            total = total
                .checked_add(element.width())
                .filter(|w| *w <= MAX_SPEC_WIDTH)
                .ok_or_else(|| {
                    AnalysisError::FieldSpec(format!(
                        "spec is wider than {MAX_SPEC_WIDTH} bits"
                    ))
                })?;
            if let Some(last) = merged.last_mut() {
                if let Some(joined) = last.join(element) {
                    *last = joined;
                    continue;
                }
            }
            merged.push(element);
        }
        Ok(FieldSpec { elements: merged })
    }

    /// A spec with `width` free bits and nothing fixed.
    pub fn all_free(width: u32) -> Result<Self, AnalysisError> {
        Self::new(vec![FieldElement::Free(width)])
    }

    pub fn elements(&self) -> &[FieldElement] {
        &self.elements
    }

    pub fn width(&self) -> u32 {
        self.elements
            .iter()
            .fold(0u32, |total, e| total.saturating_add(e.width()))
    }

    pub fn free_width(&self) -> u32 {
        self.elements
            .iter()
            .filter_map(|e| match e {
                FieldElement::Free(n) => Some(*n),
                FieldElement::Fixed { .. } => None,
            })
            .fold(0u32, u32::saturating_add)
    }

    /// Mask of the free positions within the word.
    pub fn free_mask(&self) -> u64 {
        let mut mask = 0u64;
        let mut position = self.width();
        for element in &self.elements {
            position -= element.width();
            if let FieldElement::Free(n) = element {
                mask |= low_mask(*n) << position;
            }
        }
        mask
    }

    /// The word with every free bit cleared.
    pub fn fixed_bits(&self) -> u64 {
        let mut word = 0u64;
        let mut position = self.width();
        for element in &self.elements {
            position -= element.width();
            if let FieldElement::Fixed { value, width } = element {
                word |= (value & low_mask(*width)) << position;
            }
        }
        word
    }

    /// Absolute positions of the free bits, most significant first.
    pub fn var_bit_positions(&self) -> Vec<u32> {
        let mask = self.free_mask();
        (0..self.width()).rev().filter(|i| mask >> i & 1 == 1).collect()
    }

    /// Extract the free bits of `word` as a `free_width()`-bit index.
    pub fn variable_slice(&self, word: u64) -> u64 {
        gather(word, self.free_mask())
    }

    /// The word whose fixed bits follow the spec and whose variable slice is
    /// `index`.
    pub fn instantiate(&self, index: u64) -> Result<u64, AnalysisError> {
        let free = self.free_width();
        if index & !low_mask(free) != 0 {
            return Err(AnalysisError::EncodingOutOfRange {
                encoding: index,
                width: free,
            });
        }
        Ok(self.fixed_bits() | scatter(index, self.free_mask()))
    }

    /// Whether `word` agrees with every fixed run.
    pub fn matches(&self, word: u64) -> bool {
        word & !low_mask(self.width()) == 0 && word & !self.free_mask() == self.fixed_bits()
    }

    /// Every word covered by the spec, counting the free bits upward.
    pub fn iter(&self) -> FieldSpecIter<'_> {
        FieldSpecIter {
            spec: self,
            free_mask: self.free_mask(),
            fixed: self.fixed_bits(),
            next: 0,
            end: 1u64 << self.free_width().min(63),
        }
    }

    pub fn count(&self) -> u64 {
        1u64 << self.free_width().min(63)
    }
}

/// Lazy enumerator over the words of a [`FieldSpec`].
#[derive(Debug, Clone)]
pub struct FieldSpecIter<'a> {
    spec: &'a FieldSpec,
    free_mask: u64,
    fixed: u64,
    next: u64,
    end: u64,
}

impl FieldSpecIter<'_> {
    pub fn spec(&self) -> &FieldSpec {
        self.spec
    }
}

impl Iterator for FieldSpecIter<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.next >= self.end {
            return None;
        }
        let word = self.fixed | scatter(self.next, self.free_mask);
        self.next += 1;
        Some(word)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.end - self.next).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl<'a> IntoIterator for &'a FieldSpec {
    type Item = u64;
    type IntoIter = FieldSpecIter<'a>;

    fn into_iter(self) -> FieldSpecIter<'a> {
        self.iter()
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            match element {
                FieldElement::Fixed { value, width } => {
                    write!(f, "0b{}", to_bit_string(*value, *width))?
                }
                FieldElement::Free(n) => write!(f, "{n}")?,
            }
        }
        Ok(())
    }
}

impl FromStr for FieldSpec {
    type Err = AnalysisError;

    fn from_str(text: &str) -> Result<Self, AnalysisError> {
        let mut elements = Vec::new();
        for token in text.split_whitespace() {
            if let Some(bits) = token.strip_prefix("0b") {
                if bits.is_empty() || bits.len() > MAX_SPEC_WIDTH as usize {
                    return Err(AnalysisError::FieldSpec(format!(
                        "bad fixed run '{token}'"
                    )));
                }
                let value = u64::from_str_radix(bits, 2).map_err(|_| {
                    AnalysisError::FieldSpec(format!("'{token}' is not a bit string"))
                })?;
                elements.push(FieldElement::Fixed {
                    value,
                    width: bits.len() as u32,
                });
            } else {
                let n: u32 = token.parse().map_err(|_| {
                    AnalysisError::FieldSpec(format!("'{token}' is neither 0b<bits> nor a count"))
                })?;
                if n > MAX_SPEC_WIDTH {
                    return Err(AnalysisError::FieldSpec(format!(
                        "free run '{token}' is wider than {MAX_SPEC_WIDTH} bits"
                    )));
                }
                elements.push(FieldElement::Free(n));
            }
        }
        let spec = FieldSpec::new(elements)?;
        if spec.elements.is_empty() {
            return Err(AnalysisError::FieldSpec(format!("'{text}' describes no bits")));
        }
        Ok(spec)
    }
}
