//! Oracle tables: the recorded sweep of a black-box function over every
//! W-bit encoding.

use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::bits::{check_width, domain_size};
use crate::error::AnalysisError;

/// Identifier of a shape, assigned in first-seen order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeId(pub u32);

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A finite function over `width`-bit encodings.
///
/// Analyses only compare outputs for equality, so any totally ordered output
/// type will do.
pub trait TableFunction {
    type Output: Ord + Clone + fmt::Debug;

    fn width(&self) -> u32;

    fn value_at(&self, encoding: u64) -> Result<Self::Output, AnalysisError>;
}

/// One oracle observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRecord {
    pub encoding: u64,
    pub signature: String,
    #[serde(default)]
    pub operands: Vec<i64>,
}

#[derive(Debug, Clone)]
struct Entry {
    shape: ShapeId,
    operands: Vec<i64>,
}

/// Shape ids and operand vectors for every encoding of a `width`-bit domain.
#[derive(Debug, Clone)]
pub struct OracleTable {
    width: u32,
    entries: Vec<Option<Entry>>,
    signatures: IndexSet<String>,
    specimens: Vec<u64>,
}

impl OracleTable {
    /// An empty table; every entry must be recorded before analysis.
    pub fn new(width: u32) -> Result<Self, AnalysisError> {
        check_width(width)?;
        Ok(Self {
            width,
            entries: vec![None; domain_size(width) as usize],
            signatures: IndexSet::new(),
            specimens: Vec::new(),
        })
    }

    /// Record the oracle output for `encoding`, assigning a new shape id if
    /// the signature has not been seen yet. Each encoding is recorded once.
    pub fn record(
        &mut self,
        encoding: u64,
        signature: &str,
        operands: Vec<i64>,
    ) -> Result<ShapeId, AnalysisError> {
        let slot = self.slot(encoding)?;
        if self.entries[slot].is_some() {
            return Err(AnalysisError::DuplicateEncoding { encoding });
        }
        let (index, fresh) = self.signatures.insert_full(signature.to_string());
        let shape = ShapeId(index as u32);
        if fresh {
            self.specimens.push(encoding);
        }
        self.entries[slot] = Some(Entry { shape, operands });
        Ok(shape)
    }

    /// Build a table from sweep results collected in any order.
    ///
    /// Records are re-sorted into encoding order before shape ids are
    /// assigned, so ids do not depend on the order results arrived in.
    pub fn from_sweep(
        width: u32,
        records: impl IntoIterator<Item = OracleRecord>,
    ) -> Result<Self, AnalysisError> {
        let mut records: Vec<OracleRecord> = records.into_iter().collect();
        records.sort_by_key(|r| r.encoding);
        let mut table = Self::new(width)?;
        for record in records {
            table.record(record.encoding, &record.signature, record.operands)?;
        }
        Ok(table)
    }

    /// Sweep `oracle` over the whole domain in encoding order.
    pub fn tabulate<S, F>(width: u32, mut oracle: F) -> Result<Self, AnalysisError>
    where
        S: AsRef<str>,
        F: FnMut(u64) -> (S, Vec<i64>),
    {
        let mut table = Self::new(width)?;
        for encoding in 0..domain_size(width) {
            let (signature, operands) = oracle(encoding);
            table.record(encoding, signature.as_ref(), operands)?;
        }
        Ok(table)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// First encoding without an entry, if any.
    pub fn first_missing(&self) -> Option<u64> {
        self.entries.iter().position(Option::is_none).map(|i| i as u64)
    }

    pub fn is_complete(&self) -> bool {
        self.first_missing().is_none()
    }

    /// Fail with [`AnalysisError::OracleIncomplete`] unless every entry is set.
    pub fn ensure_complete(&self) -> Result<(), AnalysisError> {
        match self.first_missing() {
            Some(encoding) => Err(AnalysisError::OracleIncomplete { encoding }),
            None => Ok(()),
        }
    }

    pub fn shape(&self, encoding: u64) -> Result<ShapeId, AnalysisError> {
        Ok(self.entry(encoding)?.shape)
    }

    pub fn operands(&self, encoding: u64) -> Result<&[i64], AnalysisError> {
        Ok(&self.entry(encoding)?.operands)
    }

    pub fn operand(&self, encoding: u64, index: usize) -> Result<i64, AnalysisError> {
        self.operands(encoding)?
            .get(index)
            .copied()
            .ok_or(AnalysisError::OperandOutOfRange { encoding, index })
    }

    pub fn shape_count(&self) -> usize {
        self.signatures.len()
    }

    pub fn shapes(&self) -> impl Iterator<Item = ShapeId> {
        (0..self.signatures.len() as u32).map(ShapeId)
    }

    pub fn signature(&self, shape: ShapeId) -> Result<&str, AnalysisError> {
        self.signatures
            .get_index(shape.0 as usize)
            .map(String::as_str)
            .ok_or(AnalysisError::UnknownShape(shape))
    }

    /// The first encoding recorded with `shape`.
    pub fn specimen(&self, shape: ShapeId) -> Result<u64, AnalysisError> {
        self.specimens
            .get(shape.0 as usize)
            .copied()
            .ok_or(AnalysisError::UnknownShape(shape))
    }

    pub fn specimen_operands(&self, shape: ShapeId) -> Result<&[i64], AnalysisError> {
        self.operands(self.specimen(shape)?)
    }

    /// Number of operand slots reported for `shape`, read from its specimen.
    pub fn operand_count(&self, shape: ShapeId) -> Result<usize, AnalysisError> {
        Ok(self.specimen_operands(shape)?.len())
    }

    /// View of operand `index` restricted to encodings of `shape`.
    pub fn project(&self, operand: usize, shape: ShapeId) -> Result<OperandProjection<'_>, AnalysisError> {
        self.signature(shape)?;
        Ok(OperandProjection {
            table: self,
            operand,
            shape,
        })
    }

    fn slot(&self, encoding: u64) -> Result<usize, AnalysisError> {
        if encoding >= domain_size(self.width) {
            return Err(AnalysisError::EncodingOutOfRange {
                encoding,
                width: self.width,
            });
        }
        Ok(encoding as usize)
    }

    fn entry(&self, encoding: u64) -> Result<&Entry, AnalysisError> {
        self.entries[self.slot(encoding)?]
            .as_ref()
            .ok_or(AnalysisError::OracleIncomplete { encoding })
    }
}

impl TableFunction for OracleTable {
    type Output = ShapeId;

    fn width(&self) -> u32 {
        self.width
    }

    fn value_at(&self, encoding: u64) -> Result<ShapeId, AnalysisError> {
        self.shape(encoding)
    }
}

/// Output of an [`OperandProjection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Projected {
    /// The encoding has a different shape.
    NotApplicable,
    Value(i64),
}

/// One operand slot as a function of the encoding, for a single shape.
#[derive(Debug, Clone, Copy)]
pub struct OperandProjection<'a> {
    table: &'a OracleTable,
    operand: usize,
    shape: ShapeId,
}

impl OperandProjection<'_> {
    pub fn operand(&self) -> usize {
        self.operand
    }

    pub fn shape(&self) -> ShapeId {
        self.shape
    }
}

impl TableFunction for OperandProjection<'_> {
    type Output = Projected;

    fn width(&self) -> u32 {
        self.table.width
    }

    fn value_at(&self, encoding: u64) -> Result<Projected, AnalysisError> {
        if self.table.shape(encoding)? != self.shape {
            return Ok(Projected::NotApplicable);
        }
        self.table.operand(encoding, self.operand).map(Projected::Value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(encoding: u64, signature: &str, operands: &[i64]) -> OracleRecord {
        OracleRecord {
            encoding,
            signature: signature.into(),
            operands: operands.to_vec(),
        }
    }

    #[test]
    fn sweep_order_does_not_change_shape_ids() -> Result<(), AnalysisError> {
        let records = vec![
            record(0, "nop", &[]),
            record(1, "add", &[1]),
            record(2, "sub", &[2]),
            record(3, "add", &[3]),
        ];
        let mut shuffled = records.clone();
        shuffled.reverse();
        shuffled.swap(0, 2);

        let a = OracleTable::from_sweep(2, records)?;
        let b = OracleTable::from_sweep(2, shuffled)?;
        for enc in 0..4 {
            assert_eq!(a.shape(enc)?, b.shape(enc)?);
        }
        assert_eq!(a.signature(ShapeId(1))?, "add");
        assert_eq!(b.specimen(ShapeId(1))?, 1);
        assert_eq!(b.specimen_operands(ShapeId(2))?, &[2]);
        Ok(())
    }

    #[test]
    fn partial_table_reports_first_missing_encoding() -> Result<(), AnalysisError> {
        let mut table = OracleTable::new(2)?;
        table.record(0, "a", vec![])?;
        table.record(2, "a", vec![])?;
        assert!(!table.is_complete());
        assert!(matches!(
            table.ensure_complete(),
            Err(AnalysisError::OracleIncomplete { encoding: 1 })
        ));
        assert!(matches!(
            table.value_at(3),
            Err(AnalysisError::OracleIncomplete { encoding: 3 })
        ));
        Ok(())
    }

    #[test]
    fn repeated_encodings_are_rejected() -> Result<(), AnalysisError> {
        let records = vec![
            record(0, "stale", &[99]),
            record(0, "mov", &[7]),
            record(1, "mov", &[7]),
        ];
        assert!(matches!(
            OracleTable::from_sweep(1, records),
            Err(AnalysisError::DuplicateEncoding { encoding: 0 })
        ));

        let mut table = OracleTable::new(1)?;
        table.record(1, "mov", vec![7])?;
        assert!(matches!(
            table.record(1, "stale", vec![99]),
            Err(AnalysisError::DuplicateEncoding { encoding: 1 })
        ));
        table.record(0, "mov", vec![7])?;
        // the rejected signature never became a shape
        assert_eq!(table.shape_count(), 1);
        assert_eq!(table.specimen(ShapeId(0))?, 1);
        Ok(())
    }

    #[test]
    fn out_of_range_encodings_are_rejected() -> Result<(), AnalysisError> {
        let mut table = OracleTable::new(2)?;
        assert!(matches!(
            table.record(4, "a", vec![]),
            Err(AnalysisError::EncodingOutOfRange { encoding: 4, width: 2 })
        ));
        assert!(matches!(
            OracleTable::new(30),
            Err(AnalysisError::WidthTooLarge { .. })
        ));
        Ok(())
    }

    #[test]
    fn projection_marks_other_shapes_not_applicable() -> Result<(), AnalysisError> {
        let table = OracleTable::tabulate(2, |e| {
            if e & 1 == 0 {
                ("even", vec![e as i64 * 10])
            } else {
                ("odd", vec![])
            }
        })?;
        let even = table.project(0, ShapeId(0))?;
        assert_eq!(even.value_at(2)?, Projected::Value(20));
        assert_eq!(even.value_at(1)?, Projected::NotApplicable);

        let odd = table.project(0, ShapeId(1))?;
        assert!(matches!(
            odd.value_at(3),
            Err(AnalysisError::OperandOutOfRange { encoding: 3, index: 0 })
        ));
        assert!(matches!(
            table.project(0, ShapeId(7)),
            Err(AnalysisError::UnknownShape(ShapeId(7)))
        ));
        Ok(())
    }
}
