//! Shapes grouped by significant-bit pattern.

use indexmap::IndexMap;
use tracing::info;

use crate::bits::{domain_size, low_mask};
use crate::error::AnalysisError;
use crate::oracle::{OracleTable, ShapeId};
use crate::sensitivity::SensitivityList;

/// Lookup from significant-bit patterns to shapes and back.
///
/// Patterns are `entropy`-bit values as produced by
/// [`SensitivityList::significant_slice`].
#[derive(Debug, Clone)]
pub struct ShapeCatalog {
    sensitivity: SensitivityList,
    by_pattern: Vec<ShapeId>,
    by_shape: IndexMap<ShapeId, Vec<u64>>,
}

impl ShapeCatalog {
    pub fn build(table: &OracleTable, sensitivity: &SensitivityList) -> Result<Self, AnalysisError> {
        sensitivity.ensure_resolved()?;
        if sensitivity.width() != table.width() {
            return Err(AnalysisError::DimensionMismatch(format!(
                "{}-bit sensitivity list for a {}-bit table",
                sensitivity.width(),
                table.width()
            )));
        }
        table.ensure_complete()?;

        let spec = sensitivity.as_field_spec()?;
        let mut by_pattern = vec![ShapeId(0); domain_size(sensitivity.entropy()) as usize];
        let mut by_shape: IndexMap<ShapeId, Vec<u64>> = IndexMap::new();
        for encoding in spec.iter() {
            let pattern = sensitivity.significant_slice(encoding)?;
            let shape = table.shape(encoding)?;
            by_pattern[pattern as usize] = shape;
            by_shape.entry(shape).or_default().push(pattern);
        }
        info!(
            entropy = sensitivity.entropy(),
            shapes = by_shape.len(),
            "shape catalog built"
        );
        Ok(Self {
            sensitivity: sensitivity.clone(),
            by_pattern,
            by_shape,
        })
    }

    pub fn sensitivity(&self) -> &SensitivityList {
        &self.sensitivity
    }

    pub fn entropy(&self) -> u32 {
        self.sensitivity.entropy()
    }

    pub fn shape_of(&self, pattern: u64) -> Result<ShapeId, AnalysisError> {
        if pattern & !low_mask(self.entropy()) != 0 {
            return Err(AnalysisError::EncodingOutOfRange {
                encoding: pattern,
                width: self.entropy(),
            });
        }
        Ok(self.by_pattern[pattern as usize])
    }

    /// Patterns producing `shape`, in ascending order.
    pub fn patterns_of(&self, shape: ShapeId) -> Result<&[u64], AnalysisError> {
        self.by_shape
            .get(&shape)
            .map(Vec::as_slice)
            .ok_or(AnalysisError::UnknownShape(shape))
    }

    /// Shapes in order of their smallest pattern.
    pub fn shapes(&self) -> impl Iterator<Item = ShapeId> + '_ {
        self.by_shape.keys().copied()
    }

    pub fn shape_count(&self) -> usize {
        self.by_shape.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensitivity::Sensitivity::{Irrelevant as X, Relevant as R, Unknown};

    fn table() -> OracleTable {
        // shape = b2 AND b0
        OracleTable::tabulate(3, |e| {
            let on = (e >> 2) & e & 1 == 1;
            (if on { "and" } else { "none" }, vec![])
        })
        .unwrap()
    }

    #[test]
    fn groups_patterns_by_shape() -> Result<(), AnalysisError> {
        let list = SensitivityList::from_tags(vec![R, X, R]);
        let catalog = ShapeCatalog::build(&table(), &list)?;
        assert_eq!(catalog.entropy(), 2);
        assert_eq!(catalog.shape_count(), 2);
        assert_eq!(catalog.shape_of(0b11)?, ShapeId(1));
        assert_eq!(catalog.shape_of(0b01)?, ShapeId(0));
        assert_eq!(catalog.patterns_of(ShapeId(0))?, &[0b00, 0b01, 0b10]);
        assert_eq!(catalog.patterns_of(ShapeId(1))?, &[0b11]);
        assert!(catalog.shape_of(0b100).is_err());
        assert!(catalog.patterns_of(ShapeId(5)).is_err());
        Ok(())
    }

    #[test]
    fn requires_resolved_sensitivity() {
        let list = SensitivityList::from_tags(vec![R, Unknown, R]);
        assert!(matches!(
            ShapeCatalog::build(&table(), &list),
            Err(AnalysisError::UnknownSensitivityAtFinalization { position: 1 })
        ));
    }

    #[test]
    fn rejects_mismatched_widths() {
        let list = SensitivityList::from_tags(vec![R, R]);
        assert!(matches!(
            ShapeCatalog::build(&table(), &list),
            Err(AnalysisError::DimensionMismatch(_))
        ));
    }
}
