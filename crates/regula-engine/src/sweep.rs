//! Recorded oracle sweeps on disk.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::error::AnalysisError;
use crate::fieldspec::FieldSpec;
use crate::oracle::{OracleRecord, OracleTable};

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Cannot read sweep file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed sweep file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Oracle results for every table index, optionally with the field spec of
/// the full word the index was cut from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    pub width: u32,
    pub points: Vec<OracleRecord>,
}

impl SweepFile {
    pub fn load(path: &Path) -> Result<Self, SweepError> {
        let text = std::fs::read_to_string(path)?;
        let sweep: SweepFile = serde_json::from_str(&text)?;
        info!(path = %path.display(), points = sweep.points.len(), "sweep loaded");
        Ok(sweep)
    }

    pub fn save(&self, path: &Path) -> Result<(), SweepError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Sweep `oracle` over every word of `spec`. Records are keyed by the
    /// word's variable slice.
    pub fn collect<F>(spec: &FieldSpec, mut oracle: F) -> Self
    where
        F: FnMut(u64) -> (String, Vec<i64>),
    {
        let points = spec
            .iter()
            .map(|word| {
                let (signature, operands) = oracle(word);
                OracleRecord {
                    encoding: spec.variable_slice(word),
                    signature,
                    operands,
                }
            })
            .collect();
        Self {
            spec: Some(spec.to_string()),
            width: spec.free_width(),
            points,
        }
    }

    pub fn field_spec(&self) -> Result<Option<FieldSpec>, AnalysisError> {
        let Some(text) = &self.spec else {
            return Ok(None);
        };
        let spec: FieldSpec = text.parse()?;
        if spec.free_width() != self.width {
            return Err(AnalysisError::DimensionMismatch(format!(
                "spec '{spec}' has {} free bits but the sweep is {} bits wide",
                spec.free_width(),
                self.width
            )));
        }
        Ok(Some(spec))
    }

    /// Build the oracle table with deterministic shape ids.
    pub fn table(&self) -> Result<OracleTable, AnalysisError> {
        OracleTable::from_sweep(self.width, self.points.iter().cloned())
    }
}
