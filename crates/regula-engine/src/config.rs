//! Analysis configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bits::MAX_WIDTH;

/// Solver backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverChoice {
    #[default]
    Z3,
    Cvc5,
}

impl std::fmt::Display for SolverChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverChoice::Z3 => write!(f, "z3"),
            SolverChoice::Cvc5 => write!(f, "cvc5"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings shared by every analysis operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub solver: SolverChoice,
    /// Per solver call; 0 means unbounded.
    pub timeout_secs: u64,
    pub max_width: u32,
    pub cvc5_command: String,
    /// Stop the flock search at the first accepted decomposition.
    pub stop_at_first_flock: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            solver: SolverChoice::Z3,
            timeout_secs: 30,
            max_width: MAX_WIDTH,
            cvc5_command: "cvc5".into(),
            stop_at_first_flock: true,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: AnalysisConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_width == 0 || self.max_width > MAX_WIDTH {
            return Err(ConfigError::Invalid(format!(
                "max_width must be between 1 and {MAX_WIDTH}, got {}",
                self.max_width
            )));
        }
        if self.solver == SolverChoice::Cvc5 && self.cvc5_command.trim().is_empty() {
            return Err(ConfigError::Invalid("cvc5_command is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout_secs, 30);
        assert!(config.stop_at_first_flock);
    }

    #[test]
    fn partial_file_keeps_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, r#"{{ "solver": "cvc5", "timeout_secs": 5 }}"#)?;
        let config = AnalysisConfig::from_json_file(file.path())?;
        assert_eq!(config.solver, SolverChoice::Cvc5);
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.max_width, MAX_WIDTH);
        assert_eq!(config.cvc5_command, "cvc5");
        Ok(())
    }

    #[test]
    fn width_outside_ceiling_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, r#"{{ "max_width": 30 }}"#)?;
        let err = AnalysisConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let zero = AnalysisConfig {
            max_width: 0,
            ..AnalysisConfig::default()
        };
        assert!(zero.validate().is_err());
        Ok(())
    }

    #[test]
    fn malformed_json_is_a_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, "{{ solver = z3")?;
        assert!(matches!(
            AnalysisConfig::from_json_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
        Ok(())
    }
}
