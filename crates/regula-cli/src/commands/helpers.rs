// Shared helpers for command handlers: flag parsing, config resolution,
// sweep loading and report output.

use std::path::{Path, PathBuf};

use miette::IntoDiagnostic;
use serde::Serialize;

use regula_engine::oracle::OracleTable;
use regula_engine::{AnalysisConfig, FieldSpec, ShapeAnalysis, SolverChoice, SolverFactory, SweepFile};

use crate::cli::Cli;
use crate::OutputFormat;

pub(crate) fn parse_solver_choice(raw: &str) -> miette::Result<SolverChoice> {
    match raw {
        "z3" => Ok(SolverChoice::Z3),
        "cvc5" => Ok(SolverChoice::Cvc5),
        other => Err(miette::miette!("Unknown solver: {other}. Use 'z3' or 'cvc5'.")),
    }
}

pub(crate) fn parse_output_format(raw: &str) -> miette::Result<OutputFormat> {
    match raw {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        other => Err(miette::miette!(
            "Unknown output format: {other}. Use 'text' or 'json'."
        )),
    }
}

/// Config file values overridden by explicit flags.
pub(crate) fn analysis_config_from_cli(cli: &Cli) -> miette::Result<AnalysisConfig> {
    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::from_json_file(path).map_err(|e| {
            miette::miette!("Failed to load config {}: {e}", path.display())
        })?,
        None => AnalysisConfig::default(),
    };
    if let Some(solver) = &cli.solver {
        config.solver = parse_solver_choice(solver)?;
    }
    if let Some(timeout) = cli.timeout_secs {
        config.timeout_secs = timeout;
    }
    config.validate().into_diagnostic()?;
    Ok(config)
}

/// A sweep file with its oracle table and optional word spec.
pub(crate) struct LoadedSweep {
    pub(crate) file: PathBuf,
    pub(crate) table: OracleTable,
    pub(crate) spec: Option<FieldSpec>,
}

pub(crate) fn load_sweep(path: &Path, config: &AnalysisConfig) -> miette::Result<LoadedSweep> {
    let sweep = SweepFile::load(path)
        .map_err(|e| miette::miette!("Failed to load sweep {}: {e}", path.display()))?;
    if sweep.width > config.max_width {
        return Err(miette::miette!(
            "Sweep is {} bits wide; the configured maximum is {}",
            sweep.width,
            config.max_width
        ));
    }
    let spec = sweep.field_spec().into_diagnostic()?;
    let table = sweep.table().into_diagnostic()?;
    Ok(LoadedSweep {
        file: path.to_path_buf(),
        table,
        spec,
    })
}

/// Analysis of a loaded sweep under `config`.
pub(crate) fn analysis_for<'a, F: SolverFactory>(
    factory: &'a F,
    loaded: &'a LoadedSweep,
    config: &AnalysisConfig,
) -> miette::Result<ShapeAnalysis<'a, F>> {
    let analysis = ShapeAnalysis::new(factory, &loaded.table)
        .with_config(config)
        .into_diagnostic()?;
    match &loaded.spec {
        Some(spec) => analysis.with_spec(spec.clone()).into_diagnostic(),
        None => Ok(analysis),
    }
}

pub(crate) fn to_pretty_json<T: Serialize>(report: &T) -> miette::Result<String> {
    serde_json::to_string_pretty(report).into_diagnostic()
}

pub(crate) fn write_json_artifact<T: Serialize>(path: &Path, report: &T) -> miette::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).into_diagnostic()?;
    }
    std::fs::write(path, to_pretty_json(report)?).into_diagnostic()?;
    Ok(())
}

/// Print `report` as JSON or through `render` as text.
pub(crate) fn emit<T: Serialize>(
    format: OutputFormat,
    report: &T,
    render: impl FnOnce(&T) -> String,
) -> miette::Result<()> {
    match format {
        OutputFormat::Text => println!("{}", render(report)),
        OutputFormat::Json => println!("{}", to_pretty_json(report)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_flags_are_errors() {
        assert!(parse_solver_choice("yices").is_err());
        assert!(parse_output_format("yaml").is_err());
        assert_eq!(parse_solver_choice("cvc5").ok(), Some(SolverChoice::Cvc5));
        assert_eq!(parse_output_format("json").ok(), Some(OutputFormat::Json));
    }
}
