// Command handler for: Sensitivity

use std::path::PathBuf;

use miette::IntoDiagnostic;
use serde::Serialize;

use regula_engine::{AnalysisConfig, SolverFactory};

use super::helpers::{analysis_for, emit, load_sweep};
use crate::OutputFormat;

#[derive(Debug, Serialize)]
pub(crate) struct SensitivityReport {
    pub(crate) file: String,
    pub(crate) width: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) spec: Option<String>,
    pub(crate) sensitivity: String,
    pub(crate) entropy: u32,
    pub(crate) relevant_bits: String,
    pub(crate) relevant_positions: Vec<u32>,
    /// Field spec enumerating one table index per significant combination.
    pub(crate) significant_spec: String,
    pub(crate) shapes: usize,
}

pub(crate) fn run_sensitivity_command<F: SolverFactory>(
    factory: &F,
    config: &AnalysisConfig,
    file: PathBuf,
    format: OutputFormat,
) -> miette::Result<()> {
    let loaded = load_sweep(&file, config)?;
    let mut analysis = analysis_for(factory, &loaded, config)?;
    let list = analysis.sensitivity().into_diagnostic()?.clone();
    let report = SensitivityReport {
        file: loaded.file.display().to_string(),
        width: loaded.table.width(),
        spec: loaded.spec.as_ref().map(ToString::to_string),
        sensitivity: list.to_string(),
        entropy: list.entropy(),
        relevant_bits: analysis.relevant_bits_string().into_diagnostic()?,
        relevant_positions: analysis.relevant_bit_positions().into_diagnostic()?,
        significant_spec: list.as_field_spec().into_diagnostic()?.to_string(),
        shapes: loaded.table.shape_count(),
    };
    emit(format, &report, render_sensitivity_text)
}

fn render_sensitivity_text(report: &SensitivityReport) -> String {
    let mut out = format!("Sensitivity of {} ({} bits)\n", report.file, report.width);
    if let Some(spec) = &report.spec {
        out.push_str(&format!("  word spec:     {spec}\n"));
    }
    out.push_str(&format!("  sensitivity:   {}\n", report.sensitivity));
    out.push_str(&format!("  entropy:       {}\n", report.entropy));
    out.push_str(&format!("  relevant bits: {}\n", report.relevant_bits));
    let positions: Vec<String> = report.relevant_positions.iter().map(u32::to_string).collect();
    out.push_str(&format!("  positions:     [{}]\n", positions.join(", ")));
    out.push_str(&format!("  enumerate:     {}\n", report.significant_spec));
    out.push_str(&format!("  shapes:        {}", report.shapes));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_lists_every_field() {
        let report = SensitivityReport {
            file: "s.json".into(),
            width: 3,
            spec: Some("0b1 3".into()),
            sensitivity: "«!x!»".into(),
            entropy: 2,
            relevant_bits: ".!.!".into(),
            relevant_positions: vec![2, 0],
            significant_spec: "1 0b0 1".into(),
            shapes: 2,
        };
        let text = render_sensitivity_text(&report);
        assert!(text.contains("«!x!»"));
        assert!(text.contains("[2, 0]"));
        assert!(text.contains("word spec:     0b1 3"));
        assert!(text.ends_with("shapes:        2"));
    }
}
