// Command handler for: Formula

use std::path::PathBuf;

use miette::IntoDiagnostic;
use serde::Serialize;

use regula_engine::oracle::ShapeId;
use regula_engine::{AnalysisConfig, OperandFormula, SolverFactory};

use super::helpers::{analysis_for, emit, load_sweep};
use crate::OutputFormat;

#[derive(Debug, Serialize)]
pub(crate) struct FormulaReport {
    pub(crate) file: String,
    pub(crate) operand: usize,
    pub(crate) shape: ShapeId,
    pub(crate) signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) formula: Option<OperandFormula>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) failure: Option<String>,
}

pub(crate) fn run_formula_command<F: SolverFactory>(
    factory: &F,
    config: &AnalysisConfig,
    file: PathBuf,
    operand: usize,
    shape: u32,
    format: OutputFormat,
) -> miette::Result<()> {
    let loaded = load_sweep(&file, config)?;
    let analysis = analysis_for(factory, &loaded, config)?;
    let shape = ShapeId(shape);
    let signature = loaded.table.signature(shape).into_diagnostic()?.to_string();

    let (formula, failure) = match analysis.formula_for(operand, shape) {
        Ok(formula) => (Some(formula), None),
        Err(e) if e.is_recoverable() => (None, Some(e.to_string())),
        Err(e) => return Err(e).into_diagnostic(),
    };
    let report = FormulaReport {
        file: loaded.file.display().to_string(),
        operand,
        shape,
        signature,
        text: formula.as_ref().map(ToString::to_string),
        formula,
        failure,
    };
    emit(format, &report, render_formula_text)
}

fn render_formula_text(report: &FormulaReport) -> String {
    let head = format!(
        "Operand {} of shape {} ({})",
        report.operand, report.shape, report.signature
    );
    match (&report.text, &report.failure) {
        (Some(text), _) => format!("{head}: {text}"),
        (None, Some(failure)) => format!("{head}: no affine formula ({failure})"),
        (None, None) => format!("{head}: no affine formula"),
    }
}
