// Command handler for: Analyze

use std::path::PathBuf;

use miette::IntoDiagnostic;

use regula_engine::{AnalysisConfig, AnalysisReport, SolverFactory};

use super::flocks::render_partitioning_text;
use super::helpers::{analysis_for, emit, load_sweep, write_json_artifact};
use crate::OutputFormat;

pub(crate) fn run_analyze_command<F: SolverFactory>(
    factory: &F,
    config: &AnalysisConfig,
    file: PathBuf,
    out: Option<PathBuf>,
    format: OutputFormat,
) -> miette::Result<()> {
    let loaded = load_sweep(&file, config)?;
    let mut analysis = analysis_for(factory, &loaded, config)?;
    let report = analysis.report().into_diagnostic()?;

    if let Some(path) = out {
        write_json_artifact(&path, &report)?;
        eprintln!("Analysis report written to {}", path.display());
    }
    emit(format, &report, render_analysis_text)
}

fn render_analysis_text(report: &AnalysisReport) -> String {
    let mut out = format!("Table width {} bits", report.width);
    if let Some(spec) = &report.spec {
        out.push_str(&format!(", word spec {spec}"));
    }
    out.push('\n');
    out.push_str(&format!(
        "Sensitivity {} (entropy {}), relevant bits {}\n",
        report.sensitivity, report.entropy, report.relevant_bits
    ));

    out.push_str(&format!("Shapes ({}):\n", report.shapes.len()));
    for shape in &report.shapes {
        let operands: Vec<String> = shape.operands.iter().map(i64::to_string).collect();
        let specimen = match shape.specimen_word {
            Some(word) => format!("{:#x} (word {word:#x})", shape.specimen),
            None => format!("{:#x}", shape.specimen),
        };
        out.push_str(&format!(
            "  {} {}: specimen {specimen}, operands [{}]\n",
            shape.shape,
            shape.signature,
            operands.join(", ")
        ));
    }

    out.push_str(&render_partitioning_text(&report.partitioning, report.entropy));
    out.push('\n');

    if !report.formulas.is_empty() {
        out.push_str("Operand formulas:\n");
    }
    for outcome in &report.formulas {
        let body = match (&outcome.text, &outcome.failure) {
            (Some(text), _) => text.clone(),
            (None, Some(failure)) => format!("none ({failure})"),
            (None, None) => "none".to_string(),
        };
        out.push_str(&format!(
            "  {} operand {}: {body}\n",
            outcome.shape, outcome.operand
        ));
    }
    out.push_str(&format!(
        "Solver: {} session(s), {} check(s), {} ms",
        report.solver.sessions_opened, report.solver.solve_calls, report.solver.solve_elapsed_ms
    ));
    out
}
