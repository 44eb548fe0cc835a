// Command handler for: Flocks

use std::path::PathBuf;

use miette::IntoDiagnostic;
use serde::Serialize;

use regula_engine::bits::to_bit_string;
use regula_engine::flock::{FlockDecomposition, FlockOutcome};
use regula_engine::{AnalysisConfig, Partitioning, SolverFactory};

use super::helpers::{analysis_for, emit, load_sweep};
use crate::OutputFormat;

#[derive(Debug, Serialize)]
pub(crate) struct FlocksReport {
    pub(crate) file: String,
    pub(crate) sensitivity: String,
    pub(crate) entropy: u32,
    pub(crate) shapes: usize,
    pub(crate) partitioning: Partitioning,
}

pub(crate) fn run_flocks_command<F: SolverFactory>(
    factory: &F,
    config: &AnalysisConfig,
    file: PathBuf,
    all: bool,
    format: OutputFormat,
) -> miette::Result<()> {
    let config = AnalysisConfig {
        stop_at_first_flock: config.stop_at_first_flock && !all,
        ..config.clone()
    };
    let loaded = load_sweep(&file, &config)?;
    let mut analysis = analysis_for(factory, &loaded, &config)?;
    let partitioning = analysis.partitioning().into_diagnostic()?;
    let catalog = analysis.catalog().into_diagnostic()?;
    let report = FlocksReport {
        file: loaded.file.display().to_string(),
        sensitivity: catalog.sensitivity().to_string(),
        entropy: catalog.entropy(),
        shapes: catalog.shape_count(),
        partitioning,
    };
    emit(format, &report, render_flocks_text)
}

pub(crate) fn render_partitioning_text(partitioning: &Partitioning, entropy: u32) -> String {
    match partitioning {
        Partitioning::Regular { shape } => format!("Regular: every pattern has shape {shape}"),
        Partitioning::Fork {
            narrow,
            wide,
            easily_normalizable,
        } => {
            let narrow_patterns: Vec<String> = narrow
                .patterns
                .iter()
                .map(|p| to_bit_string(*p, entropy))
                .collect();
            format!(
                "Fork: narrow {} ({} patterns: {}), wide {} ({} patterns){}",
                narrow.shape,
                narrow.patterns.len(),
                narrow_patterns.join(" "),
                wide.shape,
                wide.patterns.len(),
                if *easily_normalizable {
                    ", easily normalizable"
                } else {
                    ""
                }
            )
        }
        Partitioning::Flocks(search) => {
            let mut out = format!("Flocks: {} candidate(s) tried\n", search.attempts.len());
            for attempt in &search.attempts {
                let outcome = match &attempt.outcome {
                    FlockOutcome::Accepted => "accepted".to_string(),
                    FlockOutcome::Unsatisfiable => "unsatisfiable".to_string(),
                    FlockOutcome::Degenerate { entries } => {
                        format!("degenerate ({entries} entries)")
                    }
                    FlockOutcome::Inconclusive => "inconclusive".to_string(),
                };
                out.push_str(&format!("  mask {}: {outcome}\n", attempt.flocking));
            }
            if search.accepted.is_empty() {
                out.push_str("  no decomposition found");
            }
            for decomposition in &search.accepted {
                out.push_str(&render_decomposition(decomposition));
            }
            out.trim_end().to_string()
        }
    }
}

fn render_decomposition(decomposition: &FlockDecomposition) -> String {
    let classifier = &decomposition.classifier;
    let selected = classifier
        .selected()
        .map_or_else(|| "?".to_string(), |p| to_bit_string(p, classifier.width));
    let mut out = format!(
        "  decomposition {}: s(r) true only at r={selected}\n",
        decomposition.flocking
    );
    let codes: Vec<String> = decomposition.left_codes.iter().map(i64::to_string).collect();
    out.push_str(&format!("    t = [{}]\n", codes.join(", ")));
    for entry in &decomposition.combine {
        out.push_str(&format!(
            "    f({}, {}) = {}\n",
            entry.code, entry.selected, entry.shape
        ));
    }
    out
}

fn render_flocks_text(report: &FlocksReport) -> String {
    format!(
        "Shapes of {}: {} over {} relevant bit(s) {}\n{}",
        report.file,
        report.shapes,
        report.entropy,
        report.sensitivity,
        render_partitioning_text(&report.partitioning, report.entropy)
    )
}
