#![doc = include_str!("../README.md")]

mod cli;
mod commands;
mod types;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use regula_engine::{AnalysisConfig, Cvc5Factory, SolverChoice, SolverFactory, Z3Factory};

use crate::cli::{Cli, Commands};
use crate::commands::helpers::{analysis_config_from_cli, parse_output_format};
pub(crate) use crate::types::OutputFormat;

fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = analysis_config_from_cli(&cli)?;
    let format = parse_output_format(&cli.format)?;
    info!(solver = %config.solver, timeout_secs = config.timeout_secs, "regula");

    match config.solver {
        SolverChoice::Z3 => run_command(&Z3Factory::from_config(&config), &config, cli.command, format),
        SolverChoice::Cvc5 => {
            run_command(&Cvc5Factory::from_config(&config), &config, cli.command, format)
        }
    }
}

fn run_command<F: SolverFactory>(
    factory: &F,
    config: &AnalysisConfig,
    command: Commands,
    format: OutputFormat,
) -> miette::Result<()> {
    match command {
        Commands::Sensitivity { file } => {
            commands::sensitivity::run_sensitivity_command(factory, config, file, format)
        }
        Commands::Flocks { file, all } => {
            commands::flocks::run_flocks_command(factory, config, file, all, format)
        }
        Commands::Formula {
            file,
            operand,
            shape,
        } => commands::formula::run_formula_command(factory, config, file, operand, shape, format),
        Commands::Analyze { file, out } => {
            commands::analyze::run_analyze_command(factory, config, file, out, format)
        }
    }
}
