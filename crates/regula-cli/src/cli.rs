//! CLI argument definitions: top-level `Cli` struct and `Commands` enum.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "regula")]
#[command(about = "Infer bit sensitivity, flock structure and operand formulas of an encoding oracle")]
#[command(version)]
pub(crate) struct Cli {
    /// SMT solver: z3 | cvc5 (overrides the config file)
    #[arg(long, global = true)]
    pub(crate) solver: Option<String>,

    /// Per solver call timeout in seconds, 0 for none (overrides the config file)
    #[arg(long, global = true)]
    pub(crate) timeout_secs: Option<u64>,

    /// JSON analysis config file
    #[arg(long, global = true)]
    pub(crate) config: Option<PathBuf>,

    /// Output format: text | json
    #[arg(long, global = true, default_value = "text")]
    pub(crate) format: String,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Classify every table bit as relevant or irrelevant to the shape
    #[command(display_order = 1)]
    Sensitivity {
        /// Path to the sweep JSON file
        file: PathBuf,
    },

    /// Partition the shapes and search for flock decompositions
    #[command(display_order = 2)]
    Flocks {
        /// Path to the sweep JSON file
        file: PathBuf,

        /// Try every candidate split instead of stopping at the first accepted one
        #[arg(long, default_value_t = false)]
        all: bool,
    },

    /// Fit an affine formula to one operand slot of one shape
    #[command(display_order = 3)]
    Formula {
        /// Path to the sweep JSON file
        file: PathBuf,

        /// Operand slot index
        #[arg(long)]
        operand: usize,

        /// Shape id
        #[arg(long)]
        shape: u32,
    },

    /// Run every analysis and print the combined report
    #[command(display_order = 4)]
    Analyze {
        /// Path to the sweep JSON file
        file: PathBuf,

        /// Also write the JSON report to this path
        #[arg(long)]
        out: Option<PathBuf>,
    },
}
