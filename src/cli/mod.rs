//! CLI command definitions and parsing
use crate::config::FusionMethodName;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "runfuse",
    version,
    author = "neur0map",
    about = "Rerank, rescore and fuse TREC-style retrieval runs",
    long_about = "runfuse reads ranked result lists in the six-column TREC run format, \
                  reorders them with deterministic tie-breaking, rescores them \
                  (reciprocal rank, min-max, scaling) and fuses several runs over \
                  the same topics into one."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/runfuse/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Profile from the config file to apply
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output options shared by the commands that write a run
#[derive(clap::Args, Debug, Clone)]
pub struct OutputArgs {
    /// Output run file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Run tag written in the last column
    #[arg(short, long)]
    pub tag: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fuse several runs over the same topics into one
    Fuse {
        /// Input run files, in priority order (earlier runs win ties)
        #[arg(required = true, num_args = 1..)]
        runs: Vec<PathBuf>,

        /// Fusion method
        #[arg(short, long, value_enum)]
        method: Option<MethodArg>,

        /// Comma separated weight per run
        #[arg(short, long, value_delimiter = ',')]
        weights: Option<Vec<f64>>,

        /// Documents considered from each run per topic
        #[arg(short, long)]
        depth: Option<usize>,

        /// Documents kept per topic in the output
        #[arg(long)]
        max_docs: Option<usize>,

        /// RRF smoothing constant
        #[arg(long)]
        rrf_k: Option<f64>,

        /// Interpolation weight of the first run
        #[arg(long)]
        alpha: Option<f64>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Rewrite the scores of a single run
    Rescore {
        /// Input run file
        run: PathBuf,

        /// Rescoring strategy
        #[arg(short, long, value_enum)]
        strategy: StrategyArg,

        /// RRF smoothing constant
        #[arg(long)]
        rrf_k: Option<f64>,

        /// RRF weight
        #[arg(long, default_value = "1.0")]
        weight: f64,

        /// Scale factor
        #[arg(long, default_value = "1.0")]
        factor: f64,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Sort by score with deterministic tie-breaking
    Rerank {
        /// Input run file
        run: PathBuf,

        /// File of document ids to drop, one per line
        #[arg(short, long, value_name = "FILE")]
        exclude: Option<PathBuf>,

        /// Attribute file: `<docid> <key> [excluded 0|1]` per line
        #[arg(short, long, value_name = "FILE", conflicts_with = "key_pattern")]
        attributes: Option<PathBuf>,

        /// Regex with one capture group extracting the tie-break key from document ids
        #[arg(short, long)]
        key_pattern: Option<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show topic and document counts of a run
    Inspect {
        /// Input run file
        run: PathBuf,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodArg {
    Rrf,
    Average,
    Interpolation,
}

impl From<MethodArg> for FusionMethodName {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Rrf => FusionMethodName::Rrf,
            MethodArg::Average => FusionMethodName::Average,
            MethodArg::Interpolation => FusionMethodName::Interpolation,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyArg {
    Rrf,
    MinMax,
    Scale,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
