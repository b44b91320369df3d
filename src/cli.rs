use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show critical errors
    Quiet,
    /// Show standard information
    #[default]
    Normal,
    /// Show detailed information
    Verbose,
    /// Show all available debugging information
    Debug,
}

impl VerbosityLevel {
    /// Default `tracing` filter directive for this level
    pub fn log_filter(self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "error",
            VerbosityLevel::Normal => "warn",
            VerbosityLevel::Verbose => "info",
            VerbosityLevel::Debug => "debug",
        }
    }
}

/// Report format for diagnostics and model summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Readable text grouped by severity
    #[default]
    Human,
    /// Machine-readable JSON
    Json,
    /// One line per document
    Summary,
}

/// Reader, validator and formatter for Core Data model documents
#[derive(Parser, Debug, Clone)]
#[command(name = "coredata-model")]
#[command(about = "Check, format and inspect Core Data .xcdatamodel documents")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum, global = true)]
    pub output_format: Option<OutputFormat>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        conflicts_with_all = ["verbose", "debug"]
    )]
    pub quiet: bool,

    /// Show debugging information, including error sources
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    /// Prefix error reports with a timestamp
    #[arg(long = "timestamps", global = true)]
    pub timestamps: bool,

    /// Number of documents checked in parallel
    #[arg(short = 't', long = "threads", global = true)]
    pub threads: Option<usize>,

    /// Report one-directional inverses as errors
    #[arg(long = "strict-inverses", global = true)]
    pub strict_inverses: bool,

    /// Warn about relationships without an inverse
    #[arg(long = "warn-missing-inverse", global = true)]
    pub warn_missing_inverse: bool,

    /// Exit with failure when any warning is reported
    #[arg(long = "warnings-as-errors", global = true)]
    pub warnings_as_errors: bool,

    /// Model directory extensions to discover (e.g. 'xcdatamodeld,xcdatamodel')
    #[arg(
        short = 'e',
        long = "extensions",
        value_delimiter = ',',
        global = true
    )]
    pub extensions: Vec<String>,

    /// Include patterns (glob syntax)
    #[arg(long = "include", action = clap::ArgAction::Append, global = true)]
    pub include_patterns: Vec<String>,

    /// Exclude patterns (glob syntax)
    #[arg(long = "exclude", action = clap::ArgAction::Append, global = true)]
    pub exclude_patterns: Vec<String>,

    /// Maximum directory depth searched for models
    #[arg(long = "max-depth", global = true)]
    pub max_depth: Option<usize>,

    /// Follow symbolic links while searching for models
    #[arg(long = "follow-symlinks", global = true)]
    pub follow_symlinks: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Check model documents and report diagnostics
    Check {
        /// Model bundles, model directories, documents, or directories to search
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Rewrite a model document in canonical form
    Format {
        path: PathBuf,
        /// Write to a file instead of stdout
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
    /// Summarize the entities of a model
    Inspect { path: PathBuf },
    /// Generate Objective-C headers and Swift key classes into <output>/generated/
    Generate {
        path: PathBuf,
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
    },
}

impl Command {
    /// Paths the command reads
    pub fn inputs(&self) -> Vec<&PathBuf> {
        match self {
            Command::Check { paths } => paths.iter().collect(),
            Command::Format { path, .. }
            | Command::Inspect { path }
            | Command::Generate { path, .. } => vec![path],
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.debug {
            VerbosityLevel::Debug
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for path in self.command.inputs() {
            if !path.exists() {
                return Err(format!("Path does not exist: {}", path.display()));
            }
        }
        if let Some(threads) = self.threads
            && threads == 0
        {
            return Err("Number of threads must be greater than 0".to_string());
        }
        Ok(())
    }
}
