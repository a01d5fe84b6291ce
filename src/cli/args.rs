//! Command-line argument definitions for the dataset workbench
//!
//! Defines the CLI with the clap derive API. Running without a subcommand
//! starts the HTTP server.

use crate::config::{IdPolicy, WorkbenchConfig};
use crate::constants::DEFAULT_PREVIEW_ROWS;
use crate::error::{Result, WorkbenchError};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CLI arguments for the dataset workbench
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dataset-workbench",
    version,
    about = "Upload, preview and convert tabular datasets; keep a registry of GPS points",
    long_about = "Serves an HTTP API for uploading CSV, Excel and Stata datasets, previewing \
                  them and converting them to CSV or XLSX, plus an in-memory registry of GPS \
                  points with CSV export and a Leaflet map. The convert and preview commands \
                  run the same conversion pipeline on local files."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to a JSON configuration file
    ///
    /// Fields missing from the file keep their defaults; command line flags
    /// override both.
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        global = true,
        help = "Path to configuration file (JSON format)"
    )]
    pub config_file: Option<PathBuf>,

    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        help = "Increase logging verbosity (-v: debug, -vv: trace)"
    )]
    pub verbose: u8,

    /// Only show errors. Overrides verbose settings.
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Run the HTTP server (default command)
    Serve(ServeArgs),
    /// Convert a local dataset file into another format
    Convert(ConvertArgs),
    /// Print the first rows of a local dataset file
    Preview(PreviewArgs),
}

#[derive(Debug, Clone, Default, Parser)]
pub struct ServeArgs {
    /// Address to listen on, e.g. 127.0.0.1:5000
    #[arg(short = 'b', long = "bind", value_name = "ADDR")]
    pub bind: Option<String>,

    /// Directory uploaded datasets are stored in
    #[arg(short = 'u', long = "upload-dir", value_name = "PATH")]
    pub upload_dir: Option<PathBuf>,

    /// How new GPS points are numbered
    #[arg(long = "id-policy", value_enum, value_name = "POLICY")]
    pub id_policy: Option<IdPolicyArg>,

    /// Request body limit for uploads, in megabytes
    #[arg(long = "max-upload-mb", value_name = "MB")]
    pub max_upload_mb: Option<usize>,
}

#[derive(Debug, Clone, Parser)]
pub struct ConvertArgs {
    /// Dataset file to convert
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Target format (csv or xlsx)
    #[arg(short = 't', long = "to", value_name = "FORMAT")]
    pub to: String,

    /// Source format; taken from the input's extension when omitted
    #[arg(short = 'f', long = "from", value_name = "FORMAT")]
    pub from: Option<String>,

    /// Output file; defaults to the input path with the target extension
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Replace the output file if it exists
    #[arg(long = "force")]
    pub force: bool,
}

#[derive(Debug, Clone, Parser)]
pub struct PreviewArgs {
    /// Dataset file to preview
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Number of rows to show
    #[arg(short = 'n', long = "rows", default_value_t = DEFAULT_PREVIEW_ROWS)]
    pub rows: usize,

    /// Source format; taken from the input's extension when omitted
    #[arg(short = 'f', long = "from", value_name = "FORMAT")]
    pub from: Option<String>,

    /// Print the preview as JSON instead of a table
    #[arg(long = "json")]
    pub json: bool,
}

/// GPS ID policy as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IdPolicyArg {
    /// Never reuse an ID
    Monotonic,
    /// Point count plus one (IDs may repeat after deletes)
    CurrentCount,
}

impl From<IdPolicyArg> for IdPolicy {
    fn from(arg: IdPolicyArg) -> Self {
        match arg {
            IdPolicyArg::Monotonic => IdPolicy::Monotonic,
            IdPolicyArg::CurrentCount => IdPolicy::CurrentCount,
        }
    }
}

impl Args {
    /// Check arguments that clap cannot check on its own
    pub fn validate(&self) -> Result<()> {
        if let Some(config_file) = &self.config_file {
            if !config_file.exists() {
                return Err(WorkbenchError::Configuration {
                    message: format!("Config file does not exist: {}", config_file.display()),
                });
            }
        }

        match &self.command {
            Some(Commands::Convert(args)) if !args.input.is_file() => {
                Err(missing_input(&args.input))
            }
            Some(Commands::Preview(args)) if !args.input.is_file() => {
                Err(missing_input(&args.input))
            }
            _ => Ok(()),
        }
    }

    /// Determine the log level from the verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}

impl ServeArgs {
    /// Apply the serve flags on top of a loaded configuration
    pub fn apply(&self, mut config: WorkbenchConfig) -> WorkbenchConfig {
        if let Some(bind) = &self.bind {
            config = config.with_bind(bind.clone());
        }
        if let Some(upload_dir) = &self.upload_dir {
            config = config.with_upload_dir(upload_dir.clone());
        }
        if let Some(id_policy) = self.id_policy {
            config = config.with_id_policy(id_policy.into());
        }
        if let Some(megabytes) = self.max_upload_mb {
            config = config.with_max_upload_bytes(megabytes.saturating_mul(1024 * 1024));
        }
        config
    }
}

fn missing_input(path: &std::path::Path) -> WorkbenchError {
    WorkbenchError::Configuration {
        message: format!("Input file does not exist: {}", path.display()),
    }
}
