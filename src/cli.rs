//! Command-line interface for formdispatch using clap.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format for log aggregation.
    Json,
}

/// Deliver a form submission to each of its email destinations, one at a time.
#[derive(Parser, Debug)]
#[command(name = "formdispatch")]
#[command(version)]
#[command(about = "Deliver a form submission to each of its email destinations, one at a time")]
pub struct Cli {
    /// Path to configuration file.
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Submission payload (JSON). Use "-" to read from stdin.
    #[arg(short = 'p', long = "payload", default_value = "-")]
    pub payload: PathBuf,

    /// Validate configuration and exit.
    #[arg(long = "validate")]
    pub validate: bool,

    /// Log format: text or json.
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text, env = "LOG_FORMAT")]
    pub log_format: LogFormat,
}

impl Cli {
    /// True when the payload should be read from stdin.
    pub fn payload_from_stdin(&self) -> bool {
        self.payload.as_os_str() == "-"
    }
}
