//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{HistoryCommand, ListCommand, MatrixCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Build-matrix runner for declarative CI workflows
#[derive(Debug, Parser, Clone)]
#[command(name = "matrix-pipeline")]
#[command(author = "matrix-pipeline contributors")]
#[command(version)]
#[command(about = "Run a workflow once per matrix combination and report the aggregate result", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true, env = "MATRIX_PIPELINE_VERBOSE")]
    pub verbose: bool,

    /// Print step output as it arrives
    #[arg(short, long, global = true)]
    pub stream: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a workflow
    Run(RunCommand),

    /// Validate a workflow file
    Validate(ValidateCommand),

    /// Show the job instances a workflow expands to
    Matrix(MatrixCommand),

    /// List workflows in the run history
    List(ListCommand),

    /// Show run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
