//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{CompileCommand, InspectCommand, ValidateCommand};
use std::ffi::OsString;

/// Security policy CI configuration compiler
#[derive(Debug, Parser, Clone)]
#[command(name = "policyweave")]
#[command(author = "Policyweave Contributors")]
#[command(version = "0.1.0")]
#[command(
    about = "Compiles security policy scan requirements into CI pipeline configuration",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Compile a base configuration against the applicable policies
    Compile(CompileCommand),

    /// Validate a policy file
    Validate(ValidateCommand),

    /// Show which policies and actions would apply
    Inspect(InspectCommand),
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
