// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `cachedag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cachedag",
    version,
    about = "Run a DAG of expensive tasks at most once per distinct input, caching outputs on disk.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Cachedag.toml")]
    pub config: String,

    /// Override the state file location from `[config].state_file`.
    #[arg(long, value_name = "PATH")]
    pub state: Option<String>,

    /// Run the computed task set without asking for confirmation.
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Treat an unparsable state file as an error instead of starting over.
    #[arg(long)]
    pub strict_state: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CACHEDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Compute and print the tasks that would run, without executing.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
