//! CLI command implementations.

pub mod config;
pub mod dispatch;

use clap::{Args, Subcommand};

/// Arguments for the dispatch command.
#[derive(Args)]
pub struct DispatchArgs {
    /// Request URL, e.g. `app://main/users/42`.
    pub url: String,

    /// Request method (default: GET, or POST with --data).
    #[arg(short = 'X', long)]
    pub method: Option<String>,

    /// Request header as `Name: value`. Repeatable.
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Request body. `@path` reads the body from a file.
    #[arg(short, long)]
    pub data: Option<String>,

    /// Print the status line and headers before the body.
    #[arg(short, long)]
    pub include: bool,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// Where to write it (default: ./portico.toml).
        path: Option<String>,
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the configuration and the paths it names.
    Check,
}
