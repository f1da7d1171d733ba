//! Portico CLI - Command line tool for portico scheme dispatching.
//!
//! Commands:
//! - `portico dispatch` - Send one scheme request through the dispatcher
//! - `portico config` - Manage configuration

mod commands;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use portico::portico_observability::{self, LogFormat, LogLevel};

use commands::{ConfigArgs, DispatchArgs};

/// Portico CLI - Dispatch and inspect custom-scheme requests
#[derive(Parser)]
#[command(name = "portico")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch a request and print the response
    Dispatch(DispatchArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup output formatting
    let output = output::Output::new(cli.verbose, cli.json);

    // Load config
    let config_path = cli.config.as_deref();
    let ctx = match context::Context::load(config_path, output.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            output.error(&format!("{:#}", e));
            std::process::exit(1);
        }
    };

    let mut log = ctx.config.log.clone();
    if cli.verbose {
        log.level = log.level.min(LogLevel::Debug);
    }
    if cli.json {
        log.format = LogFormat::Json;
    }
    if let Err(e) = portico_observability::init(&log) {
        ctx.output.warn(&format!("Logging disabled: {}", e));
    }
    if let Some(path) = &ctx.config_path {
        ctx.output.debug(&format!("Using config {}", path.display()));
    }

    // Execute command
    let result = match cli.command {
        Commands::Dispatch(args) => commands::dispatch::run(args, &ctx),
        Commands::Config(args) => commands::config::run(args, &ctx),
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
