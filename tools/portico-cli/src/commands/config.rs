//! Configuration management commands.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use portico::portico_dispatch::{default_config_template, PolicyKind};
use portico::DispatchConfig;
use serde::Serialize;

use super::{ConfigArgs, ConfigCommand};
use crate::context::Context;

/// Run the config command.
pub fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx),
        ConfigCommand::Init { path, force } => init_config(path.as_deref(), force, ctx),
        ConfigCommand::Check => check_config(ctx),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("source", &path.display().to_string()),
        None => ctx.output.kv("source", "built-in defaults"),
    }
    ctx.output.info("");

    let content = toml::to_string_pretty(&ctx.config).context("Failed to render config")?;
    println!("{}", content);
    Ok(())
}

fn init_config(path: Option<&str>, force: bool, ctx: &Context) -> Result<()> {
    let config_path = path
        .map(|p| ctx.resolve_path(p))
        .unwrap_or_else(|| ctx.cwd.join("portico.toml"));

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    if is_json(&config_path) {
        DispatchConfig::default().save(&config_path)?;
    } else {
        fs::write(&config_path, default_config_template())
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
    }

    ctx.output.success(&format!("Created: {}", config_path.display()));
    Ok(())
}

/// Result of `config check`.
#[derive(Debug, Default, Serialize)]
struct CheckReport {
    errors: Vec<String>,
    warnings: Vec<String>,
}

fn check(config: &DispatchConfig) -> CheckReport {
    let mut report = CheckReport::default();

    if let Err(e) = config.validate() {
        report.errors.push(e.to_string());
    }

    // Missing roots only break the legacy policy, which finds scripts there
    for dir in &config.static_dirs {
        if !dir.is_dir() {
            let msg = format!("static dir not found: {}", dir.display());
            match config.policy {
                PolicyKind::Legacy => report.errors.push(msg),
                PolicyKind::Split => report.warnings.push(msg),
            }
        }
    }
    if config.policy == PolicyKind::Split && config.static_dirs.is_empty() {
        report
            .warnings
            .push("static_dirs is empty; every media request will be 404".to_string());
    }

    if let Some(template) = &config.error_template {
        if let Err(e) = fs::read_to_string(template) {
            report.errors.push(format!(
                "error_template {} is not readable: {}",
                template.display(),
                e
            ));
        }
    }

    if config.policy == PolicyKind::Legacy {
        let interpreter = &config.legacy.interpreter;
        if interpreter.components().count() > 1 && !interpreter.is_file() {
            report.warnings.push(format!(
                "legacy.interpreter not found: {}",
                interpreter.display()
            ));
        }
    }

    report
}

fn check_config(ctx: &Context) -> Result<()> {
    let report = check(&ctx.dispatch_config());

    if ctx.output.is_json() {
        ctx.output.json(&report);
    } else {
        ctx.output.header("Validating configuration");
        for error in &report.errors {
            ctx.output.error(&format!("Error: {}", error));
        }
        for warning in &report.warnings {
            ctx.output.warn(&format!("Warning: {}", warning));
        }
    }

    if !report.errors.is_empty() {
        bail!("Configuration has {} error(s)", report.errors.len());
    }

    if report.warnings.is_empty() {
        ctx.output.success("Configuration is valid");
    } else {
        ctx.output.success("Configuration is valid (with warnings)");
    }
    Ok(())
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json"))
}
