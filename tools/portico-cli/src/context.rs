//! CLI execution context.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use portico::DispatchConfig;

use crate::output::Output;

/// Config file names, searched in each directory from the working directory up.
pub const CONFIG_NAMES: [&str; 3] = ["portico.toml", ".portico.toml", "portico.json"];

/// Execution context for CLI commands.
pub struct Context {
    /// Dispatcher configuration.
    pub config: DispatchConfig,
    /// Where the configuration came from, if a file was found.
    pub config_path: Option<PathBuf>,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
}

impl Context {
    /// Load context from config file.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let (config, config_path) = if let Some(path) = config_path {
            let path = resolve(&cwd, Path::new(path));
            let config = DispatchConfig::load(&path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?;
            (config, Some(path))
        } else {
            // Try to find config in current directory or parent directories
            match Self::find_config(&cwd) {
                Some((path, config)) => (config, Some(path)),
                None => (DispatchConfig::default(), None),
            }
        };

        Ok(Self {
            config,
            config_path,
            output,
            cwd,
        })
    }

    /// Find config file in directory tree.
    fn find_config(start: &Path) -> Option<(PathBuf, DispatchConfig)> {
        let mut current = start.to_path_buf();
        loop {
            for name in CONFIG_NAMES {
                let config_path = current.join(name);
                if config_path.exists() {
                    if let Ok(config) = DispatchConfig::load(&config_path) {
                        return Some((config_path, config));
                    }
                }
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Directory relative config paths are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        self.config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.cwd.clone())
    }

    /// The config with static dirs and the error template made absolute.
    pub fn dispatch_config(&self) -> DispatchConfig {
        let base = self.base_dir();
        let mut config = self.config.clone();
        config.static_dirs = config
            .static_dirs
            .iter()
            .map(|dir| resolve(&base, dir))
            .collect();
        config.error_template = config
            .error_template
            .as_deref()
            .map(|path| resolve(&base, path));
        config
    }

    /// Resolve a path relative to the working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        resolve(&self.cwd, Path::new(path))
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
