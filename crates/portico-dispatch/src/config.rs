//! Dispatcher configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use portico_errors::{DetailLevel, ErrorTranslator, FileTemplate};
use portico_legacy::CgiRunner;
use portico_observability::LogConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::{DispatchPolicy, LegacyPolicy, SplitPolicy};

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file could not be parsed.
    #[error("Failed to parse config file {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// The config file could not be written.
    #[error("Failed to write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config could not be serialized.
    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    /// A scheme name is empty.
    #[error("{0} must not be empty")]
    EmptyScheme(&'static str),

    /// The split policy needs two distinct schemes.
    #[error("app_scheme and media_scheme are both '{0}'")]
    SameSchemes(String),

    /// The legacy policy needs somewhere to look for scripts.
    #[error("the legacy policy requires at least one static_dirs entry")]
    NoStaticDirs,

    /// A zero script timeout would kill every script.
    #[error("legacy.timeout_ms must be greater than 0")]
    ZeroTimeout,

    /// The legacy script extension is empty.
    #[error("legacy.extension must not be empty")]
    EmptyExtension,

    /// The dispatcher builder is missing a collaborator the policy needs.
    #[error("the {policy} policy requires a {collaborator}")]
    MissingCollaborator {
        policy: &'static str,
        collaborator: &'static str,
    },
}

/// Which dispatch policy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    #[default]
    Split,
    Legacy,
}

/// Dispatcher configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Dispatch policy.
    #[serde(default)]
    pub policy: PolicyKind,

    /// Scheme handled by the router (split) or the script bridge (legacy).
    #[serde(default = "default_app_scheme")]
    pub app_scheme: String,

    /// Scheme served from the static roots under the split policy.
    #[serde(default = "default_media_scheme")]
    pub media_scheme: String,

    /// Static file roots, searched in order.
    #[serde(default)]
    pub static_dirs: Vec<PathBuf>,

    /// Custom error template file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_template: Option<PathBuf>,

    /// Prefix replaced by `…` in displayed paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_root: Option<PathBuf>,

    /// Show location, backtrace and causes on error pages.
    #[serde(default = "default_true")]
    pub show_error_details: bool,

    /// Legacy script settings.
    #[serde(default)]
    pub legacy: LegacyConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

fn default_app_scheme() -> String {
    "app".to_string()
}

fn default_media_scheme() -> String {
    "media".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::default(),
            app_scheme: default_app_scheme(),
            media_scheme: default_media_scheme(),
            static_dirs: Vec::new(),
            error_template: None,
            install_root: None,
            show_error_details: true,
            legacy: LegacyConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// Legacy script execution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyConfig {
    /// CGI interpreter used for script files.
    #[serde(default = "default_interpreter")]
    pub interpreter: PathBuf,

    /// Extra interpreter arguments, placed before the script path.
    #[serde(default)]
    pub args: Vec<String>,

    /// Kill scripts running longer than this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Script file extension.
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_interpreter() -> PathBuf {
    PathBuf::from("php-cgi")
}

fn default_extension() -> String {
    "php".to_string()
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            args: Vec::new(),
            timeout_ms: None,
            extension: default_extension(),
        }
    }
}

impl DispatchConfig {
    /// Load config from a file. `.json` files are JSON, anything else TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let parsed = if is_json(path) {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            toml::from_str(&content).map_err(|e| e.to_string())
        };
        parsed.map_err(|reason| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Save config to a file, in the format its extension names.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = if is_json(path) {
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        };

        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check the settings make sense together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_scheme.trim().is_empty() {
            return Err(ConfigError::EmptyScheme("app_scheme"));
        }

        match self.policy {
            PolicyKind::Split => {
                if self.media_scheme.trim().is_empty() {
                    return Err(ConfigError::EmptyScheme("media_scheme"));
                }
                if self.app_scheme.eq_ignore_ascii_case(&self.media_scheme) {
                    return Err(ConfigError::SameSchemes(self.app_scheme.clone()));
                }
            }
            PolicyKind::Legacy => {
                if self.static_dirs.is_empty() {
                    return Err(ConfigError::NoStaticDirs);
                }
                if self.legacy.extension.trim_start_matches('.').is_empty() {
                    return Err(ConfigError::EmptyExtension);
                }
            }
        }

        if self.legacy.timeout_ms == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(())
    }

    /// The dispatch policy these settings describe.
    pub fn to_policy(&self) -> DispatchPolicy {
        match self.policy {
            PolicyKind::Split => {
                SplitPolicy::new(self.app_scheme.clone(), self.media_scheme.clone()).into()
            }
            PolicyKind::Legacy => LegacyPolicy::new(self.static_dirs.iter().cloned())
                .with_app_scheme(self.app_scheme.clone())
                .with_extension(self.legacy.extension.clone())
                .into(),
        }
    }

    /// The error translator these settings describe.
    pub fn translator(&self) -> ErrorTranslator {
        let mut translator = ErrorTranslator::new();
        if let Some(template) = &self.error_template {
            translator = translator.with_template(FileTemplate::new(template));
        }
        if let Some(root) = &self.install_root {
            translator = translator.with_install_root(root);
        }
        if !self.show_error_details {
            translator = translator.with_detail(DetailLevel::Minimal);
        }
        translator
    }

    /// The CGI runner for script files.
    pub fn cgi_runner(&self) -> CgiRunner {
        let runner = CgiRunner::new(&self.legacy.interpreter).with_args(self.legacy.args.clone());
        match self.legacy.timeout_ms {
            Some(ms) => runner.with_timeout(Duration::from_millis(ms)),
            None => runner,
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Commented starter config written by `portico config init`.
pub fn default_config_template() -> &'static str {
    r#"# Portico dispatcher configuration

# "split": media scheme -> static files, app scheme -> router
# "legacy": app scheme only; *.php paths run as scripts, the rest is static
policy = "split"

app_scheme = "app"
media_scheme = "media"

# Searched in order
static_dirs = ["public"]

# error_template = "templates/error.html"
# install_root = "/opt/myapp"

# Set to false to hide location, backtrace and causes on error pages
show_error_details = true

[legacy]
interpreter = "php-cgi"
args = []
# timeout_ms = 30000
extension = "php"

[log]
level = "info"
format = "human"
"#
}
