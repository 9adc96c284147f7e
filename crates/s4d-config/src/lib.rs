//! Configuration management for s4d.
//!
//! Parses `s4d.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories. Every setting has a
//! default, so the file is optional; the webroot can come from the file or
//! the command line.
//!
//! CLI settings are applied during load via [`CliSettings`].
//!
//! ```toml
//! webroot = "public"
//! spa = true
//!
//! [server]
//! host = "${S4D_HOST:-localhost}"
//! port = 8080
//!
//! [live_reload]
//! debounce_ms = 50
//! ignore = ["**/*.swp"]
//! ```
//!
//! ## Environment Variable Expansion
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields: `webroot`, `server.host`.

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override webroot.
    pub webroot: Option<PathBuf>,
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override SPA mode.
    pub spa: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "s4d.toml";

/// Largest accepted debounce window.
const MAX_DEBOUNCE_MS: u64 = 10_000;

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Webroot as written in the file (relative to the file).
    webroot: Option<String>,
    /// Single-page application mode.
    pub spa: bool,
    /// Server configuration.
    pub server: ServerConfig,
    /// Live reload configuration.
    pub live_reload: LiveReloadConfig,

    /// Resolved webroot (set after loading).
    #[serde(skip)]
    pub webroot_resolved: Option<PathBuf>,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host name or address. `0.0.0.0` exposes the server on the network.
    pub host: String,
    /// Port (`0` picks a free port).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 8080,
        }
    }
}

/// Live reload configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LiveReloadConfig {
    /// Quiet period before a change is reported, in milliseconds.
    pub debounce_ms: u64,
    /// Glob patterns (relative to the webroot) that never trigger a reload.
    pub ignore: Vec<String>,
}

impl Default for LiveReloadConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            ignore: Vec::new(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`server.host`").
        field: String,
        /// Error message (e.g., "${`S4D_HOST`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `s4d.toml` in current directory and parents,
    /// falling back to defaults.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values. The result is
    /// validated last.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the final configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(webroot) = &settings.webroot {
            self.webroot_resolved = Some(webroot.clone());
        }
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(spa) = settings.spa {
            self.spa = spa;
        }
    }

    /// Resolved webroot.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if no webroot was configured.
    pub fn webroot(&self) -> Result<&Path, ConfigError> {
        self.webroot_resolved.as_deref().ok_or_else(|| {
            ConfigError::Validation(
                "webroot is required (pass it as an argument or set it in s4d.toml)".to_owned(),
            )
        })
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_webroot()?;
        self.validate_server()?;
        self.validate_live_reload()?;
        Ok(())
    }

    fn validate_webroot(&self) -> Result<(), ConfigError> {
        let webroot = self.webroot()?;
        if !webroot.is_dir() {
            return Err(ConfigError::Validation(format!(
                "webroot {} is not a directory",
                webroot.display()
            )));
        }
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")
    }

    fn validate_live_reload(&self) -> Result<(), ConfigError> {
        if self.live_reload.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::Validation(format!(
                "live_reload.debounce_ms cannot exceed {MAX_DEBOUNCE_MS}"
            )));
        }

        for pattern in &self.live_reload.ignore {
            glob::Pattern::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("live_reload.ignore pattern {pattern:?}: {e}"))
            })?;
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;

        if let Some(ref webroot) = self.webroot {
            self.webroot = Some(expand::expand_env(webroot, "webroot")?);
        }

        Ok(())
    }

    /// Resolve the webroot relative to the config file directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        self.webroot_resolved = self.webroot.as_deref().map(|w| config_dir.join(w));
    }
}
