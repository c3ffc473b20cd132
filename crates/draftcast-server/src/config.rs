// Configuration loading and parsing (config/draftcast.toml).

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use draftcast_core::tracker::{
    TrackerConfig, DEFAULT_MAX_BACKOFF, DEFAULT_POLL_INTERVAL, DEFAULT_TEAMS_PER_LEAGUE,
};
use draftcast_sleeper::client::{DEFAULT_BASE_URL, DEFAULT_SPORT};

pub const CONFIG_FILE: &str = "draftcast.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Every section is optional; missing keys take their built-in defaults.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub draft: DraftConfig,
    pub sleeper: SleeperConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "127.0.0.1".into(),
            port: 4000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DraftConfig {
    pub teams_per_league: u32,
    pub poll_interval_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for DraftConfig {
    fn default() -> Self {
        DraftConfig {
            teams_per_league: DEFAULT_TEAMS_PER_LEAGUE,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            max_backoff_ms: DEFAULT_MAX_BACKOFF.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SleeperConfig {
    pub base_url: String,
    pub sport: String,
}

impl Default for SleeperConfig {
    fn default() -> Self {
        SleeperConfig {
            base_url: DEFAULT_BASE_URL.into(),
            sport: DEFAULT_SPORT.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// CSV with `player_id,adp` columns. Relative paths resolve against the
    /// working directory.
    pub adp_path: Option<PathBuf>,
}

impl Config {
    /// `bind:port` for the WebSocket listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            poll_interval: Duration::from_millis(self.draft.poll_interval_ms),
            max_backoff: Duration::from_millis(self.draft.max_backoff_ms),
            teams_per_league: self.draft.teams_per_league,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/draftcast.toml` relative to `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    load_file(&base_dir.join("config").join(CONFIG_FILE))
}

/// Parse and validate a single config file.
pub fn load_file(path: &Path) -> Result<Config, ConfigError> {
    let text = read_file(path)?;
    let config: Config = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    validate(&config)?;
    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Load config for the running process.
///
/// When the working directory carries `config/` or `defaults/`, missing files
/// are copied from defaults and `config/draftcast.toml` is loaded. Otherwise
/// the per-user config directory is consulted, and built-in defaults apply
/// if no file exists there either.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;

    if cwd.join("config").exists() || cwd.join("defaults").exists() {
        for path in ensure_config_files(&cwd)? {
            info!("copied default config to {}", path.display());
        }
        return load_config_from(&cwd);
    }

    match user_config_file() {
        Some(path) if path.exists() => {
            info!("loading config from {}", path.display());
            load_file(&path)
        }
        _ => {
            info!("no config file found, using built-in defaults");
            let config = Config::default();
            validate(&config)?;
            Ok(config)
        }
    }
}

/// `<platform config dir>/draftcast.toml`, e.g. `~/.config/draftcast/draftcast.toml`.
pub fn user_config_file() -> Option<PathBuf> {
    ProjectDirs::from("", "", "draftcast").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.draft.teams_per_league == 0 {
        return Err(ConfigError::ValidationError {
            field: "draft.teams_per_league".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.draft.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError {
            field: "draft.poll_interval_ms".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.draft.max_backoff_ms < config.draft.poll_interval_ms {
        return Err(ConfigError::ValidationError {
            field: "draft.max_backoff_ms".into(),
            message: format!(
                "must be >= poll_interval_ms ({}), got {}",
                config.draft.poll_interval_ms, config.draft.max_backoff_ms
            ),
        });
    }

    let required: &[(&str, &str)] = &[
        ("sleeper.base_url", config.sleeper.base_url.as_str()),
        ("sleeper.sport", config.sleeper.sport.as_str()),
        ("server.bind", config.server.bind.as_str()),
    ];
    for (name, value) in required {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must not be empty".into(),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
