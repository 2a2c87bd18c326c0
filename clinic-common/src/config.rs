//! Configuration loading and root folder resolution
//!
//! Bootstrap settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is not an error; the portal starts on defaults.

use chrono::NaiveTime;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{Error, Result};

/// Environment variable overriding the data folder
pub const ROOT_FOLDER_ENV: &str = "CLINIC_ROOT_FOLDER";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5780;

/// Default daily reset trigger, local wall-clock
pub const DEFAULT_RESET_TIME: &str = "03:00";

/// Default realtime channel buffer
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the database and the local mirror
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Daily reset trigger as "HH:MM"
    #[serde(default)]
    pub reset_time: Option<String>,

    /// Buffered events per realtime channel
    #[serde(default)]
    pub event_capacity: Option<usize>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Values given on the command line (clap fills these, including env fallbacks)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<PathBuf>,
    pub port: Option<u16>,
    pub reset_time: Option<String>,
}

/// Fully resolved portal configuration
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub root_folder: PathBuf,
    pub port: u16,
    pub reset_time: NaiveTime,
    pub event_capacity: usize,
    pub log_level: String,
}

impl PortalConfig {
    /// Merge command line, environment, TOML and compiled defaults
    pub fn resolve(cli: &CliOverrides, toml: Option<&TomlConfig>) -> Result<Self> {
        let root_folder = resolve_root_folder(cli.root_folder.as_deref(), toml);

        let port = cli
            .port
            .or_else(|| toml.and_then(|t| t.port))
            .unwrap_or(DEFAULT_PORT);

        let reset_raw = cli
            .reset_time
            .clone()
            .or_else(|| toml.and_then(|t| t.reset_time.clone()))
            .unwrap_or_else(|| DEFAULT_RESET_TIME.to_string());
        let reset_time = parse_reset_time(&reset_raw)?;

        let event_capacity = toml
            .and_then(|t| t.event_capacity)
            .unwrap_or(DEFAULT_EVENT_CAPACITY);
        if event_capacity == 0 {
            return Err(Error::Config("event_capacity must be greater than zero".to_string()));
        }

        let log_level = toml
            .map(|t| t.logging.level.clone())
            .unwrap_or_else(default_log_level);

        Ok(Self {
            root_folder,
            port,
            reset_time,
            event_capacity,
            log_level,
        })
    }

    /// SQLite database backing the persistence adapter
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join("clinic.db")
    }

    /// Folder of the local key-value mirror
    pub fn mirror_dir(&self) -> PathBuf {
        self.root_folder.join("mirror")
    }
}

/// Parse a "HH:MM" reset trigger
pub fn parse_reset_time(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| Error::Config(format!("reset_time must be HH:MM, got {:?}", raw)))
}

/// Root folder resolution: CLI argument, environment, TOML, compiled default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml: Option<&TomlConfig>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(root) = toml.and_then(|t| t.root_folder.clone()) {
        return root;
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Outcome of looking for the TOML file.
///
/// Config is read before logging is set up, so the outcome is reported
/// afterwards through [`ConfigFile::log`].
#[derive(Debug, Clone)]
pub enum ConfigFile {
    Loaded { path: PathBuf, config: TomlConfig },
    Missing(PathBuf),
    /// No explicit path and no platform config directory
    NoLocation,
}

impl ConfigFile {
    pub fn config(&self) -> Option<&TomlConfig> {
        match self {
            ConfigFile::Loaded { config, .. } => Some(config),
            _ => None,
        }
    }

    pub fn log(&self) {
        match self {
            ConfigFile::Loaded { path, .. } => info!("Loaded config file: {}", path.display()),
            ConfigFile::Missing(path) => {
                warn!("Config file not found at {}, using defaults", path.display())
            }
            ConfigFile::NoLocation => warn!("No config directory on this platform, using defaults"),
        }
    }
}

/// Load the TOML file at `path`, or at the platform default location.
///
/// A missing file is not an error; a file that exists but does not parse is.
pub fn load_toml_config(path: Option<&Path>) -> Result<ConfigFile> {
    let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(p) => p,
        None => return Ok(ConfigFile::NoLocation),
    };

    if !path.exists() {
        return Ok(ConfigFile::Missing(path));
    }

    let content = std::fs::read_to_string(&path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(ConfigFile::Loaded { path, config })
}

/// Platform config file location (`<config dir>/clinic-portal/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("clinic-portal").join("config.toml"))
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("clinic-portal"))
        .unwrap_or_else(|| PathBuf::from("./clinic_data"))
}
