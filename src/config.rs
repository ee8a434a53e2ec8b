use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

/// Default corpus location, relative to the working directory.
pub const DEFAULT_ABC_ROOT: &str = "abc_books";

/// Application configuration loaded from TOML config file.
/// Every field has a default, so the config file is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Folder holding the numbered book directories.
    pub abc_root: PathBuf,
    /// Custom database path (overrides XDG default).
    pub db_path: Option<PathBuf>,
    /// Number of parallel parse workers. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
    /// Result table sizes.
    pub display: DisplayConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            abc_root: PathBuf::from(DEFAULT_ABC_ROOT),
            db_path: None,
            workers: 0,
            display: DisplayConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Rows shown by "view first tunes".
    pub list_limit: usize,
    /// Rows shown by the book/type/key filters.
    pub filter_limit: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            list_limit: 10,
            filter_limit: 20,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/tunebook/config.toml`.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from an explicit path. Logs a warning and falls back to
    /// defaults if the file can't be read or parsed.
    pub fn load_from(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                return Self::default();
            }
        };
        match toml::from_str::<AppConfig>(&contents) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        resolve_workers(self.workers)
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// 0 → auto-detect (cores / 2, min 1); anything else is taken as-is.
pub fn resolve_workers(requested: usize) -> usize {
    if requested > 0 {
        requested
    } else {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        (cores / 2).max(1)
    }
}

/// Resolve the default database path using XDG data directory.
pub fn default_db_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.join("tunebook.db")
    } else {
        // Fallback: current directory
        PathBuf::from("tunebook.db")
    }
}
