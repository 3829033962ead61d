//! Filesystem layout and environment overrides.
//!
//! # Responsibility
//! - Resolve the per-user application data directory.
//! - Derive the database and log locations beneath it.
//!
//! # Invariants
//! - Resolution never touches the filesystem; directories are created by
//!   `open_db` and `init_logging` when first used.

use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "DiaryBell";
const DB_RELATIVE_PATH: [&str; 2] = ["data", "diary.db"];
const LOG_DIR_NAME: &str = "logs";
const FALLBACK_USER_NAME: &str = "User";

/// Overrides the application data directory.
pub const HOME_ENV: &str = "DIARYBELL_HOME";
/// Overrides the database file path directly.
pub const DB_PATH_ENV: &str = "DIARYBELL_DB_PATH";
/// Overrides the log level passed to `init_logging`.
pub const LOG_LEVEL_ENV: &str = "DIARYBELL_LOG_LEVEL";

/// Resolved locations of persisted application state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    root: PathBuf,
    db_override: Option<PathBuf>,
}

impl AppPaths {
    /// Uses `root` as the application data directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            db_override: None,
        }
    }

    /// Resolves paths from the environment, falling back to
    /// `<data_local_dir>/DiaryBell`, then to the working directory.
    pub fn from_env() -> Self {
        let root = non_empty_env(HOME_ENV)
            .map(PathBuf::from)
            .or_else(|| dirs::data_local_dir().map(|dir| dir.join(APP_DIR_NAME)))
            .unwrap_or_else(|| PathBuf::from(APP_DIR_NAME));

        Self {
            root,
            db_override: non_empty_env(DB_PATH_ENV).map(PathBuf::from),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Database file, `<root>/data/diary.db` unless overridden.
    pub fn db_path(&self) -> PathBuf {
        match &self.db_override {
            Some(path) => path.clone(),
            None => DB_RELATIVE_PATH
                .iter()
                .fold(self.root.clone(), |path, part| path.join(part)),
        }
    }

    /// Directory for rolling log files.
    pub fn log_dir(&self) -> PathBuf {
        self.root.join(LOG_DIR_NAME)
    }
}

/// Log level from the environment, or the build-mode default.
pub fn log_level_from_env() -> String {
    non_empty_env(LOG_LEVEL_ENV).unwrap_or_else(|| crate::logging::default_log_level().to_string())
}

/// OS login name used for first-run settings.
pub fn default_user_name() -> String {
    ["USER", "USERNAME"]
        .iter()
        .find_map(|key| non_empty_env(key))
        .unwrap_or_else(|| FALLBACK_USER_NAME.to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
