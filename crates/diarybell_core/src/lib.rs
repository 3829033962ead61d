//! Core of the DiaryBell desktop assistant.
//!
//! Owns the SQLite-backed store for settings and diary entries and the
//! notification scheduler that decides when to prompt the user.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod scheduler;
pub mod store;

pub use config::AppPaths;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::diary::{
    BulletPoint, ConversationMessage, ConversationSummary, DiaryEntry, DiaryEntryId,
};
pub use model::settings::{ProviderConfig, Settings, SettingsValidationError};
pub use repo::{RepoError, RepoResult};
pub use scheduler::{
    Clock, ManualClock, NotificationScheduler, NotificationWindow, SchedulerConfig,
    SchedulerError, SchedulerEvent, SchedulerHandle, SystemClock, TickOutcome, TriggerReason,
};
pub use store::{Store, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
