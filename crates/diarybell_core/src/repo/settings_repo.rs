//! Settings repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Read and upsert the settings singleton row.
//! - Seed first-run defaults without clobbering an existing row.
//!
//! # Invariants
//! - The row identity is always `SETTINGS_ID`.
//! - Write paths call `Settings::validate()` before SQL mutations.

use super::{bool_to_int, ensure_connection_ready, int_to_bool, RepoError, RepoResult};
use crate::model::settings::{ProviderConfig, Settings, SETTINGS_ID};
use chrono::NaiveTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

const TIME_FORMAT: &str = "%H:%M:%S%.f";

const SETTINGS_SELECT_SQL: &str = "SELECT
    user_name,
    assistant_name,
    selected_assistant_id,
    notification_frequency_minutes,
    notification_start,
    notification_end,
    notifications_paused,
    capture_active_window,
    run_at_startup,
    database_path,
    font_family,
    font_size,
    provider_json
FROM settings";

/// Repository interface for the settings singleton.
pub trait SettingsRepository {
    /// Returns the singleton, or `None` before first save.
    fn get_settings(&self) -> RepoResult<Option<Settings>>;
    /// Inserts or replaces the singleton by its fixed identity.
    fn upsert_settings(&self, settings: &Settings) -> RepoResult<()>;
    /// Inserts `settings` only when no row exists yet. Returns whether it did.
    fn insert_if_missing(&self, settings: &Settings) -> RepoResult<bool>;
    /// Updates only the paused flag. Returns whether the row exists.
    fn set_notifications_paused(&self, paused: bool) -> RepoResult<bool>;
}

/// SQLite-backed settings repository.
pub struct SqliteSettingsRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSettingsRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl SettingsRepository for SqliteSettingsRepository<'_> {
    fn get_settings(&self) -> RepoResult<Option<Settings>> {
        let row = self
            .conn
            .query_row(
                &format!("{SETTINGS_SELECT_SQL} WHERE id = ?1;"),
                [SETTINGS_ID],
                |row| Ok(parse_settings_row(row)),
            )
            .optional()?;

        row.transpose()
    }

    fn upsert_settings(&self, settings: &Settings) -> RepoResult<()> {
        settings.validate()?;
        let provider_json = serde_json::to_string(&settings.provider)?;

        self.conn.execute(
            "INSERT INTO settings (
                id,
                user_name,
                assistant_name,
                selected_assistant_id,
                notification_frequency_minutes,
                notification_start,
                notification_end,
                notifications_paused,
                capture_active_window,
                run_at_startup,
                database_path,
                font_family,
                font_size,
                provider_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(id) DO UPDATE SET
                user_name = excluded.user_name,
                assistant_name = excluded.assistant_name,
                selected_assistant_id = excluded.selected_assistant_id,
                notification_frequency_minutes = excluded.notification_frequency_minutes,
                notification_start = excluded.notification_start,
                notification_end = excluded.notification_end,
                notifications_paused = excluded.notifications_paused,
                capture_active_window = excluded.capture_active_window,
                run_at_startup = excluded.run_at_startup,
                database_path = excluded.database_path,
                font_family = excluded.font_family,
                font_size = excluded.font_size,
                provider_json = excluded.provider_json,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                SETTINGS_ID,
                settings.user_name.as_str(),
                settings.assistant_name.as_str(),
                settings.selected_assistant_id.as_str(),
                i64::from(settings.notification_frequency_minutes),
                settings.notification_start.format(TIME_FORMAT).to_string(),
                settings.notification_end.format(TIME_FORMAT).to_string(),
                bool_to_int(settings.notifications_paused),
                bool_to_int(settings.capture_active_window),
                bool_to_int(settings.run_at_startup),
                settings.database_path.as_deref(),
                settings.font_family.as_str(),
                settings.font_size,
                provider_json,
            ],
        )?;

        Ok(())
    }

    fn insert_if_missing(&self, settings: &Settings) -> RepoResult<bool> {
        if self.get_settings()?.is_some() {
            return Ok(false);
        }
        self.upsert_settings(settings)?;
        Ok(true)
    }

    fn set_notifications_paused(&self, paused: bool) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE settings
             SET
                notifications_paused = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![SETTINGS_ID, bool_to_int(paused)],
        )?;
        Ok(changed > 0)
    }
}

fn parse_settings_row(row: &Row<'_>) -> RepoResult<Settings> {
    let frequency: i64 = row.get("notification_frequency_minutes")?;
    let notification_frequency_minutes = u32::try_from(frequency)
        .ok()
        .filter(|minutes| *minutes >= 1)
        .ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid frequency `{frequency}` in settings.notification_frequency_minutes"
            ))
        })?;

    let provider_text: String = row.get("provider_json")?;
    let provider: ProviderConfig = serde_json::from_str(&provider_text).map_err(|err| {
        RepoError::InvalidData(format!("invalid json in settings.provider_json: {err}"))
    })?;

    let settings = Settings {
        user_name: row.get("user_name")?,
        assistant_name: row.get("assistant_name")?,
        selected_assistant_id: row.get("selected_assistant_id")?,
        notification_frequency_minutes,
        notification_start: parse_time(row, "notification_start")?,
        notification_end: parse_time(row, "notification_end")?,
        notifications_paused: int_to_bool(
            row.get("notifications_paused")?,
            "settings.notifications_paused",
        )?,
        capture_active_window: int_to_bool(
            row.get("capture_active_window")?,
            "settings.capture_active_window",
        )?,
        run_at_startup: int_to_bool(row.get("run_at_startup")?, "settings.run_at_startup")?,
        database_path: row.get("database_path")?,
        font_family: row.get("font_family")?,
        font_size: row.get("font_size")?,
        provider,
    };
    Ok(settings)
}

fn parse_time(row: &Row<'_>, column: &str) -> RepoResult<NaiveTime> {
    let text: String = row.get(column)?;
    NaiveTime::parse_from_str(&text, TIME_FORMAT).map_err(|_| {
        RepoError::InvalidData(format!("invalid time-of-day `{text}` in settings.{column}"))
    })
}
