//! Serialized persistence store for settings and diary entries.
//!
//! # Responsibility
//! - Own the single shared connection to the backing database file.
//! - Serialize every operation through one mutex so the file is never
//!   touched by two operations at once.
//! - Keep "absent" (`Ok(None)`) distinct from "failed" (`Err`) on reads.
//!
//! # Invariants
//! - The raw connection never leaves this module; every method acquires the
//!   guard, uses the connection, and releases it on all exit paths.
//! - No method re-enters the lock while holding it.
//! - Only `optimize` closes and re-opens the shared connection while the
//!   store stays initialized.
//! - Once initialized, exactly one settings row exists.

mod error;

pub use error::{StoreError, StoreResult};

use crate::config::default_user_name;
use crate::db::{compact_db, open_db};
use crate::model::diary::{ConversationMessage, DiaryEntry, DiaryEntryId};
use crate::model::settings::Settings;
use crate::repo::diary_repo::{DiaryRepository, SqliteDiaryRepository};
use crate::repo::settings_repo::{SettingsRepository, SqliteSettingsRepository};
use chrono::{Local, NaiveDate};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Instant;

struct StoreState {
    path: Option<PathBuf>,
    conn: Option<Connection>,
}

/// Process-wide persistence service.
///
/// Construct one per process, wrap it in an `Arc`, and hand clones to the
/// scheduler and UI layer. `parking_lot::Mutex` is eventually fair, so a
/// busy poll thread cannot starve interactive callers (or the reverse).
pub struct Store {
    state: Mutex<StoreState>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Creates an uninitialized store. Every operation except `initialize`
    /// fails with `StoreError::NotInitialized` until `initialize` succeeds.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState {
                path: None,
                conn: None,
            }),
        }
    }

    /// Creates a store and initializes it at `path` in one step.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let store = Self::new();
        store.initialize(path)?;
        Ok(store)
    }

    /// Opens the shared connection, creating the file, schema and default
    /// settings when missing.
    ///
    /// Calling this on an already-initialized store is a no-op. After
    /// `cleanup`, calling it again re-opens the store.
    ///
    /// # Errors
    /// - Any failure here is fatal for startup and is returned unchanged.
    pub fn initialize(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref();
        let started_at = Instant::now();
        let mut state = self.state.lock();

        if state.conn.is_some() {
            if state.path.as_deref() != Some(path) {
                warn!(
                    "event=store_init module=store status=skipped reason=already_initialized active_path={} requested_path={}",
                    state.path.as_deref().map(Path::display).map(|p| p.to_string()).unwrap_or_default(),
                    path.display()
                );
            }
            return Ok(());
        }

        let conn = open_db(path).map_err(|err| {
            error!(
                "event=store_init module=store status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            StoreError::Db(err)
        })?;

        if let Err(err) = seed_settings(&conn, path) {
            error!(
                "event=store_init module=store status=error duration_ms={} error_code=settings_seed_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err);
        }

        state.path = Some(path.to_path_buf());
        state.conn = Some(conn);
        info!(
            "event=store_init module=store status=ok duration_ms={} path={}",
            started_at.elapsed().as_millis(),
            path.display()
        );
        Ok(())
    }

    /// Returns whether the shared connection is currently open.
    pub fn is_initialized(&self) -> bool {
        self.state.lock().conn.is_some()
    }

    /// Returns the path the store was initialized with.
    pub fn path(&self) -> Option<PathBuf> {
        self.state.lock().path.clone()
    }

    /// Reads the settings singleton.
    ///
    /// `Ok(None)` means no settings exist yet. Failures are logged here and
    /// returned; callers that only care about data use `.ok().flatten()`.
    pub fn get_settings(&self) -> StoreResult<Option<Settings>> {
        self.with_conn("settings_get", |conn| {
            let repo = SqliteSettingsRepository::try_new(conn)?;
            Ok(repo.get_settings()?)
        })
    }

    /// Upserts the settings singleton by its fixed identity.
    pub fn save_settings(&self, settings: &Settings) -> StoreResult<()> {
        self.with_conn("settings_save", |conn| {
            let repo = SqliteSettingsRepository::try_new(conn)?;
            Ok(repo.upsert_settings(settings)?)
        })
    }

    /// Writes only the paused flag of the settings singleton, leaving every
    /// other field as currently stored. Returns whether settings exist.
    pub fn set_notifications_paused(&self, paused: bool) -> StoreResult<bool> {
        self.with_conn("settings_set_paused", |conn| {
            let repo = SqliteSettingsRepository::try_new(conn)?;
            Ok(repo.set_notifications_paused(paused)?)
        })
    }

    /// Reads the entry recorded for `date`, if any.
    pub fn get_diary_entry(&self, date: NaiveDate) -> StoreResult<Option<DiaryEntry>> {
        self.with_conn("diary_get", |conn| {
            let repo = SqliteDiaryRepository::try_new(conn)?;
            Ok(repo.find_by_date(date)?)
        })
    }

    /// Saves the complete state of `entry` as the record for `entry.date`.
    ///
    /// Stamps `last_modified` with the current time. When a record for the
    /// date already exists its surrogate id is copied onto `entry` and the
    /// row is updated; otherwise `entry` is inserted with its own id. The
    /// lookup and the write commit together.
    pub fn save_diary_entry(&self, entry: &mut DiaryEntry) -> StoreResult<DiaryEntryId> {
        entry.last_modified = Local::now();
        self.with_conn("diary_save", |conn| {
            let tx = conn.transaction()?;
            {
                let repo = SqliteDiaryRepository::try_new(&tx)?;
                match repo.find_by_date(entry.date)? {
                    Some(existing) => {
                        entry.id = existing.id;
                        repo.update_entry(entry)?;
                    }
                    None => {
                        repo.insert_entry(entry)?;
                    }
                }
            }
            tx.commit()?;
            Ok(entry.id)
        })
    }

    /// Lists all entries, newest date first.
    pub fn get_all_diary_entries(&self) -> StoreResult<Vec<DiaryEntry>> {
        self.with_conn("diary_list", |conn| {
            let repo = SqliteDiaryRepository::try_new(conn)?;
            Ok(repo.list_entries()?)
        })
    }

    /// Lists entries with `start <= date <= end`, newest date first.
    ///
    /// An inverted range yields an empty list.
    pub fn get_diary_entries_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<DiaryEntry>> {
        self.with_conn("diary_list_range", |conn| {
            let repo = SqliteDiaryRepository::try_new(conn)?;
            Ok(repo.list_entries_in_range(start, end)?)
        })
    }

    /// Appends `message` to the conversation of `date`, creating the entry
    /// when none exists yet.
    pub fn append_to_past_event(
        &self,
        date: NaiveDate,
        message: ConversationMessage,
    ) -> StoreResult<DiaryEntryId> {
        self.with_conn("diary_append", |conn| {
            let tx = conn.transaction()?;
            let id = {
                let repo = SqliteDiaryRepository::try_new(&tx)?;
                match repo.find_by_date(date)? {
                    Some(mut entry) => {
                        entry.push_message(message);
                        entry.last_modified = Local::now();
                        repo.update_entry(&entry)?;
                        entry.id
                    }
                    None => {
                        let mut entry = DiaryEntry::with_message(date, message);
                        entry.last_modified = Local::now();
                        repo.insert_entry(&entry)?
                    }
                }
            };
            tx.commit()?;
            Ok(id)
        })
    }

    /// Removes the entry for `date`. Returns whether one existed.
    pub fn delete_diary_entry(&self, date: NaiveDate) -> StoreResult<bool> {
        self.with_conn("diary_delete", |conn| {
            let repo = SqliteDiaryRepository::try_new(conn)?;
            Ok(repo.delete_by_date(date)?)
        })
    }

    /// Returns the number of stored diary entries.
    pub fn diary_entry_count(&self) -> StoreResult<u64> {
        self.with_conn("diary_count", |conn| {
            let repo = SqliteDiaryRepository::try_new(conn)?;
            Ok(repo.count_entries()?)
        })
    }

    /// Compacts the database file offline.
    ///
    /// Holds the lock for the whole operation: closes the shared connection,
    /// rebuilds the file through a private connection, then re-opens the
    /// shared connection. The re-open runs even when compaction fails, and a
    /// compaction error is only returned after the connection is restored.
    ///
    /// # Errors
    /// - `StoreError::Db` when compaction failed; the store is usable.
    /// - `StoreError::ConnectionLost` when the re-open failed; `initialize`
    ///   must be called again.
    pub fn optimize(&self) -> StoreResult<()> {
        let started_at = Instant::now();
        let mut state = self.state.lock();
        info!("event=store_optimize module=store status=start");

        let path = match (&state.path, &state.conn) {
            (Some(path), Some(_)) => path.clone(),
            _ => {
                warn!("event=store_optimize module=store status=error error_code=not_initialized");
                return Err(StoreError::NotInitialized);
            }
        };

        if let Some(conn) = state.conn.take() {
            if let Err((_, err)) = conn.close() {
                warn!("event=store_optimize module=store status=warn error_code=close_failed error={err}");
            }
        }

        let compacted = compact_db(&path);

        match open_db(&path) {
            Ok(conn) => state.conn = Some(conn),
            Err(err) => {
                error!(
                    "event=store_optimize module=store status=error duration_ms={} error_code=reopen_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(StoreError::ConnectionLost(err));
            }
        }

        match compacted {
            Ok(()) => {
                info!(
                    "event=store_optimize module=store status=ok duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=store_optimize module=store status=error duration_ms={} error_code=compact_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(StoreError::Db(err))
            }
        }
    }

    /// Closes the shared connection. Safe to call repeatedly.
    pub fn cleanup(&self) {
        let mut state = self.state.lock();
        let Some(conn) = state.conn.take() else {
            debug!("event=store_cleanup module=store status=skipped reason=not_open");
            return;
        };

        match conn.close() {
            Ok(()) => info!("event=store_cleanup module=store status=ok"),
            Err((_, err)) => {
                warn!("event=store_cleanup module=store status=warn error_code=close_failed error={err}")
            }
        }
    }

    /// Runs `op` against the shared connection under the store lock.
    fn with_conn<T>(
        &self,
        event: &'static str,
        op: impl FnOnce(&mut Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let started_at = Instant::now();
        let result = {
            let mut state = self.state.lock();
            match state.conn.as_mut() {
                Some(conn) => op(conn),
                None => Err(StoreError::NotInitialized),
            }
        };

        match &result {
            Ok(_) => debug!(
                "event={} module=store status=ok duration_ms={}",
                event,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event={} module=store status=error duration_ms={} error={}",
                event,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Ensures the settings singleton exists, backfilling provider defaults on
/// rows written by older versions.
fn seed_settings(conn: &Connection, path: &Path) -> StoreResult<()> {
    let repo = SqliteSettingsRepository::try_new(conn)?;

    let mut defaults = Settings::with_defaults(default_user_name());
    defaults.database_path = Some(path.display().to_string());
    if repo.insert_if_missing(&defaults)? {
        info!("event=settings_seed module=store status=ok created=true");
        return Ok(());
    }

    if let Some(mut existing) = repo.get_settings()? {
        if existing.backfill_provider_defaults() {
            repo.upsert_settings(&existing)?;
            info!("event=settings_seed module=store status=ok backfilled=true");
        }
    }
    Ok(())
}
