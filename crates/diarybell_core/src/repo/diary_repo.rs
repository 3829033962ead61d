//! Diary entry repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide date-keyed CRUD over `diary_entries`.
//! - Encode list-valued fields as JSON columns.
//!
//! # Invariants
//! - `date` is unique; callers decide between insert and update.
//! - Listing order is always `date DESC`.
//! - Range queries are inclusive on both ends.

use super::{ensure_connection_ready, RepoError, RepoResult};
use crate::model::diary::{DiaryEntry, DiaryEntryId};
use chrono::{DateTime, Local, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";

const ENTRY_SELECT_SQL: &str = "SELECT
    id,
    date,
    conversation_json,
    bullet_points_json,
    generated_diary,
    summary,
    emotion_tags_json,
    conversation_summaries_json,
    last_modified
FROM diary_entries";

/// Repository interface for diary entries.
pub trait DiaryRepository {
    fn find_by_date(&self, date: NaiveDate) -> RepoResult<Option<DiaryEntry>>;
    fn insert_entry(&self, entry: &DiaryEntry) -> RepoResult<DiaryEntryId>;
    /// Replaces every field of the row identified by `entry.id`.
    fn update_entry(&self, entry: &DiaryEntry) -> RepoResult<()>;
    fn list_entries(&self) -> RepoResult<Vec<DiaryEntry>>;
    fn list_entries_in_range(&self, start: NaiveDate, end: NaiveDate)
        -> RepoResult<Vec<DiaryEntry>>;
    /// Removes the entry for `date`. Returns whether a row existed.
    fn delete_by_date(&self, date: NaiveDate) -> RepoResult<bool>;
    fn count_entries(&self) -> RepoResult<u64>;
}

/// SQLite-backed diary repository.
pub struct SqliteDiaryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDiaryRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn query_entries(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepoResult<Vec<DiaryEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut entries = Vec::new();

        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(row)?);
        }

        Ok(entries)
    }
}

impl DiaryRepository for SqliteDiaryRepository<'_> {
    fn find_by_date(&self, date: NaiveDate) -> RepoResult<Option<DiaryEntry>> {
        let row = self
            .conn
            .query_row(
                &format!("{ENTRY_SELECT_SQL} WHERE date = ?1;"),
                [date_to_db(date)],
                |row| Ok(parse_entry_row(row)),
            )
            .optional()?;

        row.transpose()
    }

    fn insert_entry(&self, entry: &DiaryEntry) -> RepoResult<DiaryEntryId> {
        let columns = EncodedEntry::try_from(entry)?;

        self.conn.execute(
            "INSERT INTO diary_entries (
                id,
                date,
                conversation_json,
                bullet_points_json,
                generated_diary,
                summary,
                emotion_tags_json,
                conversation_summaries_json,
                last_modified
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                entry.id.to_string(),
                date_to_db(entry.date),
                columns.conversation,
                columns.bullet_points,
                entry.generated_diary.as_deref(),
                entry.summary.as_deref(),
                columns.emotion_tags,
                columns.conversation_summaries,
                entry.last_modified.to_rfc3339(),
            ],
        )?;

        Ok(entry.id)
    }

    fn update_entry(&self, entry: &DiaryEntry) -> RepoResult<()> {
        let columns = EncodedEntry::try_from(entry)?;

        let changed = self.conn.execute(
            "UPDATE diary_entries
             SET
                date = ?2,
                conversation_json = ?3,
                bullet_points_json = ?4,
                generated_diary = ?5,
                summary = ?6,
                emotion_tags_json = ?7,
                conversation_summaries_json = ?8,
                last_modified = ?9
             WHERE id = ?1;",
            params![
                entry.id.to_string(),
                date_to_db(entry.date),
                columns.conversation,
                columns.bullet_points,
                entry.generated_diary.as_deref(),
                entry.summary.as_deref(),
                columns.emotion_tags,
                columns.conversation_summaries,
                entry.last_modified.to_rfc3339(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(entry.id));
        }

        Ok(())
    }

    fn list_entries(&self) -> RepoResult<Vec<DiaryEntry>> {
        self.query_entries(&format!("{ENTRY_SELECT_SQL} ORDER BY date DESC;"), params![])
    }

    fn list_entries_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepoResult<Vec<DiaryEntry>> {
        self.query_entries(
            &format!("{ENTRY_SELECT_SQL} WHERE date >= ?1 AND date <= ?2 ORDER BY date DESC;"),
            [date_to_db(start), date_to_db(end)],
        )
    }

    fn delete_by_date(&self, date: NaiveDate) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM diary_entries WHERE date = ?1;", [date_to_db(date)])?;
        Ok(changed > 0)
    }

    fn count_entries(&self) -> RepoResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM diary_entries;", [], |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative entry count `{count}`")))
    }
}

/// JSON-encoded list columns of one entry.
struct EncodedEntry {
    conversation: String,
    bullet_points: String,
    emotion_tags: String,
    conversation_summaries: String,
}

impl TryFrom<&DiaryEntry> for EncodedEntry {
    type Error = RepoError;

    fn try_from(entry: &DiaryEntry) -> RepoResult<Self> {
        Ok(Self {
            conversation: serde_json::to_string(&entry.conversation)?,
            bullet_points: serde_json::to_string(&entry.bullet_points)?,
            emotion_tags: serde_json::to_string(&entry.emotion_tags)?,
            conversation_summaries: serde_json::to_string(&entry.conversation_summaries)?,
        })
    }
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<DiaryEntry> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in diary_entries.id"))
    })?;

    let date_text: String = row.get("date")?;
    let date = NaiveDate::parse_from_str(&date_text, DATE_FORMAT).map_err(|_| {
        RepoError::InvalidData(format!("invalid date `{date_text}` in diary_entries.date"))
    })?;

    let modified_text: String = row.get("last_modified")?;
    let last_modified = DateTime::parse_from_rfc3339(&modified_text)
        .map(|value| value.with_timezone(&Local))
        .map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid timestamp `{modified_text}` in diary_entries.last_modified"
            ))
        })?;

    Ok(DiaryEntry {
        id,
        date,
        conversation: parse_json_column(row, "conversation_json")?,
        bullet_points: parse_json_column(row, "bullet_points_json")?,
        generated_diary: row.get("generated_diary")?,
        summary: row.get("summary")?,
        emotion_tags: parse_json_column(row, "emotion_tags_json")?,
        conversation_summaries: parse_json_column(row, "conversation_summaries_json")?,
        last_modified,
    })
}

fn parse_json_column<T: DeserializeOwned>(row: &Row<'_>, column: &str) -> RepoResult<T> {
    let text: String = row.get(column)?;
    serde_json::from_str(&text).map_err(|err| {
        RepoError::InvalidData(format!("invalid json in diary_entries.{column}: {err}"))
    })
}

fn date_to_db(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
