//! Diary entry domain model.
//!
//! # Responsibility
//! - Define the per-day record holding conversation, notes and narrative.
//! - Provide constructors for assistant/user conversation messages.
//!
//! # Invariants
//! - `date` is a calendar date; the time-of-day never participates in identity.
//! - `id` is stable for the lifetime of the stored row and never reused.
//! - Conversation messages are appended, never edited in place.

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Surrogate identity of a stored diary entry, distinct from its date.
pub type DiaryEntryId = Uuid;

/// One message in a day's conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub timestamp: DateTime<Local>,
    /// `true` when the assistant wrote this message.
    pub is_from_assistant: bool,
    pub content: String,
    /// Emotion tag attached by the assistant (`normal`, `happy`, ...).
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub assistant_id: Option<String>,
    #[serde(default)]
    pub assistant_name: Option<String>,
}

impl ConversationMessage {
    /// Creates a user-authored message stamped with the current time.
    pub fn from_user(content: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            is_from_assistant: false,
            content: content.into(),
            emotion: None,
            assistant_id: None,
            assistant_name: None,
        }
    }

    /// Creates an assistant-authored message stamped with the current time.
    pub fn from_assistant(
        content: impl Into<String>,
        emotion: Option<String>,
        assistant_id: impl Into<String>,
        assistant_name: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            is_from_assistant: true,
            content: content.into(),
            emotion,
            assistant_id: Some(assistant_id.into()),
            assistant_name: Some(assistant_name.into()),
        }
    }
}

/// A short bullet note summarizing part of the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletPoint {
    pub id: Uuid,
    pub content: String,
    pub timestamp: DateTime<Local>,
    /// Set once the user edits a generated bullet, so regeneration keeps it.
    #[serde(default)]
    pub is_user_edited: bool,
}

impl BulletPoint {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            timestamp: Local::now(),
            is_user_edited: false,
        }
    }
}

/// Summary of one contiguous stretch of conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub summary_text: String,
    #[serde(default)]
    pub key_topics: Vec<String>,
    pub message_count: u32,
}

/// All diary data recorded for one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub id: DiaryEntryId,
    pub date: NaiveDate,
    pub conversation: Vec<ConversationMessage>,
    pub bullet_points: Vec<BulletPoint>,
    /// Narrative diary text generated from the day's conversation.
    pub generated_diary: Option<String>,
    pub summary: Option<String>,
    pub emotion_tags: Vec<String>,
    pub conversation_summaries: Vec<ConversationSummary>,
    /// Overwritten by the store on every save.
    pub last_modified: DateTime<Local>,
}

impl DiaryEntry {
    /// Creates an empty entry for `date` with a fresh surrogate id.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            conversation: Vec::new(),
            bullet_points: Vec::new(),
            generated_diary: None,
            summary: None,
            emotion_tags: Vec::new(),
            conversation_summaries: Vec::new(),
            last_modified: Local::now(),
        }
    }

    /// Creates an entry for `date` whose conversation holds only `message`.
    pub fn with_message(date: NaiveDate, message: ConversationMessage) -> Self {
        let mut entry = Self::new(date);
        entry.conversation.push(message);
        entry
    }

    /// Appends a message to the conversation log.
    pub fn push_message(&mut self, message: ConversationMessage) {
        self.conversation.push(message);
    }

    /// Returns whether nothing has been recorded for this date yet.
    pub fn is_empty(&self) -> bool {
        self.conversation.is_empty()
            && self.bullet_points.is_empty()
            && self.generated_diary.is_none()
            && self.summary.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::{ConversationMessage, DiaryEntry};
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn new_entries_get_distinct_ids() {
        let first = DiaryEntry::new(date());
        let second = DiaryEntry::new(date());
        assert_ne!(first.id, second.id);
        assert!(first.is_empty());
    }

    #[test]
    fn with_message_holds_single_message() {
        let entry = DiaryEntry::with_message(date(), ConversationMessage::from_user("walked"));
        assert_eq!(entry.conversation.len(), 1);
        assert!(!entry.conversation[0].is_from_assistant);
        assert!(!entry.is_empty());
    }

    #[test]
    fn assistant_message_carries_identity() {
        let message = ConversationMessage::from_assistant(
            "How was lunch?",
            Some("happy".to_string()),
            "sophia",
            "Sophia",
        );
        assert!(message.is_from_assistant);
        assert_eq!(message.assistant_id.as_deref(), Some("sophia"));
        assert_eq!(message.emotion.as_deref(), Some("happy"));
    }
}
