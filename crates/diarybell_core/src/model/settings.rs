//! Application settings singleton.
//!
//! # Responsibility
//! - Define the single settings record read by the scheduler and UI layer.
//! - Provide first-run defaults and write-time validation.
//!
//! # Invariants
//! - Identity is fixed (`SETTINGS_ID`); there is never more than one row.
//! - `notification_frequency_minutes` is at least 1.
//! - Provider fields are opaque to core and never interpreted here.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Fixed row identity of the settings singleton.
pub const SETTINGS_ID: i64 = 1;

pub const DEFAULT_ASSISTANT_NAME: &str = "Sophia";
pub const DEFAULT_ASSISTANT_ID: &str = "sophia";
pub const DEFAULT_FREQUENCY_MINUTES: u32 = 5;
pub const DEFAULT_GEMINI_API_BASE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";
pub const DEFAULT_OLLAMA_API_URL: &str = "http://localhost:11434/api/chat";
const DEFAULT_FONT_FAMILY: &str = "Yu Gothic";
const DEFAULT_FONT_SIZE: f64 = 16.0;

/// AI provider configuration, carried through core untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub gemini_api_key: String,
    pub gemini_api_base_url: String,
    pub use_ollama: bool,
    pub ollama_api_url: String,
    pub ollama_model_name: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            gemini_api_base_url: DEFAULT_GEMINI_API_BASE_URL.to_string(),
            use_ollama: false,
            ollama_api_url: DEFAULT_OLLAMA_API_URL.to_string(),
            ollama_model_name: String::new(),
        }
    }
}

/// The settings singleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Name the assistant uses to address the user.
    pub user_name: String,
    /// Display name of the assistant persona.
    pub assistant_name: String,
    pub selected_assistant_id: String,
    /// Minutes between notifications while inside the window. Must be >= 1.
    pub notification_frequency_minutes: u32,
    /// Start of the daily notification window.
    pub notification_start: NaiveTime,
    /// End of the daily notification window. Earlier than `notification_start`
    /// means the window wraps past midnight.
    pub notification_end: NaiveTime,
    pub notifications_paused: bool,
    /// Whether the UI layer may attach the active window title to prompts.
    pub capture_active_window: bool,
    pub run_at_startup: bool,
    /// Database path recorded at first run, for display only.
    pub database_path: Option<String>,
    pub font_family: String,
    pub font_size: f64,
    pub provider: ProviderConfig,
}

impl Settings {
    /// Creates first-run settings for the given user.
    ///
    /// The default window runs 09:00 to 01:00 the next morning.
    pub fn with_defaults(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
            selected_assistant_id: DEFAULT_ASSISTANT_ID.to_string(),
            notification_frequency_minutes: DEFAULT_FREQUENCY_MINUTES,
            notification_start: hm(9, 0),
            notification_end: hm(1, 0),
            notifications_paused: false,
            capture_active_window: false,
            run_at_startup: false,
            database_path: None,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            provider: ProviderConfig::default(),
        }
    }

    /// Validates invariants required before persistence.
    pub fn validate(&self) -> Result<(), SettingsValidationError> {
        if self.notification_frequency_minutes == 0 {
            return Err(SettingsValidationError::ZeroFrequency);
        }
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(SettingsValidationError::InvalidFontSize);
        }
        Ok(())
    }

    /// Fills provider fields that older rows may have left empty.
    ///
    /// Returns `true` when anything changed.
    pub fn backfill_provider_defaults(&mut self) -> bool {
        if self.provider.gemini_api_base_url.trim().is_empty() {
            self.provider.gemini_api_base_url = DEFAULT_GEMINI_API_BASE_URL.to_string();
            return true;
        }
        false
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Validation failures for `Settings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsValidationError {
    ZeroFrequency,
    InvalidFontSize,
}

impl Display for SettingsValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroFrequency => write!(f, "notification frequency must be at least 1 minute"),
            Self::InvalidFontSize => write!(f, "font size must be a positive number"),
        }
    }
}

impl Error for SettingsValidationError {}

#[cfg(test)]
mod tests {
    use super::{Settings, SettingsValidationError, DEFAULT_GEMINI_API_BASE_URL};
    use chrono::NaiveTime;

    #[test]
    fn defaults_use_wrapping_window_and_five_minutes() {
        let settings = Settings::with_defaults("kaori");
        assert_eq!(settings.user_name, "kaori");
        assert_eq!(settings.notification_frequency_minutes, 5);
        assert_eq!(
            settings.notification_start,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        );
        assert_eq!(
            settings.notification_end,
            NaiveTime::from_hms_opt(1, 0, 0).unwrap()
        );
        assert!(!settings.notifications_paused);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_frequency() {
        let mut settings = Settings::with_defaults("kaori");
        settings.notification_frequency_minutes = 0;
        assert_eq!(
            settings.validate(),
            Err(SettingsValidationError::ZeroFrequency)
        );
    }

    #[test]
    fn validate_rejects_non_finite_font_size() {
        let mut settings = Settings::with_defaults("kaori");
        settings.font_size = f64::NAN;
        assert_eq!(
            settings.validate(),
            Err(SettingsValidationError::InvalidFontSize)
        );
    }

    #[test]
    fn backfill_only_touches_empty_base_url() {
        let mut settings = Settings::with_defaults("kaori");
        assert!(!settings.backfill_provider_defaults());

        settings.provider.gemini_api_base_url = "  ".to_string();
        assert!(settings.backfill_provider_defaults());
        assert_eq!(
            settings.provider.gemini_api_base_url,
            DEFAULT_GEMINI_API_BASE_URL
        );
    }
}
