use chrono::NaiveTime;
use diarybell_core::model::settings::{DEFAULT_GEMINI_API_BASE_URL, DEFAULT_FREQUENCY_MINUTES};
use diarybell_core::{RepoError, SettingsValidationError, Store, StoreError};
use rusqlite::Connection;

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

#[test]
fn initialize_seeds_default_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("diary.db");
    let store = Store::open(&path).unwrap();

    let settings = store.get_settings().unwrap().unwrap();
    assert_eq!(settings.notification_frequency_minutes, DEFAULT_FREQUENCY_MINUTES);
    assert_eq!(settings.notification_start, hm(9, 0));
    assert_eq!(settings.notification_end, hm(1, 0));
    assert!(!settings.notifications_paused);
    assert_eq!(
        settings.database_path.as_deref(),
        Some(path.display().to_string().as_str())
    );
    assert_eq!(store.path(), Some(path));
}

#[test]
fn save_settings_round_trips_every_field() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("diary.db")).unwrap();

    let mut settings = store.get_settings().unwrap().unwrap();
    settings.user_name = "Mina".to_string();
    settings.assistant_name = "Kai".to_string();
    settings.selected_assistant_id = "kai".to_string();
    settings.notification_frequency_minutes = 45;
    settings.notification_start = hm(21, 0);
    settings.notification_end = hm(3, 0);
    settings.notifications_paused = true;
    settings.capture_active_window = true;
    settings.run_at_startup = true;
    settings.font_family = "Noto Sans".to_string();
    settings.font_size = 13.5;
    settings.provider.gemini_api_key = "secret".to_string();
    settings.provider.use_ollama = true;
    settings.provider.ollama_model_name = "llama3".to_string();

    store.save_settings(&settings).unwrap();
    assert_eq!(store.get_settings().unwrap().unwrap(), settings);
}

#[test]
fn save_settings_keeps_a_single_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("diary.db");
    let store = Store::open(&path).unwrap();

    let mut settings = store.get_settings().unwrap().unwrap();
    for minutes in 1..=3 {
        settings.notification_frequency_minutes = minutes;
        store.save_settings(&settings).unwrap();
    }
    store.cleanup();

    let conn = Connection::open(&path).unwrap();
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM settings;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn reopening_keeps_saved_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("diary.db");

    {
        let store = Store::open(&path).unwrap();
        let mut settings = store.get_settings().unwrap().unwrap();
        settings.user_name = "Mina".to_string();
        store.save_settings(&settings).unwrap();
    }

    let store = Store::open(&path).unwrap();
    assert_eq!(store.get_settings().unwrap().unwrap().user_name, "Mina");
}

#[test]
fn initialize_backfills_empty_gemini_base_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("diary.db");

    {
        let store = Store::open(&path).unwrap();
        let mut settings = store.get_settings().unwrap().unwrap();
        settings.provider.gemini_api_base_url = String::new();
        settings.provider.gemini_api_key = "kept".to_string();
        store.save_settings(&settings).unwrap();
    }

    let store = Store::open(&path).unwrap();
    let settings = store.get_settings().unwrap().unwrap();
    assert_eq!(settings.provider.gemini_api_base_url, DEFAULT_GEMINI_API_BASE_URL);
    assert_eq!(settings.provider.gemini_api_key, "kept");
}

#[test]
fn save_settings_rejects_zero_frequency() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("diary.db")).unwrap();

    let mut settings = store.get_settings().unwrap().unwrap();
    settings.notification_frequency_minutes = 0;

    let err = store.save_settings(&settings).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Repo(RepoError::Validation(SettingsValidationError::ZeroFrequency))
    ));
    assert_eq!(
        store
            .get_settings()
            .unwrap()
            .unwrap()
            .notification_frequency_minutes,
        DEFAULT_FREQUENCY_MINUTES
    );
}

#[test]
fn operations_before_initialize_fail_with_not_initialized() {
    let store = Store::new();

    assert!(!store.is_initialized());
    assert!(matches!(store.get_settings(), Err(StoreError::NotInitialized)));
    assert!(matches!(store.optimize(), Err(StoreError::NotInitialized)));
    assert_eq!(store.get_settings().ok().flatten(), None);
}

#[test]
fn initialize_twice_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("diary.db");
    let store = Store::open(&path).unwrap();

    store.initialize(&path).unwrap();
    store.initialize(dir.path().join("other.db")).unwrap();

    assert_eq!(store.path(), Some(path));
    assert!(!dir.path().join("other.db").exists());
}

#[test]
fn cleanup_is_idempotent_and_initialize_reopens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("diary.db");
    let store = Store::open(&path).unwrap();

    store.cleanup();
    store.cleanup();
    assert!(!store.is_initialized());
    assert!(matches!(store.get_settings(), Err(StoreError::NotInitialized)));

    store.initialize(&path).unwrap();
    assert!(store.get_settings().unwrap().is_some());
}

#[test]
fn initialize_fails_for_unusable_path() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let store = Store::new();
    assert!(store.initialize(blocker.join("diary.db")).is_err());
    assert!(!store.is_initialized());
}

#[test]
fn set_notifications_paused_keeps_concurrent_changes() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("diary.db")).unwrap();

    let mut edited = store.get_settings().unwrap().unwrap();
    edited.notification_frequency_minutes = 20;
    edited.user_name = "Mina".to_string();
    store.save_settings(&edited).unwrap();

    assert!(store.set_notifications_paused(true).unwrap());

    let stored = store.get_settings().unwrap().unwrap();
    assert!(stored.notifications_paused);
    assert_eq!(stored.notification_frequency_minutes, 20);
    assert_eq!(stored.user_name, "Mina");
}

#[test]
fn set_notifications_paused_reports_missing_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("diary.db");
    let store = Store::open(&path).unwrap();
    Connection::open(&path)
        .unwrap()
        .execute("DELETE FROM settings;", [])
        .unwrap();

    assert!(!store.set_notifications_paused(true).unwrap());
    assert_eq!(store.get_settings().unwrap(), None);
}
