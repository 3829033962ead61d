use chrono::NaiveDate;
use diarybell_core::{ConversationMessage, DiaryEntry, Store};
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: u32 = 8;
const WRITES_PER_THREAD: u32 = 10;

fn date(offset: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i64::from(offset))
}

#[test]
fn concurrent_saves_on_distinct_dates_all_persist() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open(dir.path().join("diary.db")).unwrap());
    let barrier = Arc::new(Barrier::new(THREADS as usize));

    let handles: Vec<_> = (0..THREADS)
        .map(|worker| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for write in 0..WRITES_PER_THREAD {
                    let offset = worker * WRITES_PER_THREAD + write;
                    let mut entry = DiaryEntry::new(date(offset));
                    entry.summary = Some(format!("worker {worker} write {write}"));
                    store.save_diary_entry(&mut entry).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        store.diary_entry_count().unwrap(),
        u64::from(THREADS * WRITES_PER_THREAD)
    );
    for offset in 0..THREADS * WRITES_PER_THREAD {
        assert!(store.get_diary_entry(date(offset)).unwrap().is_some());
    }
}

#[test]
fn concurrent_saves_on_same_date_leave_one_complete_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open(dir.path().join("diary.db")).unwrap());
    let barrier = Arc::new(Barrier::new(THREADS as usize));

    let handles: Vec<_> = (0..THREADS)
        .map(|worker| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut entry = DiaryEntry::new(date(0));
                entry.summary = Some(format!("worker {worker}"));
                entry.emotion_tags = vec![format!("tag-{worker}")];
                store.save_diary_entry(&mut entry).unwrap()
            })
        })
        .collect();
    let ids: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(store.diary_entry_count().unwrap(), 1);
    let stored = store.get_diary_entry(date(0)).unwrap().unwrap();
    assert!(ids.iter().all(|id| *id == stored.id));

    // Fields come from exactly one writer, never a mix.
    let summary = stored.summary.unwrap();
    let worker = summary.trim_start_matches("worker ");
    assert_eq!(stored.emotion_tags, vec![format!("tag-{worker}")]);
}

#[test]
fn concurrent_appends_keep_every_message() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open(dir.path().join("diary.db")).unwrap());
    let barrier = Arc::new(Barrier::new(THREADS as usize));

    let handles: Vec<_> = (0..THREADS)
        .map(|worker| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store
                    .append_to_past_event(
                        date(0),
                        ConversationMessage::from_user(format!("note {worker}")),
                    )
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stored = store.get_diary_entry(date(0)).unwrap().unwrap();
    assert_eq!(stored.conversation.len(), THREADS as usize);
}

#[test]
fn reads_interleaved_with_optimize_never_observe_a_closed_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open(dir.path().join("diary.db")).unwrap());
    for offset in 0..10 {
        store.save_diary_entry(&mut DiaryEntry::new(date(offset))).unwrap();
    }

    let reader = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for _ in 0..50 {
                assert_eq!(store.get_all_diary_entries().unwrap().len(), 10);
                assert!(store.get_settings().unwrap().is_some());
            }
        })
    };
    for _ in 0..3 {
        store.optimize().unwrap();
    }
    reader.join().unwrap();
}
