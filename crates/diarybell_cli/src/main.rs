//! DiaryBell command-line front end.
//!
//! # Responsibility
//! - Wire `diarybell_core` paths, logging, store and scheduler together.
//! - Offer a line-driven stand-in for the tray UI (`run`).

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use diarybell_core::config::log_level_from_env;
use diarybell_core::{
    init_logging, AppPaths, ConversationMessage, NotificationScheduler, NotificationWindow,
    SchedulerConfig, SchedulerEvent, Store, SystemClock, TriggerReason,
};
use log::{info, warn};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

/// DiaryBell - periodic diary prompts and local diary storage
#[derive(Parser)]
#[command(name = "diarybell", version)]
#[command(about = "Periodic diary prompts backed by a local SQLite store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database file (defaults to the per-user data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show settings, window and scheduling state
    Status,

    /// Run the scheduler and print events.
    ///
    /// Reads commands from stdin, one per line: `pause`, `diary`, `done`,
    /// `now`, `quit`.
    Run,

    /// Toggle the persisted pause flag
    Pause,

    /// List diary entries, newest first
    Entries {
        /// First date to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last date to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Append a message to today's conversation
    Append { text: String },

    /// Compact the database file
    Optimize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = AppPaths::from_env();

    if let Err(err) = init_logging(&log_level_from_env(), &paths.log_dir()) {
        eprintln!("warning: file logging disabled: {err}");
    }

    let db_path = cli.db.clone().unwrap_or_else(|| paths.db_path());
    let store = Store::open(&db_path)
        .with_context(|| format!("could not open database {}", db_path.display()))?;
    let store = Arc::new(store);

    match cli.command {
        Commands::Status => status(&store, &paths),
        Commands::Run => run(store),
        Commands::Pause => toggle_pause(store),
        Commands::Entries { from, to } => entries(&store, from, to),
        Commands::Append { text } => append(&store, text),
        Commands::Optimize => optimize(&store),
    }
}

fn status(store: &Arc<Store>, paths: &AppPaths) -> Result<()> {
    println!("data: {}", paths.root().display());
    let Some(settings) = store.get_settings().context("failed to read settings")? else {
        println!("settings: none");
        return Ok(());
    };

    let window = NotificationWindow::from_settings(&settings);
    println!("user: {}", settings.user_name);
    println!(
        "assistant: {} ({})",
        settings.assistant_name, settings.selected_assistant_id
    );
    println!(
        "window: {}-{}{}",
        window.start.format("%H:%M"),
        window.end.format("%H:%M"),
        if window.wraps() { " (overnight)" } else { "" }
    );
    println!("every: {} min", settings.notification_frequency_minutes);
    println!("paused: {}", settings.notifications_paused);

    if !settings.notifications_paused {
        let next = window.next_eligible(
            Local::now().naive_local(),
            settings.notification_frequency_minutes,
        );
        println!("next: {}", next.format("%Y-%m-%d %H:%M"));
    }
    let count = store
        .diary_entry_count()
        .context("failed to count diary entries")?;
    println!("entries: {count}");
    Ok(())
}

fn run(store: Arc<Store>) -> Result<()> {
    let (scheduler, events) = NotificationScheduler::new(
        Arc::clone(&store),
        Arc::new(SystemClock),
        SchedulerConfig::default(),
    );
    let handle = scheduler
        .start()
        .context("failed to start the scheduler")?;
    info!("event=cli_run module=cli status=start");

    let printer = std::thread::Builder::new()
        .name("diarybell-events".to_owned())
        .spawn(move || {
            for event in events {
                print_event(&event);
            }
        })
        .context("failed to spawn the event printer")?;

    if let Some(next) = scheduler.next_due() {
        println!("next notification at {}", next.format("%Y-%m-%d %H:%M"));
    }

    for line in std::io::stdin().lock().lines() {
        match line.context("failed to read stdin")?.trim() {
            "pause" => {
                scheduler.toggle_pause();
            }
            "diary" => scheduler.enter_diary_mode(),
            "done" => scheduler.exit_diary_mode(),
            "now" => scheduler.show_now(),
            "quit" => break,
            "" => {}
            other => println!("unknown command `{other}` (pause|diary|done|now|quit)"),
        }
    }

    handle.stop();
    drop(scheduler);
    if printer.join().is_err() {
        warn!("event=cli_run module=cli status=warn error_code=printer_panicked");
    }
    info!("event=cli_run module=cli status=stopped");
    Ok(())
}

fn print_event(event: &SchedulerEvent) {
    match event {
        SchedulerEvent::Trigger { reason, at } => {
            let reason = match reason {
                TriggerReason::Scheduled => "scheduled",
                TriggerReason::Manual => "manual",
            };
            println!("[{}] time to write ({reason})", at.format("%H:%M"));
        }
        SchedulerEvent::PauseChanged { paused } => {
            println!("{}", if *paused { "paused" } else { "resumed" });
        }
        SchedulerEvent::DiaryModeActivated => println!("diary mode on"),
        SchedulerEvent::DiaryModeDeactivated => println!("diary mode off"),
    }
}

fn toggle_pause(store: Arc<Store>) -> Result<()> {
    let (scheduler, _events) =
        NotificationScheduler::new(store, Arc::new(SystemClock), SchedulerConfig::default());
    let paused = scheduler.toggle_pause();
    println!("{}", if paused { "paused" } else { "resumed" });
    Ok(())
}

fn entries(store: &Arc<Store>, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<()> {
    let entries = match (from, to) {
        (None, None) => store.get_all_diary_entries(),
        (from, to) => store.get_diary_entries_by_date_range(
            from.unwrap_or(earliest_date()),
            to.unwrap_or(latest_date()),
        ),
    }
    .context("failed to list diary entries")?;

    if entries.is_empty() {
        println!("no entries");
    }
    for entry in entries {
        if entry.is_empty() {
            println!("{}  (empty)", entry.date);
            continue;
        }
        let headline = entry
            .summary
            .as_deref()
            .or_else(|| entry.conversation.last().map(|message| message.content.as_str()))
            .unwrap_or("");
        println!(
            "{}  {:>3} messages  {}",
            entry.date,
            entry.conversation.len(),
            headline
        );
    }
    Ok(())
}

// Dates are stored as `YYYY-MM-DD`, so open bounds stay within four-digit years.
fn earliest_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn latest_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

fn append(store: &Arc<Store>, text: String) -> Result<()> {
    let today = Local::now().date_naive();
    store
        .append_to_past_event(today, ConversationMessage::from_user(text))
        .with_context(|| format!("failed to append to {today}"))?;
    println!("appended to {today}");
    Ok(())
}

fn optimize(store: &Arc<Store>) -> Result<()> {
    store.optimize().context("database compaction failed")?;
    println!("database compacted");
    Ok(())
}
