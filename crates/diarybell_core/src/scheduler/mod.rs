//! Notification scheduling.
//!
//! # Responsibility
//! - Decide when the next notification may fire from the configured
//!   frequency and daily window.
//! - Run a fixed-interval poll loop on a dedicated thread.
//! - Report triggers and state changes to the UI layer over a channel.
//!
//! # Invariants
//! - Pause and diary mode are independent flags; either one suspends firing.
//! - A failing tick never stops the loop.
//! - Lock order is scheduler state, then store. The store never calls back.

use crate::store::StoreError;
use chrono::NaiveDateTime;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub mod clock;
mod notifier;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use notifier::{NotificationScheduler, SchedulerHandle, TickOutcome};
pub use window::NotificationWindow;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_FALLBACK_MINUTES: u32 = 30;

/// Why a trigger was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// A poll tick reached the scheduled instant inside the window.
    Scheduled,
    /// The UI asked for a notification right now.
    Manual,
}

/// Events delivered to the UI layer, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    Trigger {
        reason: TriggerReason,
        at: NaiveDateTime,
    },
    PauseChanged {
        paused: bool,
    },
    DiaryModeActivated,
    DiaryModeDeactivated,
}

/// Poll loop tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// How often the loop wakes up, independent of notification frequency.
    pub poll_interval: Duration,
    /// Delay used when no settings row exists yet.
    pub fallback_minutes: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            fallback_minutes: DEFAULT_FALLBACK_MINUTES,
        }
    }
}

impl SchedulerConfig {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_fallback_minutes(mut self, minutes: u32) -> Self {
        self.fallback_minutes = minutes.max(1);
        self
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[derive(Debug)]
pub enum SchedulerError {
    /// `start` was called while the poll thread is alive.
    AlreadyRunning,
    Spawn(std::io::Error),
    Store(StoreError),
}

impl Display for SchedulerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "scheduler poll loop is already running"),
            Self::Spawn(err) => write!(f, "failed to spawn scheduler thread: {err}"),
            Self::Store(err) => write!(f, "scheduler could not read settings: {err}"),
        }
    }
}

impl Error for SchedulerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::AlreadyRunning => None,
            Self::Spawn(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for SchedulerError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}
