//! Notification scheduler state machine and poll loop.
//!
//! # Responsibility
//! - Track pause and diary-mode suspension.
//! - Keep the next eligible instant current and fire when it is reached.
//! - Drive `poll_once` from a named background thread.
//!
//! # Invariants
//! - Firing is possible only while neither paused nor in diary mode.
//! - A due tick always reschedules, whether or not it fired.
//! - `next_due == None` means the last recompute failed; every following
//!   tick retries it.

use super::{
    Clock, NotificationWindow, SchedulerConfig, SchedulerError, SchedulerEvent, SchedulerResult,
    TriggerReason,
};
use crate::model::settings::Settings;
use crate::store::Store;
use chrono::{Duration, NaiveDateTime};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

const THREAD_NAME: &str = "diarybell-scheduler";

/// Result of a single poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Paused or in diary mode; nothing was evaluated.
    Suspended,
    NotDue { next: NaiveDateTime },
    Fired { next: NaiveDateTime },
    /// Due, but outside the window (or no settings yet); rescheduled only.
    Skipped { next: NaiveDateTime },
    /// Recovered from a previous failure by recomputing the next instant.
    Rescheduled { next: NaiveDateTime },
    /// Settings could not be read; the next tick retries.
    Failed,
}

#[derive(Debug)]
struct ScheduleState {
    paused: bool,
    diary_mode: bool,
    next_due: Option<NaiveDateTime>,
}

impl ScheduleState {
    fn is_suspended(&self) -> bool {
        self.paused || self.diary_mode
    }
}

/// Decides when to raise notification triggers.
///
/// Every method is safe to call from any thread. Enable/disable style calls
/// are idempotent.
pub struct NotificationScheduler {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    state: Mutex<ScheduleState>,
    events: Sender<SchedulerEvent>,
    running: AtomicBool,
}

impl NotificationScheduler {
    /// Creates a scheduler and the receiving end of its event channel.
    ///
    /// The paused flag is restored from settings and the first instant is
    /// computed immediately. The poll loop does not run until `start`.
    pub fn new(
        store: Arc<Store>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> (Arc<Self>, Receiver<SchedulerEvent>) {
        let (events, receiver) = crossbeam_channel::unbounded();
        let paused = store
            .get_settings()
            .ok()
            .flatten()
            .is_some_and(|settings| settings.notifications_paused);

        let scheduler = Self {
            store,
            clock,
            config,
            state: Mutex::new(ScheduleState {
                paused,
                diary_mode: false,
                next_due: None,
            }),
            events,
            running: AtomicBool::new(false),
        };

        {
            let mut state = scheduler.state.lock();
            if let Err(err) = scheduler.reschedule(&mut state) {
                warn!("event=scheduler_init module=scheduler status=degraded error={err}");
            }
        }
        info!("event=scheduler_init module=scheduler status=ok paused={paused}");

        (Arc::new(scheduler), receiver)
    }

    /// Spawns the poll loop thread.
    ///
    /// # Errors
    /// - `SchedulerError::AlreadyRunning` while a previous loop is alive.
    /// - `SchedulerError::Spawn` when the OS refuses a new thread.
    pub fn start(self: &Arc<Self>) -> SchedulerResult<SchedulerHandle> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let scheduler = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name(THREAD_NAME.to_owned())
            .spawn(move || scheduler.run_loop(&stop_rx));

        match spawned {
            Ok(join) => Ok(SchedulerHandle {
                stop_tx: Some(stop_tx),
                join: Some(join),
            }),
            Err(err) => {
                self.running.store(false, Ordering::SeqCst);
                error!("event=scheduler_start module=scheduler status=error error={err}");
                Err(SchedulerError::Spawn(err))
            }
        }
    }

    /// Whether the poll loop thread is alive.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn is_diary_mode(&self) -> bool {
        self.state.lock().diary_mode
    }

    /// The instant the next scheduled trigger becomes due, if known.
    pub fn next_due(&self) -> Option<NaiveDateTime> {
        self.state.lock().next_due
    }

    /// Runs one poll tick.
    ///
    /// Errors are logged and contained; the outcome reports what happened.
    pub fn poll_once(&self) -> TickOutcome {
        let mut state = self.state.lock();
        if state.is_suspended() {
            return TickOutcome::Suspended;
        }

        let Some(due) = state.next_due else {
            return match self.reschedule(&mut state) {
                Ok(next) => TickOutcome::Rescheduled { next },
                Err(err) => {
                    warn!("event=scheduler_tick module=scheduler status=error stage=recover error={err}");
                    TickOutcome::Failed
                }
            };
        };

        let now = self.clock.now();
        if now < due {
            return TickOutcome::NotDue { next: due };
        }

        let settings = match self.store.get_settings() {
            Ok(settings) => settings,
            Err(err) => {
                state.next_due = None;
                error!("event=scheduler_tick module=scheduler status=error stage=settings error={err}");
                return TickOutcome::Failed;
            }
        };

        let fired = match &settings {
            Some(settings) => NotificationWindow::from_settings(settings).contains(now.time()),
            None => false,
        };

        if fired {
            info!("event=notification_trigger module=scheduler status=ok reason=scheduled at={now}");
            self.emit(SchedulerEvent::Trigger {
                reason: TriggerReason::Scheduled,
                at: now,
            });
        } else {
            info!(
                "event=notification_trigger module=scheduler status=skipped reason={} at={}",
                if settings.is_some() { "outside_window" } else { "no_settings" },
                now
            );
        }

        let next = self.compute_next(settings.as_ref());
        state.next_due = Some(next);
        debug!("event=scheduler_reschedule module=scheduler status=ok previous={due} next={next}");

        if fired {
            TickOutcome::Fired { next }
        } else {
            TickOutcome::Skipped { next }
        }
    }

    /// Raises a trigger immediately, regardless of pause or diary mode.
    pub fn show_now(&self) {
        let at = self.clock.now();
        info!("event=notification_trigger module=scheduler status=ok reason=manual at={at}");
        self.emit(SchedulerEvent::Trigger {
            reason: TriggerReason::Manual,
            at,
        });
    }

    /// Flips the paused flag, persists it and returns the new state.
    ///
    /// Resuming recomputes the next instant first. While diary mode is on
    /// the flag is only recorded. A failed write to settings is logged and
    /// does not undo the in-memory change.
    pub fn toggle_pause(&self) -> bool {
        let mut state = self.state.lock();
        state.paused = !state.paused;
        let paused = state.paused;

        if !paused && !state.diary_mode {
            if let Err(err) = self.reschedule(&mut state) {
                warn!("event=scheduler_resume module=scheduler status=degraded error={err}");
            }
        }

        self.persist_paused(paused);
        info!(
            "event=scheduler_pause module=scheduler status=ok paused={} diary_mode={}",
            paused, state.diary_mode
        );
        self.emit(SchedulerEvent::PauseChanged { paused });
        paused
    }

    /// Suspends firing for an interactive diary session.
    pub fn enter_diary_mode(&self) {
        let mut state = self.state.lock();
        if state.diary_mode {
            return;
        }
        state.diary_mode = true;
        info!("event=diary_mode module=scheduler status=ok active=true");
        self.emit(SchedulerEvent::DiaryModeActivated);
    }

    /// Ends the diary session; firing resumes from a fresh instant unless
    /// paused.
    pub fn exit_diary_mode(&self) {
        let mut state = self.state.lock();
        if !state.diary_mode {
            return;
        }
        state.diary_mode = false;

        if !state.paused {
            if let Err(err) = self.reschedule(&mut state) {
                warn!("event=diary_mode module=scheduler status=degraded error={err}");
            }
        }
        info!(
            "event=diary_mode module=scheduler status=ok active=false paused={}",
            state.paused
        );
        self.emit(SchedulerEvent::DiaryModeDeactivated);
    }

    /// Recomputes the next instant from current settings, e.g. after the
    /// UI changed frequency or window.
    pub fn reschedule_now(&self) -> SchedulerResult<NaiveDateTime> {
        let mut state = self.state.lock();
        self.reschedule(&mut state)
    }

    fn reschedule(&self, state: &mut ScheduleState) -> SchedulerResult<NaiveDateTime> {
        let settings = match self.store.get_settings() {
            Ok(settings) => settings,
            Err(err) => {
                state.next_due = None;
                return Err(err.into());
            }
        };

        let previous = state.next_due;
        let next = self.compute_next(settings.as_ref());
        state.next_due = Some(next);
        debug!(
            "event=scheduler_reschedule module=scheduler status=ok previous={} next={}",
            previous.map(|at| at.to_string()).unwrap_or_else(|| "none".to_string()),
            next
        );
        Ok(next)
    }

    fn compute_next(&self, settings: Option<&Settings>) -> NaiveDateTime {
        let now = self.clock.now();
        match settings {
            Some(settings) => NotificationWindow::from_settings(settings)
                .next_eligible(now, settings.notification_frequency_minutes),
            None => now + Duration::minutes(i64::from(self.config.fallback_minutes)),
        }
    }

    fn persist_paused(&self, paused: bool) {
        match self.store.set_notifications_paused(paused) {
            Ok(true) => {}
            Ok(false) => {
                warn!("event=scheduler_pause module=scheduler status=warn error_code=no_settings");
            }
            Err(err) => {
                warn!("event=scheduler_pause module=scheduler status=warn error_code=persist_failed error={err}");
            }
        }
    }

    fn emit(&self, event: SchedulerEvent) {
        if self.events.send(event).is_err() {
            debug!("event=scheduler_emit module=scheduler status=dropped reason=receiver_closed");
        }
    }

    fn run_loop(&self, stop_rx: &Receiver<()>) {
        info!(
            "event=scheduler_loop module=scheduler status=start poll_interval_ms={}",
            self.config.poll_interval.as_millis()
        );

        loop {
            match stop_rx.recv_timeout(self.config.poll_interval) {
                Err(RecvTimeoutError::Timeout) => self.run_tick(),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("event=scheduler_loop module=scheduler status=stopped");
    }

    fn run_tick(&self) {
        match catch_unwind(AssertUnwindSafe(|| self.poll_once())) {
            Ok(outcome) => debug!("event=scheduler_tick module=scheduler status=ok outcome={outcome:?}"),
            Err(_) => {
                self.state.lock().next_due = None;
                error!("event=scheduler_tick module=scheduler status=error error_code=tick_panicked");
            }
        }
    }
}

/// Owner of a running poll loop. Dropping it stops the loop.
pub struct SchedulerHandle {
    stop_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stops the poll loop and waits for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                error!("event=scheduler_loop module=scheduler status=error error_code=join_failed");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
