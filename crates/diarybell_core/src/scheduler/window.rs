//! Daily notification window and next-instant computation.
//!
//! # Invariants
//! - `start > end` means the window wraps past midnight; both bounds are
//!   inclusive.
//! - `next_eligible` always returns an instant strictly after `now`.

use crate::model::settings::Settings;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Time-of-day interval during which notifications may fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl NotificationWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.notification_start, settings.notification_end)
    }

    /// Whether the window crosses midnight (e.g. 21:00-03:00).
    pub fn wraps(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.wraps() {
            time >= self.start || time <= self.end
        } else {
            self.start <= time && time <= self.end
        }
    }

    /// Computes the next instant a notification may fire, `frequency_minutes`
    /// after `now` when that stays inside the window, otherwise at the start
    /// of the next window occurrence.
    pub fn next_eligible(&self, now: NaiveDateTime, frequency_minutes: u32) -> NaiveDateTime {
        let time = now.time();
        let today = now.date();

        let next = if self.contains(time) {
            let tentative = now + Duration::minutes(i64::from(frequency_minutes));
            if self.contains(tentative.time()) {
                tentative
            } else if self.wraps() && time <= self.end {
                // Still in the after-midnight half: tonight's start is next.
                self.start_on(today)
            } else {
                self.start_on(tomorrow(today))
            }
        } else if self.wraps() {
            if self.end < time && time < self.start {
                self.start_on(today)
            } else {
                self.start_on(tomorrow(today))
            }
        } else if time < self.start {
            self.start_on(today)
        } else {
            self.start_on(tomorrow(today))
        };

        if next > now {
            next
        } else {
            now + Duration::minutes(1)
        }
    }

    fn start_on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.start)
    }
}

fn tomorrow(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::NotificationWindow;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    fn hm(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_time(hm(hour, minute))
    }

    fn night() -> NotificationWindow {
        NotificationWindow::new(hm(21, 0), hm(3, 0))
    }

    fn office() -> NotificationWindow {
        NotificationWindow::new(hm(9, 0), hm(18, 0))
    }

    #[test]
    fn contains_handles_both_window_shapes() {
        assert!(night().wraps());
        assert!(night().contains(hm(21, 0)));
        assert!(night().contains(hm(23, 59)));
        assert!(night().contains(hm(0, 0)));
        assert!(night().contains(hm(3, 0)));
        assert!(!night().contains(hm(3, 1)));
        assert!(!night().contains(hm(12, 0)));

        assert!(!office().wraps());
        assert!(office().contains(hm(9, 0)));
        assert!(office().contains(hm(18, 0)));
        assert!(!office().contains(hm(8, 59)));
        assert!(!office().contains(hm(18, 1)));
    }

    #[test]
    fn wrapping_window_advances_by_frequency_inside_window() {
        assert_eq!(night().next_eligible(at(10, 22, 0), 10), at(10, 22, 10));
    }

    #[test]
    fn wrapping_window_crosses_midnight_inside_window() {
        assert_eq!(night().next_eligible(at(10, 23, 55), 10), at(11, 0, 5));
    }

    #[test]
    fn wrapping_window_closing_after_midnight_waits_for_tonight() {
        assert_eq!(night().next_eligible(at(11, 2, 55), 10), at(11, 21, 0));
    }

    #[test]
    fn wrapping_window_closing_before_midnight_waits_for_tomorrow() {
        assert_eq!(night().next_eligible(at(10, 23, 0), 300), at(11, 21, 0));
    }

    #[test]
    fn wrapping_window_outside_waits_for_today_start() {
        assert_eq!(night().next_eligible(at(10, 4, 0), 10), at(10, 21, 0));
    }

    #[test]
    fn same_day_window_closing_moves_to_tomorrow() {
        assert_eq!(office().next_eligible(at(10, 17, 45), 30), at(11, 9, 0));
    }

    #[test]
    fn same_day_window_after_end_moves_to_tomorrow() {
        assert_eq!(office().next_eligible(at(10, 20, 0), 30), at(11, 9, 0));
    }

    #[test]
    fn same_day_window_before_start_waits_for_today() {
        assert_eq!(office().next_eligible(at(10, 8, 0), 30), at(10, 9, 0));
    }

    #[test]
    fn same_day_window_advances_inside_window() {
        assert_eq!(office().next_eligible(at(10, 10, 0), 30), at(10, 10, 30));
    }

    #[test]
    fn single_instant_window_moves_to_next_day() {
        let now = at(10, 9, 0);
        let window = NotificationWindow::new(hm(9, 0), hm(9, 0));
        assert_eq!(window.next_eligible(now, 30), at(11, 9, 0));
    }

    #[test]
    fn non_advancing_result_is_clamped_one_minute_forward() {
        let now = at(10, 10, 0);
        assert_eq!(office().next_eligible(now, 0), at(10, 10, 1));
    }

    #[test]
    fn result_is_strictly_after_now_for_every_minute_of_the_day() {
        for window in [night(), office(), NotificationWindow::new(hm(0, 0), hm(0, 0))] {
            for minute in 0..(24 * 60) {
                let now = at(10, minute / 60, minute % 60);
                for frequency in [1, 10, 30, 24 * 60] {
                    let next = window.next_eligible(now, frequency);
                    assert!(next > now, "window={window:?} now={now} freq={frequency}");
                }
            }
        }
    }
}
