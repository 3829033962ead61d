//! Domain model for settings and diary records.
//!
//! # Responsibility
//! - Define canonical data structures shared by store, scheduler and callers.
//! - Keep validation rules next to the data they constrain.
//!
//! # Invariants
//! - `Settings` is a singleton with fixed identity.
//! - A `DiaryEntry` is keyed by calendar date and carries a stable surrogate id.

pub mod diary;
pub mod settings;
