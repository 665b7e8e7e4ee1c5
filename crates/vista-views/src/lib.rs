//! # vista-views
//!
//! Saved views and scheduled email snapshots for Vista entity pages.
//!
//! This crate provides:
//! - [`ViewController`] - Active view, dirty tracking and save/overwrite/delete
//! - [`SnapshotBuilder`] - Frozen override sets for new schedules
//! - [`ScheduleDraft`] - Schedule form validation and request bodies
//! - [`recurrence`] - Display formatting and next-run computation
//! - [`memory`] - In-memory stores for offline use and tests

pub mod controller;
pub mod memory;
pub mod recurrence;
pub mod schedule;
pub mod snapshot;
pub mod view;

pub use controller::ViewController;
pub use memory::{InMemoryEntitySource, InMemoryScheduleStore, InMemoryViewStore};
pub use recurrence::{DisplayZone, HourOption, format_schedule, format_time, hour_options};
pub use schedule::{
    DaySet, EmailLog, EmailSchedule, EmailScheduleCreate, EmailScheduleUpdate, LogStatus,
    Recurrence, RecurrenceType, ScheduleDraft, ScheduleStatus, ScheduleStore, TimeOfDay,
    ValidatedSchedule, parse_recipients,
};
pub use snapshot::SnapshotBuilder;
pub use view::{EntitySource, SavedView, SavedViewCreate, SavedViewUpdate, ViewStore};
