//! Services module
//!
//! Business logic that sits between the UI collaborator and the store.

pub mod settings;
pub mod statistics;
pub mod trackers;
pub mod visibility;

pub use settings::{CalendarSettings, SettingsService, TrackerSettings};
pub use statistics::{compute_statistics, Statistics};
pub use trackers::TrackerService;
pub use visibility::{compute_visible, VisibleCategory, VisibleTracker};
