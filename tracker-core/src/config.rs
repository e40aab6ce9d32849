//! Application configuration constants
//!
//! Central location for file names, resource limits and validation
//! boundaries used throughout the tracker core.

use std::time::Duration;

// ===== Storage =====

/// SQLite database file inside the app data directory
pub const DATABASE_FILE_NAME: &str = "trackers.db";

/// Runtime settings file inside the app data directory
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Connections in the application pool
pub const MAX_POOL_CONNECTIONS: u32 = 5;

/// How long a connection waits on a locked database before failing
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ===== Categories =====

/// Category that receives trackers created without an explicit category
pub const DEFAULT_CATEGORY_TITLE: &str = "Мои трекеры";

// ===== Validation Limits =====

/// Maximum tracker name length in characters (matches the name field limit
/// of the creation form)
pub const MAX_NAME_LENGTH: usize = 38;

/// Largest UTC offset accepted for the calendar, in minutes (UTC+14:00)
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Smallest UTC offset accepted for the calendar, in minutes (UTC-12:00)
pub const MIN_UTC_OFFSET_MINUTES: i32 = -12 * 60;
