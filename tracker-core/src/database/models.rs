//! Database models
//!
//! Domain types for categories, trackers and completion records, plus the
//! raw row shapes they are decoded from. Decoding is explicit: a row that
//! does not describe a valid entity is an error, never a dropped entry.

use crate::error::{AppError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::FromRow;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Day of the week. Index 0 is Monday, 6 is Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    #[serde(rename = "Mon")]
    Monday,
    #[serde(rename = "Tue")]
    Tuesday,
    #[serde(rename = "Wed")]
    Wednesday,
    #[serde(rename = "Thu")]
    Thursday,
    #[serde(rename = "Fri")]
    Friday,
    #[serde(rename = "Sat")]
    Saturday,
    #[serde(rename = "Sun")]
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Weekday::Monday => "Mon",
            Weekday::Tuesday => "Tue",
            Weekday::Wednesday => "Wed",
            Weekday::Thursday => "Thu",
            Weekday::Friday => "Fri",
            Weekday::Saturday => "Sat",
            Weekday::Sunday => "Sun",
        }
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        Weekday::ALL[day.num_days_from_monday() as usize]
    }
}

/// Weekdays a habit recurs on
pub type Schedule = BTreeSet<Weekday>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerKind {
    /// Recurs on the weekdays of its schedule
    Habit,
    /// One-shot, done once
    Event,
}

impl TrackerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackerKind::Habit => "habit",
            TrackerKind::Event => "event",
        }
    }
}

impl FromStr for TrackerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "habit" => Ok(TrackerKind::Habit),
            "event" => Ok(TrackerKind::Event),
            other => Err(format!("unknown tracker kind '{}'", other)),
        }
    }
}

/// Display colour, stored as `#RRGGBB`. The core never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(u32);

impl Color {
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self((u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b))
    }

    pub fn to_hex(self) -> String {
        format!("#{:06X}", self.0)
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let hex = s
            .strip_prefix('#')
            .filter(|hex| hex.len() == 6 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| format!("colour '{}' is not in #RRGGBB form", s))?;

        u32::from_str_radix(hex, 16)
            .map(Color)
            .map_err(|e| format!("colour '{}': {}", s, e))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A habit or event the user tracks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracker {
    pub id: Uuid,
    pub name: String,
    pub color: Color,
    pub emoji: String,
    pub kind: TrackerKind,
    /// Empty for events
    pub schedule: Schedule,
    /// For events this is the day the user was browsing when it was created
    pub created_at: DateTime<Utc>,
}

impl Tracker {
    pub fn is_scheduled_on(&self, weekday: Weekday) -> bool {
        self.schedule.contains(&weekday)
    }
}

/// Named group of trackers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub trackers: Vec<Tracker>,
}

/// Evidence that a tracker was performed on a calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub id: Uuid,
    pub tracker_id: Uuid,
    pub date: NaiveDate,
}

/// Completion state of a tracker on a day after a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionState {
    Completed,
    NotCompleted,
}

impl CompletionState {
    pub fn is_completed(self) -> bool {
        self == CompletionState::Completed
    }
}

/// Create tracker request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTrackerRequest {
    pub name: String,
    pub emoji: String,
    pub color: Color,
    pub kind: TrackerKind,
    #[serde(default)]
    pub schedule: Schedule,
    /// Category to file the tracker under; the default bucket when absent
    #[serde(default)]
    pub category_title: Option<String>,
    /// Day being browsed when creation started. Becomes an event's creation date.
    #[serde(default)]
    pub initial_date: Option<DateTime<Utc>>,
}

// ===== Stored rows =====

#[derive(Debug, FromRow)]
pub(crate) struct CategoryRow {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct TrackerRow {
    pub id: String,
    pub category_id: String,
    pub name: String,
    pub emoji: String,
    pub color: String,
    pub kind: String,
    /// JSON array of weekday names
    pub schedule: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct CompletionRecordRow {
    pub id: String,
    pub tracker_id: String,
    pub date: NaiveDate,
}

pub(crate) fn parse_id(entity: &'static str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| AppError::corrupt(entity, format!("id '{}': {}", raw, e)))
}

impl CategoryRow {
    pub(crate) fn into_category(self, trackers: Vec<Tracker>) -> Result<Category> {
        Ok(Category {
            id: parse_id("category", &self.id)?,
            title: self.title,
            created_at: self.created_at,
            trackers,
        })
    }
}

impl TryFrom<TrackerRow> for Tracker {
    type Error = AppError;

    fn try_from(row: TrackerRow) -> Result<Self> {
        let kind = row
            .kind
            .parse::<TrackerKind>()
            .map_err(|e| AppError::corrupt("tracker", e))?;
        let color = row
            .color
            .parse::<Color>()
            .map_err(|e| AppError::corrupt("tracker", e))?;
        let schedule: Schedule = serde_json::from_str(&row.schedule)
            .map_err(|e| AppError::corrupt("tracker", format!("schedule: {}", e)))?;

        Ok(Tracker {
            id: parse_id("tracker", &row.id)?,
            name: row.name,
            color,
            emoji: row.emoji,
            kind,
            schedule,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<CompletionRecordRow> for CompletionRecord {
    type Error = AppError;

    fn try_from(row: CompletionRecordRow) -> Result<Self> {
        Ok(CompletionRecord {
            id: parse_id("completion record", &row.id)?,
            tracker_id: parse_id("completion record", &row.tracker_id)?,
            date: row.date,
        })
    }
}
