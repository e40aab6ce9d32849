//! Visibility filter
//!
//! Decides which trackers show up on a given day and whether each one is
//! done. Pure: works on snapshots and touches no storage.
//!
//! Ordering: categories and the trackers inside them keep the order they
//! were given in. With the SQLite store that is categories by title and
//! trackers by insertion.

use crate::clock::Calendar;
use crate::database::{Category, CompletionRecord, Tracker, TrackerKind};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// A tracker as shown on the reference day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisibleTracker {
    pub tracker: Tracker,
    /// Completion records on any day
    pub completed_count: usize,
    pub is_completed_on_reference_date: bool,
}

/// A non-empty category of visible trackers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisibleCategory {
    pub title: String,
    pub trackers: Vec<VisibleTracker>,
}

#[derive(Default, Clone, Copy)]
struct Completion {
    count: usize,
    on_reference_date: bool,
}

/// Group the trackers visible on `reference_date`, filtered by a
/// case-insensitive substring of their name (empty matches everything).
///
/// Habits show on the weekdays of their schedule. An event shows from its
/// creation day until it is first completed; after that only on the day it
/// was completed.
pub fn compute_visible(
    categories: &[Category],
    records: &[CompletionRecord],
    reference_date: NaiveDate,
    search_text: &str,
    calendar: &Calendar,
) -> Vec<VisibleCategory> {
    let weekday = Calendar::weekday(reference_date);
    let needle = search_text.to_lowercase();

    let mut completions: HashMap<Uuid, Completion> = HashMap::new();
    for record in records {
        let entry = completions.entry(record.tracker_id).or_default();
        entry.count += 1;
        entry.on_reference_date |= record.date == reference_date;
    }

    categories
        .iter()
        .filter_map(|category| {
            let trackers: Vec<VisibleTracker> = category
                .trackers
                .iter()
                .filter(|tracker| needle.is_empty() || tracker.name.to_lowercase().contains(&needle))
                .filter_map(|tracker| {
                    let completion = completions.get(&tracker.id).copied().unwrap_or_default();

                    let visible = match tracker.kind {
                        TrackerKind::Habit => tracker.is_scheduled_on(weekday),
                        TrackerKind::Event => {
                            completion.on_reference_date
                                || (completion.count == 0
                                    && reference_date >= calendar.day_of(tracker.created_at))
                        }
                    };

                    visible.then(|| VisibleTracker {
                        tracker: tracker.clone(),
                        completed_count: completion.count,
                        is_completed_on_reference_date: completion.on_reference_date,
                    })
                })
                .collect();

            (!trackers.is_empty()).then(|| VisibleCategory {
                title: category.title.clone(),
                trackers,
            })
        })
        .collect()
}
