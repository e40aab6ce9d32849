//! Statistics over completion history

use crate::clock::Calendar;
use crate::database::{Category, CompletionRecord, TrackerKind};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    /// Longest run of consecutive days with at least one completion
    pub best_period: u32,
    /// Days on which every habit scheduled for that day was completed
    pub perfect_days: u32,
    pub completed_total: usize,
    /// Completions per day that had any
    pub average_per_day: f64,
}

impl Statistics {
    pub fn is_empty(&self) -> bool {
        self.completed_total == 0
    }
}

pub fn compute_statistics(
    categories: &[Category],
    records: &[CompletionRecord],
    calendar: &Calendar,
) -> Statistics {
    let days: BTreeSet<NaiveDate> = records.iter().map(|r| r.date).collect();
    let done: HashSet<(Uuid, NaiveDate)> = records.iter().map(|r| (r.tracker_id, r.date)).collect();

    let habits: Vec<_> = categories
        .iter()
        .flat_map(|c| c.trackers.iter())
        .filter(|t| t.kind == TrackerKind::Habit)
        .collect();

    let perfect_days = days
        .iter()
        .filter(|&&day| {
            let weekday = Calendar::weekday(day);
            let mut scheduled = habits
                .iter()
                .filter(|h| h.is_scheduled_on(weekday) && calendar.day_of(h.created_at) <= day)
                .peekable();

            scheduled.peek().is_some() && scheduled.all(|h| done.contains(&(h.id, day)))
        })
        .count() as u32;

    let average_per_day = if days.is_empty() {
        0.0
    } else {
        records.len() as f64 / days.len() as f64
    };

    Statistics {
        best_period: longest_streak(&days),
        perfect_days,
        completed_total: records.len(),
        average_per_day,
    }
}

fn longest_streak(days: &BTreeSet<NaiveDate>) -> u32 {
    let mut best = 0;
    let mut current = 0;
    let mut previous: Option<NaiveDate> = None;

    for &day in days {
        current = match previous {
            Some(prev) if prev.succ_opt() == Some(day) => current + 1,
            _ => 1,
        };
        best = best.max(current);
        previous = Some(day);
    }

    best
}
