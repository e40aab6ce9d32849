//! Store boundary
//!
//! Everything the tracker core needs from persistence. `Repository` is the
//! SQLite implementation; services only see this trait.

use super::models::{Category, CompletionRecord, CompletionState, Tracker};
use super::notify::{ChangeCallback, SubscriptionId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

#[async_trait]
pub trait TrackerStore: Send + Sync {
    /// All categories with their trackers, in store order
    async fn list_categories(&self) -> Result<Vec<Category>>;

    /// Create an empty category. Fails with `DuplicateCategory` if a title
    /// equal to it ignoring case is taken.
    async fn create_category(&self, title: &str, created_at: DateTime<Utc>) -> Result<Category>;

    /// Append a tracker to the category titled `category_title`, creating
    /// the category (stamped `now`) if it does not exist.
    async fn create_tracker(
        &self,
        tracker: &Tracker,
        category_title: &str,
        now: DateTime<Utc>,
    ) -> Result<()>;

    async fn get_tracker(&self, id: Uuid) -> Result<Option<Tracker>>;

    /// Completion records, all of them or those of one tracker, ordered by date
    async fn list_completion_records(&self, tracker_id: Option<Uuid>)
        -> Result<Vec<CompletionRecord>>;

    /// Insert a record without checking for an existing one on that day
    async fn add_completion_record(&self, tracker_id: Uuid, date: NaiveDate)
        -> Result<CompletionRecord>;

    /// Remove every record of `tracker_id` on `date`. Returns whether any existed.
    async fn remove_completion_record(&self, tracker_id: Uuid, date: NaiveDate) -> Result<bool>;

    async fn is_completed(&self, tracker_id: Uuid, date: NaiveDate) -> Result<bool>;

    /// Flip the completion of `tracker_id` on `date` as a single atomic
    /// read-check-write.
    async fn toggle_completion(&self, tracker_id: Uuid, date: NaiveDate)
        -> Result<CompletionState>;

    /// Register a callback invoked after every committed change
    fn on_change(&self, callback: ChangeCallback) -> SubscriptionId;

    fn remove_subscription(&self, id: SubscriptionId) -> bool;
}
