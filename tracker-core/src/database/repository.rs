//! Repository layer for database operations
//!
//! SQLite implementation of `TrackerStore`. Multi-statement writes run in
//! a transaction and subscribers are notified only after it commits.

use super::models::*;
use super::notify::{ChangeCallback, ChangeNotifier, StoreChange, SubscriptionId};
use super::store::TrackerStore;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    notifier: ChangeNotifier,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            notifier: ChangeNotifier::new(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Titles differing only in case share a key; the UNIQUE key rejects the second.
    async fn insert_category(
        tx: &mut Transaction<'_, Sqlite>,
        title: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Category> {
        let id = Uuid::new_v4();

        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            INSERT INTO categories (id, title, title_key, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, title, created_at
            "#,
        )
        .bind(id.to_string())
        .bind(title)
        .bind(category_key(title))
        .bind(created_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            let taken = e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation());
            if taken {
                AppError::DuplicateCategory(title.to_string())
            } else {
                AppError::Database(e)
            }
        })?;

        tracing::debug!("Created category: {} ({})", title, id);
        row.into_category(Vec::new())
    }

    async fn tracker_exists(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
        let found: Option<String> = sqlx::query_scalar("SELECT id FROM trackers WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(conn)
            .await?;

        Ok(found.is_some())
    }
}

/// Case-folded title used for category uniqueness
pub(crate) fn category_key(title: &str) -> String {
    title.to_lowercase()
}

#[async_trait]
impl TrackerStore for Repository {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, CategoryRow>(
            r#"
            SELECT id, title, created_at FROM categories ORDER BY title ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let tracker_rows = sqlx::query_as::<_, TrackerRow>(
            r#"
            SELECT id, category_id, name, emoji, color, kind, schedule, created_at
            FROM trackers
            ORDER BY rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_category: HashMap<String, Vec<Tracker>> = HashMap::new();
        for row in tracker_rows {
            let category_id = row.category_id.clone();
            by_category
                .entry(category_id)
                .or_default()
                .push(Tracker::try_from(row)?);
        }

        categories
            .into_iter()
            .map(|row| {
                let trackers = by_category.remove(&row.id).unwrap_or_default();
                row.into_category(trackers)
            })
            .collect()
    }

    async fn create_category(&self, title: &str, created_at: DateTime<Utc>) -> Result<Category> {
        let mut tx = self.pool.begin().await?;
        let category = Self::insert_category(&mut tx, title, created_at).await?;
        tx.commit().await?;

        self.notifier.notify(&StoreChange::CategoryCreated {
            title: category.title.clone(),
        });
        Ok(category)
    }

    async fn create_tracker(
        &self,
        tracker: &Tracker,
        category_title: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let schedule = serde_json::to_string(&tracker.schedule)
            .map_err(|e| AppError::corrupt("tracker", format!("schedule: {}", e)))?;

        let mut tx = self.pool.begin().await?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT id FROM categories WHERE title = ?")
                .bind(category_title)
                .fetch_optional(&mut *tx)
                .await?;

        let (category_id, created_category) = match existing {
            Some(id) => (id, false),
            None => {
                let category = Self::insert_category(&mut tx, category_title, now).await?;
                (category.id.to_string(), true)
            }
        };

        sqlx::query(
            r#"
            INSERT INTO trackers (id, category_id, name, emoji, color, kind, schedule, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tracker.id.to_string())
        .bind(&category_id)
        .bind(&tracker.name)
        .bind(&tracker.emoji)
        .bind(tracker.color.to_hex())
        .bind(tracker.kind.as_str())
        .bind(&schedule)
        .bind(tracker.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!("Created tracker: {} in category: {}", tracker.id, category_title);

        if created_category {
            self.notifier.notify(&StoreChange::CategoryCreated {
                title: category_title.to_string(),
            });
        }
        self.notifier.notify(&StoreChange::TrackerCreated {
            tracker_id: tracker.id,
            category_title: category_title.to_string(),
        });

        Ok(())
    }

    async fn get_tracker(&self, id: Uuid) -> Result<Option<Tracker>> {
        let row = sqlx::query_as::<_, TrackerRow>(
            r#"
            SELECT id, category_id, name, emoji, color, kind, schedule, created_at
            FROM trackers WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Tracker::try_from).transpose()
    }

    async fn list_completion_records(
        &self,
        tracker_id: Option<Uuid>,
    ) -> Result<Vec<CompletionRecord>> {
        let rows = match tracker_id {
            Some(tracker_id) => {
                sqlx::query_as::<_, CompletionRecordRow>(
                    r#"
                    SELECT id, tracker_id, date FROM completion_records
                    WHERE tracker_id = ?
                    ORDER BY date ASC, rowid ASC
                    "#,
                )
                .bind(tracker_id.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, CompletionRecordRow>(
                    r#"
                    SELECT id, tracker_id, date FROM completion_records
                    ORDER BY date ASC, rowid ASC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(CompletionRecord::try_from).collect()
    }

    async fn add_completion_record(
        &self,
        tracker_id: Uuid,
        date: NaiveDate,
    ) -> Result<CompletionRecord> {
        let mut tx = self.pool.begin().await?;

        if !Self::tracker_exists(&mut *tx, tracker_id).await? {
            return Err(AppError::TrackerNotFound(tracker_id));
        }

        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO completion_records (id, tracker_id, date) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(tracker_id.to_string())
            .bind(date)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!("Added completion record {} for tracker {} on {}", id, tracker_id, date);
        self.notifier
            .notify(&StoreChange::CompletionAdded { tracker_id, date });

        Ok(CompletionRecord {
            id,
            tracker_id,
            date,
        })
    }

    async fn remove_completion_record(&self, tracker_id: Uuid, date: NaiveDate) -> Result<bool> {
        let removed = sqlx::query("DELETE FROM completion_records WHERE tracker_id = ? AND date = ?")
            .bind(tracker_id.to_string())
            .bind(date)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if removed == 0 {
            return Ok(false);
        }

        tracing::debug!("Removed {} completion records for tracker {} on {}", removed, tracker_id, date);
        self.notifier
            .notify(&StoreChange::CompletionRemoved { tracker_id, date });

        Ok(true)
    }

    async fn is_completed(&self, tracker_id: Uuid, date: NaiveDate) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM completion_records WHERE tracker_id = ? AND date = ?",
        )
        .bind(tracker_id.to_string())
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn toggle_completion(
        &self,
        tracker_id: Uuid,
        date: NaiveDate,
    ) -> Result<CompletionState> {
        let mut tx = self.pool.begin().await?;

        if !Self::tracker_exists(&mut *tx, tracker_id).await? {
            return Err(AppError::TrackerNotFound(tracker_id));
        }

        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM completion_records WHERE tracker_id = ? AND date = ?",
        )
        .bind(tracker_id.to_string())
        .bind(date)
        .fetch_one(&mut *tx)
        .await?;

        let (state, change) = if existing > 0 {
            sqlx::query("DELETE FROM completion_records WHERE tracker_id = ? AND date = ?")
                .bind(tracker_id.to_string())
                .bind(date)
                .execute(&mut *tx)
                .await?;

            (
                CompletionState::NotCompleted,
                StoreChange::CompletionRemoved { tracker_id, date },
            )
        } else {
            sqlx::query("INSERT INTO completion_records (id, tracker_id, date) VALUES (?, ?, ?)")
                .bind(Uuid::new_v4().to_string())
                .bind(tracker_id.to_string())
                .bind(date)
                .execute(&mut *tx)
                .await?;

            (
                CompletionState::Completed,
                StoreChange::CompletionAdded { tracker_id, date },
            )
        };

        tx.commit().await?;

        tracing::debug!("Toggled tracker {} on {} to {:?}", tracker_id, date, state);
        self.notifier.notify(&change);

        Ok(state)
    }

    fn on_change(&self, callback: ChangeCallback) -> SubscriptionId {
        self.notifier.subscribe(callback)
    }

    fn remove_subscription(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }
}
