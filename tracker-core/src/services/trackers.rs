//! Trackers service
//!
//! The write surface of the core (category creation, tracker creation,
//! completion toggling) and the queries the UI renders from.

use super::statistics::{compute_statistics, Statistics};
use super::visibility::{compute_visible, VisibleCategory};
use crate::clock::{Calendar, Clock};
use crate::config::{DEFAULT_CATEGORY_TITLE, MAX_NAME_LENGTH};
use crate::database::{
    Category, ChangeCallback, CompletionRecord, CompletionState, CreateTrackerRequest, Schedule,
    SubscriptionId, Tracker, TrackerKind, TrackerStore,
};
use crate::error::{AppError, Result};
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Service for managing trackers and their completions
#[derive(Clone)]
pub struct TrackerService {
    store: Arc<dyn TrackerStore>,
    clock: Arc<dyn Clock>,
    calendar: Calendar,
    default_category_title: String,
    // Held across every check-then-write: category uniqueness, category
    // resolution for new trackers, completion toggles
    write_lock: Arc<Mutex<()>>,
}

impl TrackerService {
    pub fn new(store: Arc<dyn TrackerStore>, clock: Arc<dyn Clock>, calendar: Calendar) -> Self {
        Self {
            store,
            clock,
            calendar,
            default_category_title: DEFAULT_CATEGORY_TITLE.to_string(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Use `title` as the bucket for trackers created without a category
    pub fn with_default_category(mut self, title: impl Into<String>) -> Self {
        self.default_category_title = title.into();
        self
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    pub fn today(&self) -> NaiveDate {
        self.calendar.today(self.clock.as_ref())
    }

    /// Create an empty category. Titles are unique regardless of case.
    pub async fn create_category(&self, title: &str) -> Result<Category> {
        let title = title.trim();
        if title.is_empty() {
            tracing::warn!("Rejected category with empty title");
            return Err(AppError::EmptyName);
        }

        let _guard = self.write_lock.lock().await;

        let categories = self.store.list_categories().await?;
        if let Some(existing) = find_case_insensitive(&categories, title) {
            tracing::warn!("Rejected duplicate category: {} (exists as {})", title, existing.title);
            return Err(AppError::DuplicateCategory(title.to_string()));
        }

        let category = self.store.create_category(title, self.clock.now()).await?;

        tracing::info!("Category created: {}", category.title);
        Ok(category)
    }

    /// List all categories with their trackers
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.store.list_categories().await
    }

    /// Create a tracker and file it under its category
    pub async fn create_tracker(&self, req: CreateTrackerRequest) -> Result<Tracker> {
        let name = validate_name(&req.name)?;

        let schedule = match req.kind {
            TrackerKind::Habit if req.schedule.is_empty() => {
                tracing::warn!("Rejected habit '{}' with empty schedule", name);
                return Err(AppError::EmptySchedule);
            }
            TrackerKind::Habit => req.schedule,
            TrackerKind::Event => Schedule::new(),
        };

        let now = self.clock.now();
        let created_at = match req.kind {
            TrackerKind::Habit => now,
            TrackerKind::Event => req.initial_date.unwrap_or(now),
        };

        let requested_title = match req.category_title.as_deref() {
            None => self.default_category_title.clone(),
            Some(title) if title.trim().is_empty() => return Err(AppError::EmptyName),
            Some(title) => title.trim().to_string(),
        };

        let _guard = self.write_lock.lock().await;
        let category_title = self.resolve_category_title(requested_title).await?;

        let tracker = Tracker {
            id: Uuid::new_v4(),
            name,
            color: req.color,
            emoji: req.emoji,
            kind: req.kind,
            schedule,
            created_at,
        };

        self.store
            .create_tracker(&tracker, &category_title, now)
            .await?;

        tracing::info!(
            "Tracker created: {} ({}) in {}",
            tracker.name,
            tracker.id,
            category_title
        );
        Ok(tracker)
    }

    /// Exact title if it exists, otherwise an existing category differing
    /// only in case, otherwise the title as given (to be created).
    async fn resolve_category_title(&self, title: String) -> Result<String> {
        let categories = self.store.list_categories().await?;

        if categories.iter().any(|c| c.title == title) {
            return Ok(title);
        }

        match find_case_insensitive(&categories, &title) {
            Some(existing) => {
                tracing::debug!("Filing tracker under existing category {}", existing.title);
                Ok(existing.title.clone())
            }
            None => Ok(title),
        }
    }

    /// Get a tracker by ID
    pub async fn get_tracker(&self, id: Uuid) -> Result<Tracker> {
        self.store
            .get_tracker(id)
            .await?
            .ok_or(AppError::TrackerNotFound(id))
    }

    /// Mark `tracker_id` done on `date`, or undo it if it already is.
    /// Returns the state after the toggle. Future days are rejected.
    pub async fn toggle_completion(
        &self,
        tracker_id: Uuid,
        date: NaiveDate,
    ) -> Result<CompletionState> {
        let today = self.today();
        if date > today {
            tracing::warn!("Rejected completion toggle for future date {} (today {})", date, today);
            return Err(AppError::FutureDate(date));
        }

        let _guard = self.write_lock.lock().await;
        let state = self.store.toggle_completion(tracker_id, date).await?;

        tracing::info!("Tracker {} on {}: {:?}", tracker_id, date, state);
        Ok(state)
    }

    /// Completion records of one tracker, oldest first
    pub async fn completion_history(&self, tracker_id: Uuid) -> Result<Vec<CompletionRecord>> {
        self.get_tracker(tracker_id).await?;
        self.store.list_completion_records(Some(tracker_id)).await
    }

    /// Trackers to show on `reference_date`, grouped by category
    pub async fn visible_trackers(
        &self,
        reference_date: NaiveDate,
        search_text: &str,
    ) -> Result<Vec<VisibleCategory>> {
        let categories = self.store.list_categories().await?;
        let records = self.store.list_completion_records(None).await?;

        Ok(compute_visible(
            &categories,
            &records,
            reference_date,
            search_text,
            &self.calendar,
        ))
    }

    pub async fn statistics(&self) -> Result<Statistics> {
        let categories = self.store.list_categories().await?;
        let records = self.store.list_completion_records(None).await?;

        Ok(compute_statistics(&categories, &records, &self.calendar))
    }

    /// Register a callback run after every committed change; re-query from it
    pub fn on_change(&self, callback: ChangeCallback) -> SubscriptionId {
        self.store.on_change(callback)
    }

    pub fn remove_subscription(&self, id: SubscriptionId) -> bool {
        self.store.remove_subscription(id)
    }
}

fn find_case_insensitive<'a>(categories: &'a [Category], title: &str) -> Option<&'a Category> {
    let wanted = title.to_lowercase();
    categories.iter().find(|c| c.title.to_lowercase() == wanted)
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        tracing::warn!("Rejected tracker with empty name");
        return Err(AppError::EmptyName);
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AppError::NameTooLong {
            max: MAX_NAME_LENGTH,
        });
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::database::{initialize_database, Color, Repository, StoreChange, Weekday};
    use chrono::{TimeZone, Utc};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // Wednesday 2024-03-06, midday
    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 3, 6, 12, 0, 0).unwrap()))
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    async fn create_test_service() -> (TrackerService, Repository) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        let repo = Repository::new(pool);
        let service = TrackerService::new(Arc::new(repo.clone()), clock(), Calendar::utc());
        (service, repo)
    }

    fn habit_request(name: &str, schedule: &[Weekday]) -> CreateTrackerRequest {
        CreateTrackerRequest {
            name: name.to_string(),
            emoji: "📚".to_string(),
            color: Color::rgb(0x33, 0xCF, 0x69),
            kind: TrackerKind::Habit,
            schedule: schedule.iter().copied().collect(),
            category_title: None,
            initial_date: None,
        }
    }

    fn event_request(name: &str, initial: NaiveDate) -> CreateTrackerRequest {
        CreateTrackerRequest {
            kind: TrackerKind::Event,
            schedule: Schedule::new(),
            initial_date: Some(Calendar::utc().start_of_day(initial)),
            ..habit_request(name, &[])
        }
    }

    #[tokio::test]
    async fn test_create_category_trims_and_rejects_duplicates() {
        let (service, _repo) = create_test_service().await;

        let work = service.create_category("  Work ").await.unwrap();
        assert_eq!(work.title, "Work");

        let duplicate = service.create_category("work").await;
        assert!(matches!(duplicate, Err(AppError::DuplicateCategory(_))));
        assert_eq!(service.list_categories().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_category_creates_differing_in_case() {
        let (service, _repo) = create_test_service().await;
        let other = service.clone();

        let (first, second) = tokio::join!(
            service.create_category("Work"),
            other.create_category("work")
        );

        assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);
        let failed = if first.is_err() { first } else { second };
        assert!(matches!(failed, Err(AppError::DuplicateCategory(_))));
        assert_eq!(service.list_categories().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_trackers_share_one_category() {
        let (service, _repo) = create_test_service().await;

        let mut upper = habit_request("Standup", &[Weekday::Monday]);
        upper.category_title = Some("Work".to_string());
        let mut lower = habit_request("Review", &[Weekday::Friday]);
        lower.category_title = Some("work".to_string());

        let (a, b) = tokio::join!(service.create_tracker(upper), service.create_tracker(lower));
        a.unwrap();
        b.unwrap();

        let categories = service.list_categories().await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].trackers.len(), 2);
    }

    #[tokio::test]
    async fn test_categories_stamped_by_injected_clock() {
        let (service, _repo) = create_test_service().await;

        let work = service.create_category("Work").await.unwrap();
        assert_eq!(work.created_at, clock().now());

        service
            .create_tracker(habit_request("Read", &[Weekday::Monday]))
            .await
            .unwrap();
        for category in service.list_categories().await.unwrap() {
            assert_eq!(category.created_at, clock().now());
        }
    }

    #[tokio::test]
    async fn test_create_category_rejects_blank_title() {
        let (service, _repo) = create_test_service().await;

        assert!(matches!(service.create_category("").await, Err(AppError::EmptyName)));
        assert!(matches!(service.create_category(" \t ").await, Err(AppError::EmptyName)));
        assert!(service.list_categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_category_case_insensitive_for_cyrillic() {
        let (service, _repo) = create_test_service().await;

        service.create_category("Спорт").await.unwrap();
        assert!(matches!(
            service.create_category("СПОРТ").await,
            Err(AppError::DuplicateCategory(_))
        ));
    }

    #[tokio::test]
    async fn test_create_tracker_validation() {
        let (service, _repo) = create_test_service().await;

        let empty = service.create_tracker(habit_request("   ", &[Weekday::Monday])).await;
        assert!(matches!(empty, Err(AppError::EmptyName)));

        let no_days = service.create_tracker(habit_request("Run", &[])).await;
        assert!(matches!(no_days, Err(AppError::EmptySchedule)));

        let long = "x".repeat(MAX_NAME_LENGTH + 1);
        let too_long = service.create_tracker(habit_request(&long, &[Weekday::Monday])).await;
        assert!(matches!(too_long, Err(AppError::NameTooLong { .. })));

        assert!(service.list_categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_tracker_uses_default_category() {
        let (service, _repo) = create_test_service().await;

        let read = service
            .create_tracker(habit_request(" Read ", &[Weekday::Monday]))
            .await
            .unwrap();
        assert_eq!(read.name, "Read");
        assert_eq!(read.created_at, clock().now());

        let categories = service.list_categories().await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].title, DEFAULT_CATEGORY_TITLE);
        assert_eq!(categories[0].trackers, vec![read]);
    }

    #[tokio::test]
    async fn test_custom_default_category() {
        let (service, _repo) = create_test_service().await;
        let service = service.with_default_category("Inbox");

        service
            .create_tracker(habit_request("Read", &[Weekday::Monday]))
            .await
            .unwrap();

        assert_eq!(service.list_categories().await.unwrap()[0].title, "Inbox");
    }

    #[tokio::test]
    async fn test_create_tracker_reuses_category_differing_in_case() {
        let (service, _repo) = create_test_service().await;
        service.create_category("Work").await.unwrap();

        let mut req = habit_request("Standup", &[Weekday::Monday]);
        req.category_title = Some("work".to_string());
        service.create_tracker(req).await.unwrap();

        let categories = service.list_categories().await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].title, "Work");
        assert_eq!(categories[0].trackers.len(), 1);
    }

    #[tokio::test]
    async fn test_event_takes_initial_date_and_drops_schedule() {
        let (service, _repo) = create_test_service().await;

        let mut req = event_request("Dentist", day(2));
        req.schedule = [Weekday::Friday].into_iter().collect();
        let event = service.create_tracker(req).await.unwrap();

        assert!(event.schedule.is_empty());
        assert_eq!(Calendar::utc().day_of(event.created_at), day(2));
    }

    #[tokio::test]
    async fn test_toggle_completion_round_trip() {
        let (service, _repo) = create_test_service().await;
        let read = service
            .create_tracker(habit_request("Read", &[Weekday::Monday]))
            .await
            .unwrap();

        let state = service.toggle_completion(read.id, day(4)).await.unwrap();
        assert!(state.is_completed());
        assert_eq!(service.completion_history(read.id).await.unwrap().len(), 1);

        let state = service.toggle_completion(read.id, day(4)).await.unwrap();
        assert_eq!(state, CompletionState::NotCompleted);
        assert!(service.completion_history(read.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_future_date_rejected() {
        let (service, repo) = create_test_service().await;
        let read = service
            .create_tracker(habit_request("Read", &[Weekday::Thursday]))
            .await
            .unwrap();

        let tomorrow = service.today().succ_opt().unwrap();
        let result = service.toggle_completion(read.id, tomorrow).await;

        assert!(matches!(result, Err(AppError::FutureDate(d)) if d == tomorrow));
        assert!(repo.list_completion_records(None).await.unwrap().is_empty());

        // Today is allowed
        let today = service.today();
        assert!(service.toggle_completion(read.id, today).await.is_ok());
    }

    #[tokio::test]
    async fn test_toggle_unknown_tracker() {
        let (service, _repo) = create_test_service().await;
        let missing = Uuid::new_v4();

        let result = service.toggle_completion(missing, day(4)).await;
        assert!(matches!(result, Err(AppError::TrackerNotFound(id)) if id == missing));
        assert!(matches!(
            service.completion_history(missing).await,
            Err(AppError::TrackerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_toggles_keep_one_record_per_day() {
        let (service, repo) = create_test_service().await;
        let read = service
            .create_tracker(habit_request("Read", &[Weekday::Monday]))
            .await
            .unwrap();

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.toggle_completion(read.id, day(4)).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Five flips from "not done" end at "done" with exactly one record
        let records = repo.list_completion_records(Some(read.id)).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_visible_trackers_scenario() {
        let (service, _repo) = create_test_service().await;
        let read = service
            .create_tracker(habit_request("Read", &[Weekday::Monday, Weekday::Wednesday]))
            .await
            .unwrap();

        let monday = day(4);
        let visible = service.visible_trackers(monday, "").await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title, "Мои трекеры");
        let shown = &visible[0].trackers[0];
        assert_eq!(shown.tracker.id, read.id);
        assert_eq!(shown.completed_count, 0);
        assert!(!shown.is_completed_on_reference_date);

        service.toggle_completion(read.id, monday).await.unwrap();

        let visible = service.visible_trackers(monday, "").await.unwrap();
        let shown = &visible[0].trackers[0];
        assert_eq!(shown.completed_count, 1);
        assert!(shown.is_completed_on_reference_date);

        assert!(service.visible_trackers(day(5), "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_statistics_from_store() {
        let (service, _repo) = create_test_service().await;
        let read = service
            .create_tracker(habit_request("Read", &Weekday::ALL))
            .await
            .unwrap();

        assert!(service.statistics().await.unwrap().is_empty());

        for d in [4, 5, 6] {
            service.toggle_completion(read.id, day(d)).await.unwrap();
        }

        let stats = service.statistics().await.unwrap();
        assert_eq!(stats.completed_total, 3);
        assert_eq!(stats.best_period, 3);
        // The habit was created on the 6th, so only that day counts as perfect
        assert_eq!(stats.perfect_days, 1);
    }

    #[tokio::test]
    async fn test_on_change_fires_after_mutations() {
        let (service, _repo) = create_test_service().await;
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let id = service.on_change(Arc::new(move |change: &StoreChange| {
            if matches!(change, StoreChange::CompletionAdded { .. }) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        let read = service
            .create_tracker(habit_request("Read", &[Weekday::Monday]))
            .await
            .unwrap();
        service.toggle_completion(read.id, day(4)).await.unwrap();
        service.visible_trackers(day(4), "").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(service.remove_subscription(id));
        service.toggle_completion(read.id, day(4)).await.unwrap();
        service.toggle_completion(read.id, day(4)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
