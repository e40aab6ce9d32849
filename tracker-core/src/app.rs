//! Application state and initialization
//!
//! Wires the data directory, settings, database pool, repository and
//! services together. Everything is passed explicitly; there is no global
//! store.

use crate::clock::{Clock, SystemClock};
use crate::config::DATABASE_FILE_NAME;
use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::services::{SettingsService, TrackerService, TrackerSettings};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub app_data_dir: PathBuf,
    pub settings: TrackerSettings,
    pub repository: Repository,
    pub trackers: TrackerService,
}

impl AppState {
    pub async fn initialize(app_data_dir: PathBuf) -> Result<Self> {
        Self::initialize_with_clock(app_data_dir, Arc::new(SystemClock)).await
    }

    pub async fn initialize_with_clock(app_data_dir: PathBuf, clock: Arc<dyn Clock>) -> Result<Self> {
        tracing::info!("Initializing tracker core");
        tracing::info!("App data directory: {:?}", app_data_dir);

        tokio::fs::create_dir_all(&app_data_dir).await?;

        let settings = SettingsService::new(app_data_dir.clone()).load().await?;
        let calendar = settings.calendar();
        tracing::info!("Calendar offset: {}", calendar.offset());

        let pool = create_pool(&app_data_dir.join(DATABASE_FILE_NAME)).await?;
        let repository = Repository::new(pool);

        let trackers = TrackerService::new(Arc::new(repository.clone()), clock, calendar)
            .with_default_category(settings.default_category_title.clone());

        tracing::info!("Tracker core initialized successfully");

        Ok(Self {
            app_data_dir,
            settings,
            repository,
            trackers,
        })
    }
}

/// Install the global tracing subscriber. Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tracker_core=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
