//! Settings service
//!
//! Runtime settings persisted as JSON in the app data directory.

use crate::clock::Calendar;
use crate::config::{
    DEFAULT_CATEGORY_TITLE, MAX_UTC_OFFSET_MINUTES, MIN_UTC_OFFSET_MINUTES, SETTINGS_FILE_NAME,
};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Calendar configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarSettings {
    /// Fixed offset east of UTC in minutes. The system offset when absent.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSettings {
    /// Category for trackers created without one
    #[serde(default = "default_category_title")]
    pub default_category_title: String,
    #[serde(default)]
    pub calendar: CalendarSettings,
}

fn default_category_title() -> String {
    DEFAULT_CATEGORY_TITLE.to_string()
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            default_category_title: default_category_title(),
            calendar: CalendarSettings::default(),
        }
    }
}

impl TrackerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.default_category_title.trim().is_empty() {
            return Err(AppError::Settings(
                "default_category_title must not be empty".to_string(),
            ));
        }

        if let Some(offset) = self.calendar.utc_offset_minutes {
            if !(MIN_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES).contains(&offset) {
                return Err(AppError::Settings(format!(
                    "utc_offset_minutes {} is outside {}..={}",
                    offset, MIN_UTC_OFFSET_MINUTES, MAX_UTC_OFFSET_MINUTES
                )));
            }
        }

        Ok(())
    }

    /// Calendar the settings describe
    pub fn calendar(&self) -> Calendar {
        self.calendar
            .utc_offset_minutes
            .and_then(Calendar::with_offset_minutes)
            .unwrap_or_else(Calendar::local)
    }
}

/// Service for managing application settings
#[derive(Clone)]
pub struct SettingsService {
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new(app_data_dir: PathBuf) -> Self {
        Self {
            settings_path: app_data_dir.join(SETTINGS_FILE_NAME),
        }
    }

    /// Load settings from disk or create default if not exists
    pub async fn load(&self) -> Result<TrackerSettings> {
        if !fs::try_exists(&self.settings_path).await? {
            tracing::info!("Settings file not found, creating default settings");
            let default = TrackerSettings::default();
            self.save(&default).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        let settings: TrackerSettings = serde_json::from_str(&content)
            .map_err(|e| AppError::Settings(format!("Failed to parse settings: {}", e)))?;
        settings.validate()?;

        Ok(settings)
    }

    /// Validate and save settings to disk
    pub async fn save(&self, settings: &TrackerSettings) -> Result<()> {
        settings.validate()?;

        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| AppError::Settings(format!("Failed to serialize settings: {}", e)))?;

        fs::write(&self.settings_path, content).await?;
        tracing::info!("Settings saved to {:?}", self.settings_path);

        Ok(())
    }
}
