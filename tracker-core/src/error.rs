//! Error types for the tracker core
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized to the UI layer as messages.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Name must not be empty")]
    EmptyName,

    #[error("Name must not be longer than {max} characters")]
    NameTooLong { max: usize },

    #[error("A habit must be scheduled on at least one weekday")]
    EmptySchedule,

    #[error("Category already exists: {0}")]
    DuplicateCategory(String),

    #[error("Tracker not found: {0}")]
    TrackerNotFound(Uuid),

    #[error("Cannot change completion for a future date: {0}")]
    FutureDate(NaiveDate),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt {entity} record: {reason}")]
    Corrupt { entity: &'static str, reason: String },

    #[error("Settings error: {0}")]
    Settings(String),
}

impl AppError {
    /// Expected, recoverable failures caused by user input.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AppError::EmptyName
                | AppError::NameTooLong { .. }
                | AppError::EmptySchedule
                | AppError::DuplicateCategory(_)
                | AppError::FutureDate(_)
        )
    }

    /// Storage faults: the database, the filesystem or a stored row that
    /// no longer decodes.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Io(_)
                | AppError::Corrupt { .. }
                | AppError::Settings(_)
        )
    }

    pub(crate) fn corrupt(entity: &'static str, reason: impl ToString) -> Self {
        AppError::Corrupt {
            entity,
            reason: reason.to_string(),
        }
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
