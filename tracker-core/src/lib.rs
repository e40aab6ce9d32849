//! Tracker core library
//!
//! Habits on a weekday schedule, one-off events, their completions per
//! calendar day and the rules deciding what is shown on a given day.

pub mod app;
pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod services;

pub use app::AppState;
pub use error::{AppError, Result};
