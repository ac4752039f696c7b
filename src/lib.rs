//! Circulation Server
//!
//! Library circulation desk backend: lending, reservations, member status
//! and notifications over a single JSON command endpoint, plus the scheduled
//! daemons that keep the collection moving.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod scheduler;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
