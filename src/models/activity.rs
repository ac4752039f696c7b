//! Activity log model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityType {
    Loan,
    Return,
    Extension,
    Reservation,
    Notification,
    Lost,
    Other,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Loan => "LOAN",
            ActivityType::Return => "RETURN",
            ActivityType::Extension => "EXTENSION",
            ActivityType::Reservation => "RESERVATION",
            ActivityType::Notification => "NOTIFICATION",
            ActivityType::Lost => "LOST",
            ActivityType::Other => "OTHER",
        }
    }
}

/// Append-only audit entry. Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityLogEntry {
    pub id: i32,
    pub subscriber_id: i32,
    pub librarian_id: Option<i32>,
    pub book_id: Option<i32>,
    pub activity_type: String,
    pub activity_date: DateTime<Utc>,
    pub message: String,
}

/// Payload for appending an activity entry inside a caller's transaction.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub subscriber_id: i32,
    pub librarian_id: Option<i32>,
    pub book_id: Option<i32>,
    pub activity_type: ActivityType,
    pub message: String,
}
