//! Notification model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    ReservationReady,
    Reminder,
    Other,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ReservationReady => "RESERVATION_READY",
            NotificationKind::Reminder => "REMINDER",
            NotificationKind::Other => "OTHER",
        }
    }
}

/// Subscriber-facing message. Append-only apart from user-initiated bulk
/// deletion by id list.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: i32,
    pub subscriber_id: i32,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub kind: String,
}
