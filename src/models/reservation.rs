//! Reservation model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Reservation lifecycle. Transitions are monotonic:
/// PENDING -> FULFILLED (cascade) -> CANCELLED (expiry), or PENDING is
/// implicitly consumed when the holder borrows the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Pending,
    Fulfilled,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Fulfilled => "FULFILLED",
            ReservationStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Reservation row. FIFO ordering within a book is by `reservation_date`
/// ascending, id ascending as tie-break.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub id: i32,
    pub subscriber_id: i32,
    pub book_id: i32,
    pub reservation_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
    pub status: String,
}
