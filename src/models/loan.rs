//! Loan model and related types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Loan row. Open iff `actual_return_date` is null; at most one open loan
/// exists per (subscriber, book) pair.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Loan {
    pub id: i32,
    pub subscriber_id: i32,
    pub book_id: i32,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub actual_return_date: Option<NaiveDate>,
}

/// Borrow history entry for a subscriber (loan joined with the book title).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LoanHistoryEntry {
    pub loan_id: i32,
    pub book_id: i32,
    pub title: String,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub actual_return_date: Option<NaiveDate>,
}
