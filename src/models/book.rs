//! Book model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Book row: one title with a pool of physical copies.
///
/// `0 <= available_copies <= total_copies` holds at every committed state;
/// both counters are mutated only inside lending/reservation transactions.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub total_copies: i32,
    pub available_copies: i32,
    pub shelf_location: Option<String>,
}

/// Catalog search row: a book joined with its open loans, one row per copy
/// currently out. A fully shelved book yields a single row with both loan
/// columns null.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BookLoanDetails {
    pub id: i32,
    pub title: String,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub total_copies: i32,
    pub available_copies: i32,
    pub shelf_location: Option<String>,
    pub holder_id: Option<i32>,
    pub due_date: Option<NaiveDate>,
}
