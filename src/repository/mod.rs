//! Repository layer for database operations
//!
//! Each sub-repository holds the pool for standalone reads. Steps that must
//! run inside a caller's transaction are associated functions taking a
//! `&mut PgConnection`, so an engine can compose several of them atomically.

pub mod activity;
pub mod books;
pub mod loans;
pub mod notifications;
pub mod reservations;
pub mod subscribers;

use sqlx::{Pool, Postgres};

/// Main repository struct holding the database connection pool.
///
/// Reservations have no entry here: every reservation step runs inside a
/// caller's transaction, through the associated functions of
/// [`reservations::ReservationsRepository`].
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub loans: loans::LoansRepository,
    pub subscribers: subscribers::SubscribersRepository,
    pub notifications: notifications::NotificationsRepository,
    pub activity: activity::ActivityRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            subscribers: subscribers::SubscribersRepository::new(pool.clone()),
            notifications: notifications::NotificationsRepository::new(pool.clone()),
            activity: activity::ActivityRepository::new(pool.clone()),
            pool,
        }
    }
}
