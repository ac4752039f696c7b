//! Reservations repository

use chrono::NaiveDate;
use sqlx::{PgConnection, Row};

use crate::{
    error::AppResult,
    models::reservation::{Reservation, ReservationStatus},
};

/// Expired FULFILLED reservation joined with its book title.
#[derive(Debug, Clone)]
pub struct ExpiredReservation {
    pub reservation_id: i32,
    pub subscriber_id: i32,
    pub book_id: i32,
    pub title: String,
}

/// Reservation table access. Every reservation step is part of a larger
/// lending or sweep transaction, so this repository holds no pool of its
/// own: all operations take the caller's connection.
pub struct ReservationsRepository;

impl ReservationsRepository {
    /// Does the subscriber already hold a PENDING reservation on this book?
    pub async fn has_pending_by(
        conn: &mut PgConnection,
        subscriber_id: i32,
        book_id: i32,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM reservations
                WHERE subscriber_id = $1 AND book_id = $2 AND status = 'PENDING'
            )
            "#,
        )
        .bind(subscriber_id)
        .bind(book_id)
        .fetch_one(conn)
        .await?;
        Ok(exists)
    }

    pub async fn pending_count(conn: &mut PgConnection, book_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reservations WHERE book_id = $1 AND status = 'PENDING'",
        )
        .bind(book_id)
        .fetch_one(conn)
        .await?;
        Ok(count)
    }

    /// Any PENDING reservation on the book (blocks loan extension).
    pub async fn has_pending(conn: &mut PgConnection, book_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM reservations WHERE book_id = $1 AND status = 'PENDING')",
        )
        .bind(book_id)
        .fetch_one(conn)
        .await?;
        Ok(exists)
    }

    pub async fn insert_pending(
        conn: &mut PgConnection,
        subscriber_id: i32,
        book_id: i32,
        reservation_date: NaiveDate,
    ) -> AppResult<i32> {
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO reservations (subscriber_id, book_id, reservation_date, expiration_date, status)
            VALUES ($1, $2, $3, NULL, 'PENDING')
            RETURNING id
            "#,
        )
        .bind(subscriber_id)
        .bind(book_id)
        .bind(reservation_date)
        .fetch_one(conn)
        .await?;
        Ok(id)
    }

    /// Earliest PENDING reservation for a book (FIFO by reservation date,
    /// id as tie-break), locked for the transaction.
    pub async fn next_pending_for_update(
        conn: &mut PgConnection,
        book_id: i32,
    ) -> AppResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations
            WHERE book_id = $1 AND status = 'PENDING'
            ORDER BY reservation_date ASC, id ASC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(book_id)
        .fetch_optional(conn)
        .await?;
        Ok(reservation)
    }

    pub async fn set_status(
        conn: &mut PgConnection,
        reservation_id: i32,
        status: ReservationStatus,
        expiration_date: Option<NaiveDate>,
    ) -> AppResult<()> {
        sqlx::query("UPDATE reservations SET status = $1, expiration_date = $2 WHERE id = $3")
            .bind(status.as_str())
            .bind(expiration_date)
            .bind(reservation_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Cancel without touching the recorded expiration date.
    pub async fn mark_cancelled(conn: &mut PgConnection, reservation_id: i32) -> AppResult<()> {
        sqlx::query("UPDATE reservations SET status = 'CANCELLED' WHERE id = $1")
            .bind(reservation_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// FULFILLED reservations whose pickup window has closed.
    pub async fn expired_fulfilled(
        conn: &mut PgConnection,
        today: NaiveDate,
    ) -> AppResult<Vec<ExpiredReservation>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id as reservation_id, r.subscriber_id, r.book_id, b.title
            FROM reservations r
            JOIN books b ON r.book_id = b.id
            WHERE r.status = 'FULFILLED' AND r.expiration_date <= $1
            ORDER BY r.expiration_date ASC, r.id ASC
            "#,
        )
        .bind(today)
        .fetch_all(conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ExpiredReservation {
                reservation_id: row.get("reservation_id"),
                subscriber_id: row.get("subscriber_id"),
                book_id: row.get("book_id"),
                title: row.get("title"),
            })
            .collect())
    }
}
