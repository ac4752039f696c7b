//! Reservation engine: queueing, fulfillment cascade and the expiry sweep

use chrono::{Duration, NaiveDate, Utc};
use sqlx::PgConnection;

use crate::{
    error::AppResult,
    models::{
        activity::{ActivityType, NewActivity},
        notification::NotificationKind,
        reservation::ReservationStatus,
    },
    repository::{
        activity::ActivityRepository, books::BooksRepository, loans::LoansRepository,
        notifications::NotificationsRepository, reservations::ReservationsRepository, Repository,
    },
};

/// Pickup window granted when a returned copy is handed to a reservation.
pub const RETURN_PICKUP_DAYS: i64 = 2;
/// Pickup window granted when the expiry sweep promotes the next holder.
pub const EXPIRY_PICKUP_DAYS: i64 = 3;

/// Outcome of a reservation request. `wire_token` is the exact lowercase
/// token the client protocol expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    Success,
    AlreadyReserved,
    AlreadyBorrowed,
    NoCopiesAvailable,
    CanBorrow,
}

impl ReserveOutcome {
    pub fn wire_token(&self) -> &'static str {
        match self {
            ReserveOutcome::Success => "success",
            ReserveOutcome::AlreadyReserved => "alreadyreserved",
            ReserveOutcome::AlreadyBorrowed => "alreadyborrowed",
            ReserveOutcome::NoCopiesAvailable => "nocopiesavailable",
            ReserveOutcome::CanBorrow => "canborrow",
        }
    }
}

/// Decision tree for a reservation request, in protocol order: a duplicate
/// reservation wins over everything; a book with copies on the shelf is
/// borrowed, not reserved; a queue already as long as the copy pool is full;
/// a member holding the book cannot also queue for it.
fn decide(
    already_reserved: bool,
    available_copies: i32,
    pending: i64,
    total_copies: i32,
    already_borrowed: bool,
) -> ReserveOutcome {
    if already_reserved {
        ReserveOutcome::AlreadyReserved
    } else if available_copies > 0 {
        ReserveOutcome::CanBorrow
    } else if pending >= total_copies as i64 {
        ReserveOutcome::NoCopiesAvailable
    } else if already_borrowed {
        ReserveOutcome::AlreadyBorrowed
    } else {
        ReserveOutcome::Success
    }
}

#[derive(Clone)]
pub struct ReservationsService {
    repository: Repository,
}

impl ReservationsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Queue a subscriber for a book. Only `Success` writes anything.
    pub async fn request_reservation(
        &self,
        subscriber_id: i32,
        book_id: i32,
    ) -> AppResult<ReserveOutcome> {
        let mut tx = self.repository.pool.begin().await?;

        let already_reserved =
            ReservationsRepository::has_pending_by(&mut tx, subscriber_id, book_id).await?;
        let book = match BooksRepository::fetch_for_update(&mut tx, book_id).await? {
            Some(b) => b,
            None => return Ok(ReserveOutcome::NoCopiesAvailable),
        };
        let pending = ReservationsRepository::pending_count(&mut tx, book_id).await?;
        let already_borrowed =
            LoansRepository::has_open_loan(&mut tx, book_id, subscriber_id).await?;

        let outcome = decide(
            already_reserved,
            book.available_copies,
            pending,
            book.total_copies,
            already_borrowed,
        );
        if outcome != ReserveOutcome::Success {
            return Ok(outcome);
        }

        let today = Utc::now().date_naive();
        ReservationsRepository::insert_pending(&mut tx, subscriber_id, book_id, today).await?;
        ActivityRepository::append(
            &mut tx,
            &NewActivity {
                subscriber_id,
                librarian_id: None,
                book_id: Some(book_id),
                activity_type: ActivityType::Reservation,
                message: format!("User {subscriber_id} reserved the book with ID: {book_id}"),
            },
        )
        .await?;

        tx.commit().await?;
        tracing::info!(subscriber_id, book_id, "reservation queued");
        Ok(ReserveOutcome::Success)
    }

    /// Hand a just-returned copy to the earliest pending reservation, inside
    /// the return's transaction. The copy stays off the shelf, so
    /// availability is not touched. Returns whether a holder was notified.
    pub async fn promote_after_return(
        conn: &mut PgConnection,
        librarian_id: i32,
        book_id: i32,
        title: &str,
        today: NaiveDate,
    ) -> AppResult<bool> {
        let reservation =
            match ReservationsRepository::next_pending_for_update(conn, book_id).await? {
                Some(r) => r,
                None => return Ok(false),
            };

        ReservationsRepository::set_status(
            conn,
            reservation.id,
            ReservationStatus::Fulfilled,
            Some(today + Duration::days(RETURN_PICKUP_DAYS)),
        )
        .await?;

        let notification = format!(
            "Book '{title}' is now available. Please collect within {RETURN_PICKUP_DAYS} days."
        );
        NotificationsRepository::insert(
            conn,
            reservation.subscriber_id,
            &notification,
            NotificationKind::ReservationReady,
        )
        .await?;
        ActivityRepository::append(
            conn,
            &NewActivity {
                subscriber_id: reservation.subscriber_id,
                librarian_id: Some(librarian_id),
                book_id: Some(book_id),
                activity_type: ActivityType::Notification,
                message: format!("Notification sent: {notification}"),
            },
        )
        .await?;
        Ok(true)
    }

    /// Cancel fulfilled reservations whose pickup window has closed and pass
    /// each freed copy to the next holder in line. One transaction for the
    /// whole batch; returns the number of reservations cancelled.
    pub async fn expiry_sweep(&self) -> AppResult<u64> {
        let today = Utc::now().date_naive();
        let mut tx = self.repository.pool.begin().await?;

        let expired = ReservationsRepository::expired_fulfilled(&mut tx, today).await?;
        let count = expired.len() as u64;

        for item in expired {
            ReservationsRepository::mark_cancelled(&mut tx, item.reservation_id).await?;

            NotificationsRepository::insert(
                &mut tx,
                item.subscriber_id,
                &format!(
                    "Your reservation for '{}' has expired and been cancelled.",
                    item.title
                ),
                NotificationKind::Reminder,
            )
            .await?;
            ActivityRepository::append(
                &mut tx,
                &NewActivity {
                    subscriber_id: item.subscriber_id,
                    librarian_id: None,
                    book_id: Some(item.book_id),
                    activity_type: ActivityType::Reservation,
                    message: format!(
                        "Reservation cancelled due to expiration for book: {}",
                        item.title
                    ),
                },
            )
            .await?;

            // The freed copy goes straight to the next holder in line; it
            // only lands back on the shelf when nobody is waiting.
            let next =
                ReservationsRepository::next_pending_for_update(&mut tx, item.book_id).await?;
            if let Some(next) = next {
                ReservationsRepository::set_status(
                    &mut tx,
                    next.id,
                    ReservationStatus::Fulfilled,
                    Some(today + Duration::days(EXPIRY_PICKUP_DAYS)),
                )
                .await?;
                NotificationsRepository::insert(
                    &mut tx,
                    next.subscriber_id,
                    &format!(
                        "The book '{}' is now available for pickup. Please collect within {} days.",
                        item.title, EXPIRY_PICKUP_DAYS
                    ),
                    NotificationKind::Reminder,
                )
                .await?;
                ActivityRepository::append(
                    &mut tx,
                    &NewActivity {
                        subscriber_id: next.subscriber_id,
                        librarian_id: None,
                        book_id: Some(item.book_id),
                        activity_type: ActivityType::Reservation,
                        message: format!(
                            "Book '{}' now available for next reservation holder",
                            item.title
                        ),
                    },
                )
                .await?;
            } else {
                BooksRepository::increment_available(&mut tx, item.book_id).await?;
            }
        }

        tx.commit().await?;
        if count > 0 {
            tracing::info!(count, "expired reservations cancelled");
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_reservation_wins_over_everything() {
        assert_eq!(
            decide(true, 5, 0, 5, true),
            ReserveOutcome::AlreadyReserved
        );
    }

    #[test]
    fn available_copies_redirect_to_borrowing() {
        assert_eq!(decide(false, 1, 0, 3, false), ReserveOutcome::CanBorrow);
    }

    #[test]
    fn full_queue_rejects() {
        assert_eq!(
            decide(false, 0, 3, 3, false),
            ReserveOutcome::NoCopiesAvailable
        );
        assert_eq!(
            decide(false, 0, 4, 3, false),
            ReserveOutcome::NoCopiesAvailable
        );
    }

    #[test]
    fn current_borrower_cannot_queue() {
        assert_eq!(
            decide(false, 0, 1, 3, true),
            ReserveOutcome::AlreadyBorrowed
        );
    }

    #[test]
    fn otherwise_reservation_succeeds() {
        assert_eq!(decide(false, 0, 2, 3, false), ReserveOutcome::Success);
    }

    #[test]
    fn wire_tokens_are_lowercase() {
        assert_eq!(ReserveOutcome::Success.wire_token(), "success");
        assert_eq!(
            ReserveOutcome::AlreadyReserved.wire_token(),
            "alreadyreserved"
        );
        assert_eq!(
            ReserveOutcome::AlreadyBorrowed.wire_token(),
            "alreadyborrowed"
        );
        assert_eq!(
            ReserveOutcome::NoCopiesAvailable.wire_token(),
            "nocopiesavailable"
        );
        assert_eq!(ReserveOutcome::CanBorrow.wire_token(), "canborrow");
    }
}
