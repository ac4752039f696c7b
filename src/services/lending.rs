//! Lending engine: borrow, return and extend
//!
//! Every operation runs in its own transaction and re-reads the rows it will
//! mutate with `SELECT ... FOR UPDATE`. Outcomes are returned as the message
//! strings shown to the desk operator; only store faults become errors.

use chrono::{Duration, NaiveDate, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{
        activity::{ActivityType, NewActivity},
        subscriber::SubscriberStatus,
    },
    repository::{
        activity::ActivityRepository, books::BooksRepository, loans::LoansRepository,
        reservations::ReservationsRepository, subscribers::SubscribersRepository, Repository,
    },
    services::reservations::ReservationsService,
};

/// Loan term in days.
pub const LOAN_PERIOD_DAYS: i64 = 14;
/// Days added to the due date by a successful extension.
pub const EXTENSION_DAYS: i64 = 7;
/// An extension is only allowed this close to the due date.
pub const EXTENSION_WINDOW_DAYS: i64 = 7;
/// Returns later than this freeze the member.
pub const FREEZE_THRESHOLD_DAYS: i64 = 7;

#[derive(Clone)]
pub struct LendingService {
    repository: Repository,
}

impl LendingService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Lend a copy to a subscriber.
    ///
    /// Preconditions are checked in a fixed order so the operator always sees
    /// the first failing one: subscriber exists, subscriber not frozen, book
    /// exists, a copy is available.
    pub async fn borrow(
        &self,
        book_id: i32,
        subscriber_id: i32,
        librarian_id: i32,
    ) -> AppResult<String> {
        let mut tx = self.repository.pool.begin().await?;

        let subscriber = match SubscribersRepository::fetch_for_update(&mut tx, subscriber_id)
            .await?
        {
            Some(s) => s,
            None => return Ok("Subscriber doesn't exist".to_string()),
        };
        if subscriber.is_frozen() {
            return Ok("Subscriber is frozen and cannot borrow books".to_string());
        }

        let book = match BooksRepository::fetch_for_update(&mut tx, book_id).await? {
            Some(b) => b,
            None => return Ok("Book doesn't exist".to_string()),
        };
        if book.available_copies <= 0 {
            return Ok("No copies of this book are available".to_string());
        }

        let today = Utc::now().date_naive();
        let due = today + Duration::days(LOAN_PERIOD_DAYS);
        LoansRepository::insert(&mut tx, subscriber_id, book_id, today, due).await?;
        BooksRepository::set_available(&mut tx, book_id, book.available_copies - 1).await?;

        let message = format!("Successfully borrowed book: {}", book.title);
        ActivityRepository::append(
            &mut tx,
            &NewActivity {
                subscriber_id,
                librarian_id: Some(librarian_id),
                book_id: Some(book_id),
                activity_type: ActivityType::Loan,
                message: message.clone(),
            },
        )
        .await?;

        tx.commit().await?;
        tracing::info!(subscriber_id, book_id, "loan created, due {}", due);
        Ok(message)
    }

    /// Take a copy back (or record it lost).
    ///
    /// A lost copy shrinks the pool (`total -= 1`) and leaves availability
    /// alone. A normal return releases the copy, may freeze the member for a
    /// late return, and hands the copy straight to the earliest pending
    /// reservation when one exists.
    pub async fn return_book(
        &self,
        book_id: i32,
        subscriber_id: i32,
        librarian_id: i32,
        is_lost: bool,
    ) -> AppResult<String> {
        let mut tx = self.repository.pool.begin().await?;

        let loan = match LoansRepository::open_loan_for_update(&mut tx, book_id, subscriber_id)
            .await?
        {
            Some(l) => l,
            None => return Ok("No active loan found for this book and subscriber".to_string()),
        };
        let book = BooksRepository::fetch_for_update(&mut tx, book_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("book {book_id} missing for open loan")))?;

        let today = Utc::now().date_naive();
        LoansRepository::close(&mut tx, loan.id, today).await?;

        if is_lost {
            BooksRepository::set_total(&mut tx, book_id, book.total_copies - 1).await?;
            let message = format!("Book reported as lost: {}", book.title);
            ActivityRepository::append(
                &mut tx,
                &NewActivity {
                    subscriber_id,
                    librarian_id: Some(librarian_id),
                    book_id: Some(book_id),
                    activity_type: ActivityType::Lost,
                    message: message.clone(),
                },
            )
            .await?;
            tx.commit().await?;
            tracing::info!(subscriber_id, book_id, "copy reported lost");
            return Ok(message);
        }

        let late = late_days(loan.due_date, today);
        let frozen = late > FREEZE_THRESHOLD_DAYS;
        let mut message = return_message(&book.title, late, frozen);

        if frozen {
            SubscribersRepository::set_status(&mut tx, subscriber_id, SubscriberStatus::Frozen)
                .await?;
            SubscribersRepository::append_status_history(
                &mut tx,
                subscriber_id,
                SubscriberStatus::Frozen,
                today,
                "Frozen due to late return",
            )
            .await?;
        }

        ActivityRepository::append(
            &mut tx,
            &NewActivity {
                subscriber_id,
                librarian_id: Some(librarian_id),
                book_id: Some(book_id),
                activity_type: ActivityType::Return,
                message: message.clone(),
            },
        )
        .await?;

        // A freed copy goes straight to the earliest pending reservation and
        // stays off the shelf; it only becomes available when nobody waits.
        let notified = ReservationsService::promote_after_return(
            &mut tx,
            librarian_id,
            book_id,
            &book.title,
            today,
        )
        .await?;
        if notified {
            message.push_str("\nNotification sent to waiting subscriber.");
        } else {
            BooksRepository::set_available(&mut tx, book_id, book.available_copies + 1).await?;
        }

        tx.commit().await?;
        tracing::info!(subscriber_id, book_id, late, frozen, "loan returned");
        Ok(message)
    }

    /// Push the due date out by a week.
    ///
    /// Rejected for frozen members, for books with pending reservations, when
    /// no open loan exists, and when the due date is still more than a week
    /// away. Librarian id 0 means the member extended it themselves.
    pub async fn extend(
        &self,
        subscriber_id: i32,
        book_id: i32,
        librarian_id: i32,
    ) -> AppResult<String> {
        let mut tx = self.repository.pool.begin().await?;

        if let Some(subscriber) =
            SubscribersRepository::fetch_for_update(&mut tx, subscriber_id).await?
        {
            if subscriber.is_frozen() {
                return Ok("Cannot extend loan - Subscriber is frozen".to_string());
            }
        }

        if ReservationsRepository::has_pending(&mut tx, book_id).await? {
            return Ok("Cannot extend loan - Book has pending reservations".to_string());
        }

        let loan = match LoansRepository::open_loan_for_update(&mut tx, book_id, subscriber_id)
            .await?
        {
            Some(l) => l,
            None => return Ok("No active loan found for this book and subscriber".to_string()),
        };
        let book = BooksRepository::fetch_for_update(&mut tx, book_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("book {book_id} missing for open loan")))?;

        let today = Utc::now().date_naive();
        if days_until_due(loan.due_date, today) > EXTENSION_WINDOW_DAYS {
            return Ok(
                "Cannot extend loan - More than 7 days remaining until return date".to_string(),
            );
        }

        let new_due = loan.due_date + Duration::days(EXTENSION_DAYS);
        LoansRepository::extend_due(&mut tx, loan.id, new_due).await?;
        ActivityRepository::append(
            &mut tx,
            &NewActivity {
                subscriber_id,
                librarian_id: Some(librarian_id),
                book_id: Some(book_id),
                activity_type: ActivityType::Extension,
                message: format!("Extended loan for book: {} by 7 days", book.title),
            },
        )
        .await?;

        tx.commit().await?;
        tracing::info!(subscriber_id, book_id, "loan extended to {}", new_due);
        Ok(format!("Successfully extended loan for book: {}", book.title))
    }
}

/// Days late; negative or zero means on time.
fn late_days(due: NaiveDate, returned: NaiveDate) -> i64 {
    (returned - due).num_days()
}

fn days_until_due(due: NaiveDate, today: NaiveDate) -> i64 {
    (due - today).num_days()
}

/// Operator-facing message for a normal return.
fn return_message(title: &str, late: i64, frozen: bool) -> String {
    let mut message = format!("Successfully returned book: {title}");
    if late > 0 {
        let unit = if late == 1 { "day" } else { "days" };
        message.push_str(&format!(" ({late} {unit} late)"));
    }
    if frozen {
        message.push_str(" - Note: Member has been frozen due to late return");
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn on_time_return_has_no_suffix() {
        let due = date(2025, 3, 10);
        assert_eq!(late_days(due, date(2025, 3, 10)), 0);
        assert_eq!(
            return_message("Dune", 0, false),
            "Successfully returned book: Dune"
        );
    }

    #[test]
    fn late_return_pluralizes_days() {
        assert_eq!(
            return_message("Dune", 1, false),
            "Successfully returned book: Dune (1 day late)"
        );
        assert_eq!(
            return_message("Dune", 3, false),
            "Successfully returned book: Dune (3 days late)"
        );
    }

    #[test]
    fn freeze_note_appended_after_late_suffix() {
        assert_eq!(
            return_message("Dune", 8, true),
            "Successfully returned book: Dune (8 days late) - Note: Member has been frozen due to late return"
        );
    }

    #[test]
    fn freeze_threshold_is_exclusive() {
        let due = date(2025, 3, 1);
        assert!(late_days(due, date(2025, 3, 8)) <= FREEZE_THRESHOLD_DAYS);
        assert!(late_days(due, date(2025, 3, 9)) > FREEZE_THRESHOLD_DAYS);
    }

    #[test]
    fn extension_window_boundary() {
        let today = date(2025, 3, 1);
        assert!(days_until_due(date(2025, 3, 8), today) <= EXTENSION_WINDOW_DAYS);
        assert!(days_until_due(date(2025, 3, 9), today) > EXTENSION_WINDOW_DAYS);
    }
}
