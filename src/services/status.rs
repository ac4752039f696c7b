//! Subscriber status manager
//!
//! Freezing happens synchronously inside the return path; this service owns
//! the other direction, the daily reactivation sweep.

use chrono::{NaiveDate, Utc};

use crate::{
    error::AppResult,
    models::{
        activity::{ActivityType, NewActivity},
        notification::NotificationKind,
        subscriber::SubscriberStatus,
    },
    repository::{
        activity::ActivityRepository, notifications::NotificationsRepository,
        subscribers::SubscribersRepository, Repository,
    },
};

/// Days a member stays frozen before the sweep reactivates them.
pub const FREEZE_PERIOD_DAYS: i64 = 30;

const REACTIVATION_REASON: &str = "Automatic status update after 30-day freeze period";

#[derive(Clone)]
pub struct StatusService {
    repository: Repository,
}

impl StatusService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Reactivate members whose latest status transition is a freeze at
    /// least thirty days old. Each member is processed in its own
    /// transaction; one failure is logged and does not stall the rest.
    /// Returns the number of members reactivated.
    pub async fn reactivation_sweep(&self) -> AppResult<u64> {
        let today = Utc::now().date_naive();
        let eligible = self
            .repository
            .subscribers
            .frozen_due_for_reactivation(today, FREEZE_PERIOD_DAYS)
            .await?;

        let mut reactivated = 0;
        for subscriber_id in eligible {
            match self.reactivate_one(subscriber_id, today).await {
                Ok(true) => reactivated += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(subscriber_id, error = %e, "reactivation failed");
                }
            }
        }
        if reactivated > 0 {
            tracing::info!(reactivated, "frozen members reactivated");
        }
        Ok(reactivated)
    }

    async fn reactivate_one(&self, subscriber_id: i32, today: NaiveDate) -> AppResult<bool> {
        let mut tx = self.repository.pool.begin().await?;

        // Re-check under the row lock; another return may have re-frozen the
        // member between the scan and this transaction.
        let subscriber = match SubscribersRepository::fetch_for_update(&mut tx, subscriber_id)
            .await?
        {
            Some(s) if s.is_frozen() => s,
            _ => return Ok(false),
        };

        SubscribersRepository::set_status(&mut tx, subscriber.id, SubscriberStatus::Active)
            .await?;
        SubscribersRepository::append_status_history(
            &mut tx,
            subscriber.id,
            SubscriberStatus::Active,
            today,
            REACTIVATION_REASON,
        )
        .await?;
        NotificationsRepository::insert(
            &mut tx,
            subscriber.id,
            "Your account has been automatically reactivated after the 30-day freeze period.",
            NotificationKind::Other,
        )
        .await?;
        ActivityRepository::append(
            &mut tx,
            &NewActivity {
                subscriber_id: subscriber.id,
                librarian_id: None,
                book_id: None,
                activity_type: ActivityType::Other,
                message: "Subscriber status automatically changed to ACTIVE".to_string(),
            },
        )
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}
