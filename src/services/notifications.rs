//! Notification service: member inboxes and the daily return reminders

use chrono::{Duration, Utc};

use crate::{
    error::AppResult,
    models::{
        activity::{ActivityType, NewActivity},
        notification::{Notification, NotificationKind},
    },
    repository::{
        activity::ActivityRepository, loans::LoansRepository,
        notifications::NotificationsRepository, Repository,
    },
};

#[derive(Clone)]
pub struct NotificationService {
    repository: Repository,
}

impl NotificationService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Remind every member with an open loan due tomorrow. The whole batch
    /// commits in one transaction; returns the number of reminders created.
    pub async fn return_reminder_sweep(&self) -> AppResult<u64> {
        let tomorrow = Utc::now().date_naive() + Duration::days(1);
        let mut tx = self.repository.pool.begin().await?;

        let due = LoansRepository::open_loans_due_on(&mut tx, tomorrow).await?;
        let count = due.len() as u64;

        for loan in due {
            let message = format!("Reminder: The book '{}' is due tomorrow", loan.title);
            NotificationsRepository::insert(
                &mut tx,
                loan.subscriber_id,
                &message,
                NotificationKind::Reminder,
            )
            .await?;
            ActivityRepository::append(
                &mut tx,
                &NewActivity {
                    subscriber_id: loan.subscriber_id,
                    librarian_id: None,
                    book_id: Some(loan.book_id),
                    activity_type: ActivityType::Notification,
                    message,
                },
            )
            .await?;
        }

        tx.commit().await?;
        if count > 0 {
            tracing::info!(count, "return reminders created");
        }
        Ok(count)
    }

    pub async fn notifications_for(&self, subscriber_id: i32) -> AppResult<Vec<Notification>> {
        self.repository.notifications.for_subscriber(subscriber_id).await
    }

    /// Bulk delete, user-initiated. Returns whether anything was removed.
    pub async fn delete_notifications(&self, ids: &[i32]) -> AppResult<bool> {
        self.repository.notifications.delete_by_ids(ids).await
    }
}
