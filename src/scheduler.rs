//! Background daemons and their scheduler
//!
//! Four daemons run for the life of the server: return reminders, subscriber
//! reactivation, reservation expiry (all daily at a configured wall-clock
//! time) and monthly report regeneration. Each is a tokio task that sleeps
//! until its next trigger, runs, logs any error and goes back to waiting.
//! A watch channel broadcasts shutdown; tasks that do not stop within the
//! configured timeout are aborted.

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Datelike, Duration, Local, NaiveDateTime, NaiveTime};
use tokio::{sync::watch, task::JoinHandle, time};

use crate::{
    config::SchedulerConfig,
    error::AppResult,
    services::{
        notifications::NotificationService, reports::ReportService,
        reservations::ReservationsService, status::StatusService, Services,
    },
};

/// Interval between monthly report runs after the first anchor.
const REPORT_INTERVAL_DAYS: i64 = 30;

/// When a daemon fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Every day at a fixed wall-clock time. If that time has already passed
    /// at startup, the first run is tomorrow.
    DailyAt(NaiveTime),
    /// Midnight on the first day of the next month, then every 30 days.
    MonthlyAnchor,
}

impl Trigger {
    /// First run strictly after `now`.
    pub fn first_run(&self, now: NaiveDateTime) -> NaiveDateTime {
        match self {
            Trigger::DailyAt(at) => {
                let today = now.date().and_time(*at);
                if today > now {
                    today
                } else {
                    today + Duration::days(1)
                }
            }
            Trigger::MonthlyAnchor => first_of_next_month(now),
        }
    }

    /// Run following a completed one that fired at `last`.
    pub fn next_run(&self, last: NaiveDateTime) -> NaiveDateTime {
        match self {
            Trigger::DailyAt(_) => last + Duration::days(1),
            Trigger::MonthlyAnchor => last + Duration::days(REPORT_INTERVAL_DAYS),
        }
    }
}

fn first_of_next_month(now: NaiveDateTime) -> NaiveDateTime {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    // The first of a month always exists.
    now.date()
        .with_day(1)
        .and_then(|d| d.with_month(month))
        .and_then(|d| d.with_year(year))
        .map(|d| d.and_time(NaiveTime::MIN))
        .unwrap_or(now)
}

/// A scheduled background job.
#[async_trait]
pub trait Daemon: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    fn trigger(&self) -> Trigger;
    async fn run(&self) -> AppResult<()>;
}

/// Daily reminder for loans due tomorrow.
pub struct ReturnReminderDaemon {
    service: NotificationService,
    at: NaiveTime,
}

#[async_trait]
impl Daemon for ReturnReminderDaemon {
    fn name(&self) -> &'static str {
        "return-reminders"
    }

    fn trigger(&self) -> Trigger {
        Trigger::DailyAt(self.at)
    }

    async fn run(&self) -> AppResult<()> {
        let count = self.service.return_reminder_sweep().await?;
        tracing::debug!(count, "reminder sweep finished");
        Ok(())
    }
}

/// Daily reactivation of members frozen for the full freeze period.
pub struct ReactivationDaemon {
    service: StatusService,
    at: NaiveTime,
}

#[async_trait]
impl Daemon for ReactivationDaemon {
    fn name(&self) -> &'static str {
        "status-reactivation"
    }

    fn trigger(&self) -> Trigger {
        Trigger::DailyAt(self.at)
    }

    async fn run(&self) -> AppResult<()> {
        self.service.reactivation_sweep().await?;
        Ok(())
    }
}

/// Daily cancellation of reservations whose pickup window closed.
pub struct ReservationExpiryDaemon {
    service: ReservationsService,
    at: NaiveTime,
}

#[async_trait]
impl Daemon for ReservationExpiryDaemon {
    fn name(&self) -> &'static str {
        "reservation-expiry"
    }

    fn trigger(&self) -> Trigger {
        Trigger::DailyAt(self.at)
    }

    async fn run(&self) -> AppResult<()> {
        self.service.expiry_sweep().await?;
        Ok(())
    }
}

/// Monthly regeneration of the report snapshots.
pub struct ReportDaemon {
    service: ReportService,
}

#[async_trait]
impl Daemon for ReportDaemon {
    fn name(&self) -> &'static str {
        "monthly-reports"
    }

    fn trigger(&self) -> Trigger {
        Trigger::MonthlyAnchor
    }

    async fn run(&self) -> AppResult<()> {
        self.service.generate_all().await
    }
}

/// Owns the daemon tasks and the shutdown channel.
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
    shutdown_timeout: StdDuration,
}

impl Scheduler {
    /// Spawn the full daemon set for a server.
    pub fn start(services: &Services, config: &SchedulerConfig) -> Self {
        let mut scheduler = Self::new(StdDuration::from_secs(config.shutdown_timeout_secs));
        scheduler.spawn(ReturnReminderDaemon {
            service: services.notifications.clone(),
            at: config.reminder_time(),
        });
        scheduler.spawn(ReactivationDaemon {
            service: services.status.clone(),
            at: config.reactivation_time(),
        });
        scheduler.spawn(ReservationExpiryDaemon {
            service: services.reservations.clone(),
            at: config.expiry_time(),
        });
        scheduler.spawn(ReportDaemon {
            service: services.reports.clone(),
        });
        scheduler
    }

    pub fn new(shutdown_timeout: StdDuration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Vec::new(),
            shutdown_timeout,
        }
    }

    pub fn spawn<D: Daemon>(&mut self, daemon: D) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let name = daemon.name();
        let handle = tokio::spawn(async move {
            let mut next = daemon.trigger().first_run(Local::now().naive_local());
            tracing::info!(daemon = name, "first run scheduled for {next}");
            loop {
                let wait = (next - Local::now().naive_local())
                    .to_std()
                    .unwrap_or(StdDuration::ZERO);
                tokio::select! {
                    _ = time::sleep(wait) => {
                        tracing::debug!(daemon = name, "run starting");
                        if let Err(e) = daemon.run().await {
                            tracing::error!(daemon = name, error = %e, "run failed");
                        }
                        next = daemon.trigger().next_run(next);
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::info!(daemon = name, "stopping");
                        break;
                    }
                }
            }
        });
        self.handles.push((name, handle));
    }

    /// Broadcast shutdown and wait for every daemon, aborting stragglers
    /// after the timeout.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for (name, handle) in self.handles {
            match time::timeout(self.shutdown_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(daemon = name, error = %e, "daemon panicked"),
                Err(_) => {
                    tracing::warn!(daemon = name, "shutdown timed out, aborting");
                }
            }
        }
        tracing::info!("scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn daily_first_run_today_if_time_not_passed() {
        let trigger = Trigger::DailyAt(NaiveTime::from_hms_opt(5, 58, 0).unwrap());
        assert_eq!(
            trigger.first_run(dt(2025, 3, 10, 4, 0)),
            dt(2025, 3, 10, 5, 58)
        );
    }

    #[test]
    fn daily_first_run_tomorrow_if_time_passed() {
        let trigger = Trigger::DailyAt(NaiveTime::from_hms_opt(4, 25, 0).unwrap());
        assert_eq!(
            trigger.first_run(dt(2025, 3, 10, 9, 0)),
            dt(2025, 3, 11, 4, 25)
        );
        // Exactly at the trigger time also waits for tomorrow.
        assert_eq!(
            trigger.first_run(dt(2025, 3, 10, 4, 25)),
            dt(2025, 3, 11, 4, 25)
        );
    }

    #[test]
    fn daily_next_run_is_one_day_later() {
        let trigger = Trigger::DailyAt(NaiveTime::from_hms_opt(4, 25, 0).unwrap());
        assert_eq!(
            trigger.next_run(dt(2025, 3, 10, 4, 25)),
            dt(2025, 3, 11, 4, 25)
        );
    }

    #[test]
    fn monthly_anchor_is_first_of_next_month_midnight() {
        let trigger = Trigger::MonthlyAnchor;
        assert_eq!(
            trigger.first_run(dt(2025, 3, 10, 15, 30)),
            dt(2025, 4, 1, 0, 0)
        );
        // Year rollover
        assert_eq!(
            trigger.first_run(dt(2025, 12, 31, 23, 59)),
            dt(2026, 1, 1, 0, 0)
        );
    }

    #[test]
    fn monthly_next_run_is_thirty_days_later() {
        let trigger = Trigger::MonthlyAnchor;
        assert_eq!(
            trigger.next_run(dt(2025, 4, 1, 0, 0)),
            dt(2025, 5, 1, 0, 0)
        );
    }
}
