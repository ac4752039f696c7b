//! Report cache: chart aggregates persisted as one JSON snapshot per
//! (kind, lookback, calendar day)
//!
//! A request first looks for today's snapshot on disk and returns it
//! unchanged, generation timestamp included; only a miss touches the store.
//! The monthly daemon calls `generate_all` to warm the cache.

use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use chrono::{Duration, NaiveDate, Utc};
use indexmap::IndexMap;
use sqlx::Row;

use crate::{
    error::AppResult,
    models::{
        activity::{ActivityType, NewActivity},
        notification::NotificationKind,
        report::{ReportKind, ReportPayload, ReportSnapshot},
    },
    repository::{
        activity::ActivityRepository, notifications::NotificationsRepository, Repository,
    },
};

/// Lookback periods for the member status report batch.
const MEMBER_STATUS_PERIODS: [i32; 4] = [7, 14, 21, 30];

/// Subscriber id used for system-generated rows.
const SYSTEM_SUBSCRIBER_ID: i32 = 0;

/// File-backed snapshot store. Several snapshots may exist for the same day
/// (concurrent writers); loads pick the most recently written one.
#[derive(Clone)]
pub struct ReportStore {
    directory: PathBuf,
}

impl ReportStore {
    pub fn new(directory: impl Into<PathBuf>) -> AppResult<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    fn file_prefix(kind: ReportKind, lookback_days: i32, date: NaiveDate) -> String {
        format!(
            "{}_{}_{}",
            kind.base_name(),
            lookback_days,
            date.format("%Y-%m-%d")
        )
    }

    /// Load the freshest snapshot written for `(kind, lookback, date)`.
    pub fn load_for_day(
        &self,
        kind: ReportKind,
        lookback_days: i32,
        date: NaiveDate,
    ) -> AppResult<Option<ReportSnapshot>> {
        let prefix = Self::file_prefix(kind, lookback_days, date);
        let mut newest: Option<(SystemTime, PathBuf)> = None;

        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(&prefix) || !name.ends_with(".json") {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            if newest.as_ref().map(|(t, _)| modified > *t).unwrap_or(true) {
                newest = Some((modified, entry.path()));
            }
        }

        match newest {
            Some((_, path)) => {
                let data = fs::read(&path)?;
                let snapshot: ReportSnapshot = serde_json::from_slice(&data)?;
                tracing::debug!(path = %path.display(), "report snapshot loaded");
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    pub fn persist(&self, snapshot: &ReportSnapshot, date: NaiveDate) -> AppResult<PathBuf> {
        let path = self.directory.join(format!(
            "{}.json",
            Self::file_prefix(snapshot.kind, snapshot.lookback_days, date)
        ));
        fs::write(&path, serde_json::to_vec_pretty(snapshot)?)?;
        tracing::debug!(path = %path.display(), "report snapshot persisted");
        Ok(path)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

#[derive(Clone)]
pub struct ReportService {
    repository: Repository,
    store: ReportStore,
    default_lookback_days: i32,
}

impl ReportService {
    pub fn new(
        repository: Repository,
        store: ReportStore,
        default_lookback_days: i32,
    ) -> Self {
        Self {
            repository,
            store,
            default_lookback_days,
        }
    }

    /// Today's snapshot for a kind, generating and persisting it on a miss.
    /// Repeated calls within the same calendar day return the identical
    /// snapshot, generation timestamp included.
    pub async fn get_or_generate(
        &self,
        kind: ReportKind,
        lookback_days: i32,
    ) -> AppResult<ReportSnapshot> {
        let today = Utc::now().date_naive();
        if let Some(snapshot) = self.store.load_for_day(kind, lookback_days, today)? {
            return Ok(snapshot);
        }

        let payload = match kind {
            ReportKind::LoanDuration => self.loan_duration_series(lookback_days).await?,
            ReportKind::LateReturn => self.late_return_series(lookback_days).await?,
            ReportKind::MemberStatus => self.member_status_distribution(lookback_days).await?,
        };
        let snapshot = ReportSnapshot {
            kind,
            title: kind.title(lookback_days),
            lookback_days,
            generated_at: Utc::now(),
            payload,
        };
        self.store.persist(&snapshot, today)?;
        tracing::info!(?kind, lookback_days, "report generated");
        Ok(snapshot)
    }

    pub async fn loan_duration_report(&self) -> AppResult<ReportSnapshot> {
        self.get_or_generate(ReportKind::LoanDuration, self.default_lookback_days)
            .await
    }

    pub async fn late_return_report(&self) -> AppResult<ReportSnapshot> {
        self.get_or_generate(ReportKind::LateReturn, self.default_lookback_days)
            .await
    }

    pub async fn member_status_report(&self, lookback_days: i32) -> AppResult<ReportSnapshot> {
        self.get_or_generate(ReportKind::MemberStatus, lookback_days)
            .await
    }

    /// Monthly batch: loan duration, late returns and the member status
    /// distribution for each period, followed by a system notification and
    /// audit entry.
    pub async fn generate_all(&self) -> AppResult<()> {
        self.loan_duration_report().await?;
        self.late_return_report().await?;
        for period in MEMBER_STATUS_PERIODS {
            self.member_status_report(period).await?;
        }
        self.record_generation().await?;
        tracing::info!("automatic report batch generated");
        Ok(())
    }

    async fn record_generation(&self) -> AppResult<()> {
        let message = format!(
            "The system generated Automatic reports, generated on {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        );
        let mut tx = self.repository.pool.begin().await?;
        NotificationsRepository::insert(
            &mut tx,
            SYSTEM_SUBSCRIBER_ID,
            &message,
            NotificationKind::Other,
        )
        .await?;
        ActivityRepository::append(
            &mut tx,
            &NewActivity {
                subscriber_id: SYSTEM_SUBSCRIBER_ID,
                librarian_id: None,
                book_id: None,
                activity_type: ActivityType::Other,
                message,
            },
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Returned-loan counts bucketed by held duration: 0-7, 8-14, 15-21 and
    /// 22+ days. Always four buckets, zeros included.
    async fn loan_duration_series(&self, lookback_days: i32) -> AppResult<ReportPayload> {
        let cutoff = Utc::now().date_naive() - Duration::days(lookback_days as i64);
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE actual_return_date - loan_date <= 7)            AS b0,
                COUNT(*) FILTER (WHERE actual_return_date - loan_date BETWEEN 8 AND 14)  AS b1,
                COUNT(*) FILTER (WHERE actual_return_date - loan_date BETWEEN 15 AND 21) AS b2,
                COUNT(*) FILTER (WHERE actual_return_date - loan_date >= 22)           AS b3
            FROM loans
            WHERE loan_date >= $1 AND actual_return_date IS NOT NULL
            "#,
        )
        .bind(cutoff)
        .fetch_one(&self.repository.pool)
        .await?;
        Ok(ReportPayload::Series(vec![
            row.get("b0"),
            row.get("b1"),
            row.get("b2"),
            row.get("b3"),
        ]))
    }

    /// Returned-loan counts by punctuality: on time, grace period (up to a
    /// week late), overdue.
    async fn late_return_series(&self, lookback_days: i32) -> AppResult<ReportPayload> {
        let cutoff = Utc::now().date_naive() - Duration::days(lookback_days as i64);
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE actual_return_date - due_date <= 0)           AS on_time,
                COUNT(*) FILTER (WHERE actual_return_date - due_date BETWEEN 1 AND 7) AS grace,
                COUNT(*) FILTER (WHERE actual_return_date - due_date > 7)            AS overdue
            FROM loans
            WHERE loan_date >= $1 AND actual_return_date IS NOT NULL
            "#,
        )
        .bind(cutoff)
        .fetch_one(&self.repository.pool)
        .await?;
        Ok(ReportPayload::Series(vec![
            row.get("on_time"),
            row.get("grace"),
            row.get("overdue"),
        ]))
    }

    /// Per-period `[active, frozen]` member counts, keyed by how long ago
    /// the freeze happened. All four period buckets are always present.
    async fn member_status_distribution(&self, lookback_days: i32) -> AppResult<ReportPayload> {
        let today = Utc::now().date_naive();
        let cutoff = today - Duration::days(lookback_days as i64);
        let row = sqlx::query(
            r#"
            WITH frozen AS (
                SELECT DISTINCT subscriber_id, $2::date - change_date AS age
                FROM subscriber_status_history
                WHERE status = 'FROZEN' AND change_date >= $1
            ),
            total AS (SELECT COUNT(*) AS n FROM subscribers)
            SELECT
                (SELECT n FROM total) AS total,
                COUNT(DISTINCT subscriber_id) FILTER (WHERE age <= 7)             AS f0,
                COUNT(DISTINCT subscriber_id) FILTER (WHERE age BETWEEN 8 AND 14)  AS f1,
                COUNT(DISTINCT subscriber_id) FILTER (WHERE age BETWEEN 15 AND 21) AS f2,
                COUNT(DISTINCT subscriber_id) FILTER (WHERE age BETWEEN 22 AND 30) AS f3
            FROM frozen
            "#,
        )
        .bind(cutoff)
        .bind(today)
        .fetch_one(&self.repository.pool)
        .await?;

        let total: i64 = row.get("total");
        let mut distribution = IndexMap::new();
        for (label, column) in [("0-7", "f0"), ("8-14", "f1"), ("15-21", "f2"), ("22-30", "f3")] {
            let frozen: i64 = row.get(column);
            distribution.insert(label.to_string(), vec![total - frozen, frozen]);
        }
        Ok(ReportPayload::Distribution(distribution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn snapshot(kind: ReportKind, days: i32) -> ReportSnapshot {
        ReportSnapshot {
            kind,
            title: kind.title(days),
            lookback_days: days,
            generated_at: Utc::now(),
            payload: ReportPayload::Series(vec![1, 2, 3, 4]),
        }
    }

    #[test]
    fn persist_then_load_same_day_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = ReportStore::new(dir.path()).unwrap();
        let today = Utc::now().date_naive();

        let written = snapshot(ReportKind::LoanDuration, 30);
        store.persist(&written, today).unwrap();

        let loaded = store
            .load_for_day(ReportKind::LoanDuration, 30, today)
            .unwrap()
            .unwrap();
        assert_eq!(loaded, written);
    }

    #[test]
    fn miss_for_other_day_or_lookback() {
        let dir = TempDir::new().unwrap();
        let store = ReportStore::new(dir.path()).unwrap();
        let today = Utc::now().date_naive();

        store.persist(&snapshot(ReportKind::LateReturn, 30), today).unwrap();

        let yesterday = today - Duration::days(1);
        assert!(store
            .load_for_day(ReportKind::LateReturn, 30, yesterday)
            .unwrap()
            .is_none());
        assert!(store
            .load_for_day(ReportKind::LateReturn, 7, today)
            .unwrap()
            .is_none());
        assert!(store
            .load_for_day(ReportKind::LoanDuration, 30, today)
            .unwrap()
            .is_none());
    }

    #[test]
    fn member_status_snapshots_keyed_by_period() {
        let dir = TempDir::new().unwrap();
        let store = ReportStore::new(dir.path()).unwrap();
        let today = Utc::now().date_naive();

        for days in MEMBER_STATUS_PERIODS {
            store.persist(&snapshot(ReportKind::MemberStatus, days), today).unwrap();
        }
        for days in MEMBER_STATUS_PERIODS {
            let loaded = store
                .load_for_day(ReportKind::MemberStatus, days, today)
                .unwrap()
                .unwrap();
            assert_eq!(loaded.lookback_days, days);
        }
    }

    #[test]
    fn distribution_payload_round_trips_in_order() {
        let mut map = IndexMap::new();
        map.insert("0-7".to_string(), vec![10, 2]);
        map.insert("8-14".to_string(), vec![11, 1]);
        map.insert("15-21".to_string(), vec![12, 0]);
        map.insert("22-30".to_string(), vec![9, 3]);
        let payload = ReportPayload::Distribution(map);

        let json = serde_json::to_string(&payload).unwrap();
        let back: ReportPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }
}
