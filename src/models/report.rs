//! Report snapshot types

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Report kinds the cache knows how to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportKind {
    LoanDuration,
    LateReturn,
    MemberStatus,
}

impl ReportKind {
    /// Base file name stem for persisted snapshots.
    pub fn base_name(&self) -> &'static str {
        match self {
            ReportKind::LoanDuration => "loan_duration_report",
            ReportKind::LateReturn => "late_return_report",
            ReportKind::MemberStatus => "activity_status_report",
        }
    }

    /// Display title; the member status report carries its period.
    pub fn title(&self, lookback_days: i32) -> String {
        match self {
            ReportKind::LoanDuration => "Monthly Loan Duration Report".to_string(),
            ReportKind::LateReturn => "Monthly Late Return Report".to_string(),
            ReportKind::MemberStatus => format!("Activity Status Report ({lookback_days} days)"),
        }
    }
}

/// Aggregate payload: either a bucketed count series or a keyed map of
/// per-period [active, frozen] pairs. The map keeps insertion order so the
/// period buckets render in the order they were computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportPayload {
    Series(Vec<i64>),
    Distribution(IndexMap<String, Vec<i64>>),
}

/// One persisted snapshot: a `(kind, lookback, calendar day)` aggregate.
/// Validity is 24 hours from `generated_at`, but cache hits are decided by
/// calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSnapshot {
    pub kind: ReportKind,
    pub title: String,
    pub lookback_days: i32,
    pub generated_at: DateTime<Utc>,
    pub payload: ReportPayload,
}
