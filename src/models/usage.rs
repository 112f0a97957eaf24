//! Usage records: the durable, append-only per-dispatch telemetry log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One completed dispatch (successful or failed-terminal). Immutable once
/// written; the core never updates or deletes these rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Account that served (or last attempted) the request, if any.
    pub account_id: Option<Uuid>,
    /// Key that authorized the request; absent for session callers.
    pub api_key_id: Option<Uuid>,
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    /// Final upstream HTTP status; absent when no upstream response arrived.
    pub status_code: Option<u16>,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

/// Input for appending a usage record.
#[derive(Debug, Clone)]
pub struct NewUsageRecord {
    pub user_id: Uuid,
    pub account_id: Option<Uuid>,
    pub api_key_id: Option<Uuid>,
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub status_code: Option<u16>,
    pub duration_ms: i64,
}

/// Grouping dimension for usage aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageGroupBy {
    Model,
    Day,
    Account,
}

impl UsageGroupBy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "model" => Some(UsageGroupBy::Model),
            "day" => Some(UsageGroupBy::Day),
            "account" => Some(UsageGroupBy::Account),
            _ => None,
        }
    }
}

/// One aggregation bucket, keyed by the chosen dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageAggregate {
    /// Model id, day (`YYYY-MM-DD`), or account id depending on grouping.
    pub key: String,
    pub request_count: i64,
    pub success_count: i64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_duration_ms: i64,
}
