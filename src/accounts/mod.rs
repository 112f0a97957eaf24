//! The account pool: candidate ordering and health indicators.
//!
//! Both functions are pure so the dispatch engine and the dashboard share
//! one tested rule. Determinism matters: given the same health state the
//! candidate order must not change between runs.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::{ProviderAccount, ProviderKind};

/// How long after an error a recovery success still shows as `warning`.
const WARNING_WINDOW_HOURS: i64 = 5;

/// Derived account health shown in the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthIndicator {
    Normal,
    Warning,
    Error,
}

/// Health rule, a pure function of the two stamps and the clock:
///
/// - no error ever recorded -> `normal`
/// - last error not yet followed by a success -> `error`
/// - success after the error, within 5 hours of it -> `warning`
/// - success after the error, window elapsed -> `normal`
pub fn health_indicator(
    last_error_at: Option<DateTime<Utc>>,
    last_success_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> HealthIndicator {
    let Some(error_at) = last_error_at else {
        return HealthIndicator::Normal;
    };
    match last_success_at {
        Some(success_at) if success_at > error_at => {
            if now - error_at < Duration::hours(WARNING_WINDOW_HOURS) {
                HealthIndicator::Warning
            } else {
                HealthIndicator::Normal
            }
        }
        _ => HealthIndicator::Error,
    }
}

/// Order candidate accounts for one dispatch.
///
/// Providers are tried in the catalog's eligibility order. Within one
/// provider, least-recently-used accounts go first (never-used before any
/// used) to spread load across linked accounts; ties break on account id so
/// the order is fully deterministic.
///
/// Inactive accounts and accounts for non-eligible providers are dropped.
pub fn ordered_candidates(
    accounts: Vec<ProviderAccount>,
    eligible: &[ProviderKind],
) -> Vec<ProviderAccount> {
    let mut ordered = Vec::with_capacity(accounts.len());
    for provider in eligible {
        let mut group: Vec<ProviderAccount> = accounts
            .iter()
            .filter(|a| a.is_active && a.provider == *provider)
            .cloned()
            .collect();
        group.sort_by(|a, b| {
            a.last_activity_at()
                .cmp(&b.last_activity_at())
                .then_with(|| a.id.cmp(&b.id))
        });
        ordered.extend(group);
    }
    ordered
}
