//! Credit usage summary models.

use serde::Serialize;

/// Health bucket derived from percent usage: exhausted above 90%, low above
/// 70%, healthy otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    #[serde(rename = "Healthy")]
    Healthy,
    #[serde(rename = "Low Credits")]
    LowCredits,
    #[serde(rename = "Exhausted")]
    Exhausted,
}

impl HealthStatus {
    pub fn from_percent(percent_used: f64) -> Self {
        if percent_used > 90.0 {
            HealthStatus::Exhausted
        } else if percent_used > 70.0 {
            HealthStatus::LowCredits
        } else {
            HealthStatus::Healthy
        }
    }
}

/// The caller's own quota slice.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCredits {
    pub limit: u64,
    pub used: u64,
    pub remaining: u64,
}

/// Aggregate view of credit consumption.
///
/// Pool-wide totals sum over every registered credential; `user_specific` is
/// present for non-admin callers, whose `percent_used` and `status` are then
/// computed against their own quota rather than the pool.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditSummary {
    pub total_available: u64,
    pub total_used: u64,
    pub remaining: u64,
    pub percent_used: f64,
    pub days_until_next_reset: i64,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_specific: Option<UserCredits>,
}
