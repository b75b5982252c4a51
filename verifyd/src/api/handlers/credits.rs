//! Credit usage summary.

use axum::{extract::State, Json};
use chrono::Utc;

use crate::{
    api::models::{
        credits::{CreditSummary, HealthStatus, UserCredits},
        users::CurrentUser,
    },
    errors::Error,
    AppState,
};

/// Aggregate pool usage plus the caller's own quota slice.
///
/// Non-admins get `percent_used` and `status` computed against their personal
/// quota; admins see the pool-wide figures.
#[tracing::instrument(skip_all)]
pub async fn credit_summary(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<CreditSummary>, Error> {
    let summary = state.store.read(|data| {
        let total_available: u64 = data.api_keys.iter().map(|k| k.total_limit).sum();
        let total_used: u64 = data.api_keys.iter().map(|k| k.used_credits).sum();

        let now = Utc::now();
        let days_until_next_reset = data
            .api_keys
            .iter()
            .map(|k| (k.reset_date - now).num_days())
            .min()
            .unwrap_or(30)
            .max(0);

        let user_specific = if current_user.is_admin() {
            None
        } else {
            data.user(&current_user.id).map(|u| UserCredits {
                limit: u.credit_limit,
                used: u.used_credits,
                remaining: u.credit_limit.saturating_sub(u.used_credits),
            })
        };

        let percent_used = match &user_specific {
            Some(uc) if uc.limit > 0 => uc.used as f64 / uc.limit as f64 * 100.0,
            // A zero personal limit counts as fully consumed
            Some(_) => 100.0,
            None if total_available > 0 => total_used as f64 / total_available as f64 * 100.0,
            None => 0.0,
        };

        CreditSummary {
            total_available,
            total_used,
            remaining: total_available.saturating_sub(total_used),
            percent_used,
            days_until_next_reset,
            status: HealthStatus::from_percent(percent_used),
            user_specific,
        }
    });

    Ok(Json(summary))
}
