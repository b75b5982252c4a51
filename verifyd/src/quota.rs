//! Submission-time quota guard.
//!
//! The check runs exactly once, when a job is submitted. Admitted jobs are
//! never retroactively rejected; two concurrently admitted jobs from the same
//! user may jointly overshoot the limit (accepted race, see DESIGN.md).

use crate::errors::Error;
use crate::store::models::User;

/// Approve or reject a prospective job of `requested` emails for `user`.
///
/// Admins are exempt from limit enforcement.
pub fn check_quota(user: &User, requested: u64) -> Result<(), Error> {
    if user.is_admin() {
        return Ok(());
    }

    if user.used_credits + requested > user.credit_limit {
        return Err(Error::QuotaExceeded {
            limit: user.credit_limit,
        });
    }

    Ok(())
}
