//! Route handlers, one module per resource.

pub mod auth;
pub mod credits;
pub mod jobs;
pub mod keys;
pub mod users;

use crate::{api::models::users::CurrentUser, errors::Error};

/// Reject non-admin callers with 403.
fn require_admin(user: &CurrentUser) -> Result<(), Error> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(Error::Forbidden {
            message: "Administrative access required".to_string(),
        })
    }
}
