//! Axum extractor resolving the authenticated caller.
//!
//! Accepts either an `Authorization: Bearer <jwt>` header or the session
//! cookie. The JWT is self-contained; handlers that need live account state
//! (credits, status) look the user up in the store themselves.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    api::models::users::CurrentUser,
    auth::session,
    config::Config,
    errors::{Error, Result},
    AppState,
};

/// Extract a bearer token from the Authorization header, if present.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Extract the session token from the cookie header, if present.
fn session_cookie<'a>(parts: &'a Parts, config: &Config) -> Option<&'a str> {
    let cookie_header = parts.headers.get(axum::http::header::COOKIE)?.to_str().ok()?;

    for cookie in cookie_header.split(';') {
        if let Some((name, value)) = cookie.trim().split_once('=') {
            if name == config.session_cookie_name {
                return Some(value);
            }
        }
    }
    None
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(parts)
            .or_else(|| session_cookie(parts, &state.config))
            .ok_or(Error::Unauthenticated { message: None })?;

        session::verify_session_token(token, &state.config).map_err(|e| match e {
            Error::Unauthenticated { .. } => Error::Unauthenticated {
                message: Some("Session expired.".to_string()),
            },
            other => other,
        })
    }
}
