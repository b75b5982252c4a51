//! Credential pool administration.
//!
//! Any authenticated caller may list the pool (secrets are masked for
//! non-admins); registering, deleting and toggling credentials is admin-only.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};

use crate::{
    api::handlers::require_admin,
    api::models::{
        auth::MessageResponse,
        keys::{KeyCreate, KeyResponse},
        users::CurrentUser,
    },
    errors::Error,
    store::models::{ApiKey, KeyStatus},
    types::KeyId,
    AppState,
};

#[tracing::instrument(skip_all)]
pub async fn list_keys(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<Vec<KeyResponse>>, Error> {
    let mut keys: Vec<KeyResponse> = state.store.read(|data| data.api_keys.iter().map(KeyResponse::from).collect());

    if !current_user.is_admin() {
        keys = keys.into_iter().map(KeyResponse::masked).collect();
    }
    Ok(Json(keys))
}

#[tracing::instrument(skip_all)]
pub async fn create_key(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<KeyCreate>,
) -> Result<(StatusCode, Json<KeyResponse>), Error> {
    require_admin(&current_user)?;

    if request.key.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Credential secret must not be empty".to_string(),
        });
    }

    let now = Utc::now();
    let key = ApiKey {
        id: KeyId::new(),
        name: request.name,
        key: request.key,
        used_credits: 0,
        total_limit: request.total_limit.unwrap_or(state.config.default_key_limit),
        status: KeyStatus::Active,
        // Usage meters are expected to reset monthly upstream
        reset_date: now + Duration::days(30),
        created_at: now,
    };

    let response = KeyResponse::from(&key);
    state.store.mutate(|data| data.api_keys.push(key))?;

    tracing::info!(key_id = %response.id.to_short_string(), name = %response.name, "Registered credential");
    Ok((StatusCode::CREATED, Json(response)))
}

#[tracing::instrument(skip_all, fields(key_id = %key_id))]
pub async fn delete_key(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(key_id): Path<KeyId>,
) -> Result<Json<MessageResponse>, Error> {
    require_admin(&current_user)?;

    state.store.mutate(|data| {
        let before = data.api_keys.len();
        data.api_keys.retain(|k| k.id != key_id);
        if data.api_keys.len() == before {
            return Err(Error::NotFound {
                resource: "Credential".to_string(),
                id: key_id.to_short_string(),
            });
        }
        Ok(())
    })??;

    Ok(Json(MessageResponse::new("Credential deleted")))
}

/// Flip a credential between `active` and `disabled`. Toggling an exhausted
/// credential back to active is a deliberate admin override (e.g. after an
/// upstream limit raise).
#[tracing::instrument(skip_all, fields(key_id = %key_id))]
pub async fn toggle_key(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(key_id): Path<KeyId>,
) -> Result<Json<KeyResponse>, Error> {
    require_admin(&current_user)?;

    let key = state.store.mutate(|data| {
        let key = data.key_mut(&key_id).ok_or_else(|| Error::NotFound {
            resource: "Credential".to_string(),
            id: key_id.to_short_string(),
        })?;
        key.status = match key.status {
            KeyStatus::Active => KeyStatus::Disabled,
            KeyStatus::Disabled | KeyStatus::Exhausted => KeyStatus::Active,
        };
        Ok::<_, Error>(key.clone())
    })??;

    Ok(Json(KeyResponse::from(&key)))
}
