//! User administration. Every endpoint here requires the admin role.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::{
    api::handlers::require_admin,
    api::models::{
        auth::MessageResponse,
        users::{CurrentUser, UserCreate, UserResponse, UserUpdate},
    },
    auth::password,
    errors::Error,
    store::{master_admin_id, models::User, models::UserRole, models::UserStatus},
    types::UserId,
    AppState,
};

#[tracing::instrument(skip_all)]
pub async fn list_users(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<Vec<UserResponse>>, Error> {
    require_admin(&current_user)?;

    let users = state.store.read(|data| data.users.iter().map(UserResponse::from).collect());
    Ok(Json(users))
}

#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>), Error> {
    require_admin(&current_user)?;

    let identity = request.user_id.trim().to_string();
    if identity.is_empty() || !identity.contains('@') {
        return Err(Error::BadRequest {
            message: "A valid email address is required".to_string(),
        });
    }

    let password_hash = match request.password {
        Some(password) if !password.is_empty() => Some(
            tokio::task::spawn_blocking(move || password::hash_string(&password))
                .await
                .map_err(|e| Error::Internal {
                    operation: format!("spawn password hashing task: {e}"),
                })??,
        ),
        _ => None,
    };

    let user = state.store.mutate(|data| {
        if data.user_by_identity(&identity).is_some() {
            return Err(Error::Conflict {
                message: "An account with this email address already exists".to_string(),
            });
        }
        let user = User {
            id: UserId::new(),
            user_id: identity.clone(),
            password_hash,
            role: request.role.unwrap_or(UserRole::User),
            credit_limit: request.credit_limit.unwrap_or(0),
            used_credits: 0,
            assigned_api_id: request.assigned_api_id,
            status: UserStatus::Active,
            created_at: Utc::now(),
        };
        data.users.push(user.clone());
        Ok(user)
    })??;

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

#[tracing::instrument(skip_all, fields(user_id = %user_id))]
pub async fn update_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<UserId>,
    Json(request): Json<UserUpdate>,
) -> Result<Json<UserResponse>, Error> {
    require_admin(&current_user)?;

    // The master administrator's role and status are fixed
    if user_id == master_admin_id() && (request.role.is_some() || request.status.is_some()) {
        return Err(Error::Forbidden {
            message: "The Master Administrator account cannot be demoted or disabled".to_string(),
        });
    }

    let password_hash = match request.password {
        Some(password) if !password.is_empty() => Some(
            tokio::task::spawn_blocking(move || password::hash_string(&password))
                .await
                .map_err(|e| Error::Internal {
                    operation: format!("spawn password hashing task: {e}"),
                })??,
        ),
        _ => None,
    };

    let user = state.store.mutate(|data| {
        let user = data.user_mut(&user_id).ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: user_id.to_short_string(),
        })?;

        if let Some(hash) = password_hash {
            user.password_hash = Some(hash);
        }
        if let Some(role) = request.role {
            user.role = role;
        }
        if let Some(limit) = request.credit_limit {
            user.credit_limit = limit;
        }
        if let Some(status) = request.status {
            user.status = status;
        }
        if let Some(assigned) = request.assigned_api_id {
            user.assigned_api_id = assigned;
        }
        Ok::<_, Error>(user.clone())
    })??;

    Ok(Json(UserResponse::from(&user)))
}

#[tracing::instrument(skip_all, fields(user_id = %user_id))]
pub async fn delete_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<MessageResponse>, Error> {
    require_admin(&current_user)?;

    if user_id == master_admin_id() {
        return Err(Error::Forbidden {
            message: "The Master Administrator account cannot be deleted".to_string(),
        });
    }

    state.store.mutate(|data| {
        let before = data.users.len();
        data.users.retain(|u| u.id != user_id);
        if data.users.len() == before {
            return Err(Error::NotFound {
                resource: "User".to_string(),
                id: user_id.to_short_string(),
            });
        }
        Ok(())
    })??;

    Ok(Json(MessageResponse::new("User deleted")))
}
