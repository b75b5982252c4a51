//! Signup, login, logout and session introspection.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;

use crate::{
    api::models::{
        auth::{AuthResponse, LoginRequest, LoginResponse, LogoutResponse, MessageResponse, SignupRequest},
        users::{CurrentUser, UserResponse},
    },
    auth::{password, session},
    config::Config,
    errors::Error,
    store::models::{User, UserRole, UserStatus},
    types::UserId,
    AppState,
};

/// Self-service registration. The account lands in `pending` with a zero
/// credit limit; an administrator activates it and grants a quota.
#[tracing::instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), Error> {
    let identity = request.user_id.trim().to_string();
    if identity.is_empty() || !identity.contains('@') {
        return Err(Error::BadRequest {
            message: "A valid email address is required".to_string(),
        });
    }
    if request.password.is_empty() {
        return Err(Error::BadRequest {
            message: "A password is required".to_string(),
        });
    }

    // Hash on a blocking thread to avoid stalling the async runtime
    let password = request.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || password::hash_string(&password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })??;

    // The uniqueness check runs inside the mutation so a concurrent signup
    // with the same identity cannot slip in between check and insert.
    state.store.mutate(|data| {
        if data.user_by_identity(&identity).is_some() {
            return Err(Error::Conflict {
                message: "An account with this email address already exists".to_string(),
            });
        }
        data.users.push(User {
            id: UserId::new(),
            user_id: identity.clone(),
            password_hash: Some(password_hash),
            role: UserRole::User,
            credit_limit: 0,
            used_credits: 0,
            assigned_api_id: None,
            status: UserStatus::Pending,
            created_at: Utc::now(),
        });
        Ok(())
    })??;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(
            "Account created. An administrator must activate it before first use.",
        )),
    ))
}

/// Login with identity and password. Sets the session cookie and returns the
/// token in the body for bearer-auth clients.
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse, Error> {
    let user = state
        .store
        .read(|data| data.user_by_identity(&request.user_id).cloned())
        .ok_or_else(invalid_credentials)?;

    // Accounts without a password hash cannot log in
    let hash = user.password_hash.clone().ok_or_else(invalid_credentials)?;

    let candidate = request.password.clone();
    let is_valid = tokio::task::spawn_blocking(move || password::verify_string(&candidate, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })??;

    if !is_valid {
        return Err(invalid_credentials());
    }

    if user.status != UserStatus::Active {
        return Err(Error::Forbidden {
            message: format!("Account is {}", user.status),
        });
    }

    let current_user = CurrentUser::from(&user);
    let token = session::create_session_token(&current_user, &state.config)?;
    let cookie = create_session_cookie(&token, &state.config);

    Ok(LoginResponse {
        auth: AuthResponse {
            token,
            user: UserResponse::from(&user),
        },
        cookie,
    })
}

/// Logout: expire the session cookie. The JWT itself stays valid until its
/// expiry, so bearer clients simply discard their copy.
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> Result<LogoutResponse, Error> {
    let cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0",
        state.config.session_cookie_name
    );

    Ok(LogoutResponse {
        message: MessageResponse::new("Logout successful"),
        cookie,
    })
}

/// Return the caller's live account record.
#[tracing::instrument(skip_all)]
pub async fn me(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>, Error> {
    state
        .store
        .read(|data| data.user(&current_user.id).map(UserResponse::from))
        .map(Json)
        .ok_or(Error::Unauthenticated {
            message: Some("Account no longer exists".to_string()),
        })
}

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid email or password".to_string()),
    }
}

fn create_session_cookie(token: &str, config: &Config) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        config.session_cookie_name,
        token,
        config.session_expiry.as_secs()
    )
}
