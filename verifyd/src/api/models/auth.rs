//! Authentication request/response models.

use axum::{
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::users::UserResponse;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_id: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub user_id: String,
    pub password: String,
}

/// Successful login: the token is also set as an HttpOnly cookie, the body
/// copy exists for clients that prefer bearer auth.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// [`AuthResponse`] plus the Set-Cookie header carrying the session token.
pub struct LoginResponse {
    pub auth: AuthResponse,
    pub cookie: String,
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        ([(header::SET_COOKIE, self.cookie)], Json(self.auth)).into_response()
    }
}

/// [`MessageResponse`] plus an expired Set-Cookie header clearing the session.
pub struct LogoutResponse {
    pub message: MessageResponse,
    pub cookie: String,
}

impl IntoResponse for LogoutResponse {
    fn into_response(self) -> Response {
        ([(header::SET_COOKIE, self.cookie)], Json(self.message)).into_response()
    }
}
