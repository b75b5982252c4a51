//! User account models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    store::models::{User, UserRole, UserStatus},
    types::{KeyId, UserId},
};

/// The authenticated caller, decoded from the session token.
///
/// This is a snapshot of identity and role at login time. Handlers that care
/// about live account state (status, remaining credits) must re-read the
/// stored [`User`] record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub user_id: String,
    pub role: UserRole,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            user_id: user.user_id.clone(),
            role: user.role,
        }
    }
}

/// A user record as returned by the API. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: UserId,
    pub user_id: String,
    pub role: UserRole,
    pub credit_limit: u64,
    pub used_credits: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_api_id: Option<KeyId>,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            user_id: user.user_id.clone(),
            role: user.role,
            credit_limit: user.credit_limit,
            used_credits: user.used_credits,
            assigned_api_id: user.assigned_api_id,
            status: user.status,
            created_at: user.created_at,
        }
    }
}

/// Payload for creating a user (admin only).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCreate {
    pub user_id: String,
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub credit_limit: Option<u64>,
    #[serde(default)]
    pub assigned_api_id: Option<KeyId>,
}

/// Partial update of a user (admin only). Absent fields are left untouched.
///
/// `assignedApiId` is doubly optional so an explicit `null` clears the pin
/// while an absent field leaves it alone.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub password: Option<String>,
    pub role: Option<UserRole>,
    pub credit_limit: Option<u64>,
    pub status: Option<UserStatus>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub assigned_api_id: Option<Option<KeyId>>,
}

fn deserialize_double_option<'de, D>(deserializer: D) -> Result<Option<Option<KeyId>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Some(Option::<KeyId>::deserialize(deserializer)?))
}
