//! Credential pool models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    store::models::{ApiKey, KeyStatus},
    types::KeyId,
};

/// Payload for registering an upstream credential (admin only).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyCreate {
    pub name: String,
    pub key: String,
    /// Defaults to the configured per-key limit when absent.
    #[serde(default)]
    pub total_limit: Option<u64>,
}

/// A credential as returned by the API.
///
/// Non-admin callers get the secret masked via [`KeyResponse::masked`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyResponse {
    pub id: KeyId,
    pub name: String,
    pub key: String,
    pub used_credits: u64,
    pub total_limit: u64,
    pub status: KeyStatus,
    pub reset_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl KeyResponse {
    /// Replace the secret with a redacted form keeping only the last four
    /// characters.
    pub fn masked(mut self) -> Self {
        let tail_start = self.key.len().saturating_sub(4);
        let tail = self.key.get(tail_start..).unwrap_or("");
        self.key = format!("****{tail}");
        self
    }
}

impl From<&ApiKey> for KeyResponse {
    fn from(key: &ApiKey) -> Self {
        Self {
            id: key.id,
            name: key.name.clone(),
            key: key.key.clone(),
            used_credits: key.used_credits,
            total_limit: key.total_limit,
            status: key.status,
            reset_date: key.reset_date,
            created_at: key.created_at,
        }
    }
}
