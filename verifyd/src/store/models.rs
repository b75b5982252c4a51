//! Persisted domain models.
//!
//! These structs are the on-disk representation (the store file is a single
//! JSON document) as well as the basis for the API response types in
//! [`crate::api::models`]. Field names are camelCase to match the store file
//! format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{JobId, KeyId, UserId};
use crate::verifier::VerifiedEmail;

/// Role of a user account. Admins bypass quota enforcement and see all jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
}

/// Lifecycle status of a user account. Only `active` accounts can log in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Disabled,
    Pending,
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserStatus::Active => write!(f, "active"),
            UserStatus::Disabled => write!(f, "disabled"),
            UserStatus::Pending => write!(f, "pending"),
        }
    }
}

/// A user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    /// Login identity (an email address). Matched case-insensitively.
    pub user_id: String,
    /// Argon2 hash. Never exposed through the API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    pub role: UserRole,
    pub credit_limit: u64,
    pub used_credits: u64,
    /// Pinned credential. When set, the executor prefers this key for the
    /// user's batches as long as it is active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_api_id: Option<KeyId>,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Lifecycle status of an upstream credential.
///
/// `exhausted` and `disabled` keys are never selected for new batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Exhausted,
    Disabled,
}

/// An upstream API credential with its usage meter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    pub id: KeyId,
    pub name: String,
    /// The secret value sent to the verification provider.
    pub key: String,
    pub used_credits: u64,
    pub total_limit: u64,
    pub status: KeyStatus,
    pub reset_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    /// Whether this key can be handed out for a new batch.
    pub fn is_selectable(&self) -> bool {
        self.status == KeyStatus::Active && self.used_credits < self.total_limit
    }
}

/// How a job was submitted: a plain pasted list, or rows derived from a bulk
/// CSV import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Plain,
    Bulk,
}

/// Lifecycle status of a verification job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Paused,
}

impl JobStatus {
    /// Completed and failed jobs never change again (except deletion).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Derived verdict for one verified email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    Valid,
    Invalid,
    Risky,
}

impl EmailStatus {
    /// Map an upstream `result` field to a verdict.
    ///
    /// Total over all inputs: `OK` is valid, `INVALID` is invalid, everything
    /// else (unknown, catch-all, empty) lands in the risky bucket.
    pub fn classify(result: &str) -> Self {
        match result {
            "OK" => EmailStatus::Valid,
            "INVALID" => EmailStatus::Invalid,
            _ => EmailStatus::Risky,
        }
    }
}

/// One verified email, appended to its job and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailResult {
    /// Position-derived id, unique within the job.
    pub id: String,
    pub email: String,
    pub status: EmailStatus,
    pub quality: String,
    pub result: String,
    pub result_code: String,
    pub sub_result: String,
    pub free: bool,
    pub role: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did_you_mean: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl EmailResult {
    /// Build a result from a raw upstream item. `seq` is the absolute
    /// position of the email within the job.
    pub fn from_verified(job_id: &JobId, seq: usize, item: VerifiedEmail) -> Self {
        Self {
            id: format!("{}_{}", job_id.to_short_string(), seq),
            status: EmailStatus::classify(&item.result),
            email: item.email,
            quality: item.quality,
            result: item.result,
            result_code: item.result_code,
            sub_result: item.sub_result,
            free: item.free,
            role: item.role,
            did_you_mean: item.did_you_mean,
            error: item.error,
            checked_at: Utc::now(),
        }
    }
}

/// A verification job: the work queue, the accumulated results, and the
/// running counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub creator_id: UserId,
    pub kind: JobKind,
    pub total_emails: u64,
    pub processed_count: u64,
    pub valid_count: u64,
    pub invalid_count: u64,
    pub risky_count: u64,
    pub remaining_count: u64,
    pub status: JobStatus,
    /// Remaining work queue, drained from the front as batches complete.
    pub emails: Vec<String>,
    /// Append-only.
    pub results: Vec<EmailResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a fresh job, already in `processing` state (the executor is
    /// spawned right after submission).
    pub fn new(creator_id: UserId, kind: JobKind, emails: Vec<String>) -> Self {
        let now = Utc::now();
        let total = emails.len() as u64;
        Self {
            id: JobId::new(),
            creator_id,
            kind,
            total_emails: total,
            processed_count: 0,
            valid_count: 0,
            invalid_count: 0,
            risky_count: 0,
            remaining_count: total,
            status: JobStatus::Processing,
            emails,
            results: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the job failed with an explanatory message. Results appended so
    /// far are retained; remaining emails are not re-queued.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(message.into());
        self.updated_at = Utc::now();
    }
}
