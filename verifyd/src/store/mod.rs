//! Durable single-file store.
//!
//! The whole application state lives in one JSON document. Every mutation
//! runs under one mutex as a mutate-then-flush critical section: the new
//! state is serialized to a sibling temp file and atomically renamed over the
//! store path, so readers only ever observe a pre- or post-mutation snapshot.
//!
//! On startup the file is loaded; a missing or corrupt file is reinitialized
//! empty. Jobs left `processing` by a previous process are marked failed
//! rather than silently resumed, since their in-memory position in the work
//! queue is what the last flush happened to capture.

pub mod models;

use anyhow::Context;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::Error;
use crate::types::{JobId, KeyId, UserId};
use models::{ApiKey, Job, JobStatus, User, UserRole, UserStatus};

/// Well-known id of the master administrator. Seeding matches on this id, so
/// the account is never duplicated across restarts.
pub fn master_admin_id() -> UserId {
    UserId::from(uuid::Uuid::nil())
}

/// The full persisted state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreData {
    pub users: Vec<User>,
    pub api_keys: Vec<ApiKey>,
    pub jobs: Vec<Job>,
}

impl StoreData {
    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.iter().find(|u| u.id == *id)
    }

    pub fn user_mut(&mut self, id: &UserId) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == *id)
    }

    /// Look up a user by login identity, case-insensitively.
    pub fn user_by_identity(&self, identity: &str) -> Option<&User> {
        self.users.iter().find(|u| u.user_id.eq_ignore_ascii_case(identity))
    }

    pub fn key(&self, id: &KeyId) -> Option<&ApiKey> {
        self.api_keys.iter().find(|k| k.id == *id)
    }

    pub fn key_mut(&mut self, id: &KeyId) -> Option<&mut ApiKey> {
        self.api_keys.iter_mut().find(|k| k.id == *id)
    }

    pub fn job(&self, id: &JobId) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == *id)
    }

    pub fn job_mut(&mut self, id: &JobId) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == *id)
    }
}

/// Handle to the store file. Cheap to share behind an `Arc`.
pub struct Store {
    path: PathBuf,
    data: Mutex<StoreData>,
}

impl Store {
    /// Load the store from `path`, reinitializing on a missing or unreadable
    /// file, and fail any job interrupted mid-flight by the previous process.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();

        let mut data = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<StoreData>(&bytes) {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Store file corrupt, reinitializing empty");
                    StoreData::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No store file found, starting empty");
                StoreData::default()
            }
            Err(e) => return Err(e).with_context(|| format!("read store file {}", path.display())),
        };

        let mut interrupted = 0usize;
        for job in data.jobs.iter_mut() {
            if job.status == JobStatus::Processing {
                job.fail("Processing interrupted by service restart. Please resubmit.");
                interrupted += 1;
            }
        }
        if interrupted > 0 {
            tracing::warn!(count = interrupted, "Marked interrupted jobs as failed");
        }

        let store = Self {
            path,
            data: Mutex::new(data),
        };
        store.flush_locked(&store.data.lock())?;
        Ok(store)
    }

    /// Idempotently (re)insert the master administrator, matched by the
    /// well-known id. The identity and hash are refreshed on every startup so
    /// config changes take effect.
    pub fn ensure_master_admin(&self, identity: &str, password_hash: Option<String>) -> crate::errors::Result<()> {
        self.mutate(|data| {
            let admin_id = master_admin_id();
            if let Some(admin) = data.user_mut(&admin_id) {
                admin.user_id = identity.to_string();
                if password_hash.is_some() {
                    admin.password_hash = password_hash;
                }
            } else {
                tracing::info!(identity = %identity, "Seeding master administrator");
                data.users.insert(
                    0,
                    User {
                        id: admin_id,
                        user_id: identity.to_string(),
                        password_hash,
                        role: UserRole::Admin,
                        credit_limit: u64::MAX,
                        used_credits: 0,
                        assigned_api_id: None,
                        status: UserStatus::Active,
                        created_at: chrono::Utc::now(),
                    },
                );
            }
        })
    }

    /// Run a read-only closure against the current snapshot.
    pub fn read<T>(&self, f: impl FnOnce(&StoreData) -> T) -> T {
        f(&self.data.lock())
    }

    /// Run a mutating closure and flush the whole state before returning.
    /// The mutation is not considered committed until the flush succeeds.
    pub fn mutate<T>(&self, f: impl FnOnce(&mut StoreData) -> T) -> crate::errors::Result<T> {
        let mut data = self.data.lock();
        let out = f(&mut data);
        self.flush_locked(&data).map_err(|e| {
            tracing::error!(error = %e, "Store flush failed");
            Error::Internal {
                operation: "flush store".to_string(),
            }
        })?;
        Ok(out)
    }

    /// Serialize to a sibling temp file, then atomically replace the store
    /// file. Callers must hold the data lock.
    fn flush_locked(&self, data: &StoreData) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(data).context("serialize store")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &bytes).with_context(|| format!("write temp store file {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replace store file {}", self.path.display()))?;
        Ok(())
    }
}
