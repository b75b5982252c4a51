//! Credential pool selection and usage accounting.
//!
//! The pool is the `apiKeys` list inside the store. Selection is first-fit in
//! insertion order; there is deliberately no fairness or load balancing
//! beyond that. A pinned credential wins only while it is still selectable.

use crate::store::models::{ApiKey, KeyStatus};
use crate::types::KeyId;

/// Pick the credential to fund the next batch.
///
/// Returns `None` when the pool is exhausted, which the executor treats as a
/// fatal job-level failure rather than a retryable condition.
pub fn select_credential<'a>(keys: &'a [ApiKey], preferred: Option<&KeyId>) -> Option<&'a ApiKey> {
    if let Some(id) = preferred {
        if let Some(key) = keys.iter().find(|k| k.id == *id) {
            if key.is_selectable() {
                return Some(key);
            }
            // Pinned key unusable: fall through to the pool-wide scan
        }
    }

    keys.iter().find(|k| k.is_selectable())
}

/// Charge `amount` against a credential after a successful batch call,
/// flipping it to `exhausted` once the limit is reached or passed.
pub fn record_usage(key: &mut ApiKey, amount: u64) {
    key.used_credits += amount;
    if key.used_credits >= key.total_limit {
        key.status = KeyStatus::Exhausted;
        tracing::info!(key_id = %key.id, name = %key.name, "Credential exhausted");
    }
}
