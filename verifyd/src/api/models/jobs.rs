//! Job submission models.
//!
//! Jobs are served back as the stored [`crate::store::models::Job`] record
//! directly; it carries nothing sensitive and clients rely on the full shape
//! (counters, queue, results) for progress polling.

use serde::Deserialize;

use crate::store::models::JobKind;

fn default_kind() -> JobKind {
    JobKind::Plain
}

/// Payload for submitting a verification job.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSubmit {
    pub emails: Vec<String>,
    #[serde(default = "default_kind")]
    pub kind: JobKind,
}
