//! Job executor: drives a verification job through its batch loop.
//!
//! One tokio task owns one job. The loop claims the next batch under the
//! store lock, calls the verification provider outside of it, then applies
//! results, counters and credential usage as a single mutate-then-flush step.
//! Cancellation is cooperative: a `paused` status is observed at the next
//! loop boundary, so an in-flight batch always lands (or fails) first.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::pool;
use crate::store::models::{EmailResult, EmailStatus, JobStatus};
use crate::store::{Store, StoreData};
use crate::types::{JobId, KeyId, UserId};
use crate::verifier::Verifier;

/// Message recorded on a job when the credential pool is exhausted.
pub const NO_CREDENTIAL_ERROR: &str = "No active credentials available. Rotation pool exhausted.";

/// Batch loop tuning.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Emails per upstream call.
    pub batch_size: usize,
    /// Fixed pause between batches, to respect upstream rate limits.
    pub batch_delay: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            batch_size: 25,
            batch_delay: Duration::from_secs(1),
        }
    }
}

/// What the claim step decided.
enum Step {
    /// Terminal state observed (completed, paused, failed, or deleted).
    Finished,
    /// A batch to verify with the selected credential.
    Batch {
        emails: Vec<String>,
        key_id: KeyId,
        secret: String,
        creator_id: UserId,
    },
}

/// Spawns and tracks per-job executor tasks.
///
/// The `active` index guarantees a single owner per job id: a job already
/// present is never spawned a second time.
pub struct JobExecutor {
    store: Arc<Store>,
    verifier: Arc<dyn Verifier>,
    config: ExecutorConfig,
    active: DashMap<JobId, ()>,
}

impl JobExecutor {
    pub fn new(store: Arc<Store>, verifier: Arc<dyn Verifier>, config: ExecutorConfig) -> Self {
        Self {
            store,
            verifier,
            config,
            active: DashMap::new(),
        }
    }

    /// Start the batch loop for `job_id` on a background task.
    ///
    /// Returns `None` if an executor already owns this job.
    pub fn spawn(self: &Arc<Self>, job_id: JobId) -> Option<JoinHandle<()>> {
        use dashmap::mapref::entry::Entry;

        match self.active.entry(job_id) {
            Entry::Occupied(_) => {
                tracing::warn!(job_id = %job_id, "Executor already owns this job, not spawning");
                None
            }
            Entry::Vacant(entry) => {
                entry.insert(());
                let this = Arc::clone(self);
                Some(tokio::spawn(async move {
                    let cleanup = Arc::clone(&this);
                    scopeguard::defer! {
                        cleanup.active.remove(&job_id);
                    }
                    this.run(job_id).await;
                }))
            }
        }
    }

    /// The batch loop. Exits on any terminal state or on a store failure.
    #[tracing::instrument(skip(self), fields(job_id = %job_id))]
    async fn run(&self, job_id: JobId) {
        tracing::info!("Job execution started");

        loop {
            let step = match self.store.mutate(|data| self.claim_batch(data, &job_id)) {
                Ok(step) => step,
                Err(e) => {
                    tracing::error!(error = %e, "Store failure while claiming batch, aborting job loop");
                    return;
                }
            };

            let Step::Batch {
                emails,
                key_id,
                secret,
                creator_id,
            } = step
            else {
                tracing::info!("Job execution finished");
                return;
            };

            tracing::debug!(batch_len = emails.len(), key_id = %key_id, "Dispatching batch");

            let outcome = self.verifier.verify(&emails, &secret).await;

            let apply = self.store.mutate(|data| match outcome {
                Ok(items) if items.len() == emails.len() => {
                    apply_batch(data, &job_id, &key_id, &creator_id, &emails, items);
                    Ok(())
                }
                Ok(items) => {
                    // All-or-nothing contract broken: cannot attribute results
                    if let Some(job) = data.job_mut(&job_id) {
                        job.fail(format!(
                            "Verification provider returned {} results for {} emails.",
                            items.len(),
                            emails.len()
                        ));
                    }
                    Err(())
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Upstream batch call failed");
                    if let Some(job) = data.job_mut(&job_id) {
                        job.fail(format!("Upstream verification failed: {e}"));
                    }
                    Err(())
                }
            });

            match apply {
                Ok(Ok(())) => {}
                Ok(Err(())) => return,
                Err(e) => {
                    tracing::error!(error = %e, "Store failure while applying batch, aborting job loop");
                    return;
                }
            }

            tokio::time::sleep(self.config.batch_delay).await;
        }
    }

    /// Decide the next step for the job. Runs under the store lock.
    fn claim_batch(&self, data: &mut StoreData, job_id: &JobId) -> Step {
        let StoreData {
            users,
            api_keys,
            jobs,
        } = data;

        let Some(job) = jobs.iter_mut().find(|j| j.id == *job_id) else {
            tracing::debug!(job_id = %job_id, "Job deleted mid-run");
            return Step::Finished;
        };

        if job.status != JobStatus::Processing {
            return Step::Finished;
        }

        if job.emails.is_empty() {
            job.status = JobStatus::Completed;
            job.updated_at = chrono::Utc::now();
            tracing::info!(job_id = %job_id, processed = job.processed_count, "Job completed");
            return Step::Finished;
        }

        let take = job.emails.len().min(self.config.batch_size);
        // Peek, do not drain: the batch leaves the queue only once its
        // results have landed.
        let emails = job.emails[..take].to_vec();
        let creator_id = job.creator_id;

        let preferred = users
            .iter()
            .find(|u| u.id == creator_id)
            .and_then(|u| u.assigned_api_id);

        match pool::select_credential(api_keys, preferred.as_ref()) {
            Some(key) => Step::Batch {
                emails,
                key_id: key.id,
                secret: key.key.clone(),
                creator_id,
            },
            None => {
                job.fail(NO_CREDENTIAL_ERROR);
                tracing::warn!(job_id = %job_id, "Credential pool exhausted, job failed");
                Step::Finished
            }
        }
    }
}

/// Land a successful batch: drain the queue, append results, update the five
/// job counters, and charge the credential and the creator. Runs under the
/// store lock; even a job paused mid-call keeps its in-flight results.
fn apply_batch(
    data: &mut StoreData,
    job_id: &JobId,
    key_id: &KeyId,
    creator_id: &UserId,
    emails: &[String],
    items: Vec<crate::verifier::VerifiedEmail>,
) {
    let StoreData {
        users,
        api_keys,
        jobs,
    } = data;

    let Some(job) = jobs.iter_mut().find(|j| j.id == *job_id) else {
        return;
    };

    let batch_len = emails.len() as u64;
    job.emails.drain(..emails.len().min(job.emails.len()));

    let seq_base = job.processed_count as usize;
    for (idx, item) in items.into_iter().enumerate() {
        let result = EmailResult::from_verified(job_id, seq_base + idx, item);
        match result.status {
            EmailStatus::Valid => job.valid_count += 1,
            EmailStatus::Invalid => job.invalid_count += 1,
            EmailStatus::Risky => job.risky_count += 1,
        }
        job.results.push(result);
    }

    job.processed_count += batch_len;
    job.remaining_count = job.remaining_count.saturating_sub(batch_len);
    job.updated_at = chrono::Utc::now();

    if let Some(key) = api_keys.iter_mut().find(|k| k.id == *key_id) {
        pool::record_usage(key, batch_len);
    }
    if let Some(user) = users.iter_mut().find(|u| u.id == *creator_id) {
        user.used_credits += batch_len;
    }
}
