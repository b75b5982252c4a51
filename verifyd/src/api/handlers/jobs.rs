//! Job submission and lifecycle.
//!
//! Submission is the synchronous part: quota and input validation happen
//! here, then the job record is persisted `processing` and an executor task
//! is spawned. Everything after that is observed by polling the job record.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::{
    api::models::{auth::MessageResponse, jobs::JobSubmit, users::CurrentUser},
    errors::Error,
    quota,
    store::models::{Job, JobStatus},
    types::JobId,
    AppState,
};

/// Jobs a listing returns at most, newest first.
const LIST_LIMIT: usize = 50;

#[tracing::instrument(skip_all)]
pub async fn submit_job(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<JobSubmit>,
) -> Result<(StatusCode, Json<Job>), Error> {
    let emails: Vec<String> = request
        .emails
        .iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect();

    if emails.is_empty() {
        return Err(Error::BadRequest {
            message: "No emails provided".to_string(),
        });
    }

    // Quota is enforced against the live record, not the session snapshot
    let user = state
        .store
        .read(|data| data.user(&current_user.id).cloned())
        .ok_or(Error::Unauthenticated {
            message: Some("Account no longer exists".to_string()),
        })?;
    quota::check_quota(&user, emails.len() as u64)?;

    let job = Job::new(current_user.id, request.kind, emails);
    state.store.mutate(|data| data.jobs.push(job.clone()))?;

    // A fresh id is never already owned; spawn itself logs if it ever is
    let _ = state.executor.spawn(job.id);
    tracing::info!(
        job_id = %job.id.to_short_string(),
        total = job.total_emails,
        "Job submitted"
    );

    Ok((StatusCode::CREATED, Json(job)))
}

/// List jobs, newest first, capped at 50. Admins see every job, other users
/// only their own.
#[tracing::instrument(skip_all)]
pub async fn list_jobs(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<Vec<Job>>, Error> {
    let jobs = state.store.read(|data| {
        data.jobs
            .iter()
            .rev()
            .filter(|j| current_user.is_admin() || j.creator_id == current_user.id)
            .take(LIST_LIMIT)
            .cloned()
            .collect()
    });
    Ok(Json(jobs))
}

#[tracing::instrument(skip_all, fields(job_id = %job_id))]
pub async fn get_job(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(job_id): Path<JobId>,
) -> Result<Json<Job>, Error> {
    let job = state.store.read(|data| data.job(&job_id).cloned()).ok_or_else(|| Error::NotFound {
        resource: "Job".to_string(),
        id: job_id.to_short_string(),
    })?;

    authorize_access(&current_user, &job)?;
    Ok(Json(job))
}

/// Cooperative cancellation: mark the job `paused`. The executor observes the
/// status change at its next batch boundary; the in-flight batch still lands.
#[tracing::instrument(skip_all, fields(job_id = %job_id))]
pub async fn cancel_job(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(job_id): Path<JobId>,
) -> Result<Json<Job>, Error> {
    let job = state.store.mutate(|data| {
        let job = data.job_mut(&job_id).ok_or_else(|| Error::NotFound {
            resource: "Job".to_string(),
            id: job_id.to_short_string(),
        })?;
        authorize_access(&current_user, job)?;

        match job.status {
            JobStatus::Processing | JobStatus::Pending => {
                job.status = JobStatus::Paused;
                job.updated_at = Utc::now();
            }
            // Cancelling an already-paused job is a no-op
            JobStatus::Paused => {}
            JobStatus::Completed | JobStatus::Failed => {
                return Err(Error::BadRequest {
                    message: "Job has already finished".to_string(),
                });
            }
        }
        Ok(job.clone())
    })??;

    Ok(Json(job))
}

#[tracing::instrument(skip_all, fields(job_id = %job_id))]
pub async fn delete_job(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(job_id): Path<JobId>,
) -> Result<Json<MessageResponse>, Error> {
    state.store.mutate(|data| {
        let job = data.job(&job_id).ok_or_else(|| Error::NotFound {
            resource: "Job".to_string(),
            id: job_id.to_short_string(),
        })?;
        authorize_access(&current_user, job)?;

        // Consumed credits are not refunded
        data.jobs.retain(|j| j.id != job_id);
        Ok::<_, Error>(())
    })??;

    Ok(Json(MessageResponse::new("Job deleted")))
}

fn authorize_access(user: &CurrentUser, job: &Job) -> Result<(), Error> {
    if user.is_admin() || job.creator_id == user.id {
        Ok(())
    } else {
        Err(Error::Forbidden {
            message: "You do not have access to this job".to_string(),
        })
    }
}
