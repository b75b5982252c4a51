//! verifyd: batch email verification service.
//!
//! A small control plane around an upstream verification provider: users
//! submit lists of emails as jobs, a background executor works through each
//! job in fixed-size batches using a rotating pool of provider credentials,
//! and per-user credit quotas bound how much anyone can verify. All state
//! lives in a single JSON store file.
//!
//! The crate is organized as:
//!
//! - [`api`]: HTTP handlers and wire models
//! - [`auth`]: password hashing, JWT sessions, the caller extractor
//! - [`store`]: the durable single-file store and domain models
//! - [`executor`]: the per-job batch loop
//! - [`pool`] / [`quota`]: credential selection and quota enforcement
//! - [`verifier`]: the upstream provider client (and its test mock)

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod executor;
pub mod pool;
pub mod quota;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod verifier;

pub use config::Config;

use std::sync::Arc;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use crate::executor::{ExecutorConfig, JobExecutor};
use crate::store::Store;
use crate::verifier::{ReqwestVerifier, Verifier};

/// Shared state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<Store>,
    pub executor: Arc<JobExecutor>,
}

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Authentication
        .route("/auth/signup", post(api::handlers::auth::signup))
        .route("/auth/login", post(api::handlers::auth::login))
        .route("/auth/logout", post(api::handlers::auth::logout))
        .route("/auth/me", get(api::handlers::auth::me))
        // User management (admin only)
        .route("/users", get(api::handlers::users::list_users))
        .route("/users", post(api::handlers::users::create_user))
        .route("/users/{id}", patch(api::handlers::users::update_user))
        .route("/users/{id}", delete(api::handlers::users::delete_user))
        // Credential pool
        .route("/keys", get(api::handlers::keys::list_keys))
        .route("/keys", post(api::handlers::keys::create_key))
        .route("/keys/{id}", delete(api::handlers::keys::delete_key))
        .route("/keys/{id}/toggle", patch(api::handlers::keys::toggle_key))
        // Verification jobs
        .route("/jobs", post(api::handlers::jobs::submit_job))
        .route("/jobs", get(api::handlers::jobs::list_jobs))
        .route("/jobs/{id}", get(api::handlers::jobs::get_job))
        .route("/jobs/{id}/cancel", post(api::handlers::jobs::cancel_job))
        .route("/jobs/{id}", delete(api::handlers::jobs::delete_job))
        // Credits
        .route("/credits/summary", get(api::handlers::credits::credit_summary));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/api/v1", api_routes)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// The assembled application: store opened, master admin seeded, executor
/// wired to the configured provider.
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Arc::new(Store::open(&config.store_path)?);

        // Seed the master administrator before accepting any traffic
        let admin_hash = match config.admin_password.clone() {
            Some(password) => Some(tokio::task::spawn_blocking(move || auth::password::hash_string(&password)).await??),
            None => None,
        };
        store.ensure_master_admin(&config.admin_user_id, admin_hash)?;

        let verifier: Arc<dyn Verifier> = Arc::new(ReqwestVerifier::new(
            config.verifier.endpoint.clone(),
            config.verifier.timeout,
        ));
        let executor = Arc::new(JobExecutor::new(
            store.clone(),
            verifier,
            ExecutorConfig {
                batch_size: config.executor.batch_size,
                batch_delay: config.executor.batch_delay,
            },
        ));

        let state = AppState {
            config: config.clone(),
            store,
            executor,
        };
        let router = build_router(state);

        Ok(Self { router, config })
    }

    /// Start serving until the shutdown future resolves.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("verifyd listening on http://{bind_addr}");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutdown complete");
        Ok(())
    }
}
