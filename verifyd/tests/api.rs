//! End-to-end API tests against the full router, with a scripted verifier in
//! place of the real provider.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use verifyd::{
    auth::password,
    build_router,
    executor::{ExecutorConfig, JobExecutor},
    store::{models::Job, models::JobStatus, Store},
    verifier::MockVerifier,
    AppState, Config,
};

const ADMIN_PASSWORD: &str = "admin-password-123";

struct TestApp {
    server: TestServer,
    store: Arc<Store>,
    verifier: MockVerifier,
    _dir: TempDir,
}

fn spawn_app() -> TestApp {
    let dir = TempDir::new().unwrap();

    let config = Config {
        secret_key: Some("integration-test-secret".to_string()),
        store_path: dir.path().join("store.json"),
        admin_user_id: "root@example.com".to_string(),
        ..Default::default()
    };

    let store = Arc::new(Store::open(&config.store_path).unwrap());
    let admin_hash = password::hash_string(ADMIN_PASSWORD).unwrap();
    store.ensure_master_admin(&config.admin_user_id, Some(admin_hash)).unwrap();

    let verifier = MockVerifier::new();
    let executor = Arc::new(JobExecutor::new(
        store.clone(),
        Arc::new(verifier.clone()),
        ExecutorConfig {
            batch_size: 5,
            batch_delay: Duration::from_millis(10),
        },
    ));

    let state = AppState {
        config: config.clone(),
        store: store.clone(),
        executor,
    };
    let server = TestServer::new(build_router(state)).unwrap();

    TestApp {
        server,
        store,
        verifier,
        _dir: dir,
    }
}

impl TestApp {
    async fn login(&self, user_id: &str, password: &str) -> String {
        let response = self
            .server
            .post("/api/v1/auth/login")
            .json(&json!({"userId": user_id, "password": password}))
            .await;
        response.assert_status_ok();
        response.json::<Value>()["token"].as_str().unwrap().to_string()
    }

    async fn login_admin(&self) -> String {
        self.login("root@example.com", ADMIN_PASSWORD).await
    }

    /// Create and activate a user through the admin API, then log them in.
    async fn provision_user(&self, admin_token: &str, user_id: &str, credit_limit: u64) -> String {
        let response = self
            .server
            .post("/api/v1/users")
            .authorization_bearer(admin_token)
            .json(&json!({
                "userId": user_id,
                "password": "user-password",
                "creditLimit": credit_limit,
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        self.login(user_id, "user-password").await
    }

    async fn register_key(&self, admin_token: &str, name: &str, limit: u64) -> Value {
        let response = self
            .server
            .post("/api/v1/keys")
            .authorization_bearer(admin_token)
            .json(&json!({"name": name, "key": format!("secret-{name}"), "totalLimit": limit}))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    /// Poll a job until it reaches a terminal or paused state.
    async fn wait_for_job(&self, token: &str, job_id: verifyd::types::JobId) -> Job {
        for _ in 0..200 {
            let response = self
                .server
                .get(&format!("/api/v1/jobs/{}", job_id.as_uuid()))
                .authorization_bearer(token)
                .await;
            response.assert_status_ok();
            let job: Job = response.json();
            if job.status != JobStatus::Processing {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not settle in time", job_id.as_uuid());
    }
}

#[tokio::test]
async fn test_unauthenticated_requests_rejected() {
    let app = spawn_app();

    for path in ["/api/v1/jobs", "/api/v1/keys", "/api/v1/users", "/api/v1/credits/summary"] {
        let response = app.server.get(path).await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_login_bad_credentials() {
    let app = spawn_app();

    let response = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({"userId": "root@example.com", "password": "wrong"}))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({"userId": "nobody@example.com", "password": "irrelevant"}))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_cookie_flow() {
    let app = spawn_app();
    let mut server = app.server;
    server.save_cookies();

    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({"userId": "root@example.com", "password": ADMIN_PASSWORD}))
        .await;
    response.assert_status_ok();
    assert!(response.headers().get("set-cookie").is_some());

    // Cookie alone authenticates subsequent requests
    let me = server.get("/api/v1/auth/me").await;
    me.assert_status_ok();
    assert_eq!(me.json::<Value>()["userId"], "root@example.com");

    // Logout clears the cookie
    let logout = server.post("/api/v1/auth/logout").await;
    logout.assert_status_ok();
    let me = server.get("/api/v1/auth/me").await;
    me.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signup_requires_activation() {
    let app = spawn_app();

    let response = app
        .server
        .post("/api/v1/auth/signup")
        .json(&json!({"userId": "new@example.com", "password": "hunter22"}))
        .await;
    response.assert_status(StatusCode::CREATED);

    // Duplicate identity, case-insensitively
    let response = app
        .server
        .post("/api/v1/auth/signup")
        .json(&json!({"userId": "NEW@example.com", "password": "hunter22"}))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    // Pending accounts cannot log in
    let response = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({"userId": "new@example.com", "password": "hunter22"}))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    // Admin activates the account
    let admin_token = app.login_admin().await;
    let users: Vec<Value> = app
        .server
        .get("/api/v1/users")
        .authorization_bearer(&admin_token)
        .await
        .json();
    let new_user = users.iter().find(|u| u["userId"] == "new@example.com").unwrap();
    let response = app
        .server
        .patch(&format!("/api/v1/users/{}", new_user["id"].as_str().unwrap()))
        .authorization_bearer(&admin_token)
        .json(&json!({"status": "active", "creditLimit": 100}))
        .await;
    response.assert_status_ok();

    app.login("new@example.com", "hunter22").await;
}

#[tokio::test]
async fn test_admin_endpoints_forbidden_for_users() {
    let app = spawn_app();
    let admin_token = app.login_admin().await;
    let user_token = app.provision_user(&admin_token, "user@example.com", 10).await;

    let response = app
        .server
        .get("/api/v1/users")
        .authorization_bearer(&user_token)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = app
        .server
        .post("/api/v1/keys")
        .authorization_bearer(&user_token)
        .json(&json!({"name": "x", "key": "y"}))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_master_admin_cannot_be_deleted() {
    let app = spawn_app();
    let admin_token = app.login_admin().await;

    let admin_id = app
        .store
        .read(|d| d.user_by_identity("root@example.com").unwrap().id);
    let response = app
        .server
        .delete(&format!("/api/v1/users/{}", admin_id.as_uuid()))
        .authorization_bearer(&admin_token)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_quota_enforced_at_submission() {
    let app = spawn_app();
    let admin_token = app.login_admin().await;
    let user_token = app.provision_user(&admin_token, "limited@example.com", 2).await;

    // Three emails against a limit of two
    let response = app
        .server
        .post("/api/v1/jobs")
        .authorization_bearer(&user_token)
        .json(&json!({"emails": ["a@x.com", "b@x.com", "c@x.com"]}))
        .await;
    response.assert_status(StatusCode::PAYMENT_REQUIRED);
    assert!(response.json::<Value>()["error"].as_str().unwrap().contains("limit: 2"));

    // No job record was created
    assert_eq!(app.store.read(|d| d.jobs.len()), 0);
}

#[tokio::test]
async fn test_admin_bypasses_quota() {
    let app = spawn_app();
    let admin_token = app.login_admin().await;
    app.register_key(&admin_token, "pool-1", 1000).await;

    let emails: Vec<String> = (0..3).map(|i| format!("user{i}@example.com")).collect();
    let refs: Vec<&str> = emails.iter().map(String::as_str).collect();
    app.verifier.push_uniform(&refs, "OK");

    let response = app
        .server
        .post("/api/v1/jobs")
        .authorization_bearer(&admin_token)
        .json(&json!({"emails": emails}))
        .await;
    response.assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn test_job_lifecycle_to_completion() {
    let app = spawn_app();
    let admin_token = app.login_admin().await;
    let user_token = app.provision_user(&admin_token, "worker@example.com", 100).await;
    app.register_key(&admin_token, "pool-1", 1000).await;

    // 7 emails, batch size 5: two batches
    let emails: Vec<String> = (0..7).map(|i| format!("user{i}@example.com")).collect();
    let first: Vec<&str> = emails[..5].iter().map(String::as_str).collect();
    let second: Vec<&str> = emails[5..].iter().map(String::as_str).collect();
    app.verifier.push_uniform(&first, "OK");
    app.verifier.push_uniform(&second, "INVALID");

    let response = app
        .server
        .post("/api/v1/jobs")
        .authorization_bearer(&user_token)
        .json(&json!({"emails": emails}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let submitted: Job = response.json();
    assert_eq!(submitted.status, JobStatus::Processing);
    assert_eq!(submitted.total_emails, 7);

    let job = app.wait_for_job(&user_token, submitted.id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.processed_count, 7);
    assert_eq!(job.remaining_count, 0);
    assert_eq!(job.valid_count, 5);
    assert_eq!(job.invalid_count, 2);
    assert_eq!(job.risky_count, 0);
    assert_eq!(job.results.len(), 7);
    assert_eq!(app.verifier.call_count(), 2);

    // Usage was metered against both the credential and the user
    app.store.read(|d| {
        assert_eq!(d.api_keys[0].used_credits, 7);
        let user = d.user_by_identity("worker@example.com").unwrap();
        assert_eq!(user.used_credits, 7);
    });
}

#[tokio::test]
async fn test_job_fails_without_credentials() {
    let app = spawn_app();
    let admin_token = app.login_admin().await;

    let response = app
        .server
        .post("/api/v1/jobs")
        .authorization_bearer(&admin_token)
        .json(&json!({"emails": ["a@x.com"]}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let submitted: Job = response.json();

    let job = app.wait_for_job(&admin_token, submitted.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.as_deref().unwrap().contains("Rotation pool exhausted"));
}

#[tokio::test]
async fn test_job_visibility_and_listing() {
    let app = spawn_app();
    let admin_token = app.login_admin().await;
    let alice = app.provision_user(&admin_token, "alice@example.com", 100).await;
    let bob = app.provision_user(&admin_token, "bob@example.com", 100).await;
    app.register_key(&admin_token, "pool-1", 1000).await;

    app.verifier.push_uniform(&["a@x.com"], "OK");
    let response = app
        .server
        .post("/api/v1/jobs")
        .authorization_bearer(&alice)
        .json(&json!({"emails": ["a@x.com"]}))
        .await;
    let alice_job: Job = response.json();

    // Bob sees an empty listing and gets 403 on Alice's job
    let bobs: Vec<Job> = app.server.get("/api/v1/jobs").authorization_bearer(&bob).await.json();
    assert!(bobs.is_empty());

    let response = app
        .server
        .get(&format!("/api/v1/jobs/{}", alice_job.id.as_uuid()))
        .authorization_bearer(&bob)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    // Admin sees everything
    let all: Vec<Job> = app
        .server
        .get("/api/v1/jobs")
        .authorization_bearer(&admin_token)
        .await
        .json();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_job_listing_capped_and_newest_first() {
    let app = spawn_app();
    let admin_token = app.login_admin().await;

    // Insert 60 finished jobs directly; only the newest 50 come back
    let creator_id = app.store.read(|d| d.users[0].id);
    app.store
        .mutate(|data| {
            for _ in 0..60 {
                let mut job = Job::new(creator_id, verifyd::store::models::JobKind::Plain, vec![]);
                job.status = JobStatus::Completed;
                data.jobs.push(job);
            }
        })
        .unwrap();
    let newest_id = app.store.read(|d| d.jobs.last().unwrap().id);

    let jobs: Vec<Job> = app
        .server
        .get("/api/v1/jobs")
        .authorization_bearer(&admin_token)
        .await
        .json();
    assert_eq!(jobs.len(), 50);
    assert_eq!(jobs[0].id, newest_id);
}

#[tokio::test]
async fn test_cancel_and_delete_job() {
    let app = spawn_app();
    let admin_token = app.login_admin().await;
    app.register_key(&admin_token, "pool-1", 1000).await;

    app.verifier.push_uniform(&["a@x.com"], "OK");
    let response = app
        .server
        .post("/api/v1/jobs")
        .authorization_bearer(&admin_token)
        .json(&json!({"emails": ["a@x.com"]}))
        .await;
    let submitted: Job = response.json();
    let job = app.wait_for_job(&admin_token, submitted.id).await;
    assert_eq!(job.status, JobStatus::Completed);

    // Cancelling a finished job is rejected
    let response = app
        .server
        .post(&format!("/api/v1/jobs/{}/cancel", job.id.as_uuid()))
        .authorization_bearer(&admin_token)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    // Deletion works and is permanent
    let response = app
        .server
        .delete(&format!("/api/v1/jobs/{}", job.id.as_uuid()))
        .authorization_bearer(&admin_token)
        .await;
    response.assert_status_ok();
    let response = app
        .server
        .get(&format!("/api/v1/jobs/{}", job.id.as_uuid()))
        .authorization_bearer(&admin_token)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_submission_rejected() {
    let app = spawn_app();
    let admin_token = app.login_admin().await;

    for body in [json!({"emails": []}), json!({"emails": ["  ", ""]})] {
        let response = app
            .server
            .post("/api/v1/jobs")
            .authorization_bearer(&admin_token)
            .json(&body)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_key_masking_for_non_admins() {
    let app = spawn_app();
    let admin_token = app.login_admin().await;
    let user_token = app.provision_user(&admin_token, "user@example.com", 10).await;
    app.register_key(&admin_token, "pool-1", 1000).await;

    let admin_view: Vec<Value> = app
        .server
        .get("/api/v1/keys")
        .authorization_bearer(&admin_token)
        .await
        .json();
    assert_eq!(admin_view[0]["key"], "secret-pool-1");

    let user_view: Vec<Value> = app
        .server
        .get("/api/v1/keys")
        .authorization_bearer(&user_token)
        .await
        .json();
    assert_eq!(user_view[0]["key"], "****ol-1");
}

#[tokio::test]
async fn test_key_toggle() {
    let app = spawn_app();
    let admin_token = app.login_admin().await;
    let key = app.register_key(&admin_token, "pool-1", 1000).await;
    let key_id = key["id"].as_str().unwrap();

    let toggled: Value = app
        .server
        .patch(&format!("/api/v1/keys/{key_id}/toggle"))
        .authorization_bearer(&admin_token)
        .await
        .json();
    assert_eq!(toggled["status"], "disabled");

    let toggled: Value = app
        .server
        .patch(&format!("/api/v1/keys/{key_id}/toggle"))
        .authorization_bearer(&admin_token)
        .await
        .json();
    assert_eq!(toggled["status"], "active");
}

#[tokio::test]
async fn test_credit_summary() {
    let app = spawn_app();
    let admin_token = app.login_admin().await;
    let user_token = app.provision_user(&admin_token, "user@example.com", 100).await;
    app.register_key(&admin_token, "pool-1", 1000).await;

    // Admin view is pool-wide
    let summary: Value = app
        .server
        .get("/api/v1/credits/summary")
        .authorization_bearer(&admin_token)
        .await
        .json();
    assert_eq!(summary["totalAvailable"], 1000);
    assert_eq!(summary["totalUsed"], 0);
    assert_eq!(summary["status"], "Healthy");
    assert!(summary.get("userSpecific").is_none());

    // User view carries the personal slice
    let summary: Value = app
        .server
        .get("/api/v1/credits/summary")
        .authorization_bearer(&user_token)
        .await
        .json();
    assert_eq!(summary["userSpecific"]["limit"], 100);
    assert_eq!(summary["userSpecific"]["remaining"], 100);
}
