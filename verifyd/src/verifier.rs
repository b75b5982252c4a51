//! Upstream verification capability.
//!
//! The executor talks to the verification provider through the [`Verifier`]
//! trait so that batch processing stays testable without real network calls.
//! [`ReqwestVerifier`] is the production implementation; [`MockVerifier`]
//! scripts responses for tests.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use std::sync::Arc;

/// Errors from a single upstream verification call.
///
/// A call is all-or-nothing: there are never partial-batch results.
#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    /// The upstream call exceeded the per-call timeout.
    #[error("upstream verification call timed out")]
    Timeout,

    /// Transport-level failure (DNS, connect, TLS, aborted body).
    #[error("upstream verification call failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The upstream answered, but not with a usable result set.
    #[error("upstream returned an unusable response: {0}")]
    BadResponse(String),
}

/// One raw item as returned by the provider, already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedEmail {
    pub email: String,
    pub quality: String,
    pub result: String,
    pub result_code: String,
    pub sub_result: String,
    pub free: bool,
    pub role: bool,
    pub did_you_mean: Option<String>,
    pub error: Option<String>,
}

/// Capability for verifying a batch of emails with one upstream credential.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Verify `emails` using `api_key`. Returns one item per email or fails
    /// as a whole.
    async fn verify(&self, emails: &[String], api_key: &str) -> Result<Vec<VerifiedEmail>, VerifierError>;
}

/// Wire shape of one provider item. The provider uses all-lowercase keys and
/// sends `resultcode` as either a string or a number.
#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    quality: Option<String>,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    resultcode: Option<serde_json::Value>,
    #[serde(default)]
    subresult: Option<String>,
    #[serde(default)]
    free: Option<bool>,
    #[serde(default)]
    role: Option<bool>,
    #[serde(default)]
    didyoumean: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl From<RawItem> for VerifiedEmail {
    fn from(item: RawItem) -> Self {
        let result_code = match item.resultcode {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => "-".to_string(),
        };
        Self {
            email: item.email.unwrap_or_else(|| "unknown".to_string()),
            quality: item.quality.unwrap_or_else(|| "unknown".to_string()),
            result: item.result.unwrap_or_else(|| "unknown".to_string()),
            result_code,
            sub_result: item.subresult.unwrap_or_else(|| "-".to_string()),
            free: item.free.unwrap_or(false),
            role: item.role.unwrap_or(false),
            did_you_mean: item.didyoumean.filter(|s| !s.is_empty()),
            error: item.error.filter(|s| !s.is_empty()),
        }
    }
}

/// Production verifier backed by reqwest.
///
/// POSTs `{"emails": [...]}` to the configured endpoint with the credential
/// passed as the `token` query parameter.
#[derive(Clone)]
pub struct ReqwestVerifier {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl ReqwestVerifier {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            timeout,
        }
    }
}

#[async_trait]
impl Verifier for ReqwestVerifier {
    #[tracing::instrument(skip_all, fields(batch_len = emails.len()))]
    async fn verify(&self, emails: &[String], api_key: &str) -> Result<Vec<VerifiedEmail>, VerifierError> {
        tracing::debug!(endpoint = %self.endpoint, "Calling verification provider");

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("token", api_key)])
            .json(&json!({ "emails": emails }))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VerifierError::Timeout
                } else {
                    VerifierError::Transport(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Provider rejected the batch");
            return Err(VerifierError::BadResponse(format!("HTTP {status}: {body}")));
        }

        let items: Vec<RawItem> = response
            .json()
            .await
            .map_err(|e| VerifierError::BadResponse(format!("invalid result set: {e}")))?;

        tracing::info!(items = items.len(), "Provider batch completed");
        Ok(items.into_iter().map(VerifiedEmail::from).collect())
    }
}

/// Scripted verifier for tests. Responses are consumed FIFO; calls are
/// recorded for assertions.
#[derive(Clone, Default)]
pub struct MockVerifier {
    responses: Arc<Mutex<VecDeque<Result<Vec<VerifiedEmail>, VerifierError>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

/// Record of one call made to the mock verifier.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub emails: Vec<String>,
    pub api_key: String,
}

impl MockVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next response.
    pub fn push_response(&self, response: Result<Vec<VerifiedEmail>, VerifierError>) {
        self.responses.lock().push_back(response);
    }

    /// Queue a successful response where every email gets `result`.
    pub fn push_uniform(&self, emails: &[&str], result: &str) {
        let items = emails
            .iter()
            .map(|email| VerifiedEmail {
                email: (*email).to_string(),
                quality: "good".to_string(),
                result: result.to_string(),
                result_code: "250".to_string(),
                sub_result: "-".to_string(),
                free: false,
                role: false,
                did_you_mean: None,
                error: None,
            })
            .collect();
        self.push_response(Ok(items));
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Verifier for MockVerifier {
    async fn verify(&self, emails: &[String], api_key: &str) -> Result<Vec<VerifiedEmail>, VerifierError> {
        self.calls.lock().push(MockCall {
            emails: emails.to_vec(),
            api_key: api_key.to_string(),
        });

        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(VerifierError::BadResponse("no scripted response".to_string())))
    }
}
