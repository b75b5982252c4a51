//! Application configuration.
//!
//! Configuration is loaded from a YAML file with environment variable
//! overrides. The file path defaults to `config.yaml` and can be set via
//! `-f` / `VERIFYD_CONFIG`. Environment variables prefixed with `VERIFYD_`
//! override YAML values; nested fields use double underscores, e.g.
//! `VERIFYD_VERIFIER__ENDPOINT=https://...`.

use clap::Parser;
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::Error;

/// Simple CLI args - just for specifying the config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "VERIFYD_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Root configuration, loaded from YAML plus `VERIFYD_` env overrides.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Path of the JSON store file
    pub store_path: PathBuf,
    /// Secret key for JWT signing (required for logins to work)
    pub secret_key: Option<String>,
    /// Login identity of the master administrator, seeded at startup
    pub admin_user_id: String,
    /// Password for the master administrator (optional; without it the
    /// account exists but cannot log in natively)
    pub admin_password: Option<String>,
    /// Session token lifetime
    #[serde(with = "humantime_serde")]
    pub session_expiry: Duration,
    /// Name of the session cookie
    pub session_cookie_name: String,
    /// Usage limit applied to newly provisioned credentials
    pub default_key_limit: u64,
    /// Upstream verification provider settings
    pub verifier: VerifierConfig,
    /// Batch loop settings
    pub executor: ExecutorSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifierConfig {
    /// Endpoint receiving `{"emails": [...]}` POSTs
    pub endpoint: String,
    /// Per-call timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.apify.com/v2/acts/account56~email-verifier/run-sync-get-dataset-items".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorSettings {
    /// Emails per upstream call
    pub batch_size: usize,
    /// Fixed pause between batches
    #[serde(with = "humantime_serde")]
    pub batch_delay: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            batch_size: 25,
            batch_delay: Duration::from_secs(1),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            store_path: PathBuf::from("verifyd.json"),
            secret_key: None,
            admin_user_id: "admin@example.com".to_string(),
            admin_password: None,
            session_expiry: Duration::from_secs(30 * 24 * 60 * 60),
            session_cookie_name: "session_token".to_string(),
            default_key_limit: 3000,
            verifier: VerifierConfig::default(),
            executor: ExecutorSettings::default(),
        }
    }
}

impl Config {
    /// Address the HTTP server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Load configuration from the YAML file and environment overrides.
    pub fn load(args: &Args) -> Result<Self, Error> {
        let config: Config = Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("VERIFYD_").split("__"))
            .extract()
            .map_err(|e| Error::Internal {
                operation: format!("load configuration: {e}"),
            })?;

        if config.secret_key.is_none() {
            tracing::warn!("No secret_key configured; logins will fail until one is set");
        }
        if config.executor.batch_size == 0 {
            return Err(Error::Internal {
                operation: "load configuration: executor.batch_size must be at least 1".to_string(),
            });
        }

        Ok(config)
    }
}
