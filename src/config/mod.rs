//! Run configuration and storage credentials.
//!
//! Credentials are read from the environment (with `.env` support via
//! dotenvy) into an explicit struct passed down the pipeline; the process
//! environment is never mutated.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
}

/// Credentials for the remote storage layer.
///
/// Loaded and validated at startup, before any extraction runs. The local
/// parquet sink does not need them; the remote storage collaborator does.
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
}

impl AwsCredentials {
    /// Load credentials from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            access_key_id: require("AWS_ACCESS_KEY_ID")?,
            secret_access_key: require("AWS_SECRET_ACCESS_KEY")?,
            session_token: require("AWS_SESSION_TOKEN")?,
        })
    }
}

// Secrets stay out of logs.
impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .finish()
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name))
}

/// Everything one batch run needs.
#[derive(Debug, Clone)]
pub struct EtlConfig {
    /// Root of the input tree; `song_data/` and `log_data/` live below it.
    pub input_root: PathBuf,
    /// Root of the output tree; one directory per relation.
    pub output_root: PathBuf,
    pub credentials: AwsCredentials,
}

impl EtlConfig {
    pub fn new(
        input_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        credentials: AwsCredentials,
    ) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            credentials,
        }
    }
}
