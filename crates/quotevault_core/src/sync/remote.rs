//! Remote data source seam and HTTP adapter.
//!
//! # Responsibility
//! - Define the transport contract: fetch a JSON array of arbitrary
//!   records, push the local list fire-and-forget.
//! - Keep record-to-quote mapping out of the transport; the engine owns it.
//!
//! # Invariants
//! - Errors are string envelopes, keeping the seam backend-agnostic.

use crate::model::quote::Quote;
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Default simulated remote: a public placeholder API returning posts.
pub const DEFAULT_ENDPOINT: &str = "https://jsonplaceholder.typicode.com/posts";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport or decode failure talking to the remote source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    Transport(String),
    Status(u16),
    Decode(String),
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "remote transport failed: {message}"),
            Self::Status(code) => write!(f, "remote returned status {code}"),
            Self::Decode(message) => write!(f, "remote payload is not usable: {message}"),
        }
    }
}

impl Error for RemoteError {}

/// Remote source contract consumed by the reconciliation engine.
pub trait RemoteSource {
    /// Fetches the raw record batch: a JSON array of arbitrary objects.
    fn fetch_records(&self) -> Result<Vec<serde_json::Value>, RemoteError>;

    /// Notifies the remote of the full current local list. Callers treat
    /// this as fire-and-forget; failures never roll back local state.
    fn push_quotes(&self, quotes: &[Quote]) -> Result<(), RemoteError>;
}

/// Blocking HTTP adapter over the placeholder API.
pub struct HttpRemoteSource {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpRemoteSource {
    /// Builds an adapter with the default 10 s timeout.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, RemoteError> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    /// Timeout is external policy, not engine logic; pick per deployment.
    pub fn with_timeout(
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| RemoteError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl RemoteSource for HttpRemoteSource {
    fn fetch_records(&self) -> Result<Vec<serde_json::Value>, RemoteError> {
        debug!("event=remote_fetch module=sync status=start endpoint={}", self.endpoint);
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .map_err(|err| RemoteError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }

        let payload: serde_json::Value = response
            .json()
            .map_err(|err| RemoteError::Decode(err.to_string()))?;
        match payload {
            serde_json::Value::Array(records) => Ok(records),
            _ => Err(RemoteError::Decode("expected a JSON array".to_string())),
        }
    }

    fn push_quotes(&self, quotes: &[Quote]) -> Result<(), RemoteError> {
        let payload = serde_json::json!({
            "quotes": quotes,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .map_err(|err| RemoteError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }
        debug!("event=remote_push module=sync status=ok count={}", quotes.len());
        Ok(())
    }
}
