//! Transport to the remote execution pool.
//!
//! [`RemotePool`] is the seam between the bridge and the network. The HTTP
//! implementation speaks the JSON wire contract from
//! [`sbx_common::protocol`]; [`MockRemotePool`] replays scripted responses
//! for tests.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::{Client, Url};
use sbx_common::protocol::{WireRequest, WireResponse};
use sbx_common::util::truncate_for_log;
use thiserror::Error;
use tracing::debug;

/// Path appended to the configured endpoint for every dispatch.
pub const EXECUTIONS_PATH: &str = "executions";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid pool endpoint {0:?}")]
    InvalidEndpoint(String),

    #[error("request to execution pool failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("execution pool returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response from execution pool: {0}")]
    Decode(String),

    #[error("execution pool unavailable: {0}")]
    Unavailable(String),
}

/// A remote environment that runs one bootstrap script per request.
pub trait RemotePool: Send + Sync {
    fn execute(
        &self,
        endpoint: &str,
        request: &WireRequest,
    ) -> impl Future<Output = Result<WireResponse, TransportError>> + Send;
}

/// Resolve `{endpoint}/executions`, rejecting anything but http(s).
pub fn executions_url(endpoint: &str) -> Result<Url, TransportError> {
    let trimmed = endpoint.trim().trim_end_matches('/');
    let invalid = || TransportError::InvalidEndpoint(endpoint.to_string());
    if trimmed.is_empty() {
        return Err(invalid());
    }
    let url = Url::parse(&format!("{trimmed}/{EXECUTIONS_PATH}")).map_err(|_| invalid())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(invalid()),
    }
}

/// [`RemotePool`] over HTTP with an optional bearer token.
#[derive(Debug, Clone)]
pub struct HttpPool {
    client: Client,
    token: Option<String>,
}

impl HttpPool {
    pub fn new(token: Option<String>) -> Result<Self, TransportError> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self { client, token })
    }
}

impl RemotePool for HttpPool {
    async fn execute(
        &self,
        endpoint: &str,
        request: &WireRequest,
    ) -> Result<WireResponse, TransportError> {
        let url = executions_url(endpoint)?;
        debug!(url = %url, session = %request.session_id, "Dispatching to execution pool");

        let mut builder = self.client.post(url).json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, MAX_ERROR_BODY).to_string(),
            });
        }

        serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// One scripted outcome for [`MockRemotePool`].
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(WireResponse),
    Status { status: u16, body: String },
    Unavailable(String),
}

impl MockReply {
    pub fn exit(exit_status: i32, stdout: &str, stderr: &str) -> Self {
        Self::Respond(WireResponse {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_status,
            ..WireResponse::default()
        })
    }
}

/// A call observed by [`MockRemotePool`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub endpoint: String,
    pub request: WireRequest,
}

/// Scripted in-memory pool.
///
/// Replies are consumed in order; once they run out every call is
/// answered with [`TransportError::Unavailable`].
#[derive(Debug, Clone, Default)]
pub struct MockRemotePool {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    delay: Option<Duration>,
}

impl MockRemotePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: MockReply) -> Self {
        self.push_reply(reply);
        self
    }

    /// Sleep this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_reply(&self, reply: MockReply) {
        self.replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(reply);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl RemotePool for MockRemotePool {
    async fn execute(
        &self,
        endpoint: &str,
        request: &WireRequest,
    ) -> Result<WireResponse, TransportError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedCall {
                endpoint: endpoint.to_string(),
                request: request.clone(),
            });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        match reply {
            Some(MockReply::Respond(response)) => Ok(response),
            Some(MockReply::Status { status, body }) => Err(TransportError::Status { status, body }),
            Some(MockReply::Unavailable(reason)) => Err(TransportError::Unavailable(reason)),
            None => Err(TransportError::Unavailable("no scripted reply".to_string())),
        }
    }
}
