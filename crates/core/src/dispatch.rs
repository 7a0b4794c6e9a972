//! Timeout-bounded dispatch of one request to the text-generation backend.
//!
//! The dispatcher races the backend call against a deadline timer. Whichever settles first
//! decides the [`DispatchOutcome`]; the loser is dropped, which cancels an in-flight HTTP
//! request or disarms the timer. Exactly one attempt is made and no state is kept between calls.

use crate::constants::{ANTHROPIC_VERSION, WEB_SEARCH_TOOL_NAME, WEB_SEARCH_TOOL_TYPE};
use crate::error::{DispatchError, SendError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// One conversation turn. `content` is passed through untouched (string or content blocks).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: Value,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: Value::String(text.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

impl ToolSpec {
    pub fn web_search() -> Self {
        Self {
            kind: WEB_SEARCH_TOOL_TYPE.into(),
            name: WEB_SEARCH_TOOL_NAME.into(),
        }
    }
}

/// Body of a Messages API call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSpec>>,
}

impl MessagesRequest {
    pub fn new(model: impl Into<String>, max_tokens: u32, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            messages,
            tools: None,
        }
    }

    /// Normalizes the tool list. Callers cannot choose tools: any request for tools yields the
    /// single trusted web-search descriptor, and no request yields no tools at all.
    pub fn with_web_search(mut self, requested: bool) -> Self {
        self.tools = requested.then(|| vec![ToolSpec::web_search()]);
        self
    }
}

/// Status and raw body of a completed backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendReply {
    pub status: u16,
    pub body: String,
}

/// Transport seam for the text-generation backend.
///
/// Implementations perform one call and must be cancel-safe: dropping the returned future
/// aborts the call.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn send(&self, api_key: &str, request: &MessagesRequest) -> Result<BackendReply, SendError>;
}

/// [`Backend`] over HTTPS using `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    messages_url: String,
}

impl HttpBackend {
    pub fn new(messages_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), messages_url)
    }

    pub fn with_client(client: reqwest::Client, messages_url: impl Into<String>) -> Self {
        Self {
            client,
            messages_url: messages_url.into(),
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn send(&self, api_key: &str, request: &MessagesRequest) -> Result<BackendReply, SendError> {
        let response = self
            .client
            .post(&self.messages_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|e| SendError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| SendError(format!("failed to read response body: {e}")))?;

        Ok(BackendReply { status, body })
    }
}

/// A content block of a backend answer. Only text blocks are consumed downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    Text(String),
    Other { kind: String },
}

impl ContentBlock {
    fn from_json(block: &Value) -> Self {
        let kind = block.get("type").and_then(Value::as_str).unwrap_or_default();
        match (kind, block.get("text").and_then(Value::as_str)) {
            ("text", Some(text)) => ContentBlock::Text(text.to_owned()),
            _ => ContentBlock::Other { kind: kind.to_owned() },
        }
    }
}

/// Decoded 2xx backend body, kept verbatim alongside its parsed content blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBackendResponse {
    body: Value,
    content: Vec<ContentBlock>,
}

impl RawBackendResponse {
    pub fn from_json(body: Value) -> Self {
        let content = body
            .get("content")
            .and_then(Value::as_array)
            .map(|blocks| blocks.iter().map(ContentBlock::from_json).collect())
            .unwrap_or_default();
        Self { body, content }
    }

    pub fn content(&self) -> &[ContentBlock] {
        &self.content
    }

    /// All text blocks joined in order with no separator.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text(text) => Some(text.as_str()),
                ContentBlock::Other { .. } => None,
            })
            .collect()
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Success(RawBackendResponse),
    Timeout,
    TransportError(String),
    /// Non-2xx status; `detail` is the decoded body, or the raw text as a JSON string.
    UpstreamError { status: u16, detail: Value },
}

impl DispatchOutcome {
    pub fn into_result(self) -> Result<RawBackendResponse, DispatchError> {
        match self {
            DispatchOutcome::Success(response) => Ok(response),
            DispatchOutcome::Timeout => Err(DispatchError::Timeout),
            DispatchOutcome::TransportError(detail) => Err(DispatchError::Transport(detail)),
            DispatchOutcome::UpstreamError { status, detail } => {
                Err(DispatchError::Upstream { status, detail })
            }
        }
    }
}

/// The backend's own error message (`error.message`), or a generic fallback.
pub fn upstream_error_message(detail: &Value) -> &str {
    detail
        .pointer("/error/message")
        .and_then(Value::as_str)
        .unwrap_or("API request failed")
}

fn classify(reply: Result<BackendReply, SendError>) -> DispatchOutcome {
    let reply = match reply {
        Ok(reply) => reply,
        Err(e) => return DispatchOutcome::TransportError(e.0),
    };

    if (200..300).contains(&reply.status) {
        return match serde_json::from_str::<Value>(&reply.body) {
            Ok(body) => DispatchOutcome::Success(RawBackendResponse::from_json(body)),
            Err(e) => DispatchOutcome::TransportError(format!("undecodable response body: {e}")),
        };
    }

    let detail = match serde_json::from_str::<Value>(&reply.body) {
        Ok(decoded) => decoded,
        Err(_) => Value::String(reply.body),
    };
    DispatchOutcome::UpstreamError {
        status: reply.status,
        detail,
    }
}

/// Issues single backend calls under an optional wall-clock deadline.
#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn Backend>,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Performs one backend call.
    ///
    /// With `deadline = Some(limit)` the call is raced against a timer; if the timer fires
    /// first the call is cancelled and `DispatchOutcome::Timeout` is returned. With `None`
    /// the call is awaited without a cap, leaving any bound to the caller.
    pub async fn dispatch(
        &self,
        api_key: &str,
        request: &MessagesRequest,
        deadline: Option<Duration>,
    ) -> DispatchOutcome {
        let started = tokio::time::Instant::now();
        tracing::debug!(model = %request.model, ?deadline, "dispatching backend request");

        let call = self.backend.send(api_key, request);
        let reply = match deadline {
            Some(limit) => {
                tokio::select! {
                    reply = call => reply,
                    () = tokio::time::sleep(limit) => {
                        tracing::warn!(?limit, "backend request timed out, in-flight call cancelled");
                        return DispatchOutcome::Timeout;
                    }
                }
            }
            None => call.await,
        };

        let outcome = classify(reply);
        match &outcome {
            DispatchOutcome::Success(_) => {
                tracing::info!(elapsed = ?started.elapsed(), "backend request succeeded");
            }
            DispatchOutcome::UpstreamError { status, detail } => {
                tracing::error!(
                    status,
                    error_message = upstream_error_message(detail),
                    "backend returned an error status"
                );
            }
            DispatchOutcome::TransportError(detail) => {
                tracing::error!(%detail, "backend transport failure");
            }
            DispatchOutcome::Timeout => {}
        }
        outcome
    }
}
