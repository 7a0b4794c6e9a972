//! Request and response bodies of the HTTP endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// One conversation turn forwarded to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    pub role: String,
    /// A string or an array of content blocks, passed through untouched.
    #[schema(value_type = Object)]
    pub content: Value,
}

/// Body of `POST /api/claude`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProxyReq {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// A non-empty list enables the single web-search tool; the entries themselves are ignored.
    #[serde(default)]
    #[schema(value_type = Option<Vec<Object>>)]
    pub tools: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TimeoutRes {
    pub error: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl TimeoutRes {
    pub fn after_secs(secs: u64) -> Self {
        Self {
            error: format!(
                "Request timed out after {secs} seconds. The API response took too long."
            ),
            kind: "timeout".into(),
        }
    }
}

/// Non-2xx answer from the backend, relayed with the backend's status code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UpstreamErrorRes {
    pub error: String,
    #[schema(value_type = Object)]
    pub details: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InternalErrorRes {
    pub error: String,
    /// Debug rendering of the error and its source chain.
    pub stack: String,
}

/// Batch run declined by the weekday gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SkipRes {
    pub message: String,
    /// Day of week, 0 = Sunday.
    pub day: u32,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TourFailureRes {
    pub tour: String,
    pub error: String,
}

/// Batch run delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RunRes {
    pub success: bool,
    pub message: String,
    pub date: String,
    pub sections: usize,
    pub failures: Vec<TourFailureRes>,
}
