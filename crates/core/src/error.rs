use crate::dispatch::upstream_error_message;
use crate::tour::Tour;

/// Failure to recover a structured record from backend text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("no JSON object found in backend response")]
    NoObjectFound,
    #[error("malformed JSON in backend response: {0}")]
    MalformedJson(String),
}

/// Failure reported by a [`Backend`](crate::dispatch::Backend) below the HTTP protocol level.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct SendError(pub String);

/// The failing arms of a [`DispatchOutcome`](crate::dispatch::DispatchOutcome).
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    /// The deadline fired first; whether the backend completed the work is unknown.
    #[error("backend request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend returned HTTP {status}: {}", upstream_error_message(.detail))]
    Upstream {
        status: u16,
        detail: serde_json::Value,
    },
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// Invalid or missing process configuration. Raised before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingVar(&'static str),
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("EMAIL_RECIPIENTS contains no recipients")]
    NoRecipients,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DeliveryError {
    #[error("failed to reach email endpoint: {0}")]
    Transport(String),
    #[error("email endpoint rejected the report (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

/// A tour whose fetch failed, kept for run summaries.
#[derive(Debug, Clone)]
pub struct TourFailure {
    pub tour: Tour,
    pub error: String,
}

/// Run-level failure of the scheduled pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("batch run is not configured: {0}")]
    Configuration(#[from] ConfigError),
    #[error("failed to fetch {tour} predictions: {source}")]
    Fetch {
        tour: Tour,
        #[source]
        source: FetchError,
    },
    #[error("all tours failed: {0:?}")]
    AllToursFailed(Vec<TourFailure>),
    #[error("report delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
    #[error("run did not finish within {} seconds", .0.as_secs())]
    TimedOut(std::time::Duration),
}

pub type RunResult<T> = std::result::Result<T, RunError>;
