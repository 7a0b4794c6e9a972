//! Prediction fetching: one dispatch plus extraction per tour.

use crate::dispatch::Dispatcher;
use crate::error::FetchError;
use crate::extract::extract_response;
use crate::record::StructuredRecord;
use crate::tour::PredictionRequest;
use fairway_types::NonEmptyText;
use std::time::Duration;

/// Composes the [`Dispatcher`] and the extractor for one tour at a time.
#[derive(Clone)]
pub struct PredictionFetcher {
    dispatcher: Dispatcher,
    api_key: NonEmptyText,
    model: String,
    deadline: Option<Duration>,
}

impl PredictionFetcher {
    /// `deadline` is usually `None` on the batch path, where the caller's own outer timeout
    /// bounds the run.
    pub fn new(
        dispatcher: Dispatcher,
        api_key: NonEmptyText,
        model: impl Into<String>,
        deadline: Option<Duration>,
    ) -> Self {
        Self {
            dispatcher,
            api_key,
            model: model.into(),
            deadline,
        }
    }

    /// Fetches and validates one tour's predictions.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Dispatch` for timeouts, transport and upstream failures, and
    /// `FetchError::Extraction` when the answer holds no usable JSON object.
    pub async fn fetch(&self, request: &PredictionRequest) -> Result<StructuredRecord, FetchError> {
        tracing::info!(tour = %request.tour, "fetching predictions");

        let body = request.to_messages_request(&self.model);
        let response = self
            .dispatcher
            .dispatch(self.api_key.as_str(), &body, self.deadline)
            .await
            .into_result()?;

        let record = extract_response(&response)?;
        tracing::info!(
            tour = %request.tour,
            picks = record.value_picks.len(),
            "extracted prediction record"
        );
        Ok(record)
    }
}
