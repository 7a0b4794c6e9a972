//! Report delivery by email.

use crate::config::DeliveryConfig;
use crate::constants::REPORT_TITLE;
use crate::error::DeliveryError;
use crate::render::CompositeReport;
use async_trait::async_trait;
use fairway_types::{EmailAddress, NonEmptyText, RecipientList};
use serde::Serialize;

/// Acknowledgement from the email endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReceipt {
    /// Provider message id, when the response carried one.
    pub id: Option<String>,
    pub body: serde_json::Value,
}

/// Sends a finished report to its recipients.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(
        &self,
        report: &CompositeReport,
        subject: &str,
    ) -> Result<DeliveryReceipt, DeliveryError>;
}

/// Subject line for the weekly report email.
pub fn report_subject(date_caption: &str) -> String {
    format!("{REPORT_TITLE} - {date_caption}")
}

#[derive(Serialize)]
struct EmailPayload<'a> {
    from: &'a EmailAddress,
    to: &'a RecipientList,
    subject: &'a str,
    html: &'a str,
}

/// [`Mailer`] for the Resend HTTP API.
#[derive(Debug, Clone)]
pub struct ResendMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: NonEmptyText,
    from: EmailAddress,
    recipients: RecipientList,
}

impl ResendMailer {
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            from: config.from.clone(),
            recipients: config.recipients.clone(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn deliver(
        &self,
        report: &CompositeReport,
        subject: &str,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let payload = EmailPayload {
            from: &self.from,
            to: &self.recipients,
            subject,
            html: &report.html,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.as_str())
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DeliveryError::Transport(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "email endpoint rejected report");
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        let body: serde_json::Value =
            serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
        let id = body.get("id").and_then(|id| id.as_str()).map(str::to_owned);
        tracing::info!(
            recipients = self.recipients.len(),
            id = id.as_deref().unwrap_or("-"),
            "report email sent"
        );
        Ok(DeliveryReceipt { id, body })
    }
}
