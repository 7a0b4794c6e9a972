//! # Fairway Core
//!
//! Core logic for the weekly golf value-pick predictions pipeline.
//!
//! This crate contains the pipeline itself:
//! - Timeout-bounded dispatch to the text-generation backend ([`dispatch`])
//! - Recovery of a structured record from free-form answers ([`extract`])
//! - Deterministic HTML rendering of the weekly report ([`render`])
//! - The schedule gate, email delivery and the run orchestrator
//!
//! **No server concerns**: HTTP routing, CORS and request framing belong in `api-rest` and
//! `api-shared`.

pub mod config;
pub mod constants;
pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod orchestrator;
pub mod record;
pub mod render;
pub mod schedule;
pub mod tour;

pub use config::{BatchCredentials, CoreConfig, DeliveryConfig, FailurePolicy};
pub use delivery::{Mailer, ResendMailer};
pub use dispatch::{
    Backend, DispatchOutcome, Dispatcher, HttpBackend, Message, MessagesRequest,
    RawBackendResponse,
};
pub use error::{
    ConfigError, DeliveryError, DispatchError, ExtractionError, FetchError, RunError, RunResult,
};
pub use extract::{extract, extract_response};
pub use fetch::PredictionFetcher;
pub use orchestrator::{ReportBuilder, RunOrchestrator, RunOutcome, RunSummary};
pub use record::StructuredRecord;
pub use render::{CompositeReport, ReportMeta, ReportRenderer, ReportSection};
pub use schedule::{GateDecision, GateSkip, ScheduleGate};
pub use tour::{PredictionRequest, Tour};
