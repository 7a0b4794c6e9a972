//! Constants used throughout the Fairway core crate.
//!
//! Endpoint defaults, wire-protocol literals and report copy live here so that the dispatcher,
//! prompt builder and renderer agree on them.

use std::time::Duration;

/// Default Anthropic Messages API endpoint.
pub const DEFAULT_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

/// Value sent in the `anthropic-version` header.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Model used when no override is configured.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// `max_tokens` applied by the proxy when the caller omits it.
pub const PROXY_MAX_TOKENS: u32 = 1000;

/// `max_tokens` used for prediction fetches.
pub const PREDICTION_MAX_TOKENS: u32 = 1500;

/// Deadline applied to synchronous proxy calls.
pub const DEFAULT_PROXY_TIMEOUT: Duration = Duration::from_secs(90);

/// Upper bound on one whole batch run (every fetch plus delivery).
pub const DEFAULT_RUN_BUDGET: Duration = Duration::from_secs(15 * 60);

/// Type tag of the only tool the backend is ever given.
pub const WEB_SEARCH_TOOL_TYPE: &str = "web_search_20250305";

/// Name of the web-search tool.
pub const WEB_SEARCH_TOOL_NAME: &str = "web_search";

/// Default email delivery endpoint (Resend).
pub const DEFAULT_EMAILS_URL: &str = "https://api.resend.com/emails";

/// Default sender address (Resend test domain).
pub const DEFAULT_EMAIL_FROM: &str = "onboarding@resend.dev";

/// Hour of day (UTC) at which the daily scheduler fires.
pub const DEFAULT_RUN_HOUR_UTC: u32 = 8;

/// Report title, also used as the email subject prefix.
pub const REPORT_TITLE: &str = "⛳ Golf AI Weekly Predictions";
