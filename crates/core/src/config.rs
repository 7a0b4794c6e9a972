//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.
//!
//! Binaries pass `|name| std::env::var(name).ok()` as the lookup; tests pass a map.

use crate::constants::{
    DEFAULT_EMAILS_URL, DEFAULT_EMAIL_FROM, DEFAULT_MESSAGES_URL, DEFAULT_MODEL,
    DEFAULT_PROXY_TIMEOUT, DEFAULT_RUN_BUDGET, DEFAULT_RUN_HOUR_UTC,
};
use crate::error::ConfigError;
use crate::tour::Tour;
use chrono::Weekday;
use fairway_types::{EmailAddress, NonEmptyText, RecipientList, TextError};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_MESSAGES_URL: &str = "ANTHROPIC_MESSAGES_URL";
pub const ENV_MODEL: &str = "FAIRWAY_MODEL";
pub const ENV_PROXY_TIMEOUT_SECS: &str = "FAIRWAY_PROXY_TIMEOUT_SECS";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "FAIRWAY_FETCH_TIMEOUT_SECS";
pub const ENV_RUN_BUDGET_SECS: &str = "FAIRWAY_RUN_BUDGET_SECS";
pub const ENV_RUN_DAY: &str = "FAIRWAY_RUN_DAY";
pub const ENV_RUN_HOUR_UTC: &str = "FAIRWAY_RUN_HOUR_UTC";
pub const ENV_SCHEDULER: &str = "FAIRWAY_SCHEDULER";
pub const ENV_TOURS: &str = "FAIRWAY_TOURS";
pub const ENV_FAILURE_POLICY: &str = "FAIRWAY_FAILURE_POLICY";
pub const ENV_ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_RESEND_API_KEY: &str = "RESEND_API_KEY";
pub const ENV_EMAIL_RECIPIENTS: &str = "EMAIL_RECIPIENTS";
pub const ENV_EMAIL_FROM: &str = "EMAIL_FROM";
pub const ENV_EMAILS_URL: &str = "RESEND_EMAILS_URL";

/// What a multi-tour run does when one tour fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// The first failure aborts the run; later tours are not fetched.
    #[default]
    AbortOnFirst,
    /// Failures are collected and the run continues; it fails only if every tour failed.
    BestEffort,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" | "abort-on-first" => Ok(Self::AbortOnFirst),
            "best-effort" | "best_effort" | "besteffort" => Ok(Self::BestEffort),
            other => Err(format!("unknown failure policy '{other}'")),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    messages_url: String,
    model: String,
    proxy_timeout: Duration,
    fetch_timeout: Option<Duration>,
    run_budget: Duration,
    run_day: Weekday,
    run_hour_utc: u32,
    scheduler_enabled: bool,
    tours: Vec<Tour>,
    failure_policy: FailurePolicy,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            messages_url: DEFAULT_MESSAGES_URL.into(),
            model: DEFAULT_MODEL.into(),
            proxy_timeout: DEFAULT_PROXY_TIMEOUT,
            fetch_timeout: None,
            run_budget: DEFAULT_RUN_BUDGET,
            run_day: Weekday::Wed,
            run_hour_utc: DEFAULT_RUN_HOUR_UTC,
            scheduler_enabled: true,
            tours: vec![Tour::Pga, Tour::DpWorld],
            failure_policy: FailurePolicy::AbortOnFirst,
        }
    }
}

impl CoreConfig {
    /// Builds the configuration from a variable lookup, applying defaults for unset values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first variable whose value does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            messages_url: non_blank(lookup(ENV_MESSAGES_URL)).unwrap_or(defaults.messages_url),
            model: non_blank(lookup(ENV_MODEL)).unwrap_or(defaults.model),
            proxy_timeout: secs_from_env_value(ENV_PROXY_TIMEOUT_SECS, lookup(ENV_PROXY_TIMEOUT_SECS))?
                .unwrap_or(defaults.proxy_timeout),
            fetch_timeout: secs_from_env_value(ENV_FETCH_TIMEOUT_SECS, lookup(ENV_FETCH_TIMEOUT_SECS))?,
            run_budget: secs_from_env_value(ENV_RUN_BUDGET_SECS, lookup(ENV_RUN_BUDGET_SECS))?
                .unwrap_or(defaults.run_budget),
            run_day: run_day_from_env_value(lookup(ENV_RUN_DAY))?,
            run_hour_utc: run_hour_from_env_value(lookup(ENV_RUN_HOUR_UTC))?,
            scheduler_enabled: flag_from_env_value(ENV_SCHEDULER, lookup(ENV_SCHEDULER), true)?,
            tours: tours_from_env_value(lookup(ENV_TOURS))?,
            failure_policy: failure_policy_from_env_value(lookup(ENV_FAILURE_POLICY))?,
        })
    }

    pub fn with_messages_url(mut self, url: impl Into<String>) -> Self {
        self.messages_url = url.into();
        self
    }

    pub fn with_tours(mut self, tours: Vec<Tour>) -> Self {
        self.tours = tours;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_proxy_timeout(mut self, timeout: Duration) -> Self {
        self.proxy_timeout = timeout;
        self
    }

    pub fn with_run_budget(mut self, budget: Duration) -> Self {
        self.run_budget = budget;
        self
    }

    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn proxy_timeout(&self) -> Duration {
        self.proxy_timeout
    }

    /// Per-fetch deadline on the batch path; `None` means uncapped.
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout
    }

    /// Wall-clock bound on one batch run, enforced even when fetches have no deadline.
    pub fn run_budget(&self) -> Duration {
        self.run_budget
    }

    pub fn run_day(&self) -> Weekday {
        self.run_day
    }

    pub fn run_hour_utc(&self) -> u32 {
        self.run_hour_utc
    }

    pub fn scheduler_enabled(&self) -> bool {
        self.scheduler_enabled
    }

    pub fn tours(&self) -> &[Tour] {
        &self.tours
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }
}

/// Email delivery settings.
#[derive(Clone, Debug)]
pub struct DeliveryConfig {
    pub endpoint: String,
    pub api_key: NonEmptyText,
    pub from: EmailAddress,
    pub recipients: RecipientList,
}

impl DeliveryConfig {
    /// # Errors
    ///
    /// Fails when `RESEND_API_KEY` or `EMAIL_RECIPIENTS` is missing, or an address is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: non_blank(lookup(ENV_EMAILS_URL)).unwrap_or_else(|| DEFAULT_EMAILS_URL.into()),
            api_key: required_from_env_value(ENV_RESEND_API_KEY, lookup(ENV_RESEND_API_KEY))?,
            from: sender_from_env_value(lookup(ENV_EMAIL_FROM))?,
            recipients: recipients_from_env_value(lookup(ENV_EMAIL_RECIPIENTS))?,
        })
    }
}

/// Secrets needed by the scheduled batch run, validated together so a run never starts half
/// configured.
#[derive(Clone, Debug)]
pub struct BatchCredentials {
    pub anthropic_api_key: NonEmptyText,
    pub delivery: DeliveryConfig,
}

impl BatchCredentials {
    /// # Errors
    ///
    /// Returns the first missing or invalid variable as a `ConfigError`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            anthropic_api_key: required_from_env_value(
                ENV_ANTHROPIC_API_KEY,
                lookup(ENV_ANTHROPIC_API_KEY),
            )?,
            delivery: DeliveryConfig::from_lookup(&lookup)?,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

pub fn required_from_env_value(
    name: &'static str,
    value: Option<String>,
) -> Result<NonEmptyText, ConfigError> {
    value
        .and_then(|v| NonEmptyText::new(v).ok())
        .ok_or(ConfigError::MissingVar(name))
}

/// Parses a whole number of seconds. Unset or blank gives `None`; `0` is rejected.
pub fn secs_from_env_value(
    name: &'static str,
    value: Option<String>,
) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = non_blank(value) else {
        return Ok(None);
    };
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".into(),
        }),
        Ok(secs) => Ok(Some(Duration::from_secs(secs))),
        Err(e) => Err(ConfigError::Invalid {
            name,
            reason: format!("'{raw}' is not a number of seconds: {e}"),
        }),
    }
}

pub fn run_day_from_env_value(value: Option<String>) -> Result<Weekday, ConfigError> {
    match non_blank(value) {
        None => Ok(Weekday::Wed),
        Some(raw) => raw.parse::<Weekday>().map_err(|_| ConfigError::Invalid {
            name: ENV_RUN_DAY,
            reason: format!("'{raw}' is not a weekday"),
        }),
    }
}

pub fn run_hour_from_env_value(value: Option<String>) -> Result<u32, ConfigError> {
    match non_blank(value) {
        None => Ok(DEFAULT_RUN_HOUR_UTC),
        Some(raw) => match raw.parse::<u32>() {
            Ok(hour) if hour < 24 => Ok(hour),
            _ => Err(ConfigError::Invalid {
                name: ENV_RUN_HOUR_UTC,
                reason: format!("'{raw}' is not an hour between 0 and 23"),
            }),
        },
    }
}

pub fn flag_from_env_value(
    name: &'static str,
    value: Option<String>,
    default: bool,
) -> Result<bool, ConfigError> {
    match non_blank(value).map(|v| v.to_ascii_lowercase()).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            name,
            reason: format!("'{other}' is not a boolean"),
        }),
    }
}

/// Parses an ordered, comma-separated tour list. Duplicates are kept.
pub fn tours_from_env_value(value: Option<String>) -> Result<Vec<Tour>, ConfigError> {
    let Some(raw) = non_blank(value) else {
        return Ok(CoreConfig::default().tours);
    };
    let tours = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry.parse::<Tour>().map_err(|reason| ConfigError::Invalid {
                name: ENV_TOURS,
                reason,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if tours.is_empty() {
        return Err(ConfigError::Invalid {
            name: ENV_TOURS,
            reason: "no tours listed".into(),
        });
    }
    Ok(tours)
}

pub fn failure_policy_from_env_value(value: Option<String>) -> Result<FailurePolicy, ConfigError> {
    match non_blank(value) {
        None => Ok(FailurePolicy::default()),
        Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
            name: ENV_FAILURE_POLICY,
            reason,
        }),
    }
}

pub fn sender_from_env_value(value: Option<String>) -> Result<EmailAddress, ConfigError> {
    let raw = non_blank(value).unwrap_or_else(|| DEFAULT_EMAIL_FROM.into());
    EmailAddress::parse(&raw).map_err(|e| ConfigError::Invalid {
        name: ENV_EMAIL_FROM,
        reason: e.to_string(),
    })
}

pub fn recipients_from_env_value(value: Option<String>) -> Result<RecipientList, ConfigError> {
    let raw = value.ok_or(ConfigError::MissingVar(ENV_EMAIL_RECIPIENTS))?;
    RecipientList::parse_csv(&raw).map_err(|e| match e {
        TextError::NoRecipients | TextError::Empty => ConfigError::NoRecipients,
        other => ConfigError::Invalid {
            name: ENV_EMAIL_RECIPIENTS,
            reason: other.to_string(),
        },
    })
}
