//! Tours (report topics) and the per-fetch prediction request.

use crate::constants::PREDICTION_MAX_TOKENS;
use crate::dispatch::{Message, MessagesRequest};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// JSON skeleton the backend is asked to fill in.
const RECORD_SKELETON: &str = r#"{"tournament":"","course":"","location":"","dates":"","courseProfile":{"length":"","par":"","keyFeatures":[""],"favoredSkills":[""]},"weather":"","valuePicks":[{"rank":1,"player":"","odds":"","why":"","coursefit":"","stats":{"drivingAcc":"","gir":"","sgApproach":"","sgPutting":"","recentForm":""}}]}"#;

/// A professional tour covered by the weekly report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tour {
    Pga,
    DpWorld,
}

impl Tour {
    pub fn name(self) -> &'static str {
        match self {
            Tour::Pga => "PGA Tour",
            Tour::DpWorld => "DP World Tour",
        }
    }

    /// Section heading used in the rendered report.
    pub fn caption(self) -> &'static str {
        match self {
            Tour::Pga => "🇺🇸 PGA Tour",
            Tour::DpWorld => "🇪🇺 DP World Tour",
        }
    }

    pub fn site(self) -> &'static str {
        match self {
            Tour::Pga => "pgatour.com",
            Tour::DpWorld => "europeantour.com",
        }
    }

    /// Source hints given to the backend's web search, in prompt order. The tour site is
    /// listed twice: once as the tour's own site and once alongside the stats site.
    pub fn source_hints(self) -> Vec<String> {
        [self.site(), "datagolf.com", self.site(), "oddschecker", "weather.com"]
            .into_iter()
            .map(str::to_owned)
            .collect()
    }
}

impl fmt::Display for Tour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pga" => Ok(Tour::Pga),
            "dp" | "dpworld" | "dp-world" => Ok(Tour::DpWorld),
            other => Err(format!("unknown tour '{other}' (expected 'pga' or 'dp')")),
        }
    }
}

/// Everything needed to ask the backend for one tour's predictions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionRequest {
    pub tour: Tour,
    pub date: String,
    pub sources: Vec<String>,
}

impl PredictionRequest {
    pub fn for_tour(tour: Tour, date: impl Into<String>) -> Self {
        Self {
            tour,
            date: date.into(),
            sources: tour.source_hints(),
        }
    }

    /// Renders the user prompt sent to the backend.
    pub fn prompt(&self) -> String {
        format!(
            "{date}. {tour} this week.\n\nSources: {sources}\n\n5 value picks 20/1+ matching course.\n\nJSON:\n{RECORD_SKELETON}",
            date = self.date,
            tour = self.tour.name(),
            sources = self.sources.join(" "),
        )
    }

    /// Builds the backend request: a single user turn with web search enabled.
    pub fn to_messages_request(&self, model: &str) -> MessagesRequest {
        MessagesRequest::new(
            model,
            PREDICTION_MAX_TOKENS,
            vec![Message::user(self.prompt())],
        )
        .with_web_search(true)
    }
}
