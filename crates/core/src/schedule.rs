//! Weekly schedule gate and daily trigger timing.
//!
//! The batch trigger fires daily; the gate lets exactly one weekday through unless the caller
//! forces the run. All calendar arithmetic is UTC.

use chrono::{DateTime, Datelike, Duration, NaiveTime, SecondsFormat, Utc, Weekday};

/// Outcome of consulting the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Run { forced: bool },
    Skip(GateSkip),
}

/// Skip notice returned when the gate declines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateSkip {
    pub message: String,
    /// Day of week, 0 = Sunday.
    pub day: u32,
    /// RFC 3339 timestamp of the evaluation.
    pub date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleGate {
    run_day: Weekday,
}

impl Default for ScheduleGate {
    fn default() -> Self {
        Self::new(Weekday::Wed)
    }
}

impl ScheduleGate {
    pub fn new(run_day: Weekday) -> Self {
        Self { run_day }
    }

    pub fn run_day(&self) -> Weekday {
        self.run_day
    }

    /// Decides whether a run may proceed at `now`. `force` bypasses the weekday check.
    pub fn evaluate(&self, now: DateTime<Utc>, force: bool) -> GateDecision {
        if force {
            return GateDecision::Run { forced: true };
        }
        if now.weekday() == self.run_day {
            return GateDecision::Run { forced: false };
        }

        let skip = GateSkip {
            message: format!("Not {} - skipping", weekday_name(self.run_day)),
            day: now.weekday().num_days_from_sunday(),
            date: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        tracing::info!(day = skip.day, run_day = ?self.run_day, "schedule gate declined run");
        GateDecision::Skip(skip)
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// The next `hour:00` UTC strictly after `now`. Hours above 23 are clamped to 23.
pub fn next_daily_run(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let at = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or_default();
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Human-readable date used as the report caption, e.g. "Wednesday, October 14, 2026".
pub fn report_date_caption(now: DateTime<Utc>) -> String {
    now.format("%A, %B %-d, %Y").to_string()
}
