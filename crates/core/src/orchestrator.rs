//! The scheduled batch pipeline: gate, fetch every tour, render, deliver.

use crate::config::{BatchCredentials, CoreConfig, FailurePolicy};
use crate::constants::DEFAULT_RUN_BUDGET;
use crate::delivery::{report_subject, Mailer, ResendMailer};
use crate::dispatch::{Dispatcher, HttpBackend};
use crate::error::{RunError, RunResult, TourFailure};
use crate::fetch::PredictionFetcher;
use crate::record::StructuredRecord;
use crate::render::{CompositeReport, ReportMeta, ReportRenderer, ReportSection};
use crate::schedule::{report_date_caption, GateDecision, GateSkip, ScheduleGate};
use crate::tour::{PredictionRequest, Tour};
use chrono::{DateTime, Datelike, Utc};
use std::sync::Arc;
use std::time::Duration;

/// A rendered report plus the tours that were left out of it.
#[derive(Debug, Clone)]
pub struct BuiltReport {
    pub report: CompositeReport,
    pub failures: Vec<TourFailure>,
}

/// Summary of a delivered run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub date: String,
    pub sections: usize,
    pub failures: Vec<TourFailure>,
    pub delivery_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Skipped(GateSkip),
    Delivered(RunSummary),
}

/// Fetches each tour in order and renders the results.
#[derive(Clone)]
pub struct ReportBuilder {
    fetcher: PredictionFetcher,
    renderer: ReportRenderer,
    tours: Vec<Tour>,
    policy: FailurePolicy,
}

impl ReportBuilder {
    pub fn new(fetcher: PredictionFetcher, tours: Vec<Tour>, policy: FailurePolicy) -> Self {
        Self {
            fetcher,
            renderer: ReportRenderer::new(),
            tours,
            policy,
        }
    }

    /// Fetches sequentially so sections keep tour order.
    ///
    /// # Errors
    ///
    /// Under `AbortOnFirst`, the first failed tour ends the build with `RunError::Fetch`.
    /// Under `BestEffort`, the build fails with `RunError::AllToursFailed` only when no tour
    /// produced a record.
    pub async fn build(&self, now: DateTime<Utc>) -> RunResult<BuiltReport> {
        let caption = report_date_caption(now);
        let mut records: Vec<(Tour, StructuredRecord)> = Vec::with_capacity(self.tours.len());
        let mut failures = Vec::new();

        for &tour in &self.tours {
            let request = PredictionRequest::for_tour(tour, caption.clone());
            match self.fetcher.fetch(&request).await {
                Ok(record) => records.push((tour, record)),
                Err(source) => match self.policy {
                    FailurePolicy::AbortOnFirst => {
                        tracing::error!(%tour, error = %source, "tour fetch failed, aborting run");
                        return Err(RunError::Fetch { tour, source });
                    }
                    FailurePolicy::BestEffort => {
                        tracing::warn!(%tour, error = %source, "tour fetch failed, continuing");
                        failures.push(TourFailure {
                            tour,
                            error: source.to_string(),
                        });
                    }
                },
            }
        }

        if records.is_empty() && !failures.is_empty() {
            return Err(RunError::AllToursFailed(failures));
        }

        let sections: Vec<ReportSection<'_>> = records
            .iter()
            .map(|(tour, record)| ReportSection {
                record: Some(record),
                caption: tour.caption(),
            })
            .collect();
        let meta = ReportMeta {
            caption,
            footer_year: now.year(),
        };
        let report = self.renderer.render(&sections, &meta);
        Ok(BuiltReport { report, failures })
    }
}

/// Runs the whole weekly pipeline.
///
/// Fetch and delivery together are bounded by `budget`, so a backend that never answers
/// cannot hold a run (or the scheduler loop driving it) open indefinitely.
#[derive(Clone)]
pub struct RunOrchestrator {
    gate: ScheduleGate,
    builder: ReportBuilder,
    mailer: Arc<dyn Mailer>,
    budget: Duration,
}

impl RunOrchestrator {
    pub fn new(gate: ScheduleGate, builder: ReportBuilder, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            gate,
            builder,
            mailer,
            budget: DEFAULT_RUN_BUDGET,
        }
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// Wires the production backend and mailer from resolved configuration.
    pub fn from_credentials(cfg: &CoreConfig, credentials: &BatchCredentials) -> Self {
        let dispatcher = Dispatcher::new(Arc::new(HttpBackend::new(cfg.messages_url())));
        let fetcher = PredictionFetcher::new(
            dispatcher,
            credentials.anthropic_api_key.clone(),
            cfg.model(),
            cfg.fetch_timeout(),
        );
        let builder = ReportBuilder::new(fetcher, cfg.tours().to_vec(), cfg.failure_policy());
        Self::new(
            ScheduleGate::new(cfg.run_day()),
            builder,
            Arc::new(ResendMailer::from_config(&credentials.delivery)),
        )
        .with_budget(cfg.run_budget())
    }

    pub fn gate(&self) -> &ScheduleGate {
        &self.gate
    }

    /// Fetches and renders without consulting the gate or delivering.
    pub async fn build_report(&self, now: DateTime<Utc>) -> RunResult<BuiltReport> {
        self.builder.build(now).await
    }

    /// Runs the pipeline once. A gate skip is a successful outcome, not an error.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the run, or `RunError::TimedOut` once the budget elapses.
    pub async fn run(&self, now: DateTime<Utc>, force: bool) -> RunResult<RunOutcome> {
        match self.gate.evaluate(now, force) {
            GateDecision::Skip(skip) => return Ok(RunOutcome::Skipped(skip)),
            GateDecision::Run { forced } => {
                tracing::info!(forced, "starting prediction run");
            }
        }

        match tokio::time::timeout(self.budget, self.build_and_deliver(now)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(budget_secs = self.budget.as_secs(), "prediction run timed out");
                Err(RunError::TimedOut(self.budget))
            }
        }
    }

    async fn build_and_deliver(&self, now: DateTime<Utc>) -> RunResult<RunOutcome> {
        let BuiltReport { report, failures } = self.builder.build(now).await?;
        let subject = report_subject(&report.caption);
        let receipt = self.mailer.deliver(&report, &subject).await?;

        tracing::info!(
            sections = report.sections,
            failures = failures.len(),
            "prediction run delivered"
        );
        Ok(RunOutcome::Delivered(RunSummary {
            date: report.caption,
            sections: report.sections,
            failures,
            delivery_id: receipt.id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryReceipt;
    use crate::dispatch::{Backend, BackendReply, MessagesRequest};
    use crate::error::{DeliveryError, FetchError, SendError};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use fairway_types::NonEmptyText;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers per tour, chosen by the tour name in the prompt.
    struct ScriptedBackend {
        pga: BackendReply,
        dp: BackendReply,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Backend for ScriptedBackend {
        async fn send(&self, _: &str, request: &MessagesRequest) -> Result<BackendReply, SendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let prompt = request.messages[0].content.as_str().unwrap_or_default();
            if prompt.contains("PGA Tour this week") {
                Ok(self.pga.clone())
            } else {
                Ok(self.dp.clone())
            }
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, CompositeReport)>>,
        reject: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn deliver(
            &self,
            report: &CompositeReport,
            subject: &str,
        ) -> Result<DeliveryReceipt, DeliveryError> {
            if self.reject {
                return Err(DeliveryError::Rejected {
                    status: 403,
                    body: "domain not verified".into(),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push((subject.to_owned(), report.clone()));
            Ok(DeliveryReceipt {
                id: Some("email_1".into()),
                body: json!({"id": "email_1"}),
            })
        }
    }

    fn ok_reply(tournament: &str) -> BackendReply {
        let text = format!(
            "```json\n{{\"tournament\":\"{tournament}\",\"valuePicks\":[{{\"rank\":1,\"player\":\"A\",\"odds\":\"25/1\"}}]}}\n```"
        );
        BackendReply {
            status: 200,
            body: json!({"content": [{"type": "text", "text": text}]}).to_string(),
        }
    }

    fn prose_reply() -> BackendReply {
        BackendReply {
            status: 200,
            body: json!({"content": [{"type": "text", "text": "No event this week."}]}).to_string(),
        }
    }

    fn orchestrator(
        pga: BackendReply,
        dp: BackendReply,
        policy: FailurePolicy,
        mailer: Arc<RecordingMailer>,
    ) -> (RunOrchestrator, Arc<ScriptedBackend>) {
        let backend = Arc::new(ScriptedBackend {
            pga,
            dp,
            calls: AtomicUsize::new(0),
        });
        let fetcher = PredictionFetcher::new(
            Dispatcher::new(backend.clone()),
            NonEmptyText::new("sk").unwrap(),
            "m",
            None,
        );
        let builder = ReportBuilder::new(fetcher, vec![Tour::Pga, Tour::DpWorld], policy);
        (
            RunOrchestrator::new(ScheduleGate::default(), builder, mailer),
            backend,
        )
    }

    fn wednesday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 8, 0, 0).unwrap()
    }

    fn friday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn gate_skip_dispatches_nothing() {
        let mailer = Arc::new(RecordingMailer::default());
        let (orch, backend) = orchestrator(
            ok_reply("A"),
            ok_reply("B"),
            FailurePolicy::AbortOnFirst,
            mailer.clone(),
        );

        let outcome = orch.run(friday(), false).await.unwrap();
        assert!(matches!(outcome, RunOutcome::Skipped(ref skip) if skip.day == 5));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn forced_run_delivers_sections_in_tour_order() {
        let mailer = Arc::new(RecordingMailer::default());
        let (orch, backend) = orchestrator(
            ok_reply("Travelers"),
            ok_reply("Dunhill"),
            FailurePolicy::AbortOnFirst,
            mailer.clone(),
        );

        let RunOutcome::Delivered(summary) = orch.run(friday(), true).await.unwrap() else {
            panic!("expected delivery");
        };
        assert_eq!(summary.sections, 2);
        assert_eq!(summary.date, "Friday, October 16, 2026");
        assert_eq!(summary.delivery_id.as_deref(), Some("email_1"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);

        let sent = mailer.sent.lock().unwrap();
        let (subject, report) = &sent[0];
        assert_eq!(subject, "⛳ Golf AI Weekly Predictions - Friday, October 16, 2026");
        let pga = report.html.find("Travelers").unwrap();
        let dp = report.html.find("Dunhill").unwrap();
        assert!(pga < dp);
    }

    #[tokio::test]
    async fn abort_policy_stops_at_first_failure() {
        let mailer = Arc::new(RecordingMailer::default());
        let (orch, backend) = orchestrator(
            prose_reply(),
            ok_reply("Dunhill"),
            FailurePolicy::AbortOnFirst,
            mailer.clone(),
        );

        let err = orch.run(wednesday(), false).await.unwrap_err();
        assert!(matches!(
            err,
            RunError::Fetch {
                tour: Tour::Pga,
                source: FetchError::Extraction(_)
            }
        ));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn best_effort_delivers_partial_report() {
        let mailer = Arc::new(RecordingMailer::default());
        let (orch, _) = orchestrator(
            prose_reply(),
            ok_reply("Dunhill"),
            FailurePolicy::BestEffort,
            mailer.clone(),
        );

        let RunOutcome::Delivered(summary) = orch.run(wednesday(), false).await.unwrap() else {
            panic!("expected delivery");
        };
        assert_eq!(summary.sections, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].tour, Tour::Pga);
        assert!(!mailer.sent.lock().unwrap()[0].1.html.contains("<h2>🇺🇸 PGA Tour</h2>"));
    }

    #[tokio::test]
    async fn best_effort_fails_when_every_tour_fails() {
        let mailer = Arc::new(RecordingMailer::default());
        let (orch, _) = orchestrator(
            prose_reply(),
            prose_reply(),
            FailurePolicy::BestEffort,
            mailer.clone(),
        );

        let err = orch.run(wednesday(), false).await.unwrap_err();
        match err {
            RunError::AllToursFailed(failures) => assert_eq!(failures.len(), 2),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delivery_rejection_fails_the_run() {
        let mailer = Arc::new(RecordingMailer {
            reject: true,
            ..Default::default()
        });
        let (orch, _) = orchestrator(
            ok_reply("A"),
            ok_reply("B"),
            FailurePolicy::AbortOnFirst,
            mailer,
        );

        let err = orch.run(wednesday(), false).await.unwrap_err();
        assert!(matches!(
            err,
            RunError::Delivery(DeliveryError::Rejected { status: 403, .. })
        ));
    }

    #[tokio::test]
    async fn build_report_skips_gate_and_delivery() {
        let mailer = Arc::new(RecordingMailer::default());
        let (orch, backend) = orchestrator(
            ok_reply("A"),
            ok_reply("B"),
            FailurePolicy::AbortOnFirst,
            mailer.clone(),
        );

        let built = orch.build_report(friday()).await.unwrap();
        assert_eq!(built.report.sections, 2);
        assert!(built.report.html.contains("© 2026 Golf AI Predictions"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    struct HangingBackend;

    #[async_trait]
    impl Backend for HangingBackend {
        async fn send(&self, _: &str, _: &MessagesRequest) -> Result<BackendReply, SendError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_fetch_is_bounded_by_run_budget() {
        let mailer = Arc::new(RecordingMailer::default());
        let fetcher = PredictionFetcher::new(
            Dispatcher::new(Arc::new(HangingBackend)),
            NonEmptyText::new("sk").unwrap(),
            "m",
            None,
        );
        let builder = ReportBuilder::new(fetcher, vec![Tour::Pga], FailurePolicy::AbortOnFirst);
        let orch = RunOrchestrator::new(ScheduleGate::default(), builder, mailer.clone())
            .with_budget(Duration::from_secs(600));

        let started = tokio::time::Instant::now();
        let err = orch.run(wednesday(), false).await.unwrap_err();
        assert!(matches!(err, RunError::TimedOut(budget) if budget == Duration::from_secs(600)));
        assert!(started.elapsed() >= Duration::from_secs(600));
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn production_wiring_uses_configured_budget() {
        let cfg = CoreConfig::default().with_run_budget(Duration::from_secs(42));
        let creds = BatchCredentials::from_lookup(|name| match name {
            "ANTHROPIC_API_KEY" => Some("sk".into()),
            "RESEND_API_KEY" => Some("re".into()),
            "EMAIL_RECIPIENTS" => Some("a@x.com".into()),
            _ => None,
        })
        .unwrap();
        let orch = RunOrchestrator::from_credentials(&cfg, &creds);
        assert_eq!(orch.budget, Duration::from_secs(42));
    }
}
