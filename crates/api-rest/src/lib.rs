//! # API REST
//!
//! REST API implementation for Fairway.
//!
//! Handles:
//! - The backend proxy endpoint (`/api/claude`)
//! - The scheduled batch endpoint (`/api/scheduled-predictions`)
//! - Health and the OpenAPI document
//! - REST-specific concerns (JSON framing, CORS, status mapping)
//!
//! Both endpoints are also mounted under `/.netlify/functions/` so existing callers keep working.
//!
//! Uses `api-shared` for wire types.

#![warn(rust_2018_idioms)]

use api_shared::{
    auth::require_api_key, ChatMessage, ErrorRes, HealthRes, HealthService, InternalErrorRes,
    ProxyReq, RunRes, SkipRes, TimeoutRes, TourFailureRes, UpstreamErrorRes,
};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{any, get},
    Router,
};
use chrono::{DateTime, Utc};
use fairway_core::{
    constants::PROXY_MAX_TOKENS,
    dispatch::upstream_error_message,
    BatchCredentials, ConfigError, CoreConfig, DispatchError, DispatchOutcome, Dispatcher,
    GateDecision, GateSkip, HttpBackend, Message, MessagesRequest, RunError, RunOrchestrator,
    RunOutcome, RunSummary, ScheduleGate,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

/// Application state for the REST API server.
///
/// The batch orchestrator is optional: when batch credentials are missing the proxy keeps
/// working and the batch endpoint reports the configuration error.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<CoreConfig>,
    pub dispatcher: Dispatcher,
    pub batch: Result<Arc<RunOrchestrator>, ConfigError>,
    pub clock: fn() -> DateTime<Utc>,
}

impl AppState {
    /// Wires the production backend, and the batch pipeline when its credentials resolved.
    pub fn from_config(
        cfg: CoreConfig,
        credentials: Result<BatchCredentials, ConfigError>,
    ) -> Self {
        let dispatcher = Dispatcher::new(Arc::new(HttpBackend::new(cfg.messages_url())));
        let batch = credentials
            .map(|creds| Arc::new(RunOrchestrator::from_credentials(&cfg, &creds)));
        if let Err(e) = &batch {
            tracing::warn!("batch endpoint disabled: {e}");
        }
        Self {
            cfg: Arc::new(cfg),
            dispatcher,
            batch,
            clock: Utc::now,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, claude_proxy, scheduled_predictions),
    components(schemas(
        HealthRes,
        ChatMessage,
        ProxyReq,
        ErrorRes,
        TimeoutRes,
        UpstreamErrorRes,
        InternalErrorRes,
        SkipRes,
        RunRes,
        TourFailureRes,
    ))
)]
pub struct ApiDoc;

/// Builds the router with CORS applied to every route.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([header::CONTENT_TYPE])
        .allow_methods([Method::POST, Method::OPTIONS]);

    Router::new()
        .route("/health", get(health))
        .route("/api/claude", any(claude_proxy))
        .route("/.netlify/functions/claude", any(claude_proxy))
        .route(
            "/api/scheduled-predictions",
            get(scheduled_predictions).post(scheduled_predictions),
        )
        .route(
            "/.netlify/functions/scheduled-predictions",
            get(scheduled_predictions).post(scheduled_predictions),
        )
        .route("/api-docs/openapi.json", get(openapi))
        .layer(cors)
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// 500 response carrying the error message and its debug/source-chain rendering.
fn internal_error<E>(err: E) -> Response
where
    E: std::error::Error + Send + Sync + 'static,
{
    let error = err.to_string();
    let stack = format!("{:?}", anyhow::Error::new(err));
    tracing::error!("request failed: {stack}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(InternalErrorRes { error, stack }),
    )
        .into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorRes {
            error: message.into(),
        }),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/api/claude",
    request_body = ProxyReq,
    responses(
        (status = 200, description = "Backend response, passed through verbatim"),
        (status = 400, description = "API key missing", body = ErrorRes),
        (status = 405, description = "Method not allowed", body = ErrorRes),
        (status = 500, description = "Malformed body or transport failure", body = InternalErrorRes),
        (status = 504, description = "Backend did not answer in time", body = TimeoutRes)
    )
)]
/// Forwards one Messages API call under the proxy deadline.
///
/// Any method is routed here so that non-POST requests get a JSON 405 rather than axum's
/// default empty body. The body is parsed by hand so that malformed JSON maps to 500.
#[axum::debug_handler]
async fn claude_proxy(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    if method != Method::POST {
        return error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    }

    let req: ProxyReq = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => return internal_error(e),
    };

    let api_key = match require_api_key(req.api_key.as_deref()) {
        Ok(key) => key,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let messages = req
        .messages
        .into_iter()
        .map(|m| Message {
            role: m.role,
            content: m.content,
        })
        .collect();
    let request = MessagesRequest::new(
        state.cfg.model(),
        req.max_tokens.filter(|n| *n > 0).unwrap_or(PROXY_MAX_TOKENS),
        messages,
    )
    .with_web_search(req.tools.as_ref().is_some_and(|t| !t.is_empty()));

    let outcome = state
        .dispatcher
        .dispatch(api_key.as_str(), &request, Some(state.cfg.proxy_timeout()))
        .await;

    match outcome {
        DispatchOutcome::Success(response) => Json(response.into_body()).into_response(),
        DispatchOutcome::Timeout => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(TimeoutRes::after_secs(state.cfg.proxy_timeout().as_secs())),
        )
            .into_response(),
        DispatchOutcome::UpstreamError { status, detail } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            let error = upstream_error_message(&detail).to_owned();
            (status, Json(UpstreamErrorRes { error, details: detail })).into_response()
        }
        DispatchOutcome::TransportError(detail) => internal_error(DispatchError::Transport(detail)),
    }
}

#[derive(Debug, Deserialize)]
struct ScheduledParams {
    force: Option<String>,
}

fn skip_response(skip: GateSkip) -> Response {
    Json(SkipRes {
        message: skip.message,
        day: skip.day,
        date: skip.date,
    })
    .into_response()
}

fn run_response(summary: RunSummary) -> Response {
    Json(RunRes {
        success: true,
        message: "Predictions email sent successfully".into(),
        date: summary.date,
        sections: summary.sections,
        failures: summary
            .failures
            .into_iter()
            .map(|f| TourFailureRes {
                tour: f.tour.to_string(),
                error: f.error,
            })
            .collect(),
    })
    .into_response()
}

#[utoipa::path(
    get,
    path = "/api/scheduled-predictions",
    params(
        ("force" = Option<String>, Query, description = "Any non-empty value bypasses the weekday check")
    ),
    responses(
        (status = 200, description = "Run skipped by the weekday gate", body = SkipRes),
        (status = 200, description = "Report delivered", body = RunRes),
        (status = 500, description = "Run failed or batch not configured", body = InternalErrorRes)
    )
)]
/// Runs the weekly pipeline once.
#[axum::debug_handler]
async fn scheduled_predictions(
    State(state): State<AppState>,
    Query(params): Query<ScheduledParams>,
) -> Response {
    let force = params.force.is_some_and(|f| !f.is_empty());
    let now = (state.clock)();

    let orchestrator = match &state.batch {
        Ok(orchestrator) => orchestrator.clone(),
        Err(e) => {
            // A skip is still reported on off days so the daily trigger stays quiet.
            if let GateDecision::Skip(skip) = ScheduleGate::new(state.cfg.run_day()).evaluate(now, force) {
                return skip_response(skip);
            }
            return internal_error(RunError::Configuration(e.clone()));
        }
    };

    match orchestrator.run(now, force).await {
        Ok(RunOutcome::Skipped(skip)) => skip_response(skip),
        Ok(RunOutcome::Delivered(summary)) => run_response(summary),
        Err(e) => internal_error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::TimeZone;
    use fairway_core::delivery::DeliveryReceipt;
    use fairway_core::dispatch::{Backend, BackendReply};
    use fairway_core::error::{DeliveryError, SendError};
    use fairway_core::render::CompositeReport;
    use fairway_core::{FailurePolicy, Mailer, PredictionFetcher, ReportBuilder, Tour};
    use fairway_types::NonEmptyText;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use std::time::Duration;
    use tower::ServiceExt;

    struct FixedBackend {
        reply: BackendReply,
        seen: Mutex<Vec<(String, MessagesRequest)>>,
    }

    #[async_trait]
    impl Backend for FixedBackend {
        async fn send(&self, api_key: &str, request: &MessagesRequest) -> Result<BackendReply, SendError> {
            self.seen
                .lock()
                .unwrap()
                .push((api_key.to_owned(), request.clone()));
            Ok(self.reply.clone())
        }
    }

    struct HangingBackend;

    #[async_trait]
    impl Backend for HangingBackend {
        async fn send(&self, _: &str, _: &MessagesRequest) -> Result<BackendReply, SendError> {
            std::future::pending().await
        }
    }

    struct AcceptingMailer;

    #[async_trait]
    impl Mailer for AcceptingMailer {
        async fn deliver(&self, _: &CompositeReport, _: &str) -> Result<DeliveryReceipt, DeliveryError> {
            Ok(DeliveryReceipt {
                id: Some("email_1".into()),
                body: json!({"id": "email_1"}),
            })
        }
    }

    fn friday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap()
    }

    fn fixed(status: u16, body: Value) -> Arc<FixedBackend> {
        Arc::new(FixedBackend {
            reply: BackendReply {
                status,
                body: body.to_string(),
            },
            seen: Mutex::new(Vec::new()),
        })
    }

    fn state_with(backend: Arc<dyn Backend>) -> AppState {
        AppState {
            cfg: Arc::new(CoreConfig::default().with_proxy_timeout(Duration::from_secs(90))),
            dispatcher: Dispatcher::new(backend),
            batch: Err(ConfigError::MissingVar("ANTHROPIC_API_KEY")),
            clock: friday,
        }
    }

    fn with_batch(mut state: AppState, backend: Arc<dyn Backend>) -> AppState {
        let fetcher = PredictionFetcher::new(
            Dispatcher::new(backend),
            NonEmptyText::new("sk").unwrap(),
            "m",
            None,
        );
        let builder = ReportBuilder::new(fetcher, vec![Tour::Pga], FailurePolicy::AbortOnFirst);
        state.batch = Ok(Arc::new(RunOrchestrator::new(
            ScheduleGate::default(),
            builder,
            Arc::new(AcceptingMailer),
        )));
        state
    }

    async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn json_of(bytes: &Bytes) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_alive() {
        let req = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = send(state_with(fixed(200, json!({}))), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["ok"], true);
    }

    #[tokio::test]
    async fn openapi_lists_endpoints() {
        let req = Request::get("/api-docs/openapi.json").body(Body::empty()).unwrap();
        let (status, body) = send(state_with(fixed(200, json!({}))), req).await;
        assert_eq!(status, StatusCode::OK);
        let doc = json_of(&body);
        assert!(doc["paths"].get("/api/claude").is_some());
        assert!(doc["paths"].get("/api/scheduled-predictions").is_some());
    }

    #[tokio::test]
    async fn options_returns_empty_ok_with_cors_headers() {
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/claude")
            .header(header::ORIGIN, "https://example.com")
            .body(Body::empty())
            .unwrap();
        let response = router(state_with(fixed(200, json!({})))).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn non_post_is_rejected() {
        let backend = fixed(200, json!({}));
        let req = Request::get("/api/claude").body(Body::empty()).unwrap();
        let (status, body) = send(state_with(backend.clone()), req).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json_of(&body), json!({"error": "Method not allowed"}));
        assert!(backend.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_api_key_is_bad_request() {
        let backend = fixed(200, json!({}));
        let req = post_json("/api/claude", json!({"messages": []}));
        let (status, body) = send(state_with(backend.clone()), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&body), json!({"error": "API key is required"}));
        assert!(backend.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_internal_error_with_stack() {
        let req = Request::post("/api/claude")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(state_with(fixed(200, json!({}))), req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_of(&body);
        assert!(body["error"].as_str().unwrap().contains("key must be a string"));
        assert!(body["stack"].is_string());
    }

    #[tokio::test]
    async fn success_passes_backend_body_through() {
        let upstream = json!({"id": "msg_1", "content": [{"type": "text", "text": "hi"}]});
        let backend = fixed(200, upstream.clone());
        let req = post_json(
            "/.netlify/functions/claude",
            json!({
                "api_key": "sk-ant",
                "messages": [{"role": "user", "content": "hi"}],
                "tools": [{"type": "custom", "name": "shell"}]
            }),
        );
        let (status, body) = send(state_with(backend.clone()), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body), upstream);

        let seen = backend.seen.lock().unwrap();
        let (key, request) = &seen[0];
        assert_eq!(key, "sk-ant");
        assert_eq!(request.max_tokens, PROXY_MAX_TOKENS);
        assert_eq!(
            serde_json::to_value(&request.tools).unwrap(),
            json!([{"type": "web_search_20250305", "name": "web_search"}])
        );
    }

    #[tokio::test]
    async fn empty_tools_and_zero_max_tokens_use_defaults() {
        let backend = fixed(200, json!({"id": "msg_1"}));
        let req = post_json(
            "/api/claude",
            json!({"api_key": "sk", "messages": [], "tools": [], "max_tokens": 0}),
        );
        let (status, _) = send(state_with(backend.clone()), req).await;
        assert_eq!(status, StatusCode::OK);

        let seen = backend.seen.lock().unwrap();
        let (_, request) = &seen[0];
        assert_eq!(request.max_tokens, PROXY_MAX_TOKENS);
        let wire = serde_json::to_value(request).unwrap();
        assert!(wire.get("tools").is_none());
    }

    #[tokio::test]
    async fn upstream_error_keeps_status_and_details() {
        let detail = json!({"type": "error", "error": {"type": "authentication_error", "message": "invalid x-api-key"}});
        let req = post_json("/api/claude", json!({"api_key": "bad", "messages": []}));
        let (status, body) = send(state_with(fixed(401, detail.clone())), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_of(&body),
            json!({"error": "invalid x-api-key", "details": detail})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out_with_504() {
        let req = post_json("/api/claude", json!({"api_key": "sk", "messages": []}));
        let (status, body) = send(state_with(Arc::new(HangingBackend)), req).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(json_of(&body)["type"], "timeout");
    }

    #[tokio::test]
    async fn unconfigured_batch_still_skips_off_days() {
        let req = Request::get("/api/scheduled-predictions").body(Body::empty()).unwrap();
        let (status, body) = send(state_with(fixed(200, json!({}))), req).await;
        assert_eq!(status, StatusCode::OK);
        let body = json_of(&body);
        assert_eq!(body["message"], "Not Wednesday - skipping");
        assert_eq!(body["day"], 5);
    }

    #[tokio::test]
    async fn unconfigured_batch_fails_when_forced() {
        let req = Request::get("/api/scheduled-predictions?force=true")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(state_with(fixed(200, json!({}))), req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_of(&body)["error"]
            .as_str()
            .unwrap()
            .contains("ANTHROPIC_API_KEY"));
    }

    #[tokio::test]
    async fn empty_force_does_not_force() {
        let backend = fixed(200, json!({}));
        let state = with_batch(state_with(fixed(200, json!({}))), backend.clone());
        let req = Request::get("/api/scheduled-predictions?force=")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["message"], "Not Wednesday - skipping");
        assert!(backend.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn forced_run_reports_success() {
        let text = "{\"tournament\":\"Open\",\"valuePicks\":[{\"rank\":1,\"player\":\"A\"}]}";
        let backend = fixed(200, json!({"content": [{"type": "text", "text": text}]}));
        let state = with_batch(state_with(fixed(200, json!({}))), backend);
        let req = Request::post("/.netlify/functions/scheduled-predictions?force=1")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(state, req).await;
        assert_eq!(status, StatusCode::OK);
        let body = json_of(&body);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Predictions email sent successfully");
        assert_eq!(body["sections"], 1);
        assert_eq!(body["date"], "Friday, October 16, 2026");
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_batch_run_ends_with_500() {
        let state = with_batch(state_with(fixed(200, json!({}))), Arc::new(HangingBackend));
        let req = Request::get("/api/scheduled-predictions?force=1")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(state, req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_of(&body)["error"]
            .as_str()
            .unwrap()
            .contains("did not finish within"));
    }

    #[tokio::test]
    async fn failed_run_is_internal_error() {
        let backend = fixed(200, json!({"content": [{"type": "text", "text": "no data"}]}));
        let state = with_batch(state_with(fixed(200, json!({}))), backend);
        let req = Request::get("/api/scheduled-predictions?force=yes")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(state, req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_of(&body);
        assert!(body["error"].as_str().unwrap().contains("PGA Tour"));
        assert!(body["stack"].as_str().unwrap().contains("Caused by"));
    }
}
