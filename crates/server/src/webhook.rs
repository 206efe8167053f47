use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use galley_core::pipeline::{ReportPipeline, RequestOutcome};
use galley_slack::blocks::{self, ResponseMessage};
use galley_slack::client::SlackClient;
use galley_slack::commands::{parse_report_command, SlashCommandPayload};
use galley_slack::delivery::DeliverReport;
use galley_slack::signature;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ReportPipeline>,
    pub delivery: Arc<dyn DeliverReport>,
    pub slack: Arc<SlackClient>,
    pub signing_secret: SecretString,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/slack/command", post(slack_command))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Decoded `application/x-www-form-urlencoded` slash-command body. Slack
/// sends more fields than these; the rest are ignored.
#[derive(Debug, Deserialize)]
struct SlashForm {
    command: String,
    #[serde(default)]
    text: String,
    user_id: String,
    #[serde(default)]
    channel_id: String,
    response_url: String,
}

/// Verifies the request, acknowledges immediately, and hands the real work
/// to a background task so Slack's 3-second reply window is never at risk.
async fn slack_command(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let timestamp = header_value(&headers, "x-slack-request-timestamp");
    let provided = header_value(&headers, "x-slack-signature");

    if let Err(error) = signature::verify(
        &state.signing_secret,
        &timestamp,
        &body,
        &provided,
        Utc::now().timestamp(),
    ) {
        warn!(error = %error, "rejected slash command with bad signature");
        return (StatusCode::FORBIDDEN, Json(json!({ "text": "Unauthorized request" })))
            .into_response();
    }

    let form: SlashForm = match serde_urlencoded::from_bytes(&body) {
        Ok(form) => form,
        Err(error) => {
            warn!(error = %error, "rejected malformed slash command body");
            return (StatusCode::BAD_REQUEST, Json(json!({ "text": "Malformed request" })))
                .into_response();
        }
    };

    let payload = SlashCommandPayload {
        command: form.command,
        text: form.text,
        user_id: form.user_id,
        channel_id: form.channel_id,
        response_url: form.response_url,
        request_id: Uuid::new_v4().to_string(),
    };

    info!(
        request_id = %payload.request_id,
        user_id = %payload.user_id,
        "slash command accepted"
    );
    tokio::spawn(process_command(state, payload));

    Json(blocks::ack_message()).into_response()
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers.get(name).and_then(|value| value.to_str().ok()).unwrap_or_default().to_owned()
}

/// Runs the pipeline for one invocation and reports the outcome back through
/// the `response_url` (and a DM upload on success).
async fn process_command(state: AppState, payload: SlashCommandPayload) {
    let message = outcome_message(&state, &payload).await;
    post_outcome(&state, &payload, message).await;
}

async fn outcome_message(state: &AppState, payload: &SlashCommandPayload) -> ResponseMessage {
    let command = match parse_report_command(payload) {
        Ok(command) => command,
        Err(error) => {
            warn!(request_id = %payload.request_id, error = %error, "unsupported command");
            return blocks::unsupported_command_message(&payload.command);
        }
    };

    match state.pipeline.run(&command.raw_date).await {
        RequestOutcome::Success(report) => {
            match state.delivery.deliver(&payload.user_id, &report).await {
                Ok(()) => blocks::report_sent_message(),
                Err(error) => {
                    warn!(
                        request_id = %payload.request_id,
                        user_id = %payload.user_id,
                        error = %error,
                        "report delivery failed"
                    );
                    blocks::delivery_failed_message()
                }
            }
        }
        RequestOutcome::Empty(range) => blocks::empty_result_message(&range),
        RequestOutcome::Failed(error) => {
            info!(request_id = %payload.request_id, error = %error, "request failed");
            blocks::error_message(&error)
        }
    }
}

async fn post_outcome(state: &AppState, payload: &SlashCommandPayload, message: ResponseMessage) {
    let value = match serde_json::to_value(&message) {
        Ok(value) => value,
        Err(error) => {
            warn!(request_id = %payload.request_id, error = %error, "could not encode reply");
            return;
        }
    };
    if let Err(error) = state.slack.post_response(&payload.response_url, &value).await {
        warn!(
            request_id = %payload.request_id,
            error = %error,
            "could not post outcome to response_url"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use galley_core::daterange::DateRangeValidator;
    use galley_core::domain::{DateRange, OrderItem, RawMessage, ReportPayload};
    use galley_core::errors::FetchError;
    use galley_core::pipeline::{
        HistoryFetcher, OrderExtractor, PipelineLimits, ReportPipeline,
    };
    use galley_core::report::XlsxReportRenderer;
    use galley_slack::client::SlackClient;
    use galley_slack::delivery::{DeliverReport, DeliveryError};
    use galley_slack::signature;
    use secrecy::SecretString;
    use tower::util::ServiceExt;

    use super::{router, AppState};

    struct EmptyFetcher;

    #[async_trait]
    impl HistoryFetcher for EmptyFetcher {
        async fn fetch(&self, _range: &DateRange) -> Result<Vec<RawMessage>, FetchError> {
            Ok(Vec::new())
        }
    }

    struct NoopExtractor;

    #[async_trait]
    impl OrderExtractor for NoopExtractor {
        async fn extract(&self, _message: RawMessage) -> Vec<OrderItem> {
            Vec::new()
        }
    }

    struct NoopDelivery;

    #[async_trait]
    impl DeliverReport for NoopDelivery {
        async fn deliver(
            &self,
            _user_id: &str,
            _payload: &ReportPayload,
        ) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    fn signing_secret() -> SecretString {
        String::from("test-signing-secret").into()
    }

    fn state() -> AppState {
        let pipeline = ReportPipeline::new(
            DateRangeValidator::default(),
            Arc::new(EmptyFetcher),
            Arc::new(NoopExtractor),
            Arc::new(XlsxReportRenderer),
            PipelineLimits { extract_concurrency: 1, deadline: Duration::from_secs(5) },
        );
        let slack = SlackClient::new(String::from("xoxb-test").into(), Duration::from_secs(1))
            .expect("client builds");

        AppState {
            pipeline: Arc::new(pipeline),
            delivery: Arc::new(NoopDelivery),
            slack: Arc::new(slack),
            signing_secret: signing_secret(),
        }
    }

    #[tokio::test]
    async fn unsupported_commands_get_a_reply_not_silence() {
        let payload = galley_slack::commands::SlashCommandPayload {
            command: "/weather".to_owned(),
            text: String::new(),
            user_id: "U123".to_owned(),
            channel_id: "C123".to_owned(),
            response_url: "https://hooks.slack.test/respond".to_owned(),
            request_id: "req-1".to_owned(),
        };
        let message = super::outcome_message(&state(), &payload).await;
        assert!(message.text.contains("/shopping-list"));
    }

    #[tokio::test]
    async fn healthz_responds_ok() {
        let response = router(state())
            .oneshot(Request::get("/healthz").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unsigned_commands_are_rejected() {
        let response = router(state())
            .oneshot(
                Request::post("/slack/command")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from("command=%2Fshopping-list&text=08%2F23%2F2026"))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn signed_commands_are_acknowledged_immediately() {
        let body =
            "command=%2Fshopping-list&text=08%2F23%2F2026&user_id=U123&channel_id=C123\
             &response_url=https%3A%2F%2Fhooks.slack.test%2Frespond";
        let timestamp = Utc::now().timestamp().to_string();
        let header =
            format!("v0={}", signature::sign(&signing_secret(), &timestamp, body.as_bytes()));

        let response = router(state())
            .oneshot(
                Request::post("/slack/command")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .header("x-slack-request-timestamp", timestamp)
                    .header("x-slack-signature", header)
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("body bytes");
        let text = String::from_utf8(bytes.to_vec()).expect("utf8 body");
        assert!(text.contains("Processing your request"));
    }
}
