//! Route handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::Value;
use tokio::time::timeout;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};
use uuid::Uuid;

use crate::audit::{sanitize_request, AuditLevel, AuditRecord, AuditSink};
use crate::delivery::EmailSender;
use crate::error::DeliveryError;
use crate::guard::RequestGuard;
use crate::protocol::{
    declared_length, error_response, EmailCommand, InboundRequest, SendResponse,
};

/// Shared, read-only state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub guard: Arc<RequestGuard>,
    pub sender: Arc<dyn EmailSender>,
    pub sink: Arc<dyn AuditSink>,
    /// Upper bound on one call to the sender.
    pub send_timeout: Duration,
}

impl AppState {
    pub fn new(
        guard: Arc<RequestGuard>,
        sender: Arc<dyn EmailSender>,
        sink: Arc<dyn AuditSink>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            guard,
            sender,
            sink,
            send_timeout,
        }
    }
}

/// Build the gateway router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthcheck", get(healthcheck))
        .route("/send", post(send_email))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> String {
    format!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

async fn healthcheck() -> &'static str {
    "OK"
}

async fn send_email(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let inbound = read_inbound(parts.headers, body, state.guard.max_payload_bytes()).await;

    let command = match state.guard.handle(&inbound) {
        Ok(command) => command,
        Err(rejection) => return rejection.into_response(),
    };

    deliver(&state, &inbound, command).await
}

/// Buffer the body, refusing to read past `limit` bytes.
///
/// A declared `Content-Length` above the limit skips reading entirely.
async fn read_inbound(headers: HeaderMap, body: Body, limit: usize) -> InboundRequest {
    if declared_length(&headers).is_some_and(|len| len > limit as u64) {
        return InboundRequest::unread(headers);
    }

    match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => InboundRequest::new(headers, bytes),
        Err(e) => {
            debug!(error = %e, limit, "Request body not read");
            InboundRequest::unread(headers)
        }
    }
}

/// Caller-facing messages for delivery failures. Internal detail stays in
/// the audit record.
const PROVIDER_REJECTED_MESSAGE: &str = "Email provider rejected the message";
const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Hand a validated command to the sender and translate the outcome.
///
/// Sending and auditing run together on a detached task, so the outcome is
/// recorded exactly once even if the caller disconnects mid-send.
async fn deliver(state: &AppState, inbound: &InboundRequest, command: EmailCommand) -> Response {
    let sanitized = sanitize_request(&inbound.headers, inbound.body_if_read());
    let task = tokio::spawn(send_and_audit(
        state.clone(),
        inbound.request_id,
        command,
        sanitized,
    ));

    match task.await {
        Ok(Ok(())) => SendResponse::sent().into_response(),
        Ok(Err((status, message))) => error_response(status, message),
        Err(e) => {
            error!(request_id = %inbound.request_id, error = %e, "Delivery task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
        }
    }
}

/// Send one command and write its audit record.
async fn send_and_audit(
    state: AppState,
    request_id: Uuid,
    command: EmailCommand,
    sanitized: Value,
) -> Result<(), (StatusCode, &'static str)> {
    let err = match send_with_timeout(&state, command).await {
        Ok(message_id) => {
            state
                .sink
                .record(&AuditRecord::sent(request_id, message_id, sanitized));
            return Ok(());
        }
        Err(err) => err,
    };

    let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let level = if err.is_caller_error() {
        AuditLevel::Warn
    } else {
        AuditLevel::Error
    };
    let (code, public_message) = match &err {
        DeliveryError::Provider { .. } => ("PROVIDER_REJECTED", PROVIDER_REJECTED_MESSAGE),
        DeliveryError::Unexpected { .. } => ("DELIVERY_FAILED", INTERNAL_ERROR_MESSAGE),
    };

    let record = AuditRecord::delivery_failure(
        level,
        request_id,
        status.as_u16(),
        code,
        public_message,
        sanitized,
    )
    .with_detail(state.guard.redact_detail(&err.to_string()));
    state.sink.record(&record);

    Err((status, public_message))
}

/// Run the sender on its own task so a panic surfaces as an unexpected
/// failure, and abort it once the timeout elapses.
async fn send_with_timeout(state: &AppState, command: EmailCommand) -> Result<String, DeliveryError> {
    let sender = Arc::clone(&state.sender);
    let mut task = tokio::spawn(async move { sender.send(command).await });

    match timeout(state.send_timeout, &mut task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(DeliveryError::Unexpected {
            message: format!("sender task failed: {}", join_error),
        }),
        Err(_) => {
            task.abort();
            Err(DeliveryError::Unexpected {
                message: format!(
                    "send timed out after {}ms",
                    state.send_timeout.as_millis()
                ),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::header::CONTENT_LENGTH;
    use axum::http::{HeaderValue, Request as HttpRequest};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_read_inbound_within_limit() {
        let inbound = read_inbound(HeaderMap::new(), Body::from("hello"), 16).await;
        assert!(inbound.body_read);
        assert_eq!(inbound.body.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn test_read_inbound_stops_at_limit() {
        let inbound = read_inbound(HeaderMap::new(), Body::from("x".repeat(32)), 16).await;
        assert!(!inbound.body_read);
        assert!(inbound.body.is_empty());
    }

    #[tokio::test]
    async fn test_read_inbound_trusts_oversized_declaration() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from(1_000_000u64));
        let inbound = read_inbound(headers, Body::from("small"), 16).await;
        assert!(!inbound.body_read);
    }

    #[tokio::test]
    async fn test_healthcheck_and_index() {
        use crate::audit::NullAuditSink;
        use crate::auth::{SharedSecret, SystemClock};
        use crate::delivery::LogEmailSender;
        use crate::guard::GuardConfig;

        let guard = RequestGuard::new(
            &SharedSecret::new("s"),
            GuardConfig {
                max_payload_bytes: 1024,
                default_sender: "a@b.c".to_string(),
            },
            Arc::new(SystemClock),
            Arc::new(NullAuditSink),
        );
        let state = AppState::new(
            Arc::new(guard),
            Arc::new(LogEmailSender::new()),
            Arc::new(NullAuditSink),
            Duration::from_secs(1),
        );
        let app = router(state);

        let response = app
            .clone()
            .oneshot(HttpRequest::get("/healthcheck").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(body.as_ref(), b"OK");

        let response = app
            .oneshot(HttpRequest::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        assert!(String::from_utf8_lossy(&body).starts_with("mailgate v"));
    }
}
