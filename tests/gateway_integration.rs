//! Integration tests for the mail gateway.
//!
//! These tests drive the full router (body limit, guard, delivery and
//! audit) in-process with `tower::ServiceExt::oneshot`, using fake senders
//! in place of a real email provider.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tokio::sync::Notify;
use tower::ServiceExt;

use mailgate::audit::{AuditLevel, MemoryAuditSink};
use mailgate::auth::{Authenticator, FixedClock, SharedSecret};
use mailgate::delivery::EmailSender;
use mailgate::error::DeliveryError;
use mailgate::guard::{GuardConfig, RequestGuard};
use mailgate::protocol::EmailCommand;
use mailgate::server::{router, AppState};

const SECRET: &str = "integration-test-secret";
const SENDER: &str = "noreply@example.com";
const NOW: i64 = 1_700_000_000;
const MAX_PAYLOAD: usize = 4096;
const VALID_BODY: &str = r#"{"recipients":["a@x.com"],"subject":"Hi","body":"hello"}"#;

/// Records every command it is given.
#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<EmailCommand>>,
}

#[async_trait]
impl EmailSender for RecordingSender {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, command: EmailCommand) -> Result<String, DeliveryError> {
        self.sent.lock().unwrap().push(command);
        Ok("msg-1".to_string())
    }
}

/// Fails the way a broken provider connection would.
struct FailingSender;

#[async_trait]
impl EmailSender for FailingSender {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn send(&self, _command: EmailCommand) -> Result<String, DeliveryError> {
        Err(DeliveryError::Unexpected {
            message: format!("connection reset while using {}", SECRET),
        })
    }
}

struct PanickingSender;

#[async_trait]
impl EmailSender for PanickingSender {
    fn name(&self) -> &'static str {
        "panicking"
    }

    async fn send(&self, _command: EmailCommand) -> Result<String, DeliveryError> {
        panic!("provider client blew up");
    }
}

/// Never answers within the gateway's timeout.
struct SlowSender;

#[async_trait]
impl EmailSender for SlowSender {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn send(&self, _command: EmailCommand) -> Result<String, DeliveryError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("late".to_string())
    }
}

/// Signals once the send has started, then takes a while to finish.
#[derive(Default)]
struct DelayedSender {
    started: Notify,
}

#[async_trait]
impl EmailSender for DelayedSender {
    fn name(&self) -> &'static str {
        "delayed"
    }

    async fn send(&self, _command: EmailCommand) -> Result<String, DeliveryError> {
        self.started.notify_one();
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok("msg-late".to_string())
    }
}

/// Rejects every message as an unverified address.
struct UnverifiedSender;

#[async_trait]
impl EmailSender for UnverifiedSender {
    fn name(&self) -> &'static str {
        "unverified"
    }

    async fn send(&self, _command: EmailCommand) -> Result<String, DeliveryError> {
        Err(DeliveryError::Provider {
            status: 400,
            message: "Email address is not verified".to_string(),
        })
    }
}

/// Test gateway instance.
struct TestGateway {
    app: Router,
    audit: Arc<MemoryAuditSink>,
    authenticator: Authenticator,
}

impl TestGateway {
    fn start(sender: Arc<dyn EmailSender>) -> Self {
        Self::start_with_timeout(sender, Duration::from_secs(5))
    }

    fn start_with_timeout(sender: Arc<dyn EmailSender>, send_timeout: Duration) -> Self {
        let secret = SharedSecret::new(SECRET);
        let audit = Arc::new(MemoryAuditSink::new());

        let guard = RequestGuard::new(
            &secret,
            GuardConfig {
                max_payload_bytes: MAX_PAYLOAD,
                default_sender: SENDER.to_string(),
            },
            Arc::new(FixedClock::new(NOW)),
            audit.clone(),
        );
        let state = AppState::new(Arc::new(guard), sender, audit.clone(), send_timeout);

        Self {
            app: router(state),
            audit,
            authenticator: Authenticator::new(&secret),
        }
    }

    fn signed(&self, timestamp: i64, body: &str) -> Request<Body> {
        let timestamp = timestamp.to_string();
        let signature = self.authenticator.sign(&timestamp, body.as_bytes());
        Request::post("/send")
            .header("content-type", "application/json")
            .header("x-timestamp", timestamp)
            .header("x-signature", signature)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// Send a request and return the status plus the raw body text.
    async fn call(&self, request: Request<Body>) -> (StatusCode, String) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }
}

fn json(text: &str) -> Value {
    serde_json::from_str(text).unwrap()
}

#[tokio::test]
async fn test_valid_request_is_sent() {
    let sender = Arc::new(RecordingSender::default());
    let gateway = TestGateway::start(sender.clone());

    let (status, body) = gateway.call(gateway.signed(NOW, VALID_BODY)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["message"], "Email sent!");

    let sent = sender.sent.lock().unwrap();
    assert_eq!(
        *sent,
        vec![EmailCommand {
            sender: SENDER.to_string(),
            recipients: vec!["a@x.com".to_string()],
            subject: "Hi".to_string(),
            body: "hello".to_string(),
        }]
    );

    let records = gateway.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].code, "SENT");
    assert_eq!(records[0].message_id.as_deref(), Some("msg-1"));
}

#[tokio::test]
async fn test_stale_timestamp_is_forbidden() {
    let sender = Arc::new(RecordingSender::default());
    let gateway = TestGateway::start(sender.clone());

    let (status, body) = gateway.call(gateway.signed(NOW - 600, VALID_BODY)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json(&body)["code"], 403);
    assert!(sender.sent.lock().unwrap().is_empty());

    let records = gateway.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].code, "STALE_TIMESTAMP");
    assert_eq!(records[0].level, AuditLevel::Warn);
}

#[tokio::test]
async fn test_missing_subject_is_bad_request() {
    let sender = Arc::new(RecordingSender::default());
    let gateway = TestGateway::start(sender.clone());

    let request = gateway.signed(NOW, r#"{"recipients":["a@x.com"],"body":"hello"}"#);
    let (status, body) = gateway.call(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body = json(&body);
    assert_eq!(body["code"], 400);
    assert!(body["error"].as_str().unwrap().contains("subject"));
    assert!(sender.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_payload_rejected_before_auth() {
    let sender = Arc::new(RecordingSender::default());
    let gateway = TestGateway::start(sender.clone());

    let oversized = format!(
        r#"{{"recipients":["a@x.com"],"subject":"Hi","body":"{}"}}"#,
        "x".repeat(MAX_PAYLOAD)
    );
    let request = Request::post("/send")
        .header("content-type", "application/json")
        .header("content-length", oversized.len())
        .body(Body::from(oversized))
        .unwrap();
    let (status, body) = gateway.call(request).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json(&body)["code"], 413);

    let records = gateway.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].code, "OVERSIZED_PAYLOAD");
    assert_eq!(records[0].sanitized_request["body"], "[NOT READ]");
}

#[tokio::test]
async fn test_oversized_chunked_body_rejected() {
    let gateway = TestGateway::start(Arc::new(RecordingSender::default()));

    // No content-length: the limit is enforced while reading.
    let request = Request::post("/send")
        .body(Body::from("y".repeat(MAX_PAYLOAD + 1)))
        .unwrap();
    let (status, _) = gateway.call(request).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_unexpected_delivery_failure_is_generic_500() {
    let gateway = TestGateway::start(Arc::new(FailingSender));

    let (status, body) = gateway.call(gateway.signed(NOW, VALID_BODY)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json(&body),
        serde_json::json!({"error": "Internal server error", "code": 500})
    );
    assert!(!body.contains(SECRET));
    assert!(!body.contains("connection reset"));

    let records = gateway.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].code, "DELIVERY_FAILED");
    assert_eq!(records[0].level, AuditLevel::Error);
    assert_eq!(records[0].status, 500);
    assert_eq!(records[0].message, "Internal server error");

    let detail = records[0].detail.as_deref().unwrap();
    assert!(detail.contains("connection reset"));
    assert!(detail.contains("[REDACTED]"));

    let logged = serde_json::to_string(&records[0]).unwrap();
    assert!(!logged.contains(SECRET));
}

#[tokio::test]
async fn test_panicking_sender_is_500() {
    let gateway = TestGateway::start(Arc::new(PanickingSender));

    let (status, body) = gateway.call(gateway.signed(NOW, VALID_BODY)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body.contains("blew up"));

    let records = gateway.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].code, "DELIVERY_FAILED");
    assert_eq!(records[0].message, "Internal server error");
}

#[tokio::test]
async fn test_outcome_audited_when_client_disconnects() {
    let sender = Arc::new(DelayedSender::default());
    let gateway = TestGateway::start(sender.clone());

    // Drop the in-flight request as soon as the send begins.
    let call = gateway.app.clone().oneshot(gateway.signed(NOW, VALID_BODY));
    tokio::select! {
        _ = call => panic!("request completed before the send started"),
        _ = sender.started.notified() => {}
    }

    let mut records = gateway.audit.records();
    for _ in 0..100 {
        if !records.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        records = gateway.audit.records();
    }

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].code, "SENT");
    assert_eq!(records[0].message_id.as_deref(), Some("msg-late"));
}

#[tokio::test]
async fn test_sender_timeout_is_500() {
    let gateway =
        TestGateway::start_with_timeout(Arc::new(SlowSender), Duration::from_millis(50));

    let (status, _) = gateway.call(gateway.signed(NOW, VALID_BODY)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(gateway.audit.records()[0].code, "DELIVERY_FAILED");
}

#[tokio::test]
async fn test_unverified_address_is_bad_request() {
    let gateway = TestGateway::start(Arc::new(UnverifiedSender));

    let (status, body) = gateway.call(gateway.signed(NOW, VALID_BODY)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["code"], 400);

    let records = gateway.audit.records();
    assert_eq!(records[0].code, "PROVIDER_REJECTED");
    assert_eq!(records[0].level, AuditLevel::Warn);
}

#[tokio::test]
async fn test_missing_headers_are_forbidden() {
    let gateway = TestGateway::start(Arc::new(RecordingSender::default()));

    let request = Request::post("/send")
        .header("content-type", "application/json")
        .body(Body::from(VALID_BODY))
        .unwrap();
    let (status, _) = gateway.call(request).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(gateway.audit.records()[0].code, "MISSING_HEADERS");
}

#[tokio::test]
async fn test_tampered_body_is_forbidden_and_not_logged_raw() {
    let gateway = TestGateway::start(Arc::new(RecordingSender::default()));

    let signature = gateway
        .authenticator
        .sign(&NOW.to_string(), VALID_BODY.as_bytes());
    let tampered = VALID_BODY.replace("a@x.com", "evil@x.com");
    let request = Request::post("/send")
        .header("x-timestamp", NOW.to_string())
        .header("x-signature", signature.as_str())
        .body(Body::from(tampered))
        .unwrap();
    let (status, body) = gateway.call(request).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(!body.contains(&signature));

    let records = gateway.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].code, "SIGNATURE_MISMATCH");
    let logged = serde_json::to_string(&records[0]).unwrap();
    assert!(!logged.contains(&signature));
    assert!(!logged.contains(SECRET));
}

#[tokio::test]
async fn test_healthcheck() {
    let gateway = TestGateway::start(Arc::new(RecordingSender::default()));

    let request = Request::get("/healthcheck").body(Body::empty()).unwrap();
    let (status, body) = gateway.call(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
    assert!(gateway.audit.records().is_empty());
}

#[tokio::test]
async fn test_concurrent_requests_are_independent() {
    let sender = Arc::new(RecordingSender::default());
    let gateway = Arc::new(TestGateway::start(sender.clone()));

    let mut handles = Vec::new();
    for i in 0..8 {
        let gateway = Arc::clone(&gateway);
        handles.push(tokio::spawn(async move {
            let timestamp = if i % 2 == 0 { NOW } else { NOW - 1000 };
            gateway.call(gateway.signed(timestamp, VALID_BODY)).await.0
        }));
    }

    let mut ok = 0;
    let mut forbidden = 0;
    for handle in handles {
        let status = handle.await.unwrap();
        if status == StatusCode::OK {
            ok += 1;
        } else if status == StatusCode::FORBIDDEN {
            forbidden += 1;
        } else {
            panic!("unexpected status {}", status);
        }
    }

    assert_eq!((ok, forbidden), (4, 4));
    assert_eq!(sender.sent.lock().unwrap().len(), 4);
    assert_eq!(gateway.audit.records().len(), 8);
}
