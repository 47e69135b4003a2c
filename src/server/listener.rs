//! TCP listener and server lifecycle.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::audit::{AuditLogger, AuditSink, FanoutAuditSink, TracingAuditSink};
use crate::auth::SystemClock;
use crate::config::Settings;
use crate::delivery::build_sender;
use crate::error::{GatewayError, GatewayResult};
use crate::guard::{GuardConfig, RequestGuard};

use super::routes::{router, AppState};

/// Assemble the audit sink described by `settings`.
///
/// Records always reach the process log. When auditing is enabled they are
/// also appended to the audit file; if that file cannot be opened the
/// gateway keeps running with the process log only.
pub fn build_audit_sink(settings: &Settings) -> Arc<dyn AuditSink> {
    let mut sink = FanoutAuditSink::new().with(Arc::new(TracingAuditSink));

    if settings.audit.enabled {
        let path = settings.audit_log_path();
        match AuditLogger::new(&path) {
            Ok(logger) => {
                info!(path = %path.display(), "Audit logging enabled");
                sink = sink.with(Arc::new(logger));
            }
            Err(e) => {
                warn!(
                    error = %e,
                    path = %path.display(),
                    "Failed to create audit logger, audit file disabled"
                );
            }
        }
    } else {
        info!("Audit file disabled");
    }

    Arc::new(sink)
}

/// HTTP server bound to its listening socket.
pub struct GatewayServer {
    listener: TcpListener,
    state: AppState,
}

impl GatewayServer {
    /// Load the secret, wire up the guard, sender and audit sink, and bind.
    pub async fn bind(settings: &Settings) -> GatewayResult<Self> {
        let secret = settings.load_secret()?;
        let sink = build_audit_sink(settings);
        let sender = build_sender(settings)?;

        let guard = RequestGuard::new(
            &secret,
            GuardConfig::from_settings(settings),
            Arc::new(SystemClock),
            Arc::clone(&sink),
        );
        info!(
            max_payload_bytes = guard.max_payload_bytes(),
            "Request guard ready"
        );

        let state = AppState::new(Arc::new(guard), sender, sink, settings.send_timeout());

        let addr = settings.bind_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Server {
                message: format!("Failed to bind to {}: {}", addr, e),
            })?;

        info!(addr = %addr, "Listener bound");

        Ok(Self { listener, state })
    }

    /// Address actually bound; differs from the configured one for port 0.
    pub fn local_addr(&self) -> GatewayResult<SocketAddr> {
        self.listener.local_addr().map_err(GatewayError::from)
    }

    /// Serve until `shutdown` completes, then drain in-flight requests.
    pub async fn run<F>(self, shutdown: F) -> GatewayResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(self.state);

        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| GatewayError::Server {
                message: format!("Server error: {}", e),
            })?;

        info!("Server stopped");
        Ok(())
    }
}
