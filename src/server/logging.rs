//! Logging for the activation server.
//!
//! - [`init_logging`] installs the global subscriber: stdout plus an
//!   append-only plain-text file.
//! - [`request_logging_middleware`] gives every request an ID, a span and a
//!   completion line with status and timing.
//! - [`log_activation_event`] records the outcome of each activation or
//!   issuance attempt.
//!
//! # Usage
//!
//! ```rust,ignore
//! use axum::middleware;
//! use activator::server::logging::request_logging_middleware;
//!
//! let app = Router::new()
//!     .route("/", post(activate_handler))
//!     .layer(middleware::from_fn(request_logging_middleware));
//! ```

use std::fs::OpenOptions;
use std::sync::Mutex;
use std::time::Instant;

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, Response},
    middleware::Next,
};
use tracing::{info, info_span, warn, Instrument};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::LoggingConfig;
use crate::errors::{LicenseError, LicenseResult};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `logging.level` when set.
pub fn init_logging(config: &LoggingConfig) -> LicenseResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| LicenseError::ConfigError(format!("invalid log filter: {e}")))?;

    let file_layer = if config.file.is_empty() {
        None
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.file)
            .map_err(|e| {
                LicenseError::ConfigError(format!("cannot open log file {}: {e}", config.file))
            })?;
        Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| LicenseError::ConfigError(format!("failed to install logger: {e}")))
}

/// Outcome of an activation or issuance attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationEvent {
    /// Code was bound to a machine for the first time
    Bound,
    /// Code was already bound to the presenting machine
    Validated,
    /// Code is bound to a different machine
    Rejected,
    /// Code does not exist
    UnknownCode,
    /// Code was handed out by the issuance endpoint
    CodeIssued,
    /// Issuance attempted with the wrong secret
    BadSecret,
    /// A fresh batch of codes was generated
    PoolReplenished,
}

impl std::fmt::Display for ActivationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActivationEvent::Bound => "bound",
            ActivationEvent::Validated => "validated",
            ActivationEvent::Rejected => "rejected",
            ActivationEvent::UnknownCode => "unknown_code",
            ActivationEvent::CodeIssued => "code_issued",
            ActivationEvent::BadSecret => "bad_secret",
            ActivationEvent::PoolReplenished => "pool_replenished",
        };
        write!(f, "{}", s)
    }
}

impl ActivationEvent {
    fn is_failure(&self) -> bool {
        matches!(
            self,
            ActivationEvent::Rejected | ActivationEvent::UnknownCode | ActivationEvent::BadSecret
        )
    }
}

/// Log an activation or issuance outcome.
///
/// # Arguments
///
/// * `event` - What happened
/// * `activation_code` - The code involved (empty for `BadSecret`)
/// * `details` - Optional extra context, e.g. the machine code
pub fn log_activation_event(event: ActivationEvent, activation_code: &str, details: Option<&str>) {
    let span = info_span!(
        "activation_event",
        event = %event,
        activation_code = %activation_code,
    );
    let _enter = span.enter();

    match (event.is_failure(), details) {
        (true, Some(d)) => warn!(reason = %d, "Activation event occurred"),
        (true, None) => warn!("Activation event occurred"),
        (false, Some(d)) => info!(details = %d, "Activation event occurred"),
        (false, None) => info!("Activation event occurred"),
    }
}

/// Header name for the request ID.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Generate a new unique request ID.
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Logging middleware that tracks request timing and generates request IDs.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response<Body> {
    let request_id = generate_request_id();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    let start = Instant::now();

    let response = async move {
        info!("Started processing request");
        next.run(request).await
    }
    .instrument(span.clone())
    .await;

    let duration = start.elapsed();
    let status = response.status();

    let _enter = span.enter();
    info!(
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        "Request completed"
    );

    let (mut parts, body) = response.into_parts();
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        parts.headers.insert(REQUEST_ID_HEADER, header_value);
    }

    Response::from_parts(parts, body)
}

/// Health check response structure.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    pub service: String,
    pub version: String,
    pub database: DatabaseHealth,
}

/// Database health status.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DatabaseHealth {
    pub connected: bool,
    /// sqlite or postgres
    pub db_type: String,
}

impl HealthResponse {
    pub fn new(db_connected: bool, db_type: &str) -> Self {
        Self {
            status: if db_connected { "healthy" } else { "degraded" }.to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: DatabaseHealth {
                connected: db_connected,
                db_type: db_type.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_is_valid_uuid() {
        let id = generate_request_id();
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn event_names_are_snake_case() {
        assert_eq!(ActivationEvent::UnknownCode.to_string(), "unknown_code");
        assert_eq!(ActivationEvent::PoolReplenished.to_string(), "pool_replenished");
    }

    #[test]
    fn only_rejections_are_failures() {
        assert!(ActivationEvent::Rejected.is_failure());
        assert!(ActivationEvent::BadSecret.is_failure());
        assert!(!ActivationEvent::Bound.is_failure());
        assert!(!ActivationEvent::CodeIssued.is_failure());
    }

    #[test]
    fn health_response_degraded() {
        let health = HealthResponse::new(false, "postgres");
        assert_eq!(health.status, "degraded");
        assert!(!health.database.connected);
        assert_eq!(health.service, "license-activator");
    }
}
