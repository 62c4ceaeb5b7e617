//! # Delivery Executor
//!
//! Performs one signed HTTP POST to a destination endpoint and captures the
//! result as data. Ordinary HTTP error statuses are not `Err` values here:
//! 4xx/5xx come back as `ok = false` with the status set, and only
//! transport-level failures take the `error_message` path. The coordinator
//! never needs to catch anything from an attempt.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use sha2::Sha256;

use crate::error::{RelayError, Result};
use crate::scheduler::classifier::FailureKind;

type HmacSha256 = Hmac<Sha256>;

/// Signature header, present only when the endpoint has a shared secret.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
/// Event-type header sent with every delivery.
pub const EVENT_HEADER: &str = "X-Webhook-Event";
/// Unix-timestamp header sent with every delivery.
pub const TIMESTAMP_HEADER: &str = "X-Webhook-Timestamp";

/// Substituted when the response body itself cannot be read.
const UNREADABLE_BODY_PLACEHOLDER: &str = "<failed to read response body>";

/// Everything the executor needs to make one attempt.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub url: String,
    pub event_type: String,
    /// JSON payload, byte-for-byte what was stored at enqueue time
    pub payload: String,
    /// Per-destination signing secret; absent means the signature header is
    /// omitted, not an error
    pub secret: Option<String>,
}

/// Result of a single delivery attempt, captured as data.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    /// True only for 2xx responses
    pub ok: bool,
    pub http_status: Option<u16>,
    /// Truncated destination response body, when one was received
    pub response_body: Option<String>,
    pub duration_ms: i64,
    pub error_message: Option<String>,
    /// Set for transport failures so the classifier can tell a timeout from
    /// a connection failure; `None` when an HTTP status was received
    pub failure_kind: Option<FailureKind>,
}

/// One delivery attempt against a destination.
///
/// The trait seam exists so the coordinator can be driven by a scripted
/// deliverer in tests; production uses [`HttpDeliverer`].
#[async_trait]
pub trait Deliverer: Send + Sync {
    async fn attempt(&self, request: &DeliveryRequest) -> AttemptOutcome;
}

/// Production deliverer: reqwest client with a hard per-attempt timeout.
pub struct HttpDeliverer {
    client: reqwest::Client,
    user_agent: String,
    response_body_limit: usize,
}

impl HttpDeliverer {
    /// Build a deliverer with the given per-attempt timeout.
    pub fn new(
        request_timeout: Duration,
        user_agent: impl Into<String>,
        response_body_limit: usize,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RelayError::DeliveryClient(e.to_string()))?;
        Ok(Self {
            client,
            user_agent: user_agent.into(),
            response_body_limit,
        })
    }

    fn truncate_body(&self, body: String) -> String {
        if body.len() <= self.response_body_limit {
            return body;
        }
        // Byte limit, backed off to the nearest char boundary.
        let mut end = self.response_body_limit;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body[..end].to_string()
    }
}

#[async_trait]
impl Deliverer for HttpDeliverer {
    async fn attempt(&self, request: &DeliveryRequest) -> AttemptOutcome {
        let started = Instant::now();

        let mut http_request = self
            .client
            .post(&request.url)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, &self.user_agent)
            .header(EVENT_HEADER, &request.event_type)
            .header(TIMESTAMP_HEADER, unix_timestamp().to_string())
            .body(request.payload.clone());

        if let Some(secret) = &request.secret {
            http_request = http_request.header(
                SIGNATURE_HEADER,
                format!("sha256={}", sign_payload(secret, &request.payload)),
            );
        }

        match http_request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = match response.text().await {
                    Ok(body) => self.truncate_body(body),
                    Err(_) => UNREADABLE_BODY_PLACEHOLDER.to_string(),
                };
                let duration_ms = started.elapsed().as_millis() as i64;
                let ok = (200..300).contains(&status);
                AttemptOutcome {
                    ok,
                    http_status: Some(status),
                    response_body: Some(body),
                    duration_ms,
                    error_message: if ok {
                        None
                    } else {
                        Some(format!("destination responded with HTTP {status}"))
                    },
                    failure_kind: None,
                }
            }
            Err(err) => {
                let duration_ms = started.elapsed().as_millis() as i64;
                let kind = if err.is_timeout() {
                    FailureKind::Timeout
                } else if err.is_connect() {
                    FailureKind::Network
                } else {
                    FailureKind::Other
                };
                AttemptOutcome {
                    ok: false,
                    http_status: None,
                    response_body: None,
                    duration_ms,
                    error_message: Some(err.to_string()),
                    failure_kind: Some(kind),
                }
            }
        }
    }
}

/// Hex HMAC-SHA256 of the payload under the endpoint secret.
pub fn sign_payload(secret: &str, payload: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
