//! Capability errors and their credential-vs-generic classification.
//!
//! Gemini reports failures as
//! `{"error": {"code": 400, "message": "...", "status": "INVALID_ARGUMENT",
//! "details": [{"reason": "API_KEY_INVALID", ...}]}}`.
//! Classification reads those structured fields first. A 400 is also a
//! credential failure when its message, status or raw body carries an
//! invalid-key marker, or when the message names the API key.

use serde::Deserialize;

/// What the caller should do about a failed capability call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityErrorKind {
    /// The service rejected (or we never had) a usable API key.
    Credential,
    /// Anything else: transport, timeout, safety block, bad output, 5xx.
    Generic,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct CapabilityError {
    pub kind: CapabilityErrorKind,
    /// HTTP status, when the failure came from an HTTP response.
    pub status: Option<u16>,
    /// Upstream machine-readable reason (`API_KEY_INVALID`, `SAFETY`, ...).
    pub reason: Option<String>,
    pub message: String,
}

const CREDENTIAL_REASONS: &[&str] = &[
    "API_KEY_INVALID",
    "API_KEY_EXPIRED",
    "INVALID_KEY",
    "API_KEY_SERVICE_BLOCKED",
    "BILLING_DISABLED",
];

const CREDENTIAL_STATUSES: &[&str] = &["UNAUTHENTICATED", "PERMISSION_DENIED"];

/// Markers that mean "bad key" wherever they appear in a 400.
const INVALID_KEY_MARKERS: &[&str] = &["INVALID_KEY", "API_KEY_INVALID"];

impl CapabilityError {
    pub fn credential(message: impl Into<String>) -> Self {
        Self {
            kind: CapabilityErrorKind::Credential,
            status: None,
            reason: None,
            message: message.into(),
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self {
            kind: CapabilityErrorKind::Generic,
            status: None,
            reason: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn is_credential(&self) -> bool {
        self.kind == CapabilityErrorKind::Credential
    }

    /// Build an error from a non-success HTTP response.
    pub fn from_response(status: u16, body: &str) -> Self {
        let upstream = serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .map(|e| e.error);

        let (message, upstream_status, reason) = match &upstream {
            Some(err) => (
                err.message.clone().unwrap_or_else(|| format!("HTTP {}", status)),
                err.status.clone(),
                err.details
                    .iter()
                    .find_map(|d| d.reason.clone()),
            ),
            None => (
                format!("HTTP {}: {}", status, truncate(body, 200)),
                None,
                None,
            ),
        };

        let kind = classify(
            status,
            upstream_status.as_deref(),
            reason.as_deref(),
            &message,
            body,
        );
        let reason = reason.or(upstream_status);

        Self {
            kind,
            status: Some(status),
            reason,
            message,
        }
    }

    /// Build an error from a transport-level failure (no response at all).
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            format!("request failed: {}", err)
        };
        Self::generic(message)
    }
}

fn classify(
    http_status: u16,
    upstream_status: Option<&str>,
    reason: Option<&str>,
    message: &str,
    body: &str,
) -> CapabilityErrorKind {
    if matches!(http_status, 401 | 403) {
        return CapabilityErrorKind::Credential;
    }
    if let Some(reason) = reason {
        if CREDENTIAL_REASONS.contains(&reason) {
            return CapabilityErrorKind::Credential;
        }
    }
    if let Some(status) = upstream_status {
        if CREDENTIAL_STATUSES.contains(&status) {
            return CapabilityErrorKind::Credential;
        }
    }
    if http_status == 400 {
        let marked = |text: &str| {
            let upper = text.to_ascii_uppercase();
            INVALID_KEY_MARKERS.iter().any(|m| upper.contains(m))
        };
        if marked(message) || upstream_status.is_some_and(marked) || marked(body) {
            return CapabilityErrorKind::Credential;
        }
        let lower = message.to_ascii_lowercase();
        if lower.contains("api key") || lower.contains("api_key") {
            return CapabilityErrorKind::Credential;
        }
    }
    CapabilityErrorKind::Generic
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let cut: String = value.chars().take(max_chars).collect();
    format!("{}…", cut)
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: UpstreamError,
}

#[derive(Debug, Deserialize)]
struct UpstreamError {
    message: Option<String>,
    status: Option<String>,
    #[serde(default)]
    details: Vec<UpstreamErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorDetail {
    reason: Option<String>,
}
