//! Credential gate: decides whether capability calls may be made.
//!
//! The gate owns the tri-valued [`CredentialState`]. It changes in exactly
//! three places:
//! - `probe()` at startup
//! - `request_selection()` after the user picked a key
//! - `mark_rejected()` when the service refused the key
//!
//! When the host facility is missing or reports itself unavailable, the
//! configured [`CredentialFallback`] decides the state.

mod keyring_host;

pub use keyring_host::{KeyPrompt, KeyringHost, KEYRING_SERVICE, KEYRING_USER};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialState {
    Unknown,
    Present,
    Absent,
}

impl fmt::Display for CredentialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CredentialState::Unknown => "unknown",
            CredentialState::Present => "present",
            CredentialState::Absent => "absent",
        };
        f.write_str(s)
    }
}

/// What to assume when there is no usable credential host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CredentialFallback {
    /// Fail open: treat the credential as present and let the first call
    /// revalidate it.
    #[default]
    AssumePresent,
    AssumeAbsent,
}

impl CredentialFallback {
    pub fn state(&self) -> CredentialState {
        match self {
            CredentialFallback::AssumePresent => CredentialState::Present,
            CredentialFallback::AssumeAbsent => CredentialState::Absent,
        }
    }
}

impl FromStr for CredentialFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "assume_present" | "present" | "open" => Ok(CredentialFallback::AssumePresent),
            "assume_absent" | "absent" | "closed" => Ok(CredentialFallback::AssumeAbsent),
            other => Err(format!("Unknown credential fallback: {}", other)),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    /// The facility does not exist in this environment.
    #[error("credential facility unavailable: {0}")]
    Unavailable(String),
    /// The facility exists but the operation failed.
    #[error("credential operation failed: {0}")]
    Failed(String),
}

/// The hosting environment's credential facility.
#[async_trait]
pub trait CredentialHost: Send + Sync {
    async fn has_selected_credential(&self) -> Result<bool, HostError>;
    async fn open_credential_selector(&self) -> Result<(), HostError>;
}

pub struct CredentialGate {
    host: Option<Arc<dyn CredentialHost>>,
    fallback: CredentialFallback,
    state: CredentialState,
}

impl CredentialGate {
    pub fn new(host: Option<Arc<dyn CredentialHost>>, fallback: CredentialFallback) -> Self {
        Self {
            host,
            fallback,
            state: CredentialState::Unknown,
        }
    }

    /// Gate for providers that need no key: no host, fail open.
    pub fn not_required() -> Self {
        Self::new(None, CredentialFallback::AssumePresent)
    }

    pub fn state(&self) -> CredentialState {
        self.state
    }

    pub fn allows_calls(&self) -> bool {
        self.state == CredentialState::Present
    }

    /// Ask the host whether a credential is selected.
    pub async fn probe(&mut self) -> CredentialState {
        self.state = match &self.host {
            None => {
                log::info!(
                    "[GATE] No credential host: fallback {:?}",
                    self.fallback
                );
                self.fallback.state()
            }
            Some(host) => match host.has_selected_credential().await {
                Ok(true) => CredentialState::Present,
                Ok(false) => CredentialState::Absent,
                Err(HostError::Unavailable(reason)) => {
                    log::warn!(
                        "[GATE] Credential host unavailable ({}): fallback {:?}",
                        reason,
                        self.fallback
                    );
                    self.fallback.state()
                }
                Err(HostError::Failed(reason)) => {
                    log::error!("[GATE] Credential probe failed: {}", reason);
                    CredentialState::Absent
                }
            },
        };
        log::info!("[GATE] Probe result: {}", self.state);
        self.state
    }

    /// Let the user pick a credential.
    ///
    /// On completion the state becomes Present without re-probing, even if
    /// the user dismissed the selector; the next call revalidates.
    pub async fn request_selection(&mut self) -> Result<CredentialState, HostError> {
        match &self.host {
            None => {
                self.state = self.fallback.state();
            }
            Some(host) => match host.open_credential_selector().await {
                Ok(()) => self.state = CredentialState::Present,
                Err(HostError::Unavailable(reason)) => {
                    log::warn!("[GATE] Selector unavailable ({}): fallback", reason);
                    self.state = self.fallback.state();
                }
                Err(err) => {
                    log::error!("[GATE] Credential selection failed: {}", err);
                    return Err(err);
                }
            },
        }
        log::info!("[GATE] After selection: {}", self.state);
        Ok(self.state)
    }

    /// The service rejected the credential; re-arm the gate.
    pub fn mark_rejected(&mut self) {
        log::warn!("[GATE] Credential rejected upstream: gate re-armed");
        self.state = CredentialState::Absent;
    }
}
