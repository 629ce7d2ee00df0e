//! OS keychain credential host.
//!
//! A credential counts as selected when the user picked a key this
//! session, an env var holds a key, or the keychain entry
//! `tryon-studio`/`gemini` is non-empty. Selecting a key asks the injected
//! [`KeyPrompt`], keeps the answer for the session and stores it in the
//! keychain.
//!
//! [`KeyringHost::resolve_key`] feeds capability calls with the same
//! precedence, so a freshly selected key replaces a rejected env key.

use super::{CredentialHost, HostError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

pub const KEYRING_SERVICE: &str = "tryon-studio";
pub const KEYRING_USER: &str = "gemini";

/// Env vars checked before the keychain, in order.
const DEFAULT_ENV_KEYS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Interactive source of a new API key. `Ok(None)` means the user cancelled.
#[async_trait]
pub trait KeyPrompt: Send + Sync {
    async fn prompt_for_key(&self) -> std::io::Result<Option<String>>;
}

pub struct KeyringHost {
    service: String,
    user: String,
    env_keys: Vec<String>,
    prompt: Option<Arc<dyn KeyPrompt>>,
    /// Key picked through the selector; wins over env and keychain.
    selected: Mutex<Option<String>>,
    remember: bool,
}

impl KeyringHost {
    pub fn new(prompt: Option<Arc<dyn KeyPrompt>>) -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
            user: KEYRING_USER.to_string(),
            env_keys: DEFAULT_ENV_KEYS.iter().map(|k| k.to_string()).collect(),
            prompt,
            selected: Mutex::new(None),
            remember: true,
        }
    }

    /// Whether a selected key is written to the keychain. When off, it
    /// only lives for this session.
    pub fn remember_selection(mut self, remember: bool) -> Self {
        self.remember = remember;
        self
    }

    /// Override the env vars consulted before the keychain.
    pub fn with_env_keys(mut self, keys: &[&str]) -> Self {
        self.env_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Override the keychain entry.
    pub fn with_entry(mut self, service: &str, user: &str) -> Self {
        self.service = service.to_string();
        self.user = user.to_string();
        self
    }

    fn env_key(&self) -> Option<String> {
        self.env_keys.iter().find_map(|name| non_empty_env(name))
    }

    fn selected_key(&self) -> Option<String> {
        self.selected.lock().ok().and_then(|key| key.clone())
    }

    /// Key for the next capability call: the selected key, then env, then
    /// the keychain entry. Blocking.
    pub fn resolve_key(&self) -> Option<String> {
        if let Some(key) = self.selected_key() {
            return Some(key);
        }
        self.env_key()
            .or_else(|| match read_keychain(&self.service, &self.user) {
                Ok(key) => key,
                Err(e) => {
                    log::warn!("[GATE] Keychain lookup failed: {}", e);
                    None
                }
            })
    }
}

#[async_trait]
impl CredentialHost for KeyringHost {
    async fn has_selected_credential(&self) -> Result<bool, HostError> {
        if self.selected_key().is_some() {
            return Ok(true);
        }
        if self.env_key().is_some() {
            log::info!("[GATE] API key found in environment");
            return Ok(true);
        }

        let service = self.service.clone();
        let user = self.user.clone();
        let lookup = tokio::task::spawn_blocking(move || read_keychain(&service, &user))
            .await
            .map_err(|e| HostError::Failed(e.to_string()))?;

        match lookup {
            Ok(Some(_)) => {
                log::info!("[GATE] API key found in OS keychain");
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn open_credential_selector(&self) -> Result<(), HostError> {
        let prompt = self
            .prompt
            .as_ref()
            .ok_or_else(|| HostError::Unavailable("no interactive key prompt".to_string()))?;

        let key = prompt
            .prompt_for_key()
            .await
            .map_err(|e| HostError::Failed(format!("reading key: {}", e)))?;

        let key = match key.map(|k| k.trim().to_string()) {
            Some(k) if !k.is_empty() => k,
            _ => {
                log::info!("[GATE] Key selection cancelled");
                return Ok(());
            }
        };

        if self.remember {
            let service = self.service.clone();
            let user = self.user.clone();
            let stored = key.clone();
            let written =
                tokio::task::spawn_blocking(move || write_keychain(&service, &user, &stored))
                    .await
                    .map_err(|e| HostError::Failed(e.to_string()))?;
            match written {
                Ok(()) => log::info!("[GATE] API key saved to OS keychain"),
                Err(HostError::Unavailable(reason)) => {
                    log::warn!("[GATE] Keychain unavailable ({}): key kept for this session", reason)
                }
                Err(e) => return Err(e),
            }
        }

        if let Ok(mut selected) = self.selected.lock() {
            *selected = Some(key);
        }
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn read_keychain(service: &str, user: &str) -> Result<Option<String>, HostError> {
    let entry = keyring::Entry::new(service, user).map_err(map_keyring_error)?;
    match entry.get_password() {
        Ok(key) if !key.trim().is_empty() => Ok(Some(key)),
        Ok(_) => Ok(None),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(map_keyring_error(e)),
    }
}

fn write_keychain(service: &str, user: &str, key: &str) -> Result<(), HostError> {
    let entry = keyring::Entry::new(service, user).map_err(map_keyring_error)?;
    entry.set_password(key).map_err(map_keyring_error)
}

fn map_keyring_error(err: keyring::Error) -> HostError {
    match err {
        keyring::Error::PlatformFailure(e) => HostError::Unavailable(e.to_string()),
        keyring::Error::NoStorageAccess(e) => HostError::Unavailable(e.to_string()),
        other => HostError::Failed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CancelPrompt;

    #[async_trait]
    impl KeyPrompt for CancelPrompt {
        async fn prompt_for_key(&self) -> std::io::Result<Option<String>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn env_key_counts_as_selected() {
        let var = "TRYON_TEST_KEY_ENV_PRESENT";
        std::env::set_var(var, "abc123");
        let host = KeyringHost::new(None).with_env_keys(&[var]);
        assert!(host.has_selected_credential().await.unwrap());
        std::env::remove_var(var);
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let var = "TRYON_TEST_KEY_ENV_BLANK";
        std::env::set_var(var, "   ");
        assert_eq!(non_empty_env(var), None);
        std::env::remove_var(var);
    }

    #[tokio::test]
    async fn selector_without_prompt_is_unavailable() {
        let host = KeyringHost::new(None);
        let err = host.open_credential_selector().await.unwrap_err();
        assert!(matches!(err, HostError::Unavailable(_)));
    }

    #[tokio::test]
    async fn cancelled_prompt_completes_without_writing() {
        let host = KeyringHost::new(Some(Arc::new(CancelPrompt)))
            .with_entry("tryon-studio-test", "cancelled");
        host.open_credential_selector().await.unwrap();
    }

    struct AnswerPrompt(&'static str);

    #[async_trait]
    impl KeyPrompt for AnswerPrompt {
        async fn prompt_for_key(&self) -> std::io::Result<Option<String>> {
            Ok(Some(self.0.to_string()))
        }
    }

    #[tokio::test]
    async fn selected_key_replaces_env_key() {
        let var = "TRYON_TEST_KEY_ENV_STALE";
        std::env::set_var(var, "stale-key");
        let host = KeyringHost::new(Some(Arc::new(AnswerPrompt(" fresh-key \n"))))
            .with_env_keys(&[var])
            .remember_selection(false);
        assert_eq!(host.resolve_key().as_deref(), Some("stale-key"));

        host.open_credential_selector().await.unwrap();

        assert_eq!(host.resolve_key().as_deref(), Some("fresh-key"));
        assert!(host.has_selected_credential().await.unwrap());
        std::env::remove_var(var);
    }

    #[test]
    fn resolver_uses_configured_env_keys() {
        let var = "TRYON_TEST_KEY_ENV_CUSTOM";
        std::env::set_var(var, "custom-key");
        let host = KeyringHost::new(None).with_env_keys(&[var]);
        assert_eq!(host.resolve_key().as_deref(), Some("custom-key"));
        std::env::remove_var(var);
    }

    #[test]
    fn platform_failures_map_to_unavailable() {
        let err = map_keyring_error(keyring::Error::PlatformFailure(Box::new(
            std::io::Error::new(std::io::ErrorKind::Other, "no secret service"),
        )));
        assert!(matches!(err, HostError::Unavailable(_)));

        let err = map_keyring_error(keyring::Error::Invalid("user".into(), "empty".into()));
        assert!(matches!(err, HostError::Failed(_)));
    }
}
