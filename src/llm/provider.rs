//! Capability providers: which backend answers the two try-on calls.
//!
//! The wizard only sees `Arc<dyn TryOnCapability>`; this module maps the
//! configured provider id onto a concrete client.

use super::dryrun::DryrunCapability;
use super::gemini::{ApiKeyResolver, GeminiClient, GeminiSettings};
use super::TryOnCapability;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Gemini,
    Dryrun,
}

impl ProviderKind {
    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::Dryrun => "dryrun",
        }
    }

    /// Whether calls through this provider need an API key at all.
    pub fn needs_credential(&self) -> bool {
        matches!(self, ProviderKind::Gemini)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "dryrun" | "offline" => Ok(ProviderKind::Dryrun),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

/// Provider metadata shown by the shell's `status` command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub env_key: Option<String>,
}

/// All known providers and their display info.
pub fn all_providers() -> Vec<ProviderInfo> {
    vec![
        ProviderInfo {
            id: ProviderKind::Gemini.id().to_string(),
            name: "Google Gemini: size via text model, composite via image model".to_string(),
            env_key: Some("GEMINI_API_KEY".to_string()),
        },
        ProviderInfo {
            id: ProviderKind::Dryrun.id().to_string(),
            name: "Dry run: offline, fixed size, local overlay".to_string(),
            env_key: None,
        },
    ]
}

/// Build the capability client for a provider.
pub fn build_capability(
    kind: ProviderKind,
    settings: GeminiSettings,
    api_key: ApiKeyResolver,
) -> Arc<dyn TryOnCapability> {
    log::info!("[LLM] Provider: {}", kind);
    match kind {
        ProviderKind::Gemini => {
            log::info!(
                "[LLM] Models: size={} image={}",
                settings.size_model,
                settings.image_model
            );
            Arc::new(GeminiClient::new(settings, api_key))
        }
        ProviderKind::Dryrun => Arc::new(DryrunCapability::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_ids_parse_case_insensitively() {
        assert_eq!("Gemini".parse::<ProviderKind>(), Ok(ProviderKind::Gemini));
        assert_eq!(" offline ".parse::<ProviderKind>(), Ok(ProviderKind::Dryrun));
        assert!("openai".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn only_gemini_needs_a_key() {
        assert!(ProviderKind::Gemini.needs_credential());
        assert!(!ProviderKind::Dryrun.needs_credential());
    }

    #[test]
    fn build_returns_matching_backend() {
        let resolver: ApiKeyResolver = Arc::new(|| None);
        let cap = build_capability(ProviderKind::Dryrun, GeminiSettings::default(), resolver.clone());
        assert_eq!(cap.name(), "dryrun");
        let cap = build_capability(ProviderKind::Gemini, GeminiSettings::default(), resolver);
        assert_eq!(cap.name(), "gemini");
    }

    #[test]
    fn every_kind_is_listed() {
        let ids: Vec<String> = all_providers().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["gemini", "dryrun"]);
    }
}
