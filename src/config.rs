//! Application configuration.
//!
//! Layering, lowest to highest priority:
//! 1. built-in defaults
//! 2. `config.json` (explicit path, else `<config_dir>/tryon-studio/config.json`)
//! 3. env vars (`TRYON_PROVIDER`, `GEMINI_API_BASE`, `GEMINI_SIZE_MODEL`,
//!    `GEMINI_IMAGE_MODEL`, `TRYON_CREDENTIAL_FALLBACK`)
//! 4. command-line flags (applied by the caller)
//!
//! A missing default config file is not an error; a missing explicit one
//! or a malformed one is.

use crate::credentials::CredentialFallback;
use crate::llm::gemini::{DEFAULT_API_BASE, DEFAULT_IMAGE_MODEL, DEFAULT_SIZE_MODEL};
use crate::llm::{GeminiSettings, ProviderKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_DIR: &str = "tryon-studio";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct AppConfig {
    pub provider: ProviderKind,
    pub api_base: String,
    pub size_model: String,
    pub image_model: String,
    pub request_timeout_secs: u64,
    pub credential_fallback: CredentialFallback,
    /// Store a key picked in the app in the OS keychain.
    pub remember_key: bool,
    /// Issue size estimation and composite generation concurrently.
    pub parallel_calls: bool,
    pub assets_dir: PathBuf,
    pub catalog_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub storefront_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            api_base: DEFAULT_API_BASE.to_string(),
            size_model: DEFAULT_SIZE_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            request_timeout_secs: 90,
            credential_fallback: CredentialFallback::AssumePresent,
            remember_key: true,
            parallel_calls: false,
            assets_dir: PathBuf::from("assets"),
            catalog_path: None,
            output_dir: PathBuf::from("."),
            storefront_url: "https://superbeautiful.de".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value for {var}: {message}")]
    Env { var: String, message: String },
    #[error("failed to write config {path}: {message}")]
    Write { path: PathBuf, message: String },
}

/// Default config file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(CONFIG_FILE)
}

impl AppConfig {
    /// Load from `path` (or the default location), then apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path.is_some();
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_path);

        let mut config = match std::fs::read_to_string(&path) {
            Ok(raw) => {
                let config: AppConfig =
                    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                        path: path.clone(),
                        source,
                    })?;
                log::info!("[CONFIG] Loaded {}", path.display());
                config
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
                log::info!("[CONFIG] No config at {}, using defaults", path.display());
                AppConfig::default()
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply env overrides through `lookup` (injectable for tests).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(raw) = get("TRYON_PROVIDER") {
            self.provider = raw.parse().map_err(|message| ConfigError::Env {
                var: "TRYON_PROVIDER".to_string(),
                message,
            })?;
        }
        if let Some(raw) = get("TRYON_CREDENTIAL_FALLBACK") {
            self.credential_fallback = raw.parse().map_err(|message| ConfigError::Env {
                var: "TRYON_CREDENTIAL_FALLBACK".to_string(),
                message,
            })?;
        }
        if let Some(base) = get("GEMINI_API_BASE") {
            self.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(model) = get("GEMINI_SIZE_MODEL") {
            self.size_model = model;
        }
        if let Some(model) = get("GEMINI_IMAGE_MODEL") {
            self.image_model = model;
        }
        Ok(())
    }

    /// Write the config as pretty JSON, creating parent dirs.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |message: String| ConfigError::Write {
            path: path.to_path_buf(),
            message,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| write_err(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| write_err(e.to_string()))?;
        log::info!("[CONFIG] Saved {}", path.display());
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.clamp(5, 600))
    }

    pub fn gemini_settings(&self) -> GeminiSettings {
        GeminiSettings {
            api_base: self.api_base.clone(),
            size_model: self.size_model.clone(),
            image_model: self.image_model.clone(),
            timeout: self.request_timeout(),
        }
    }
}
