//! Shared fakes and fixtures for the wizard integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tryon_studio_lib::catalog::Product;
use tryon_studio_lib::credentials::{CredentialGate, CredentialFallback, CredentialHost, HostError};
use tryon_studio_lib::imaging::{CodecError, ImageSource, InlineImage};
use tryon_studio_lib::llm::{CapabilityError, SizeLabel, TryOnCapability};
use tryon_studio_lib::wizard::{CallOrdering, Phase, Wizard, WizardEvent};
use tokio::sync::mpsc::UnboundedReceiver;

// ── Fixtures ────────────────────────────────────────────────────────

pub fn hoodie() -> Product {
    Product::new(
        "bf-hoodie",
        "Better Future Hoodie",
        "/images/better-future-hoodie.png",
    )
}

pub fn tee() -> Product {
    Product::new("bf-tee", "Better Future T-Shirt", "/images/better-future-tee.png")
}

/// A catalog entry whose reference image cannot be fetched.
pub fn offline_product() -> Product {
    Product::new("bf-offline", "Offline Hoodie", "https://offline.invalid/hoodie.png")
}

pub fn photo() -> InlineImage {
    InlineImage::new("image/jpeg", b"user-photo".to_vec())
}

pub fn garment() -> InlineImage {
    InlineImage::new("image/png", b"garment".to_vec())
}

/// The composite the scripted capability returns on success.
pub fn result_x() -> InlineImage {
    InlineImage::new("image/png", b"composite-x".to_vec())
}

/// What the service answers for a key it refuses.
pub fn invalid_key_error() -> CapabilityError {
    CapabilityError::from_response(
        400,
        r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT","details":[{"@type":"type.googleapis.com/google.rpc.ErrorInfo","reason":"API_KEY_INVALID"}]}}"#,
    )
}

/// A refused key reported only through the message text.
pub fn invalid_key_message_error() -> CapabilityError {
    CapabilityError::from_response(
        400,
        r#"{"error":{"code":400,"message":"INVALID_KEY","status":"INVALID_ARGUMENT"}}"#,
    )
}

pub fn overloaded_error() -> CapabilityError {
    CapabilityError::from_response(
        503,
        r#"{"error":{"code":503,"message":"The model is overloaded.","status":"UNAVAILABLE"}}"#,
    )
}

// ── Capability ──────────────────────────────────────────────────────

/// Capability with canned answers that records every call it receives.
pub struct ScriptedCapability {
    size: Result<SizeLabel, CapabilityError>,
    composite: Mutex<Result<InlineImage, CapabilityError>>,
    calls: Mutex<Vec<&'static str>>,
}

impl ScriptedCapability {
    pub fn new(
        size: Result<SizeLabel, CapabilityError>,
        composite: Result<InlineImage, CapabilityError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            size,
            composite: Mutex::new(composite),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Size M, composite X.
    pub fn succeeding() -> Arc<Self> {
        Self::new(Ok(SizeLabel::M), Ok(result_x()))
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    /// Change the composite answer for subsequent calls.
    pub fn set_composite(&self, composite: Result<InlineImage, CapabilityError>) {
        *self.composite.lock().unwrap() = composite;
    }
}

#[async_trait]
impl TryOnCapability for ScriptedCapability {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn estimate_size(
        &self,
        user_image: &InlineImage,
        _product_label: &str,
    ) -> Result<SizeLabel, CapabilityError> {
        assert_eq!(user_image, &photo());
        self.calls.lock().unwrap().push("estimate_size");
        self.size.clone()
    }

    async fn generate_composite(
        &self,
        user_image: &InlineImage,
        product_image: &InlineImage,
        _product_label: &str,
    ) -> Result<InlineImage, CapabilityError> {
        assert_eq!(user_image, &photo());
        assert_eq!(product_image, &garment());
        self.calls.lock().unwrap().push("generate_composite");
        self.composite.lock().unwrap().clone()
    }
}

// ── Images ──────────────────────────────────────────────────────────

/// Local files named `unreadable*` fail; references on `.invalid` hosts fail.
pub struct StubImages {
    pub references: Mutex<Vec<String>>,
}

impl StubImages {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            references: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ImageSource for StubImages {
    async fn encode_local_file(&self, path: &Path) -> Result<InlineImage, CodecError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if name.starts_with("unreadable") {
            return Err(CodecError::Read {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }
        Ok(photo())
    }

    async fn encode_reference(&self, location: &str) -> Result<InlineImage, CodecError> {
        self.references.lock().unwrap().push(location.to_string());
        if location.contains(".invalid") {
            return Err(CodecError::Fetch {
                url: location.to_string(),
                message: "dns error".to_string(),
            });
        }
        Ok(garment())
    }
}

// ── Credentials ─────────────────────────────────────────────────────

/// Host whose selector always "selects" a key.
pub struct SwitchHost {
    selected: AtomicBool,
}

impl SwitchHost {
    pub fn new(selected: bool) -> Arc<Self> {
        Arc::new(Self {
            selected: AtomicBool::new(selected),
        })
    }
}

#[async_trait]
impl CredentialHost for SwitchHost {
    async fn has_selected_credential(&self) -> Result<bool, HostError> {
        Ok(self.selected.load(Ordering::SeqCst))
    }

    async fn open_credential_selector(&self) -> Result<(), HostError> {
        self.selected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ── Wizard setup ────────────────────────────────────────────────────

pub fn wizard_with(
    host: Arc<SwitchHost>,
    capability: Arc<ScriptedCapability>,
    images: Arc<StubImages>,
    ordering: CallOrdering,
) -> Wizard {
    let host: Arc<dyn CredentialHost> = host;
    let gate = CredentialGate::new(Some(host), CredentialFallback::AssumePresent);
    Wizard::new(gate, capability, images).with_ordering(ordering)
}

/// Probed (key present), `product` selected, photo set, on the upload step.
pub async fn ready_wizard(
    capability: Arc<ScriptedCapability>,
    product: Product,
    ordering: CallOrdering,
) -> Wizard {
    let mut wizard = wizard_with(SwitchHost::new(true), capability, StubImages::new(), ordering);
    wizard.probe_credentials().await;
    wizard.select_product(product).unwrap();
    wizard.continue_to_upload().unwrap();
    wizard.set_user_image(photo()).unwrap();
    assert_eq!(wizard.phase(), Phase::UploadPhoto);
    wizard
}

/// Everything emitted so far.
pub fn drain(events: &mut UnboundedReceiver<WizardEvent>) -> Vec<WizardEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

pub fn loading_changes(events: &[WizardEvent]) -> Vec<bool> {
    events
        .iter()
        .filter_map(|e| match e {
            WizardEvent::LoadingChanged(v) => Some(*v),
            _ => None,
        })
        .collect()
}
