//! Try-on wizard: the three-step workflow state machine.
//!
//! Owns the [`TryOnSession`], the current [`Phase`] and the
//! [`CredentialGate`], and orchestrates one try-on:
//! product image → size estimate → composite → result.
//!
//! Invariants:
//! - `session().is_loading()` is true exactly while a try-on runs, and is
//!   cleared exactly once per try-on whatever the outcome.
//! - At most one try-on is in flight (`start_try_on` takes `&mut self`
//!   and refuses while loading).
//! - No capability call is made unless the gate reports Present.
//! - A credential rejection re-arms the gate; nothing else does.
//!
//! Submodules:
//!   - phase.rs    : Phase, WizardStep, Screen
//!   - session.rs  : TryOnSession
//!   - events.rs   : WizardEvent subscribers
//!   - messages.rs : user-facing error text

mod events;
pub mod messages;
mod phase;
mod session;

pub use events::{TryOnStage, WizardEvent};
pub use phase::{Phase, Screen, WizardStep};
pub use session::TryOnSession;

use crate::catalog::Product;
use crate::credentials::{CredentialGate, CredentialState, HostError};
use crate::imaging::{CodecError, ImageSource, InlineImage};
use crate::llm::{CapabilityError, SizeLabel, TryOnCapability};
use events::EventHub;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedReceiver;

/// How the two capability calls of a try-on are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallOrdering {
    /// Size estimate first, then composite.
    #[default]
    Sequential,
    /// Both at once; the first failure wins.
    Parallel,
}

/// A navigation or input action was attempted from the wrong phase.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("cannot {action} during {phase}")]
    NotAllowed { action: &'static str, phase: Phase },
    #[error("no product selected")]
    NoProduct,
    #[error("a usable API key is required (credential {0})")]
    CredentialRequired(CredentialState),
}

/// Why `start_try_on` declined to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReadyReason {
    Busy,
    NoProduct,
    NoPhoto,
    Credential(CredentialState),
    WrongPhase(Phase),
}

impl fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotReadyReason::Busy => f.write_str("a try-on is already running"),
            NotReadyReason::NoProduct => f.write_str("no product selected"),
            NotReadyReason::NoPhoto => f.write_str("no photo uploaded"),
            NotReadyReason::Credential(state) => write!(f, "credential is {}", state),
            NotReadyReason::WrongPhase(phase) => write!(f, "not available during {}", phase),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The service refused the API key.
    Credential,
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TryOnOutcome {
    /// Preconditions not met; nothing changed.
    NotReady(NotReadyReason),
    Succeeded(SizeLabel),
    Failed(FailureKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Accepted,
    /// The file could not be read or decoded; the session error is set.
    Unreadable,
}

/// Internal failure of one try-on, before classification.
#[derive(Debug, thiserror::Error)]
enum TryOnError {
    #[error("product image unavailable: {0}")]
    ProductImage(#[from] CodecError),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

impl TryOnError {
    fn kind(&self) -> FailureKind {
        match self {
            TryOnError::Capability(e) if e.is_credential() => FailureKind::Credential,
            _ => FailureKind::Generic,
        }
    }
}

pub struct Wizard {
    session: TryOnSession,
    phase: Phase,
    gate: CredentialGate,
    capability: Arc<dyn TryOnCapability>,
    images: Arc<dyn ImageSource>,
    ordering: CallOrdering,
    events: EventHub,
    /// Whether the startup probe has answered.
    probed: bool,
}

impl Wizard {
    pub fn new(
        gate: CredentialGate,
        capability: Arc<dyn TryOnCapability>,
        images: Arc<dyn ImageSource>,
    ) -> Self {
        Self {
            session: TryOnSession::default(),
            phase: Phase::SelectProduct,
            gate,
            capability,
            images,
            ordering: CallOrdering::default(),
            events: EventHub::default(),
            probed: false,
        }
    }

    pub fn with_ordering(mut self, ordering: CallOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    // ── Read access ─────────────────────────────────────────────────

    pub fn session(&self) -> &TryOnSession {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn step(&self) -> WizardStep {
        self.phase.step()
    }

    pub fn credential_state(&self) -> CredentialState {
        self.gate.state()
    }

    pub fn ordering(&self) -> CallOrdering {
        self.ordering
    }

    pub fn capability_name(&self) -> &str {
        self.capability.name()
    }

    /// What the presentation layer should show right now.
    pub fn screen(&self) -> Screen {
        match self.gate.state() {
            CredentialState::Unknown if !self.probed => Screen::Probing,
            CredentialState::Present => Screen::Step(self.phase.step()),
            _ => Screen::CredentialRequired,
        }
    }

    pub fn subscribe(&mut self) -> UnboundedReceiver<WizardEvent> {
        self.events.subscribe()
    }

    // ── Credentials ─────────────────────────────────────────────────

    /// Startup check; the gate stays closed until this answers.
    pub async fn probe_credentials(&mut self) -> CredentialState {
        let before = self.gate.state();
        let state = self.gate.probe().await;
        self.probed = true;
        self.credential_changed(before);
        state
    }

    /// Let the user pick a key. Present afterwards unless the host failed.
    pub async fn request_credential_selection(&mut self) -> Result<CredentialState, HostError> {
        let before = self.gate.state();
        let result = self.gate.request_selection().await;
        self.probed = true;
        self.credential_changed(before);
        result
    }

    // ── Navigation ──────────────────────────────────────────────────

    /// Choose (or replace) the garment. Only on the selection step.
    pub fn select_product(&mut self, product: Product) -> Result<(), WizardError> {
        self.require_phase("select a product", &[Phase::SelectProduct])?;
        log::info!("[WIZARD] Selected product {} ({})", product.id, product.name);
        self.session.selected_product = Some(product);
        self.session.error = None;
        Ok(())
    }

    pub fn continue_to_upload(&mut self) -> Result<(), WizardError> {
        self.require_phase("continue", &[Phase::SelectProduct])?;
        if self.session.selected_product.is_none() {
            return Err(WizardError::NoProduct);
        }
        if !self.gate.allows_calls() {
            return Err(WizardError::CredentialRequired(self.gate.state()));
        }
        self.set_phase(Phase::UploadPhoto);
        Ok(())
    }

    /// Back to selection. Product and photo are kept.
    pub fn back_to_selection(&mut self) -> Result<(), WizardError> {
        self.require_phase("go back", &[Phase::UploadPhoto])?;
        self.set_phase(Phase::SelectProduct);
        Ok(())
    }

    /// Read and encode a photo from disk.
    ///
    /// A read or decode failure is reported through the session error and
    /// leaves the previous photo (if any) in place.
    pub async fn upload_photo(&mut self, path: &Path) -> Result<UploadOutcome, WizardError> {
        self.require_phase("upload a photo", &[Phase::UploadPhoto])?;
        match self.images.encode_local_file(path).await {
            Ok(image) => {
                log::info!(
                    "[WIZARD] Photo accepted: {} ({} bytes, {})",
                    path.display(),
                    image.data.len(),
                    image.mime_type
                );
                self.session.user_image = Some(image);
                self.session.error = None;
                Ok(UploadOutcome::Accepted)
            }
            Err(e) => {
                log::warn!("[WIZARD] Photo rejected: {}", e);
                self.session.error = Some(messages::FILE_READ_FAILED.to_string());
                Ok(UploadOutcome::Unreadable)
            }
        }
    }

    /// Accept an already-encoded photo.
    pub fn set_user_image(&mut self, image: InlineImage) -> Result<(), WizardError> {
        self.require_phase("upload a photo", &[Phase::UploadPhoto])?;
        self.session.user_image = Some(image);
        self.session.error = None;
        Ok(())
    }

    pub fn clear_photo(&mut self) -> Result<(), WizardError> {
        self.require_phase("remove the photo", &[Phase::UploadPhoto])?;
        self.session.user_image = None;
        Ok(())
    }

    /// From a resolved try-on back to the upload step, keeping product
    /// and photo so the user can retry or swap the photo.
    pub fn retry(&mut self) -> Result<(), WizardError> {
        self.require_phase("retry", &[Phase::Failed, Phase::ResultReady])?;
        self.session.clear_result();
        self.set_phase(Phase::UploadPhoto);
        Ok(())
    }

    /// Discard everything and start over. Credential state is kept.
    pub fn reset(&mut self) {
        log::info!("[WIZARD] Reset");
        self.session = TryOnSession::default();
        self.set_phase(Phase::SelectProduct);
    }

    // ── Try-on ──────────────────────────────────────────────────────

    pub fn can_start_try_on(&self) -> Result<(), NotReadyReason> {
        self.try_on_inputs().map(|_| ())
    }

    fn try_on_inputs(&self) -> Result<(Product, InlineImage), NotReadyReason> {
        if self.session.is_loading {
            return Err(NotReadyReason::Busy);
        }
        if self.phase != Phase::UploadPhoto {
            return Err(NotReadyReason::WrongPhase(self.phase));
        }
        if !self.gate.allows_calls() {
            return Err(NotReadyReason::Credential(self.gate.state()));
        }
        let product = self
            .session
            .selected_product
            .clone()
            .ok_or(NotReadyReason::NoProduct)?;
        let photo = self
            .session
            .user_image
            .clone()
            .ok_or(NotReadyReason::NoPhoto)?;
        Ok((product, photo))
    }

    /// Run one try-on to completion.
    ///
    /// Failures never propagate; they land in the session error, the
    /// phase becomes Failed, and a credential rejection re-arms the gate.
    pub async fn start_try_on(&mut self) -> TryOnOutcome {
        let (product, photo) = match self.try_on_inputs() {
            Ok(inputs) => inputs,
            Err(reason) => {
                log::info!("[WIZARD] Try-on not started: {}", reason);
                return TryOnOutcome::NotReady(reason);
            }
        };

        let start = Instant::now();
        log::info!(
            "[WIZARD] Try-on started: {} via {} ({:?})",
            product.id,
            self.capability.name(),
            self.ordering
        );

        self.session.clear_result();
        self.set_loading(true);
        self.set_phase(Phase::Submitting);

        let result = self.run_calls(&product, &photo).await;

        match result {
            Ok((size, image)) => {
                log::info!(
                    "[WIZARD] Try-on complete in {}ms: size {}, {} bytes",
                    start.elapsed().as_millis(),
                    size,
                    image.data.len()
                );
                self.session.recommended_size = Some(size);
                self.session.result_image = Some(image);
                self.set_loading(false);
                self.set_phase(Phase::ResultReady);
                TryOnOutcome::Succeeded(size)
            }
            Err(err) => {
                let kind = err.kind();
                log::error!(
                    "[WIZARD] Try-on failed after {}ms ({:?}): {}",
                    start.elapsed().as_millis(),
                    kind,
                    err
                );
                let message = match kind {
                    FailureKind::Credential => {
                        let before = self.gate.state();
                        self.gate.mark_rejected();
                        self.credential_changed(before);
                        messages::CREDENTIAL_REJECTED
                    }
                    FailureKind::Generic => messages::GENERATION_FAILED,
                };
                self.session.error = Some(message.to_string());
                self.set_loading(false);
                self.set_phase(Phase::Failed);
                TryOnOutcome::Failed(kind)
            }
        }
    }

    async fn run_calls(
        &mut self,
        product: &Product,
        photo: &InlineImage,
    ) -> Result<(SizeLabel, InlineImage), TryOnError> {
        let capability = Arc::clone(&self.capability);
        let images = Arc::clone(&self.images);

        self.events.emit(WizardEvent::Progress(TryOnStage::FetchingProduct));
        let garment = images.encode_reference(&product.image_url).await?;

        match self.ordering {
            CallOrdering::Sequential => {
                self.events.emit(WizardEvent::Progress(TryOnStage::EstimatingSize));
                let size = capability.estimate_size(photo, &product.name).await?;
                self.events.emit(WizardEvent::Progress(TryOnStage::GeneratingImage));
                let image = capability
                    .generate_composite(photo, &garment, &product.name)
                    .await?;
                Ok((size, image))
            }
            CallOrdering::Parallel => {
                self.events.emit(WizardEvent::Progress(TryOnStage::EstimatingSize));
                self.events.emit(WizardEvent::Progress(TryOnStage::GeneratingImage));
                let (size, image) = tokio::try_join!(
                    capability.estimate_size(photo, &product.name),
                    capability.generate_composite(photo, &garment, &product.name),
                )?;
                Ok((size, image))
            }
        }
    }

    // ── Internals ───────────────────────────────────────────────────

    fn require_phase(&self, action: &'static str, allowed: &[Phase]) -> Result<(), WizardError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(WizardError::NotAllowed {
                action,
                phase: self.phase,
            })
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            log::debug!("[WIZARD] {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
            self.events.emit(WizardEvent::PhaseChanged(phase));
        }
    }

    fn set_loading(&mut self, loading: bool) {
        self.session.is_loading = loading;
        self.events.emit(WizardEvent::LoadingChanged(loading));
    }

    fn credential_changed(&mut self, before: CredentialState) {
        let after = self.gate.state();
        if after != before {
            self.events.emit(WizardEvent::CredentialChanged(after));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::DryrunCapability;
    use async_trait::async_trait;

    fn png(width: u32, height: u32, rgb: [u8; 3]) -> InlineImage {
        let mut data = Vec::new();
        image::RgbImage::from_pixel(width, height, image::Rgb(rgb))
            .write_to(&mut std::io::Cursor::new(&mut data), image::ImageFormat::Png)
            .unwrap();
        InlineImage::new("image/png", data)
    }

    /// Local files decode unless named `missing.png`; references containing
    /// `broken` yield undecodable bytes.
    struct FixedImages;

    #[async_trait]
    impl ImageSource for FixedImages {
        async fn encode_local_file(&self, path: &Path) -> Result<InlineImage, CodecError> {
            if path.ends_with("missing.png") {
                return Err(CodecError::NotAnImage(path.display().to_string()));
            }
            Ok(png(8, 8, [0, 0, 255]))
        }

        async fn encode_reference(&self, location: &str) -> Result<InlineImage, CodecError> {
            if location.contains("broken") {
                return Ok(InlineImage::new("image/png", vec![4, 5, 6]));
            }
            Ok(png(4, 4, [255, 0, 0]))
        }
    }

    fn wizard() -> Wizard {
        Wizard::new(
            CredentialGate::not_required(),
            Arc::new(DryrunCapability::default()),
            Arc::new(FixedImages),
        )
    }

    fn hoodie() -> Product {
        Product::new("bf-hoodie", "Better Future Hoodie", "/images/hoodie.png")
    }

    #[tokio::test]
    async fn screen_waits_for_probe() {
        let mut w = wizard();
        assert_eq!(w.screen(), Screen::Probing);
        w.probe_credentials().await;
        assert_eq!(w.screen(), Screen::Step(WizardStep::SelectProduct));
    }

    #[tokio::test]
    async fn continue_requires_product() {
        let mut w = wizard();
        w.probe_credentials().await;
        assert_eq!(w.continue_to_upload(), Err(WizardError::NoProduct));
        w.select_product(hoodie()).unwrap();
        w.continue_to_upload().unwrap();
        assert_eq!(w.phase(), Phase::UploadPhoto);
    }

    #[tokio::test]
    async fn continue_blocked_before_probe() {
        let mut w = wizard();
        w.select_product(hoodie()).unwrap();
        assert_eq!(
            w.continue_to_upload(),
            Err(WizardError::CredentialRequired(CredentialState::Unknown))
        );
    }

    #[tokio::test]
    async fn back_keeps_product_and_photo() {
        let mut w = wizard();
        w.probe_credentials().await;
        w.select_product(hoodie()).unwrap();
        w.continue_to_upload().unwrap();
        w.upload_photo(Path::new("me.png")).await.unwrap();
        w.back_to_selection().unwrap();

        assert_eq!(w.phase(), Phase::SelectProduct);
        assert!(w.session().selected_product().is_some());
        assert!(w.session().user_image().is_some());
    }

    #[tokio::test]
    async fn unreadable_photo_sets_error_and_stays() {
        let mut w = wizard();
        at_upload(&mut w, hoodie()).await;

        let outcome = w.upload_photo(Path::new("missing.png")).await.unwrap();
        assert_eq!(outcome, UploadOutcome::Unreadable);
        assert_eq!(w.session().error(), Some(messages::FILE_READ_FAILED));
        assert!(w.session().user_image().is_none());
        assert_eq!(w.phase(), Phase::UploadPhoto);
    }

    #[tokio::test]
    async fn select_is_refused_outside_selection_step() {
        let mut w = wizard();
        w.probe_credentials().await;
        w.select_product(hoodie()).unwrap();
        w.continue_to_upload().unwrap();
        let err = w.select_product(hoodie()).unwrap_err();
        assert!(matches!(
            err,
            WizardError::NotAllowed {
                phase: Phase::UploadPhoto,
                ..
            }
        ));
    }

    async fn at_upload(w: &mut Wizard, product: Product) {
        w.probe_credentials().await;
        w.select_product(product).unwrap();
        w.continue_to_upload().unwrap();
    }

    #[tokio::test]
    async fn dryrun_try_on_reaches_result() {
        let mut w = wizard();
        at_upload(&mut w, hoodie()).await;
        w.upload_photo(Path::new("me.png")).await.unwrap();

        assert_eq!(w.start_try_on().await, TryOnOutcome::Succeeded(SizeLabel::M));
        assert_eq!(w.phase(), Phase::ResultReady);
        assert_eq!(w.session().recommended_size(), Some(SizeLabel::M));
        assert!(w.session().result_image().is_some());
        assert!(!w.session().is_loading());
    }

    #[tokio::test]
    async fn undecodable_garment_fails_generically() {
        let mut w = wizard();
        at_upload(
            &mut w,
            Product::new("x", "Broken", "/images/broken.png"),
        )
        .await;
        w.set_user_image(png(8, 8, [0, 0, 255])).unwrap();

        let outcome = w.start_try_on().await;
        assert_eq!(outcome, TryOnOutcome::Failed(FailureKind::Generic));
        assert_eq!(w.session().error(), Some(messages::GENERATION_FAILED));
        assert!(!w.session().is_loading());
        assert_eq!(w.credential_state(), CredentialState::Present);
    }

    #[tokio::test]
    async fn start_without_photo_changes_nothing() {
        let mut w = wizard();
        at_upload(&mut w, hoodie()).await;
        let before = w.session().clone();

        assert_eq!(
            w.start_try_on().await,
            TryOnOutcome::NotReady(NotReadyReason::NoPhoto)
        );
        assert_eq!(w.session(), &before);
        assert_eq!(w.phase(), Phase::UploadPhoto);
    }

    #[test]
    fn not_ready_reasons_read_naturally() {
        assert_eq!(NotReadyReason::NoPhoto.to_string(), "no photo uploaded");
        assert_eq!(
            NotReadyReason::Credential(CredentialState::Absent).to_string(),
            "credential is absent"
        );
    }
}
