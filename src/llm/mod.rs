//! Capability domain: the two AI calls behind a try-on.
//!
//! Public API for the "brain" of the try-on flow.
//! External code should only use the items exported here.
//!
//! Providers:
//!   - Google Gemini (gemini.rs)
//!   - Offline dry run (dryrun.rs)
//!
//! Shared:
//!   - error.rs   : CapabilityError + credential/generic classification
//!   - prompts.rs : instruction text
//!   - provider.rs: provider ids + client construction
//!   - types.rs   : SizeLabel

mod dryrun;
mod error;
pub mod gemini;
pub mod prompts;
pub mod provider;
pub mod types;

pub use dryrun::DryrunCapability;
pub use error::{CapabilityError, CapabilityErrorKind};
pub use gemini::{ApiKeyResolver, GeminiClient, GeminiSettings};
pub use provider::{build_capability, ProviderKind};
pub use types::SizeLabel;

use crate::imaging::InlineImage;
use async_trait::async_trait;

/// The external generative service, reduced to the two calls a try-on needs.
///
/// Each call is exactly one request: no retries, no caching. Calls are
/// independent; ordering is the caller's decision.
#[async_trait]
pub trait TryOnCapability: Send + Sync {
    fn name(&self) -> &str;

    /// Estimate the garment size that fits the person in the photo.
    async fn estimate_size(
        &self,
        user_image: &InlineImage,
        product_label: &str,
    ) -> Result<SizeLabel, CapabilityError>;

    /// Render the person in `user_image` wearing the product.
    async fn generate_composite(
        &self,
        user_image: &InlineImage,
        product_image: &InlineImage,
        product_label: &str,
    ) -> Result<InlineImage, CapabilityError>;
}
