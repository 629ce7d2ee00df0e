//! Offline capability: no network, no API key.
//!
//! Returns a fixed size and builds the "composite" locally by pasting a
//! scaled-down product image onto the torso area of the photo. Useful for
//! exercising the whole wizard without spending generation credits.

use super::error::CapabilityError;
use super::types::SizeLabel;
use super::TryOnCapability;
use crate::imaging::InlineImage;
use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat};

pub struct DryrunCapability {
    size: SizeLabel,
}

impl DryrunCapability {
    pub fn new(size: SizeLabel) -> Self {
        Self { size }
    }
}

impl Default for DryrunCapability {
    fn default() -> Self {
        Self::new(SizeLabel::M)
    }
}

#[async_trait]
impl TryOnCapability for DryrunCapability {
    fn name(&self) -> &str {
        "dryrun"
    }

    async fn estimate_size(
        &self,
        user_image: &InlineImage,
        product_label: &str,
    ) -> Result<SizeLabel, CapabilityError> {
        decode(user_image, "user photo")?;
        log::info!("[DRYRUN] Size estimate for {}: {}", product_label, self.size);
        Ok(self.size)
    }

    async fn generate_composite(
        &self,
        user_image: &InlineImage,
        product_image: &InlineImage,
        product_label: &str,
    ) -> Result<InlineImage, CapabilityError> {
        let user = user_image.clone();
        let product = product_image.clone();
        let composite = tokio::task::spawn_blocking(move || compose(&user, &product))
            .await
            .map_err(|e| CapabilityError::generic(format!("composite task failed: {}", e)))??;
        log::info!(
            "[DRYRUN] Composite for {}: {} bytes",
            product_label,
            composite.data.len()
        );
        Ok(composite)
    }
}

fn decode(image: &InlineImage, what: &str) -> Result<DynamicImage, CapabilityError> {
    image::load_from_memory(&image.data)
        .map_err(|e| CapabilityError::generic(format!("{} is not a decodable image: {}", what, e)))
}

fn compose(user: &InlineImage, product: &InlineImage) -> Result<InlineImage, CapabilityError> {
    let mut canvas = decode(user, "user photo")?.to_rgba8();
    let garment = decode(product, "product image")?;

    let (width, height) = canvas.dimensions();
    let target_w = (width / 2).max(1);
    let target_h = (height / 2).max(1);
    let garment = garment.resize(target_w, target_h, FilterType::Nearest).to_rgba8();

    let x = i64::from((width - garment.width()) / 2);
    let y = i64::from(height / 3);
    imageops::overlay(&mut canvas, &garment, x, y);

    let mut png = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| CapabilityError::generic(format!("PNG encode failed: {}", e)))?;
    Ok(InlineImage::new("image/png", png))
}
