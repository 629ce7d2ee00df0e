//! Prompt text for the two capability calls.
//!
//! Image parts always precede the instruction text in the request; the
//! prompts refer to them by position.

use super::types::SizeLabel;

pub const SIZE_MAX_TOKENS: u32 = 16;
pub const SIZE_TEMPERATURE: f64 = 0.1;

/// Size estimation instruction. The first (only) image is the user photo.
pub fn build_size_prompt(product_label: &str) -> String {
    format!(
        "The photo shows a person who wants to buy the garment \"{product}\". \
Estimate which size of this garment fits them, judging from body proportions visible in the photo. \
Answer with exactly one of these size codes and nothing else: {sizes}.",
        product = product_label,
        sizes = SizeLabel::prompt_list(),
    )
}

/// Composite instruction. Image 1 is the user photo, image 2 the product.
pub fn build_composite_prompt(product_label: &str) -> String {
    format!(
        "Image 1 is a photo of a person. Image 2 is the product \"{product}\". \
Generate a realistic photo of the person from image 1 wearing the product from image 2. \
Keep the person's face, body shape, pose and the background of image 1 unchanged. \
Reproduce the product's color, print and cut faithfully and fit it naturally to the body, \
with correct folds, shadows and lighting. Return only the image.",
        product = product_label,
    )
}
