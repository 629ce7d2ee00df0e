//! The mutable try-on session.

use crate::catalog::Product;
use crate::imaging::InlineImage;
use crate::llm::SizeLabel;

/// Everything the user has entered and the service has returned so far.
///
/// Only the wizard mutates it; readers get it through `Wizard::session()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TryOnSession {
    pub(super) selected_product: Option<Product>,
    pub(super) user_image: Option<InlineImage>,
    pub(super) result_image: Option<InlineImage>,
    pub(super) recommended_size: Option<SizeLabel>,
    pub(super) is_loading: bool,
    pub(super) error: Option<String>,
}

impl TryOnSession {
    pub fn selected_product(&self) -> Option<&Product> {
        self.selected_product.as_ref()
    }

    pub fn user_image(&self) -> Option<&InlineImage> {
        self.user_image.as_ref()
    }

    pub fn result_image(&self) -> Option<&InlineImage> {
        self.result_image.as_ref()
    }

    pub fn recommended_size(&self) -> Option<SizeLabel> {
        self.recommended_size
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True for a freshly created (or reset) session.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(super) fn clear_result(&mut self) {
        self.result_image = None;
        self.recommended_size = None;
        self.error = None;
    }
}
