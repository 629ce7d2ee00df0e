//! Product catalog: the fixed list of garments offered for try-on.
//!
//! The built-in list ships with the binary. A JSON file with the same
//! shape (`[{"id": ..., "name": ..., "imageUrl": ...}]`) can replace it.

use crate::llm::SizeLabel;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    /// URL, `data:` URL or path relative to the assets directory.
    #[serde(alias = "imageLocation")]
    pub image_url: String,
}

impl Product {
    pub fn new(id: &str, name: &str, image_url: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            image_url: image_url.to_string(),
        }
    }
}

/// Sizes the shop sells; size estimates are always one of these.
pub const AVAILABLE_SIZES: [SizeLabel; 6] = SizeLabel::ALL;

#[derive(Debug, Clone)]
pub struct Catalog {
    products: Vec<Product>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("catalog {0} contains no products")]
    Empty(String),
    #[error("catalog {path} lists product id {id} twice")]
    DuplicateId { path: String, id: String },
}

impl Catalog {
    pub fn builtin() -> Self {
        Self {
            products: vec![
                Product::new(
                    "bf-hoodie",
                    "Better Future Hoodie",
                    "/images/better-future-hoodie.png",
                ),
                Product::new(
                    "bf-tee",
                    "Better Future T-Shirt",
                    "/images/better-future-tee.png",
                ),
                Product::new(
                    "bf-crewneck",
                    "Better Future Crewneck",
                    "/images/better-future-crewneck.png",
                ),
            ],
        }
    }

    /// Load a catalog from a JSON file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: display.clone(),
            source,
        })?;
        let products: Vec<Product> =
            serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
                path: display.clone(),
                source,
            })?;
        if products.is_empty() {
            return Err(CatalogError::Empty(display));
        }
        let mut seen = std::collections::HashSet::new();
        for product in &products {
            if !seen.insert(product.id.as_str()) {
                return Err(CatalogError::DuplicateId {
                    path: display,
                    id: product.id.clone(),
                });
            }
        }
        log::info!("[CATALOG] Loaded {} products from {}", products.len(), display);
        Ok(Self { products })
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn find(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Look up by id, or by 1-based position as shown in the product list.
    pub fn resolve(&self, key: &str) -> Option<&Product> {
        let key = key.trim();
        if let Some(product) = self.find(key) {
            return Some(product);
        }
        key.parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|idx| self.products.get(idx))
    }
}
