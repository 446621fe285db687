//! Shared primitive IDs and the cart line key.

use serde::{Deserialize, Serialize};

/// Queue operation identifier.
pub type OpId = String;
/// Catalog product identifier.
pub type ProductId = String;
/// Product variant identifier (size, storage, ...).
pub type VariantId = String;
/// Cart session identifier sent with every tool call.
pub type SessionId = String;

/// Identity of a cart line: one line per (product, variant) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineKey {
    /// Product id.
    pub product_id: ProductId,
    /// Variant id.
    pub variant_id: VariantId,
}

impl LineKey {
    /// Builds a key from anything string-like.
    pub fn new(product_id: impl Into<ProductId>, variant_id: impl Into<VariantId>) -> Self {
        Self {
            product_id: product_id.into(),
            variant_id: variant_id.into(),
        }
    }
}

impl std::fmt::Display for LineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.product_id, self.variant_id)
    }
}
