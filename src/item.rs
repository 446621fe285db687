//! Cart line records, drafts, and the server snapshot shape.

use serde::{Deserialize, Serialize};

use crate::{
    core::display::{display_for, DisplayMeta},
    types::{LineKey, ProductId, VariantId},
};

/// One line of the local, optimistic cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Product id.
    pub product_id: ProductId,
    /// Variant id.
    pub variant_id: VariantId,
    /// Product display name.
    pub name: String,
    /// Variant label ("Medium", "128GB").
    pub variant: String,
    /// Unit price captured when the line was created or last synced.
    pub unit_price: f64,
    /// Quantity, always at least 1 while the line exists.
    pub quantity: u32,
    /// Optional product image.
    pub image_url: Option<String>,
    /// Client-only presentation metadata.
    pub display: DisplayMeta,
}

impl CartItem {
    /// Key identifying this line.
    pub fn key(&self) -> LineKey {
        LineKey::new(self.product_id.clone(), self.variant_id.clone())
    }

    /// Returns true when this line belongs to `key`.
    pub fn matches(&self, key: &LineKey) -> bool {
        self.product_id == key.product_id && self.variant_id == key.variant_id
    }

    /// `unit_price * quantity`.
    pub fn line_total(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

/// Payload for adding a product to the cart.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDraft {
    /// Product id.
    pub product_id: ProductId,
    /// Variant id.
    pub variant_id: VariantId,
    /// Product display name.
    pub name: String,
    /// Variant label.
    pub variant: String,
    /// Unit price shown to the user at add time.
    pub unit_price: f64,
    /// Quantity to add.
    pub quantity: u32,
    /// Optional product image.
    pub image_url: Option<String>,
}

impl ItemDraft {
    /// Minimal draft; name and variant label default to the ids.
    pub fn new(
        product_id: impl Into<ProductId>,
        variant_id: impl Into<VariantId>,
        unit_price: f64,
        quantity: u32,
    ) -> Self {
        let product_id = product_id.into();
        let variant_id = variant_id.into();
        Self {
            name: product_id.clone(),
            variant: variant_id.clone(),
            product_id,
            variant_id,
            unit_price,
            quantity,
            image_url: None,
        }
    }

    /// Key of the line this draft lands on.
    pub fn key(&self) -> LineKey {
        LineKey::new(self.product_id.clone(), self.variant_id.clone())
    }

    /// Materializes a fresh cart line.
    pub fn into_item(self) -> CartItem {
        let display = display_for(&self.product_id);
        CartItem {
            product_id: self.product_id,
            variant_id: self.variant_id,
            name: self.name,
            variant: self.variant,
            unit_price: self.unit_price,
            quantity: self.quantity,
            image_url: self.image_url,
            display,
        }
    }
}

/// Line entry as returned by the `get_cart_state` tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerCartLine {
    /// Product id.
    pub product_id: ProductId,
    /// Variant id.
    pub variant_id: VariantId,
    /// Product display name.
    #[serde(default)]
    pub name: String,
    /// Variant label.
    #[serde(default)]
    pub variant: String,
    /// Unit price.
    #[serde(default)]
    pub price: f64,
    /// Quantity.
    pub quantity: u32,
    /// Image url; the server sends an empty string when there is none.
    #[serde(default)]
    pub image_url: Option<String>,
}

impl ServerCartLine {
    /// Converts to a local line, re-deriving display metadata.
    pub fn into_item(self) -> CartItem {
        let display = display_for(&self.product_id);
        CartItem {
            product_id: self.product_id,
            variant_id: self.variant_id,
            name: self.name,
            variant: self.variant,
            unit_price: self.price,
            quantity: self.quantity,
            image_url: self.image_url.filter(|url| !url.is_empty()),
            display,
        }
    }
}

/// Authoritative cart as reported by the server.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CartSnapshot {
    /// Lines in server order.
    #[serde(default)]
    pub items: Vec<ServerCartLine>,
    /// Server-computed total.
    #[serde(default)]
    pub total: f64,
}
