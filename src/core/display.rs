use serde::{Deserialize, Serialize};

/// Icon used for products missing from the display table.
pub const FALLBACK_ICON: &str = "📦";
/// Accent color used for products missing from the display table.
pub const FALLBACK_COLOR: &str = "#3b82f6";

const DISPLAY_TABLE: &[(&str, &str, &str)] = &[
    ("lebron-lakers-jersey", "👑", "#552583"),
    ("curry-warriors-jersey", "🏹", "#1D428A"),
    ("giannis-bucks-jersey", "🇬🇷", "#00471B"),
    ("luka-mavs-jersey", "🏀", "#00538C"),
    ("tatum-celtics-jersey", "☘️", "#007A33"),
    ("jordan-bulls-jersey", "🐐", "#CE1141"),
];

/// Presentation metadata kept only on the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMeta {
    /// Icon glyph.
    pub icon: String,
    /// Accent color as a CSS hex string.
    pub color: String,
}

impl DisplayMeta {
    /// The generic icon/color pair.
    pub fn fallback() -> Self {
        Self {
            icon: FALLBACK_ICON.to_string(),
            color: FALLBACK_COLOR.to_string(),
        }
    }

    /// True when this is the generic fallback.
    pub fn is_fallback(&self) -> bool {
        self.icon == FALLBACK_ICON && self.color == FALLBACK_COLOR
    }
}

/// Looks up display metadata for `product_id`, falling back to the generic pair.
pub fn display_for(product_id: &str) -> DisplayMeta {
    DISPLAY_TABLE
        .iter()
        .find(|(id, _, _)| *id == product_id)
        .map(|(_, icon, color)| DisplayMeta {
            icon: (*icon).to_string(),
            color: (*color).to_string(),
        })
        .unwrap_or_else(DisplayMeta::fallback)
}
