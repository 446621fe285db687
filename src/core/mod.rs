//! Local cart state machine and display helpers.

/// Optimistic cart state and the mutation template.
pub mod cart;
/// Static product-id to icon/color mapping.
pub mod display;
