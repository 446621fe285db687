//! Runtime configuration for a cart session.

use std::{str::FromStr, time::Duration};

use crate::types::SessionId;

/// Settings for [`crate::runtime::handle::spawn_cart`].
#[derive(Debug, Clone, PartialEq)]
pub struct CartConfig {
    /// Cart session sent with every tool call.
    pub session_id: SessionId,
    /// Base url of the backend exposing `/mcp-action`.
    pub backend_url: String,
    /// Quiet period before a triggered resync runs.
    pub resync_debounce_ms: u64,
    /// Per-request timeout for the HTTP backend.
    pub request_timeout_ms: u64,
    /// Capacity of the event broadcast channel.
    pub event_buffer: usize,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            backend_url: "http://localhost:3002".to_string(),
            resync_debounce_ms: 300,
            request_timeout_ms: 10_000,
            event_buffer: 256,
        }
    }
}

impl CartConfig {
    /// Defaults overlaid with `CART_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        if let Some(v) = lookup("CART_SESSION_ID").filter(|v| !v.is_empty()) {
            cfg.session_id = v;
        }
        if let Some(v) = lookup("CART_BACKEND_URL").filter(|v| !v.is_empty()) {
            cfg.backend_url = v;
        }
        overlay(&lookup, "CART_RESYNC_DEBOUNCE_MS", &mut cfg.resync_debounce_ms);
        overlay(&lookup, "CART_REQUEST_TIMEOUT_MS", &mut cfg.request_timeout_ms);
        cfg
    }

    /// [`CartConfig::resync_debounce_ms`] as a duration.
    pub fn resync_debounce(&self) -> Duration {
        Duration::from_millis(self.resync_debounce_ms)
    }

    /// [`CartConfig::request_timeout_ms`] as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn overlay<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    let Some(raw) = lookup(key) else { return };
    match raw.trim().parse() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable config value"),
    }
}
