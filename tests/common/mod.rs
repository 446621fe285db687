#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use cartsync::{
    backend::{BackendError, CartBackend, CatalogEntry, InMemoryBackend, ToolResponse},
    config::CartConfig,
    item::ItemDraft,
    op::ToolRequest,
};

pub const SESSION: &str = "test-session";

/// Simulated store that can hold one request for a chosen tool open.
pub struct GatedBackend {
    pub store: InMemoryBackend,
    held_tool: Mutex<Option<String>>,
    arrived: Notify,
    release: Notify,
}

impl GatedBackend {
    pub fn new(catalog: Vec<CatalogEntry>) -> Arc<Self> {
        Arc::new(Self {
            store: InMemoryBackend::new(catalog),
            held_tool: Mutex::new(None),
            arrived: Notify::new(),
            release: Notify::new(),
        })
    }

    /// The next call to `tool` blocks until [`GatedBackend::release`].
    pub fn hold_next(&self, tool: &str) {
        *self.held_tool.lock().expect("lock") = Some(tool.to_string());
    }

    /// Resolves once the held request reached the backend.
    pub async fn wait_arrived(&self) {
        self.arrived.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl CartBackend for GatedBackend {
    async fn call_tool(&self, request: ToolRequest) -> Result<ToolResponse, BackendError> {
        let hold = {
            let mut held = self.held_tool.lock().expect("lock");
            if held.as_deref() == Some(request.tool_name.as_str()) {
                held.take();
                true
            } else {
                false
            }
        };
        if hold {
            self.arrived.notify_one();
            self.release.notified().await;
        }
        self.store.call_tool(request).await
    }
}

/// Simulated store whose calls to one tool panic.
pub struct PanickingBackend {
    pub store: InMemoryBackend,
    tool: &'static str,
}

impl PanickingBackend {
    pub fn new(catalog: Vec<CatalogEntry>, tool: &'static str) -> Arc<Self> {
        Arc::new(Self {
            store: InMemoryBackend::new(catalog),
            tool,
        })
    }
}

#[async_trait]
impl CartBackend for PanickingBackend {
    async fn call_tool(&self, request: ToolRequest) -> Result<ToolResponse, BackendError> {
        if request.tool_name == self.tool {
            panic!("backend crashed handling {}", self.tool);
        }
        self.store.call_tool(request).await
    }
}

pub fn catalog() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry::new("A", "default", 1.0),
        CatalogEntry::new("B", "default", 2.0),
        CatalogEntry::new("X", "default", 10.0),
        CatalogEntry::new("luka-mavs-jersey", "size-l", 139.99),
        CatalogEntry::new("mystery-box", "default", 5.0),
    ]
}

pub fn draft(product: &str, qty: u32, price: f64) -> ItemDraft {
    ItemDraft::new(product, "default", price, qty)
}

/// Config whose debounced resync never fires within a test.
pub fn quiet_config() -> CartConfig {
    CartConfig {
        session_id: SESSION.to_string(),
        resync_debounce_ms: 3_600_000,
        ..CartConfig::default()
    }
}

pub fn config_with_debounce(ms: u64) -> CartConfig {
    CartConfig {
        session_id: SESSION.to_string(),
        resync_debounce_ms: ms,
        ..CartConfig::default()
    }
}

/// Routes `tracing` output to the test harness; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
