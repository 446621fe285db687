//! Simulated store backend holding authoritative carts in memory.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use hashbrown::HashMap;
use serde_json::json;

use crate::{
    item::{CartSnapshot, ServerCartLine},
    op::{tools, ToolRequest},
    types::{LineKey, ProductId, SessionId, VariantId},
};

use super::{BackendError, CartBackend, ToolResponse, INVALID_PARAMS, METHOD_NOT_FOUND};

/// Purchasable (product, variant) pair with its final price.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Product id.
    pub product_id: ProductId,
    /// Variant id.
    pub variant_id: VariantId,
    /// Product name.
    pub name: String,
    /// Variant label.
    pub variant: String,
    /// Base price plus variant modifier.
    pub price: f64,
    /// Optional image.
    pub image_url: Option<String>,
}

impl CatalogEntry {
    /// Entry whose name and label default to the ids.
    pub fn new(product_id: impl Into<ProductId>, variant_id: impl Into<VariantId>, price: f64) -> Self {
        let product_id = product_id.into();
        let variant_id = variant_id.into();
        Self {
            name: product_id.clone(),
            variant: variant_id.clone(),
            product_id,
            variant_id,
            price,
            image_url: None,
        }
    }

    fn matches(&self, key: &LineKey) -> bool {
        self.product_id == key.product_id && self.variant_id == key.variant_id
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    catalog: Vec<CatalogEntry>,
    carts: HashMap<SessionId, Vec<(LineKey, u32)>>,
    fail_next: HashMap<String, u32>,
    calls: Vec<ToolRequest>,
}

/// In-process stand-in for the shop's tool server.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
}

impl InMemoryBackend {
    /// Backend selling `catalog`.
    pub fn new(catalog: Vec<CatalogEntry>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                catalog,
                ..MemoryState::default()
            }),
        }
    }

    /// Makes the next `count` calls to `tool` fail with [`BackendError::Injected`].
    pub fn fail_next(&self, tool: &str, count: u32) {
        *self.lock().fail_next.entry(tool.to_string()).or_default() += count;
    }

    /// Every request received so far, in arrival order.
    pub fn calls(&self) -> Vec<ToolRequest> {
        self.lock().calls.clone()
    }

    /// Number of requests received for `tool`.
    pub fn call_count(&self, tool: &str) -> usize {
        self.lock().calls.iter().filter(|r| r.tool_name == tool).count()
    }

    /// Authoritative cart for `session_id`.
    pub fn cart(&self, session_id: &str) -> CartSnapshot {
        let state = self.lock();
        build_snapshot(&state, session_id)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, request: &ToolRequest) -> Result<ToolResponse, BackendError> {
        let mut state = self.lock();
        state.calls.push(request.clone());

        if let Some(remaining) = state.fail_next.get_mut(&request.tool_name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BackendError::Injected {
                    tool: request.tool_name.clone(),
                });
            }
        }

        let session = request.session_id.clone();
        let outcome = match request.tool_name.as_str() {
            tools::ADD_TO_CART => add_to_cart(&mut state, request),
            tools::REMOVE_FROM_CART => remove_from_cart(&mut state, request),
            tools::SET_CART_QUANTITY => set_cart_quantity(&mut state, request),
            tools::CLEAR_CART => {
                state.carts.remove(&session);
                Ok(())
            }
            tools::GET_CART_STATE => Ok(()),
            other => Err(ToolResponse::fault(METHOD_NOT_FOUND, format!("Unknown tool: {other}"))),
        };

        Ok(match outcome {
            Ok(()) => {
                let cart = build_snapshot(&state, &session);
                ToolResponse::ok(json!({ "data": { "cart": cart } }))
            }
            Err(fault) => fault,
        })
    }
}

#[async_trait]
impl CartBackend for InMemoryBackend {
    async fn call_tool(&self, request: ToolRequest) -> Result<ToolResponse, BackendError> {
        self.handle(&request)
    }
}

fn line_key(request: &ToolRequest) -> Result<LineKey, ToolResponse> {
    match (request.str_param("product_id"), request.str_param("variant_id")) {
        (Some(p), Some(v)) if !p.is_empty() && !v.is_empty() => Ok(LineKey::new(p, v)),
        _ => Err(ToolResponse::fault(
            INVALID_PARAMS,
            "Missing required fields: product_id and variant_id",
        )),
    }
}

fn require_listed(state: &MemoryState, key: &LineKey) -> Result<(), ToolResponse> {
    if !state.catalog.iter().any(|e| e.product_id == key.product_id) {
        return Err(ToolResponse::fault(
            INVALID_PARAMS,
            format!("Product not found: {}", key.product_id),
        ));
    }
    if !state.catalog.iter().any(|e| e.matches(key)) {
        return Err(ToolResponse::fault(
            INVALID_PARAMS,
            format!("Variant not found: {}", key.variant_id),
        ));
    }
    Ok(())
}

fn add_to_cart(state: &mut MemoryState, request: &ToolRequest) -> Result<(), ToolResponse> {
    let key = line_key(request)?;
    require_listed(state, &key)?;
    let quantity = request.int_param("quantity").unwrap_or(1);
    let quantity = u32::try_from(quantity)
        .ok()
        .filter(|q| *q > 0)
        .ok_or_else(|| ToolResponse::fault(INVALID_PARAMS, "quantity must be >= 1"))?;

    let lines = state.carts.entry(request.session_id.clone()).or_default();
    match lines.iter_mut().find(|(k, _)| *k == key) {
        Some((_, qty)) => *qty = qty.saturating_add(quantity),
        None => lines.push((key, quantity)),
    }
    Ok(())
}

fn remove_from_cart(state: &mut MemoryState, request: &ToolRequest) -> Result<(), ToolResponse> {
    let key = line_key(request)?;
    if let Some(lines) = state.carts.get_mut(&request.session_id) {
        lines.retain(|(k, _)| *k != key);
    }
    Ok(())
}

fn set_cart_quantity(state: &mut MemoryState, request: &ToolRequest) -> Result<(), ToolResponse> {
    let key = line_key(request)?;
    let quantity = request.int_param("quantity").unwrap_or(1);
    if quantity < 0 {
        return Err(ToolResponse::fault(INVALID_PARAMS, "quantity must be >= 0"));
    }
    if quantity == 0 {
        if let Some(lines) = state.carts.get_mut(&request.session_id) {
            lines.retain(|(k, _)| *k != key);
        }
        return Ok(());
    }

    require_listed(state, &key)?;
    let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
    let lines = state.carts.entry(request.session_id.clone()).or_default();
    match lines.iter_mut().find(|(k, _)| *k == key) {
        Some((_, qty)) => *qty = quantity,
        None => lines.push((key, quantity)),
    }
    Ok(())
}

fn build_snapshot(state: &MemoryState, session_id: &str) -> CartSnapshot {
    let mut total = 0.0;
    let items = state
        .carts
        .get(session_id)
        .into_iter()
        .flatten()
        .map(|(key, quantity)| match state.catalog.iter().find(|e| e.matches(key)) {
            Some(entry) => {
                total += entry.price * f64::from(*quantity);
                ServerCartLine {
                    product_id: entry.product_id.clone(),
                    variant_id: entry.variant_id.clone(),
                    name: entry.name.clone(),
                    variant: entry.variant.clone(),
                    price: entry.price,
                    quantity: *quantity,
                    image_url: entry.image_url.clone(),
                }
            }
            None => ServerCartLine {
                product_id: key.product_id.clone(),
                variant_id: key.variant_id.clone(),
                name: key.product_id.clone(),
                variant: key.variant_id.clone(),
                price: 0.0,
                quantity: *quantity,
                image_url: None,
            },
        })
        .collect();

    CartSnapshot {
        items,
        total: (total * 100.0_f64).round() / 100.0,
    }
}
