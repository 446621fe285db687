//! Cart mutation model and the tool-call request it turns into.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{item::ItemDraft, types::{LineKey, SessionId}};

/// `action_type` sent with every tool request.
pub const ACTION_TYPE_TOOL: &str = "tool_call";

/// Tool names understood by the backend.
pub mod tools {
    /// Add or increment a line.
    pub const ADD_TO_CART: &str = "add_to_cart";
    /// Remove a line.
    pub const REMOVE_FROM_CART: &str = "remove_from_cart";
    /// Set a line's quantity; zero removes.
    pub const SET_CART_QUANTITY: &str = "set_cart_quantity";
    /// Empty the cart.
    pub const CLEAR_CART: &str = "clear_cart";
    /// Fetch the authoritative snapshot.
    pub const GET_CART_STATE: &str = "get_cart_state";
}

/// A single optimistic cart mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum CartOp {
    /// Increment a line, or append it when absent.
    Add {
        /// Line to add.
        draft: ItemDraft,
    },
    /// Drop a line.
    Remove {
        /// Line to drop.
        key: LineKey,
    },
    /// Overwrite a line's quantity. Values `<= 0` remove the line.
    SetQuantity {
        /// Line to change.
        key: LineKey,
        /// New quantity.
        quantity: i64,
    },
    /// Drop every line.
    Clear,
}

impl CartOp {
    /// Backend tool that confirms this mutation.
    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::Add { .. } => tools::ADD_TO_CART,
            Self::Remove { .. } => tools::REMOVE_FROM_CART,
            Self::SetQuantity { .. } => tools::SET_CART_QUANTITY,
            Self::Clear => tools::CLEAR_CART,
        }
    }

    /// Line touched by this mutation, if it targets a single line.
    pub fn key(&self) -> Option<LineKey> {
        match self {
            Self::Add { draft } => Some(draft.key()),
            Self::Remove { key } | Self::SetQuantity { key, .. } => Some(key.clone()),
            Self::Clear => None,
        }
    }

    /// Tool parameters for the backend call.
    pub fn params(&self) -> Value {
        match self {
            Self::Add { draft } => json!({
                "product_id": draft.product_id,
                "variant_id": draft.variant_id,
                "quantity": draft.quantity,
            }),
            Self::Remove { key } => json!({
                "product_id": key.product_id,
                "variant_id": key.variant_id,
            }),
            Self::SetQuantity { key, quantity } => json!({
                "product_id": key.product_id,
                "variant_id": key.variant_id,
                "quantity": (*quantity).max(0),
            }),
            Self::Clear => json!({}),
        }
    }

    /// Full tool request for `session_id`.
    pub fn to_request(&self, session_id: &SessionId) -> ToolRequest {
        ToolRequest::new(self.tool_name(), self.params(), session_id.clone())
    }
}

/// Body of a tool invocation against the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Always [`ACTION_TYPE_TOOL`] for requests built here.
    pub action_type: String,
    /// Tool to invoke.
    pub tool_name: String,
    /// Tool arguments.
    pub params: Value,
    /// Cart session.
    pub session_id: SessionId,
}

impl ToolRequest {
    /// Builds a tool-call request.
    pub fn new(tool_name: &str, params: Value, session_id: SessionId) -> Self {
        Self {
            action_type: ACTION_TYPE_TOOL.to_string(),
            tool_name: tool_name.to_string(),
            params,
            session_id,
        }
    }

    /// Request for the authoritative cart snapshot.
    pub fn get_cart_state(session_id: SessionId) -> Self {
        Self::new(tools::GET_CART_STATE, json!({}), session_id)
    }

    /// Reads a string parameter.
    pub fn str_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    /// Reads an integer parameter.
    pub fn int_param(&self, name: &str) -> Option<i64> {
        self.params.get(name).and_then(Value::as_i64)
    }
}
