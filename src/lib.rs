//! Optimistic, queue-serialized cart state over a tool-calling shop backend.
//!
//! # Examples
//!
//! Serializing arbitrary work with [`queue::OperationQueue`]:
//! ```
//! use cartsync::queue::OperationQueue;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let queue = OperationQueue::new();
//! let first = queue.enqueue(None, || async { Ok::<_, String>(1) });
//! let second = queue.enqueue(None, || async { Ok::<_, String>(2) });
//! assert_eq!(first.await.expect("first"), 1);
//! assert_eq!(second.await.expect("second"), 2);
//! # }
//! ```
//!
//! Runtime usage against the simulated store:
//! ```
//! use std::sync::Arc;
//!
//! use cartsync::{
//!     backend::{CatalogEntry, InMemoryBackend},
//!     config::CartConfig,
//!     core::cart::CartState,
//!     item::ItemDraft,
//!     runtime::handle::spawn_cart,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let backend = Arc::new(InMemoryBackend::new(vec![
//!     CatalogEntry::new("jordan-bulls-jersey", "size-m-authentic", 199.99),
//! ]));
//! let cart = spawn_cart(CartState::new(), backend, CartConfig::default());
//! let outcome = cart
//!     .add_item(ItemDraft::new("jordan-bulls-jersey", "size-m-authentic", 199.99, 1))
//!     .await
//!     .expect("add");
//! assert_eq!(outcome.item.expect("line").quantity, 1);
//! assert_eq!(cart.total(), 199.99);
//! cart.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// Backend collaborator trait, HTTP client, and simulated store.
pub mod backend;
/// Session configuration.
pub mod config;
/// Local cart state machine and display metadata.
pub mod core;
/// Cart lines, drafts, and server snapshots.
pub mod item;
/// Cart mutations and tool requests.
pub mod op;
/// Sequential operation queue.
pub mod queue;
/// Cart runtime handle and events.
pub mod runtime;
/// Shared primitive types.
pub mod types;
