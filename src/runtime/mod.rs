//! Queue-backed cart runtime and event stream APIs.

/// Event stream types emitted by the runtime.
pub mod events;
/// Cart handle, mutation template, and resync worker.
pub mod handle;
