//! Runtime event stream payloads.

use crate::types::OpId;

/// Events emitted while mutations and resyncs run.
#[derive(Debug, Clone, PartialEq)]
pub enum CartEvent {
    /// A mutation was applied locally and its backend call is in flight.
    Optimistic {
        /// Mutation id.
        op_id: OpId,
        /// Backend tool being called.
        tool: &'static str,
    },
    /// The backend accepted a mutation.
    Confirmed {
        /// Mutation id.
        op_id: OpId,
    },
    /// The backend rejected a mutation and its local effect was undone.
    RolledBack {
        /// Mutation id.
        op_id: OpId,
        /// Backend failure.
        error: String,
    },
    /// Local items were replaced by the server snapshot.
    Resynced {
        /// Number of lines after the resync.
        lines: usize,
        /// Cart total after the resync.
        total: f64,
    },
    /// A resync was not applied because mutations were in flight.
    ResyncSkipped,
    /// The snapshot fetch failed; local items were left untouched.
    ResyncFailed {
        /// Fetch failure.
        error: String,
    },
}
