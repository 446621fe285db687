use hashbrown::HashSet;

use crate::{
    item::{CartItem, CartSnapshot},
    op::CartOp,
    types::{LineKey, OpId},
};

/// Local, optimistic view of the server cart.
///
/// Pure state machine: callers drive the mutation template
/// (`begin` / `apply` / `rollback` / `settle`) and own all I/O.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    items: Vec<CartItem>,
    backup: Vec<CartItem>,
    pending_mutations: HashSet<OpId>,
    mutation_epoch: u64,
    synced: bool,
}

impl CartState {
    /// Empty, never-synced cart.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cart seeded with `items`, as if freshly synced.
    pub fn with_items(items: Vec<CartItem>) -> Self {
        Self {
            items,
            synced: true,
            ..Self::default()
        }
    }

    /// Starts a mutation: records the backup and registers `op_id` as in flight.
    ///
    /// The returned backup belongs to this mutation; on failure pass it back to
    /// [`CartState::rollback`] rather than reading [`CartState::backup`], which a
    /// later mutation may already have replaced.
    pub fn begin(&mut self, op_id: &OpId) -> Vec<CartItem> {
        self.backup = self.items.clone();
        self.pending_mutations.insert(op_id.clone());
        self.mutation_epoch += 1;
        self.backup.clone()
    }

    /// Applies `op` to the local items and returns the resulting line, if any.
    pub fn apply(&mut self, op: &CartOp) -> Option<CartItem> {
        match op {
            CartOp::Add { draft } => {
                if draft.quantity == 0 {
                    return self.get(&draft.key()).cloned();
                }
                let key = draft.key();
                if let Some(line) = self.items.iter_mut().find(|i| i.matches(&key)) {
                    line.quantity = line.quantity.saturating_add(draft.quantity);
                    return Some(line.clone());
                }
                let line = draft.clone().into_item();
                self.items.push(line.clone());
                Some(line)
            }
            CartOp::Remove { key } => {
                self.items.retain(|i| !i.matches(key));
                None
            }
            CartOp::SetQuantity { key, quantity } => {
                if *quantity <= 0 {
                    self.items.retain(|i| !i.matches(key));
                    return None;
                }
                let qty = u32::try_from(*quantity).unwrap_or(u32::MAX);
                let line = self.items.iter_mut().find(|i| i.matches(key))?;
                line.quantity = qty;
                Some(line.clone())
            }
            CartOp::Clear => {
                self.items.clear();
                None
            }
        }
    }

    /// Restores `backup` verbatim.
    pub fn rollback(&mut self, backup: Vec<CartItem>) {
        self.items = backup;
    }

    /// Marks `op_id` settled. Returns true when nothing is left in flight.
    pub fn settle(&mut self, op_id: &OpId) -> bool {
        self.pending_mutations.remove(op_id);
        self.pending_mutations.is_empty()
    }

    /// Replaces every line with the server's view.
    pub fn replace_from_snapshot(&mut self, snapshot: CartSnapshot) {
        self.items = snapshot
            .items
            .into_iter()
            .filter(|line| line.quantity > 0)
            .map(|line| line.into_item())
            .collect();
        self.synced = true;
    }

    /// Current lines in display order.
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Line for `key`.
    pub fn get(&self, key: &LineKey) -> Option<&CartItem> {
        self.items.iter().find(|i| i.matches(key))
    }

    /// Whether a line for `key` exists.
    pub fn contains(&self, key: &LineKey) -> bool {
        self.get(key).is_some()
    }

    /// Sum of line totals, rounded to cents.
    pub fn total(&self) -> f64 {
        let raw: f64 = self.items.iter().map(CartItem::line_total).sum();
        (raw * 100.0).round() / 100.0
    }

    /// Sum of quantities.
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Snapshot taken before the most recent mutation.
    pub fn backup(&self) -> &[CartItem] {
        &self.backup
    }

    /// Mutations currently in flight.
    pub fn pending_mutations(&self) -> &HashSet<OpId> {
        &self.pending_mutations
    }

    /// Whether any mutation is in flight.
    pub fn has_pending_mutations(&self) -> bool {
        !self.pending_mutations.is_empty()
    }

    /// Counter bumped by every [`CartState::begin`].
    pub fn epoch(&self) -> u64 {
        self.mutation_epoch
    }

    /// True after at least one successful resync.
    pub fn is_synced(&self) -> bool {
        self.synced
    }
}
