//! Single point of quantity reads and writes for BOM lines.

use std::collections::{BTreeMap, BTreeSet};

use pcbforge_core::{BomLineId, DomainError, DomainResult, Entity, InventoryItemId};
use pcbforge_inventory::InventoryItem;

use crate::model::{BomLine, QuantitySource};

/// Identity of the stock a line draws from. Several lines may share one
/// tracked item; an untracked line is its own source.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StockSource {
    Item(InventoryItemId),
    Line(BomLineId),
}

impl StockSource {
    pub fn of(line: &BomLine) -> Self {
        match line.source {
            QuantitySource::Tracked { item_id } => Self::Item(item_id),
            QuantitySource::Untracked { .. } => Self::Line(line.id),
        }
    }
}

/// Applies and reverses quantity deltas against tracked items or untracked lines.
///
/// Holds the tracked inventory items of the current working set. It never
/// persists anything; callers collect [`InventoryLedger::touched_items`] and
/// hand them to the repository.
#[derive(Debug, Clone, Default)]
pub struct InventoryLedger {
    items: BTreeMap<InventoryItemId, InventoryItem>,
    /// Quantities as loaded, before any delta.
    loaded: BTreeMap<InventoryItemId, i64>,
    touched: BTreeSet<InventoryItemId>,
}

impl InventoryLedger {
    pub fn new(items: impl IntoIterator<Item = InventoryItem>) -> Self {
        let items: BTreeMap<_, _> = items.into_iter().map(|i| (i.id(), i)).collect();
        let loaded = items.iter().map(|(id, i)| (*id, i.quantity())).collect();
        Self {
            items,
            loaded,
            touched: BTreeSet::new(),
        }
    }

    pub fn loaded_quantity(&self, id: InventoryItemId) -> Option<i64> {
        self.loaded.get(&id).copied()
    }

    pub fn item(&self, id: InventoryItemId) -> Option<&InventoryItem> {
        self.items.get(&id)
    }

    /// Quantity currently available to `line`.
    pub fn available_quantity(&self, line: &BomLine) -> DomainResult<i64> {
        match &line.source {
            QuantitySource::Tracked { item_id } => self
                .items
                .get(item_id)
                .map(InventoryItem::quantity)
                .ok_or_else(|| DomainError::not_found(InventoryItem::KIND, item_id)),
            QuantitySource::Untracked {
                quantity_available, ..
            } => Ok(*quantity_available),
        }
    }

    /// Add `delta` to the stock behind `line` (negative consumes, positive returns).
    ///
    /// No clamping. Consumption must have been validated first.
    pub fn apply_delta(&mut self, line: &mut BomLine, delta: i64) -> DomainResult<()> {
        match &mut line.source {
            QuantitySource::Tracked { item_id } => {
                let item = self
                    .items
                    .get_mut(item_id)
                    .ok_or_else(|| DomainError::not_found(InventoryItem::KIND, *item_id))?;
                item.adjust(delta);
                self.touched.insert(*item_id);
            }
            QuantitySource::Untracked {
                quantity_available, ..
            } => {
                *quantity_available += delta;
            }
        }
        Ok(())
    }

    pub fn has_touched_items(&self) -> bool {
        !self.touched.is_empty()
    }

    /// Items mutated through this ledger, in id order.
    pub fn touched_items(&self) -> Vec<InventoryItem> {
        self.touched
            .iter()
            .filter_map(|id| self.items.get(id).cloned())
            .collect()
    }
}
