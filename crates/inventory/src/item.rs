use serde::{Deserialize, Serialize};

use pcbforge_core::{Entity, InventoryItemId};

/// A trackable stock record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    id: InventoryItemId,
    name: String,
    quantity: i64,
}

impl InventoryItem {
    pub fn new(id: InventoryItemId, name: impl Into<String>, quantity: i64) -> Self {
        Self {
            id,
            name: name.into(),
            quantity,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    /// Apply a signed quantity change.
    ///
    /// No floor is enforced here: consumers validate availability before
    /// consuming, and reversals only return what was taken.
    pub fn adjust(&mut self, delta: i64) {
        self.quantity += delta;
    }
}

impl Entity for InventoryItem {
    type Id = InventoryItemId;

    const KIND: &'static str = "inventory item";

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjust_applies_signed_deltas() {
        let mut item = InventoryItem::new(InventoryItemId::new(), "R 10k 0603", 100);

        item.adjust(-30);
        assert_eq!(item.quantity(), 70);

        item.adjust(30);
        assert_eq!(item.quantity(), 100);
    }

    #[test]
    fn adjust_does_not_clamp() {
        let mut item = InventoryItem::new(InventoryItemId::new(), "C 100n", 1);
        item.adjust(-3);
        assert_eq!(item.quantity(), -2);
    }
}
