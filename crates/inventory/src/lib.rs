//! Inventory domain module.
//!
//! Tracked stock records. The inventory subsystem owns these; other modules
//! only read and adjust their quantity.

pub mod item;

pub use item::InventoryItem;
