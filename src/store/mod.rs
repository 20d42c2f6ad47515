//! Data store modules for branch inventory files

pub mod inventory;

pub use inventory::{InventoryStore, StoreError};
