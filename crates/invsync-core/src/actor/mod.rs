//! Actor implementations

pub mod inventory;

pub use inventory::{InventoryActor, InventoryActorArgs};
