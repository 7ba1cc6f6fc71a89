//! Application state shared across HTTP handlers

use std::sync::Arc;

use invsync_core::InventoryHandle;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Running inventory module
    pub inventory: Arc<InventoryHandle>,
}

impl AppState {
    /// Create new application state
    pub fn new(inventory: Arc<InventoryHandle>) -> Self {
        Self { inventory }
    }
}
