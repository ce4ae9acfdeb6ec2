//! Server state

use std::sync::Arc;

use crate::monitor::engine::Monitor;

/// Server state shared across handlers
pub struct ServerState {
    pub monitor: Arc<Monitor>,
}

impl ServerState {
    pub fn new(monitor: Arc<Monitor>) -> Self {
        Self { monitor }
    }
}
