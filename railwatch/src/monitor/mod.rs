//! Status polling and reconciliation engine

pub mod backoff;
pub mod engine;
pub mod history;
pub mod reconcile;
pub mod source;
