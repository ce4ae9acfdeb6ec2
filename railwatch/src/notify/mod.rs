//! Notification dispatch boundary

pub mod notifier;
