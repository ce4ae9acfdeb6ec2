//! Persisted configuration and credential storage

pub mod layout;
pub mod settings;
pub mod token;
