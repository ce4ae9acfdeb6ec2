//! Data models

pub mod service;
pub mod status;
