//! Railwatch Library
//!
//! Core modules for the railwatch deployment status monitor.

pub mod app;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod server;
pub mod storage;
pub mod utils;
pub mod workers;
