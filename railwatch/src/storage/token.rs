//! Opaque API token storage
//!
//! The monitor never interprets token contents; it only moves them between
//! this file and the Authorization header.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::errors::MonitorError;
use crate::filesys::file::File;

#[derive(Debug, Serialize, Deserialize)]
struct TokenRecord {
    token: String,
}

/// Read the stored token, if any
pub async fn get(file: &File) -> Result<Option<SecretString>, MonitorError> {
    if !file.exists().await {
        return Ok(None);
    }

    let record: TokenRecord = file.read_json().await?;
    if record.token.is_empty() {
        return Ok(None);
    }
    Ok(Some(SecretString::from(record.token)))
}

/// Store a token with owner-only file permissions
pub async fn set(file: &File, token: &SecretString) -> Result<(), MonitorError> {
    file.write_json(&TokenRecord {
        token: token.expose_secret().to_string(),
    })
    .await?;
    file.set_permissions_600().await
}

/// Remove the stored token
pub async fn delete(file: &File) -> Result<(), MonitorError> {
    file.delete().await
}
