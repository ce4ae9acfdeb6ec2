//! Settings file management

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::MonitorError;
use crate::filesys::file::File;
use crate::http::client::DEFAULT_BASE_URL;
use crate::logs::LogLevel;
use crate::models::service::MonitoredApp;
use crate::notify::notifier::NotifyPreferences;
use crate::storage::layout::StorageLayout;

/// Monitor settings, persisted as JSON.
///
/// Every field carries a default so files written by older releases keep
/// loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Base URL for the Railway GraphQL API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Base polling interval in seconds (lengthened under rate limiting)
    #[serde(default = "default_polling_interval")]
    pub polling_interval_secs: u64,

    /// Owning project id
    #[serde(default)]
    pub project_id: Option<String>,

    /// Project display name
    #[serde(default)]
    pub project_name: Option<String>,

    /// Environment to scope deployment queries to
    #[serde(default)]
    pub environment_id: Option<String>,

    /// Ids of the services to monitor, in display order
    #[serde(default)]
    pub tracked_service_ids: Vec<String>,

    /// Display-name overrides keyed by service id
    #[serde(default)]
    pub service_names: HashMap<String, String>,

    /// User-defined service groups
    #[serde(default)]
    pub apps: Vec<MonitoredApp>,

    /// Notification preferences
    #[serde(default)]
    pub notifications: NotifyPreferences,

    /// Enable the local read-only status server
    #[serde(default = "default_true")]
    pub enable_status_server: bool,

    /// Port for the local status server
    #[serde(default = "default_server_port")]
    pub server_port: u16,
}

fn default_true() -> bool {
    true
}

fn default_api_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_polling_interval() -> u64 {
    30
}

fn default_server_port() -> u16 {
    7878
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            api_base_url: default_api_base_url(),
            polling_interval_secs: default_polling_interval(),
            project_id: None,
            project_name: None,
            environment_id: None,
            tracked_service_ids: Vec::new(),
            service_names: HashMap::new(),
            apps: Vec::new(),
            notifications: NotifyPreferences::default(),
            enable_status_server: true,
            server_port: default_server_port(),
        }
    }
}

impl Settings {
    /// Whether there is anything to poll
    pub fn is_configured(&self) -> bool {
        self.project_id.is_some() && !self.tracked_service_ids.is_empty()
    }

    /// Project display name, falling back to a generic label
    pub fn display_project_name(&self) -> String {
        self.project_name
            .clone()
            .unwrap_or_else(|| "Project".to_string())
    }

    /// Load settings; a missing file yields defaults
    pub async fn load(file: &File) -> Result<Self, MonitorError> {
        if !file.exists().await {
            return Ok(Self::default());
        }
        file.read_json().await
    }

    /// Persist settings to the given file
    pub async fn persist(&self, file: &File) -> Result<(), MonitorError> {
        file.write_json(self).await
    }

    /// Drop everything tied to the monitored project (configuration reset)
    pub fn clear_monitoring(&mut self) {
        self.project_id = None;
        self.project_name = None;
        self.environment_id = None;
        self.tracked_service_ids.clear();
        self.service_names.clear();
        self.apps.clear();
    }
}

/// Assert that the monitor has been configured with a token and services
pub async fn assert_configured(
    layout: &StorageLayout,
    settings: &Settings,
) -> Result<(), MonitorError> {
    if !layout.token_file().exists().await {
        return Err(MonitorError::NotConfigured(
            "API token not found".to_string(),
        ));
    }

    if !settings.is_configured() {
        return Err(MonitorError::NotConfigured(
            "No project or services configured".to_string(),
        ));
    }

    Ok(())
}
