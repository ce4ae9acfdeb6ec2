//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::errors::MonitorError;
use crate::http::client::ApiClient;
use crate::monitor::engine::Monitor;
use crate::notify::notifier::{LogNotifier, Notifier};
use crate::storage::settings::Settings;
use crate::storage::token;

/// Main application state
pub struct AppState {
    /// The monitor engine
    pub monitor: Arc<Monitor>,
}

impl AppState {
    /// Initialize application state: load the stored token, build the API
    /// client, and bring up the monitor.
    pub async fn init(options: &AppOptions, settings: Settings) -> Result<Self, MonitorError> {
        info!("Initializing application state...");

        let layout = options.storage.layout.clone();

        let api_token = token::get(&layout.token_file())
            .await?
            .ok_or_else(|| MonitorError::NotConfigured("API token not found".to_string()))?;

        let client = ApiClient::new(&settings.api_base_url, api_token)?;
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

        let monitor = Arc::new(
            Monitor::new(
                Arc::new(client),
                notifier,
                layout,
                settings,
                options.backoff.clone(),
            )
            .await,
        );

        Ok(Self { monitor })
    }
}
