//! railwatch - Entry Point
//!
//! A headless monitor for Railway deployments. Polls the Railway GraphQL
//! API, records status transitions, and exposes a local status server.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use railwatch::app::options::{AppOptions, ServerOptions, StorageOptions};
use railwatch::app::run::run;
use railwatch::http::client::ApiClient;
use railwatch::logs::{init_logging, LogOptions};
use railwatch::monitor::backoff::BackoffOptions;
use railwatch::storage::layout::StorageLayout;
use railwatch::storage::settings::{assert_configured, Settings};
use railwatch::storage::token;
use railwatch::utils::version_info;

use secrecy::SecretString;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        println!("{}", serde_json::to_string_pretty(&version).unwrap());
        return;
    }

    // Write configuration and exit
    if cli_args.contains_key("configure") {
        return configure(&cli_args).await;
    }

    // Run the monitor starting here

    let layout = StorageLayout::default();
    let settings_file = layout.settings_file();
    let settings = match Settings::load(&settings_file).await {
        Ok(settings) => settings,
        Err(e) => {
            error!("Unable to read settings file: {}", e);
            return;
        }
    };

    // Initialize logging; the guard must live until exit
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        log_dir: Some(layout.logs_dir()),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    if let Err(e) = assert_configured(&layout, &settings).await {
        error!("Monitor is not yet configured: {}", e);
        error!("Run: railwatch --configure --token=<api_token> --project=<project_id> --services=<id,id,...>");
        return;
    }

    let options = AppOptions {
        storage: StorageOptions {
            layout: layout.clone(),
        },
        enable_status_server: settings.enable_status_server,
        server: ServerOptions {
            port: settings.server_port,
            ..Default::default()
        },
        backoff: BackoffOptions {
            base_interval: Duration::from_secs(settings.polling_interval_secs),
            ..Default::default()
        },
        ..Default::default()
    };

    info!("Running railwatch with options: {:?}", options);
    let result = run(options, settings, await_shutdown_signal()).await;
    if let Err(e) = result {
        error!("Failed to run the monitor: {e}");
    }
}

/// Write the API token and monitoring configuration, validating the token
/// against the API when possible.
async fn configure(cli_args: &HashMap<String, String>) {
    let layout = StorageLayout::default();
    let settings_file = layout.settings_file();

    let mut settings = match Settings::load(&settings_file).await {
        Ok(settings) => settings,
        Err(e) => {
            println!("Unable to read settings file: {e}");
            return;
        }
    };

    if let Some(raw_token) = cli_args.get("token") {
        let api_token = SecretString::from(raw_token.clone());

        match ApiClient::new(&settings.api_base_url, api_token.clone()) {
            Ok(client) => match client.validate_token().await {
                Ok(true) => println!("Token validated against the Railway API"),
                Ok(false) => warn!("Token was rejected by the Railway API; storing it anyway"),
                Err(e) => warn!("Could not validate token ({}); storing it anyway", e),
            },
            Err(e) => {
                println!("Failed to build API client: {e}");
                return;
            }
        }

        if let Err(e) = token::set(&layout.token_file(), &api_token).await {
            println!("Failed to store token: {e}");
            return;
        }
        println!("Token stored");
    }

    if let Some(project_id) = cli_args.get("project") {
        settings.project_id = Some(project_id.clone());
    }
    if let Some(project_name) = cli_args.get("project-name") {
        settings.project_name = Some(project_name.clone());
    }
    if let Some(environment_id) = cli_args.get("environment") {
        settings.environment_id = Some(environment_id.clone());
    }
    if let Some(services) = cli_args.get("services") {
        settings.tracked_service_ids = services
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    if let Err(e) = settings.persist(&settings_file).await {
        println!("Failed to persist settings: {e}");
        return;
    }

    println!(
        "Configuration saved: project={}, services={}",
        settings.project_id.as_deref().unwrap_or("<unset>"),
        settings.tracked_service_ids.len()
    );
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).unwrap();
        let mut sigint = signal(SignalKind::interrupt()).unwrap();

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        info!("Ctrl+C received, shutting down...");
    }
}
