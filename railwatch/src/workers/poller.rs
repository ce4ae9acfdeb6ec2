//! Polling worker driving periodic refresh cycles

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::monitor::engine::{Monitor, RefreshKind};

/// Poller worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Initial delay before the first poll
    pub initial_delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
        }
    }
}

/// Run the poller worker.
///
/// The shutdown signal races both the in-flight refresh and the
/// inter-cycle wait, so a slow or hanging fetch cannot stall shutdown.
/// The wait interval is re-read from the monitor after every cycle, so
/// rate-limit backoff takes effect on the very next wait.
pub async fn run<S, F>(
    options: &Options,
    monitor: &Arc<Monitor>,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Poller worker starting...");

    tokio::select! {
        _ = &mut shutdown_signal => {
            info!("Poller worker shutting down...");
            return;
        }
        _ = sleep_fn(options.initial_delay) => {}
    }

    loop {
        debug!("Running refresh cycle...");

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Poller worker shutting down...");
                return;
            }
            result = monitor.refresh(RefreshKind::Background) => {
                match result {
                    Ok(_) => {
                        debug!("Refresh cycle completed");
                    }
                    Err(e) => {
                        error!("Refresh cycle failed: {}", e);
                    }
                }
            }
        }

        let interval = monitor.current_interval().await;

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Poller worker shutting down...");
                return;
            }
            _ = sleep_fn(interval) => {
                // Continue with the next cycle
            }
        }
    }
}
