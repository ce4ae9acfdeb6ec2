//! The monitor engine: owns settings, service state, history and backoff,
//! and runs poll cycles against the status source.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::MonitorError;
use crate::models::service::{aggregate_status, HistoryEntry, MonitoredApp, MonitoredService};
use crate::models::status::DeploymentStatus;
use crate::monitor::backoff::{Backoff, BackoffOptions};
use crate::monitor::history::{HistoryLedger, DEFAULT_CAPACITY};
use crate::monitor::reconcile::{reconcile, services_equal, FetchOutcome, ServiceContext};
use crate::monitor::source::StatusSource;
use crate::notify::notifier::Notifier;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::storage::token;

/// What triggered a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// Poll-loop timer fired
    Background,
    /// Explicit user/API request; shows a loading indicator
    Manual,
}

/// Published view of the monitor, one value per observable change
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    pub services: Vec<MonitoredService>,
    pub last_error: Option<String>,
    pub is_loading: bool,
    pub is_configured: bool,
}

impl StatusSnapshot {
    /// Worst-wins status across all tracked services
    pub fn overall_status(&self) -> DeploymentStatus {
        aggregate_status(&self.services)
    }
}

/// Monitoring configuration applied in one step
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub project_id: String,
    pub project_name: Option<String>,
    pub environment_id: Option<String>,
    pub tracked_service_ids: Vec<String>,
    pub service_names: HashMap<String, String>,
}

struct MonitorState {
    settings: Settings,
    services: Vec<MonitoredService>,
    previous_statuses: HashMap<String, DeploymentStatus>,
    history: HistoryLedger,
    backoff: Backoff,
    last_error: Option<String>,
    is_loading: bool,
    has_attempted_env_migration: bool,
}

/// Orchestrates poll cycles and owns all mutable monitoring state.
///
/// All state lives behind one mutex held for the whole refresh cycle, so a
/// timer-driven refresh and a manual one can never interleave: observers
/// always see the result of complete cycles.
pub struct Monitor {
    source: Arc<dyn StatusSource>,
    notifier: Arc<dyn Notifier>,
    layout: StorageLayout,
    state: Mutex<MonitorState>,
    snapshot_tx: watch::Sender<StatusSnapshot>,
    transitions_tx: broadcast::Sender<HistoryEntry>,
}

impl Monitor {
    /// Build the monitor, loading persisted history and seeding placeholder
    /// entries for every tracked service so observers have a full roster
    /// before the first poll completes.
    pub async fn new(
        source: Arc<dyn StatusSource>,
        notifier: Arc<dyn Notifier>,
        layout: StorageLayout,
        settings: Settings,
        backoff_options: BackoffOptions,
    ) -> Self {
        let history = HistoryLedger::load(&layout.history_file(), DEFAULT_CAPACITY).await;
        info!(
            entries = history.len(),
            services = settings.tracked_service_ids.len(),
            "Monitor initialized"
        );

        let services = placeholder_services(&settings);
        let is_configured = settings.is_configured();

        let (snapshot_tx, _) = watch::channel(StatusSnapshot {
            services: services.clone(),
            last_error: None,
            is_loading: false,
            is_configured,
        });
        let (transitions_tx, _) = broadcast::channel(64);

        let state = MonitorState {
            backoff: Backoff::new(backoff_options),
            settings,
            services,
            previous_statuses: HashMap::new(),
            history,
            last_error: None,
            is_loading: false,
            has_attempted_env_migration: false,
        };

        Self {
            source,
            notifier,
            layout,
            state: Mutex::new(state),
            snapshot_tx,
            transitions_tx,
        }
    }

    /// Current published snapshot
    pub fn snapshot(&self) -> StatusSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Subscribe to snapshot updates
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Subscribe to individual status transitions
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<HistoryEntry> {
        self.transitions_tx.subscribe()
    }

    /// Transition history, most recent first
    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.state.lock().await.history.entries().to_vec()
    }

    /// The interval the poll loop should wait before the next cycle
    pub async fn current_interval(&self) -> Duration {
        self.state.lock().await.backoff.current_interval()
    }

    /// Each configured group with its rolled-up status
    pub async fn group_statuses(&self) -> Vec<(MonitoredApp, DeploymentStatus)> {
        let state = self.state.lock().await;
        state
            .settings
            .apps
            .iter()
            .map(|app| (app.clone(), app.aggregate_status(&state.services)))
            .collect()
    }

    /// Run one refresh cycle.
    ///
    /// Fetch failures never propagate: they land in the snapshot's
    /// `last_error` and the previous per-service state is carried forward.
    pub async fn refresh(&self, kind: RefreshKind) -> Result<(), MonitorError> {
        let mut state = self.state.lock().await;

        if !state.settings.is_configured() {
            debug!("Refresh skipped: monitor not configured");
            state.services.clear();
            state.is_loading = false;
            self.publish(&state);
            return Ok(());
        }

        if kind == RefreshKind::Manual {
            state.is_loading = true;
            self.publish(&state);
        }

        self.migrate_environment_once(&mut state).await;
        let result = self.run_cycle(&mut state).await;

        // Publish even when persistence failed: the cycle's in-memory
        // updates are still valid and the loading flag must not stick.
        state.is_loading = false;
        self.publish(&state);
        result
    }

    /// Apply a complete monitoring configuration, persist it, and run an
    /// immediate refresh so the new roster gets real statuses right away.
    pub async fn configure(&self, config: MonitorConfig) -> Result<(), MonitorError> {
        {
            let mut state = self.state.lock().await;

            state.settings.project_id = Some(config.project_id);
            state.settings.project_name = config.project_name;
            state.settings.environment_id = config.environment_id;
            state.settings.tracked_service_ids = config.tracked_service_ids;
            state.settings.service_names = config.service_names;
            state.settings.persist(&self.layout.settings_file()).await?;

            // Old observations are meaningless under a new configuration
            state.previous_statuses.clear();
            state.services = placeholder_services(&state.settings);
            state.last_error = None;
            state.has_attempted_env_migration = state.settings.environment_id.is_some();

            info!(
                services = state.settings.tracked_service_ids.len(),
                project = %state.settings.display_project_name(),
                "Monitoring configured"
            );
            self.publish(&state);
        }

        self.refresh(RefreshKind::Manual).await
    }

    /// Drop all monitoring state: configuration, token, services, history
    pub async fn reset(&self) -> Result<(), MonitorError> {
        let mut state = self.state.lock().await;

        state.settings.clear_monitoring();
        state.settings.persist(&self.layout.settings_file()).await?;
        token::delete(&self.layout.token_file()).await?;

        state.services.clear();
        state.previous_statuses.clear();
        state.history.clear();
        state.history.persist(&self.layout.history_file()).await?;
        state.last_error = None;
        state.backoff.on_success();

        info!("Monitoring configuration reset");
        self.publish(&state);
        Ok(())
    }

    /// Replace the display-name overrides and rename live entries
    pub async fn set_service_names(
        &self,
        names: HashMap<String, String>,
    ) -> Result<(), MonitorError> {
        let mut state = self.state.lock().await;

        state.settings.service_names = names;
        state.settings.persist(&self.layout.settings_file()).await?;

        let MonitorState {
            services, settings, ..
        } = &mut *state;
        for service in services.iter_mut() {
            if let Some(name) = settings.service_names.get(&service.id) {
                service.service_name = name.clone();
            }
        }

        self.publish(&state);
        Ok(())
    }

    /// Add a service group and persist it
    pub async fn add_group(
        &self,
        name: String,
        service_ids: Vec<String>,
    ) -> Result<MonitoredApp, MonitorError> {
        let mut state = self.state.lock().await;

        let app = MonitoredApp::new(name, service_ids);
        state.settings.apps.push(app.clone());
        state.settings.persist(&self.layout.settings_file()).await?;
        Ok(app)
    }

    /// Remove a service group by id
    pub async fn remove_group(&self, id: Uuid) -> Result<(), MonitorError> {
        let mut state = self.state.lock().await;

        let before = state.settings.apps.len();
        state.settings.apps.retain(|app| app.id != id);
        if state.settings.apps.len() == before {
            return Err(MonitorError::NotFound(format!("group {}", id)));
        }

        state.settings.persist(&self.layout.settings_file()).await?;
        Ok(())
    }

    /// Restart a service's current deployment, then refresh
    pub async fn restart_service(&self, service_id: &str) -> Result<(), MonitorError> {
        let deployment_id = self.deployment_id_for(service_id).await?;
        info!(service = service_id, deployment = %deployment_id, "Restarting deployment");
        self.source.restart_deployment(&deployment_id).await?;
        self.refresh(RefreshKind::Manual).await
    }

    /// Trigger a fresh build and deploy for a service, then refresh
    pub async fn redeploy_service(&self, service_id: &str) -> Result<(), MonitorError> {
        let deployment_id = self.deployment_id_for(service_id).await?;
        info!(service = service_id, deployment = %deployment_id, "Redeploying");
        self.source.redeploy_deployment(&deployment_id).await?;
        self.refresh(RefreshKind::Manual).await
    }

    /// Look up a service's current deployment id without holding the lock
    /// across the remote call.
    async fn deployment_id_for(&self, service_id: &str) -> Result<String, MonitorError> {
        let state = self.state.lock().await;
        state
            .services
            .iter()
            .find(|s| s.id == service_id)
            .ok_or_else(|| MonitorError::NotFound(format!("service {}", service_id)))?
            .deployment_id
            .clone()
            .ok_or_else(|| {
                MonitorError::NotFound(format!("no known deployment for service {}", service_id))
            })
    }

    /// One-shot: settings written before environment scoping existed have no
    /// environment id, which makes deployment queries span all environments.
    /// Resolve and persist the production environment on the first cycle.
    async fn migrate_environment_once(&self, state: &mut MonitorState) {
        if state.settings.environment_id.is_some() || state.has_attempted_env_migration {
            return;
        }
        state.has_attempted_env_migration = true;

        let Some(project_id) = state.settings.project_id.clone() else {
            return;
        };

        match self.source.fetch_project(&project_id).await {
            Ok(Some(project)) => {
                if let Some(environment) = project.production_environment() {
                    info!(
                        environment = %environment.name,
                        id = %environment.id,
                        "Resolved environment for deployment queries"
                    );
                    state.settings.environment_id = Some(environment.id.clone());
                    if let Err(e) = state.settings.persist(&self.layout.settings_file()).await {
                        error!("Failed to persist resolved environment: {}", e);
                    }
                }
            }
            Ok(None) => warn!(project = %project_id, "Project not found during environment resolution"),
            Err(e) => warn!("Environment resolution failed, will retry next start: {}", e),
        }
    }

    /// Fetch every tracked service sequentially, reconcile, record
    /// transitions, and adjust the backoff.
    async fn run_cycle(&self, state: &mut MonitorState) -> Result<(), MonitorError> {
        let tracked = state.settings.tracked_service_ids.clone();
        let environment_id = state.settings.environment_id.clone();

        let mut fetched = HashMap::with_capacity(tracked.len());
        let mut rate_limited = false;

        for service_id in &tracked {
            match self
                .source
                .fetch_deployment(service_id, environment_id.as_deref())
                .await
            {
                Ok(deployment) => {
                    fetched.insert(service_id.clone(), FetchOutcome::Fetched(deployment));
                }
                Err(e) if e.is_rate_limited() => {
                    // No point burning more requests this cycle
                    warn!(service = %service_id, "Rate limited, aborting cycle");
                    fetched.insert(service_id.clone(), FetchOutcome::Fail(e));
                    rate_limited = true;
                    break;
                }
                Err(e) => {
                    warn!(service = %service_id, "Deployment fetch failed: {}", e);
                    fetched.insert(service_id.clone(), FetchOutcome::Fail(e));
                }
            }
        }

        let project_id = state.settings.project_id.clone().unwrap_or_default();
        let project_name = state.settings.display_project_name();
        let ctx = ServiceContext {
            project_id: &project_id,
            project_name: &project_name,
        };

        let mut output = reconcile(
            &tracked,
            &ctx,
            &state.services,
            &state.previous_statuses,
            fetched,
        );

        // Apply display-name overrides before the result becomes visible
        for service in &mut output.services {
            if let Some(name) = state.settings.service_names.get(&service.id) {
                service.service_name = name.clone();
            }
        }
        for transition in &mut output.transitions {
            if let Some(name) = state.settings.service_names.get(&transition.service_id) {
                transition.service_name = name.clone();
            }
        }

        state.services = output.services;
        for (service_id, status) in output.observed {
            state.previous_statuses.insert(service_id, status);
        }
        state.last_error = output.last_error;

        if !output.transitions.is_empty() {
            for transition in &output.transitions {
                info!(
                    service = %transition.service_name,
                    old = %transition.old_status.display_name(),
                    new = %transition.new_status.display_name(),
                    "Status transition"
                );
                state.history.append(transition.clone());
                let _ = self.transitions_tx.send(transition.clone());

                let notifier = Arc::clone(&self.notifier);
                let entry = transition.clone();
                let prefs = state.settings.notifications.clone();
                tokio::spawn(async move {
                    notifier.notify(&entry, &prefs).await;
                });
            }

            state.history.persist(&self.layout.history_file()).await?;
        }

        if rate_limited {
            if state.backoff.on_rate_limited() {
                info!(
                    interval_secs = state.backoff.current_interval().as_secs(),
                    consecutive = state.backoff.consecutive_rate_limits(),
                    "Backing off polling interval"
                );
            }
        } else if state.backoff.on_success() {
            info!(
                interval_secs = state.backoff.current_interval().as_secs(),
                "Rate limit cleared, polling interval restored"
            );
        }

        Ok(())
    }

    /// Publish the current state, skipping the send when nothing an
    /// observer can act on has changed.
    fn publish(&self, state: &MonitorState) {
        let is_configured = state.settings.is_configured();
        self.snapshot_tx.send_if_modified(|current| {
            let unchanged = services_equal(&current.services, &state.services)
                && current.last_error == state.last_error
                && current.is_loading == state.is_loading
                && current.is_configured == is_configured;
            if unchanged {
                return false;
            }

            *current = StatusSnapshot {
                services: state.services.clone(),
                last_error: state.last_error.clone(),
                is_loading: state.is_loading,
                is_configured,
            };
            true
        });
    }
}

/// Seed an entry per tracked service so the roster is complete before the
/// first successful poll.
fn placeholder_services(settings: &Settings) -> Vec<MonitoredService> {
    let project_id = settings.project_id.clone().unwrap_or_default();
    let project_name = settings.display_project_name();

    settings
        .tracked_service_ids
        .iter()
        .map(|id| MonitoredService {
            id: id.clone(),
            project_id: project_id.clone(),
            project_name: project_name.clone(),
            service_name: settings
                .service_names
                .get(id)
                .cloned()
                .unwrap_or_else(|| id.clone()),
            status: DeploymentStatus::Unknown,
            last_updated: Utc::now(),
            deployment_started_at: None,
            deployment_id: None,
        })
        .collect()
}
