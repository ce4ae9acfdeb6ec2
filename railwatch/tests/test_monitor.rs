//! End-to-end tests of the monitor engine against a scripted status source

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;

use railwatch::http::client::ApiError;
use railwatch::http::deployments::{
    Connection, Deployment, Edge, EnvironmentInfo, ProjectInfo,
};
use railwatch::models::status::DeploymentStatus;
use railwatch::monitor::backoff::BackoffOptions;
use railwatch::monitor::engine::{Monitor, RefreshKind};
use railwatch::monitor::source::StatusSource;
use railwatch::notify::notifier::LogNotifier;
use railwatch::storage::layout::StorageLayout;
use railwatch::storage::settings::Settings;

/// Status source fed from per-service scripts of fetch results
struct ScriptedSource {
    deployments: Mutex<HashMap<String, VecDeque<Result<Option<Deployment>, ApiError>>>>,
    project: Mutex<Option<ProjectInfo>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    fn new() -> Self {
        Self {
            deployments: Mutex::new(HashMap::new()),
            project: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn script(&self, service_id: &str, result: Result<Option<Deployment>, ApiError>) {
        self.deployments
            .lock()
            .unwrap()
            .entry(service_id.to_string())
            .or_default()
            .push_back(result);
    }

    fn script_status(&self, service_id: &str, deployment_id: &str, status: DeploymentStatus) {
        self.script(
            service_id,
            Ok(Some(Deployment {
                id: deployment_id.to_string(),
                status,
                created_at: Utc::now(),
            })),
        );
    }

    fn set_project(&self, project: ProjectInfo) {
        *self.project.lock().unwrap() = Some(project);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn fetch_deployment(
        &self,
        service_id: &str,
        environment_id: Option<&str>,
    ) -> Result<Option<Deployment>, ApiError> {
        self.calls.lock().unwrap().push(format!(
            "deployment:{}:{}",
            service_id,
            environment_id.unwrap_or("-")
        ));

        self.deployments
            .lock()
            .unwrap()
            .get_mut(service_id)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(Ok(None))
    }

    async fn fetch_project(&self, project_id: &str) -> Result<Option<ProjectInfo>, ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("project:{}", project_id));
        Ok(self.project.lock().unwrap().clone())
    }

    async fn restart_deployment(&self, deployment_id: &str) -> Result<(), ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("restart:{}", deployment_id));
        Ok(())
    }

    async fn redeploy_deployment(&self, deployment_id: &str) -> Result<(), ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("redeploy:{}", deployment_id));
        Ok(())
    }
}

/// Status source whose deployment fetches never complete
struct HangingSource;

#[async_trait]
impl StatusSource for HangingSource {
    async fn fetch_deployment(
        &self,
        _service_id: &str,
        _environment_id: Option<&str>,
    ) -> Result<Option<Deployment>, ApiError> {
        std::future::pending().await
    }

    async fn fetch_project(&self, _project_id: &str) -> Result<Option<ProjectInfo>, ApiError> {
        Ok(None)
    }

    async fn restart_deployment(&self, _deployment_id: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn redeploy_deployment(&self, _deployment_id: &str) -> Result<(), ApiError> {
        Ok(())
    }
}

fn configured_settings(tracked: &[&str]) -> Settings {
    let mut settings = Settings::default();
    settings.project_id = Some("proj-1".to_string());
    settings.project_name = Some("Demo".to_string());
    settings.environment_id = Some("env-1".to_string());
    settings.tracked_service_ids = tracked.iter().map(|s| s.to_string()).collect();
    settings
}

async fn monitor_with(
    source: Arc<ScriptedSource>,
    settings: Settings,
) -> (Arc<Monitor>, TempDir) {
    let dir = TempDir::new().unwrap();
    let layout = StorageLayout::new(dir.path());
    let monitor = Arc::new(
        Monitor::new(
            source,
            Arc::new(LogNotifier),
            layout,
            settings,
            BackoffOptions::default(),
        )
        .await,
    );
    (monitor, dir)
}

#[tokio::test]
async fn test_first_observation_records_no_transition() {
    let source = Arc::new(ScriptedSource::new());
    source.script_status("svc-a", "dep-1", DeploymentStatus::Building);

    let (monitor, _dir) = monitor_with(source, configured_settings(&["svc-a"])).await;
    monitor.refresh(RefreshKind::Background).await.unwrap();

    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.services.len(), 1);
    assert_eq!(snapshot.services[0].status, DeploymentStatus::Building);
    assert!(snapshot.last_error.is_none());
    assert!(monitor.history().await.is_empty());
}

#[tokio::test]
async fn test_transition_recorded_once_and_persisted() {
    let source = Arc::new(ScriptedSource::new());
    source.script_status("svc-a", "dep-1", DeploymentStatus::Building);
    source.script_status("svc-a", "dep-1", DeploymentStatus::Success);
    source.script_status("svc-a", "dep-1", DeploymentStatus::Success);

    let (monitor, dir) = monitor_with(source, configured_settings(&["svc-a"])).await;
    let mut transitions = monitor.subscribe_transitions();

    monitor.refresh(RefreshKind::Background).await.unwrap();
    monitor.refresh(RefreshKind::Background).await.unwrap();
    // Same status again: no new transition
    monitor.refresh(RefreshKind::Background).await.unwrap();

    let history = monitor.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].old_status, DeploymentStatus::Building);
    assert_eq!(history[0].new_status, DeploymentStatus::Success);

    let broadcasted = transitions.recv().await.unwrap();
    assert_eq!(broadcasted.new_status, DeploymentStatus::Success);

    // Transition survives a restart via the history file
    let layout = StorageLayout::new(dir.path());
    let raw: Vec<serde_json::Value> = layout.history_file().read_json().await.unwrap();
    assert_eq!(raw.len(), 1);
}

#[tokio::test]
async fn test_rate_limit_aborts_cycle_and_backs_off() {
    let source = Arc::new(ScriptedSource::new());
    // Cycle 1 and 2: svc-a succeeds, svc-b is rate limited, svc-c never reached
    for _ in 0..2 {
        source.script_status("svc-a", "dep-1", DeploymentStatus::Success);
        source.script("svc-b", Err(ApiError::RateLimited));
    }

    let (monitor, _dir) =
        monitor_with(source.clone(), configured_settings(&["svc-a", "svc-b", "svc-c"])).await;

    monitor.refresh(RefreshKind::Background).await.unwrap();
    monitor.refresh(RefreshKind::Background).await.unwrap();

    // svc-c was never fetched
    let calls = source.calls();
    assert!(!calls.iter().any(|c| c.starts_with("deployment:svc-c")));
    assert_eq!(
        calls,
        vec![
            "deployment:svc-a:env-1",
            "deployment:svc-b:env-1",
            "deployment:svc-a:env-1",
            "deployment:svc-b:env-1",
        ]
    );

    // Fetched services still published, skipped ones keep their placeholder
    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.services[0].status, DeploymentStatus::Success);
    assert_eq!(snapshot.services[2].status, DeploymentStatus::Unknown);
    assert!(snapshot.last_error.is_some());

    // Two consecutive rate-limited cycles: 30s, then 60s
    assert_eq!(
        monitor.current_interval().await,
        std::time::Duration::from_secs(60)
    );
}

#[tokio::test]
async fn test_clean_cycle_resets_backoff() {
    let source = Arc::new(ScriptedSource::new());
    source.script("svc-a", Err(ApiError::RateLimited));
    source.script("svc-a", Err(ApiError::RateLimited));
    source.script_status("svc-a", "dep-1", DeploymentStatus::Success);

    let (monitor, _dir) = monitor_with(source, configured_settings(&["svc-a"])).await;

    monitor.refresh(RefreshKind::Background).await.unwrap();
    monitor.refresh(RefreshKind::Background).await.unwrap();
    assert_eq!(
        monitor.current_interval().await,
        std::time::Duration::from_secs(60)
    );

    monitor.refresh(RefreshKind::Background).await.unwrap();
    assert_eq!(
        monitor.current_interval().await,
        std::time::Duration::from_secs(30)
    );
}

#[tokio::test]
async fn test_network_failure_keeps_previous_state() {
    let source = Arc::new(ScriptedSource::new());
    source.script_status("svc-a", "dep-1", DeploymentStatus::Success);
    source.script("svc-a", Err(ApiError::Network("connection refused".to_string())));

    let (monitor, _dir) = monitor_with(source, configured_settings(&["svc-a"])).await;

    monitor.refresh(RefreshKind::Background).await.unwrap();
    monitor.refresh(RefreshKind::Background).await.unwrap();

    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.services[0].status, DeploymentStatus::Success);
    assert!(snapshot.last_error.unwrap().contains("connection refused"));
    assert!(monitor.history().await.is_empty());
}

#[tokio::test]
async fn test_manual_refresh_clears_loading_flag() {
    let source = Arc::new(ScriptedSource::new());
    source.script_status("svc-a", "dep-1", DeploymentStatus::Success);

    let (monitor, _dir) = monitor_with(source, configured_settings(&["svc-a"])).await;
    monitor.refresh(RefreshKind::Manual).await.unwrap();

    let snapshot = monitor.snapshot();
    assert!(!snapshot.is_loading);
    assert!(snapshot.is_configured);
}

#[tokio::test]
async fn test_environment_resolved_once_and_persisted() {
    let source = Arc::new(ScriptedSource::new());
    source.set_project(ProjectInfo {
        id: "proj-1".to_string(),
        name: "Demo".to_string(),
        services: None,
        environments: Some(Connection {
            edges: vec![
                Edge {
                    node: EnvironmentInfo {
                        id: "env-stage".to_string(),
                        name: "staging".to_string(),
                    },
                },
                Edge {
                    node: EnvironmentInfo {
                        id: "env-prod".to_string(),
                        name: "production".to_string(),
                    },
                },
            ],
        }),
    });
    source.script_status("svc-a", "dep-1", DeploymentStatus::Success);
    source.script_status("svc-a", "dep-1", DeploymentStatus::Success);

    let mut settings = configured_settings(&["svc-a"]);
    settings.environment_id = None;

    let (monitor, dir) = monitor_with(source.clone(), settings).await;
    monitor.refresh(RefreshKind::Background).await.unwrap();
    monitor.refresh(RefreshKind::Background).await.unwrap();

    // Resolved exactly once, preferring the environment named "production"
    let calls = source.calls();
    assert_eq!(calls.iter().filter(|c| c.starts_with("project:")).count(), 1);
    assert!(calls.contains(&"deployment:svc-a:env-prod".to_string()));

    let layout = StorageLayout::new(dir.path());
    let persisted = Settings::load(&layout.settings_file()).await.unwrap();
    assert_eq!(persisted.environment_id.as_deref(), Some("env-prod"));
}

#[tokio::test]
async fn test_restart_uses_current_deployment_id() {
    let source = Arc::new(ScriptedSource::new());
    source.script_status("svc-a", "dep-42", DeploymentStatus::Crashed);
    source.script_status("svc-a", "dep-42", DeploymentStatus::Deploying);

    let (monitor, _dir) = monitor_with(source.clone(), configured_settings(&["svc-a"])).await;
    monitor.refresh(RefreshKind::Background).await.unwrap();

    monitor.restart_service("svc-a").await.unwrap();
    assert!(source.calls().contains(&"restart:dep-42".to_string()));

    // Unknown services are rejected before any remote call
    assert!(monitor.restart_service("svc-missing").await.is_err());
}

#[tokio::test]
async fn test_poller_stops_while_fetch_is_hanging() {
    use std::time::Duration;
    use railwatch::workers::poller;

    let dir = TempDir::new().unwrap();
    let layout = StorageLayout::new(dir.path());
    let monitor = Arc::new(
        Monitor::new(
            Arc::new(HangingSource),
            Arc::new(LogNotifier),
            layout,
            configured_settings(&["svc-a"]),
            BackoffOptions::default(),
        )
        .await,
    );

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
    let options = poller::Options {
        initial_delay: Duration::ZERO,
    };

    let handle = tokio::spawn(async move {
        poller::run(
            &options,
            &monitor,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    // Let the worker get stuck in a fetch before signalling
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.send(()).unwrap();

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("poller must stop while a fetch is in flight")
        .unwrap();
}

#[tokio::test]
async fn test_failed_persist_still_publishes_and_clears_loading() {
    let source = Arc::new(ScriptedSource::new());
    source.script_status("svc-a", "dep-1", DeploymentStatus::Building);
    source.script_status("svc-a", "dep-1", DeploymentStatus::Success);

    // Point storage at a path under a regular file so history writes fail
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "").unwrap();
    let layout = StorageLayout::new(blocker);

    let monitor = Arc::new(
        Monitor::new(
            source,
            Arc::new(LogNotifier),
            layout,
            configured_settings(&["svc-a"]),
            BackoffOptions::default(),
        )
        .await,
    );

    monitor.refresh(RefreshKind::Background).await.unwrap();

    // Transition cycle: the history persist fails, but the observed
    // status is still published and the loading flag does not stick
    let result = monitor.refresh(RefreshKind::Manual).await;
    assert!(result.is_err());

    let snapshot = monitor.snapshot();
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.services[0].status, DeploymentStatus::Success);
}

#[tokio::test]
async fn test_groups_roll_up_to_worst_status() {
    let source = Arc::new(ScriptedSource::new());
    source.script_status("svc-a", "dep-1", DeploymentStatus::Success);
    source.script_status("svc-b", "dep-2", DeploymentStatus::Crashed);

    let (monitor, _dir) = monitor_with(source, configured_settings(&["svc-a", "svc-b"])).await;

    let app = monitor
        .add_group("web".to_string(), vec!["svc-a".to_string(), "svc-b".to_string()])
        .await
        .unwrap();

    monitor.refresh(RefreshKind::Background).await.unwrap();

    let groups = monitor.group_statuses().await;
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].1, DeploymentStatus::Crashed);

    monitor.remove_group(app.id).await.unwrap();
    assert!(monitor.group_statuses().await.is_empty());
}

#[tokio::test]
async fn test_display_name_overrides_apply_to_live_entries() {
    let source = Arc::new(ScriptedSource::new());
    source.script_status("svc-a", "dep-1", DeploymentStatus::Success);

    let (monitor, _dir) = monitor_with(source, configured_settings(&["svc-a"])).await;
    monitor.refresh(RefreshKind::Background).await.unwrap();

    monitor
        .set_service_names(HashMap::from([(
            "svc-a".to_string(),
            "api gateway".to_string(),
        )]))
        .await
        .unwrap();

    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.services[0].service_name, "api gateway");
}

#[tokio::test]
async fn test_configure_applies_roster_and_refreshes() {
    let source = Arc::new(ScriptedSource::new());
    source.script_status("svc-new", "dep-9", DeploymentStatus::Deploying);

    // Start fully unconfigured
    let (monitor, dir) = monitor_with(source, Settings::default()).await;
    assert!(!monitor.snapshot().is_configured);

    monitor
        .configure(railwatch::monitor::engine::MonitorConfig {
            project_id: "proj-2".to_string(),
            project_name: Some("Other".to_string()),
            environment_id: Some("env-1".to_string()),
            tracked_service_ids: vec!["svc-new".to_string()],
            service_names: HashMap::from([("svc-new".to_string(), "worker".to_string())]),
        })
        .await
        .unwrap();

    // Configure runs an immediate refresh
    let snapshot = monitor.snapshot();
    assert!(snapshot.is_configured);
    assert_eq!(snapshot.services.len(), 1);
    assert_eq!(snapshot.services[0].service_name, "worker");
    assert_eq!(snapshot.services[0].status, DeploymentStatus::Deploying);

    let layout = StorageLayout::new(dir.path());
    let persisted = Settings::load(&layout.settings_file()).await.unwrap();
    assert_eq!(persisted.project_id.as_deref(), Some("proj-2"));
    assert_eq!(persisted.tracked_service_ids, vec!["svc-new".to_string()]);
}

#[tokio::test]
async fn test_reset_clears_configuration_and_history() {
    let source = Arc::new(ScriptedSource::new());
    source.script_status("svc-a", "dep-1", DeploymentStatus::Building);
    source.script_status("svc-a", "dep-1", DeploymentStatus::Success);

    let (monitor, dir) = monitor_with(source, configured_settings(&["svc-a"])).await;
    monitor.refresh(RefreshKind::Background).await.unwrap();
    monitor.refresh(RefreshKind::Background).await.unwrap();
    assert_eq!(monitor.history().await.len(), 1);

    monitor.reset().await.unwrap();

    let snapshot = monitor.snapshot();
    assert!(snapshot.services.is_empty());
    assert!(!snapshot.is_configured);
    assert!(monitor.history().await.is_empty());

    let layout = StorageLayout::new(dir.path());
    let persisted = Settings::load(&layout.settings_file()).await.unwrap();
    assert!(!persisted.is_configured());
}
