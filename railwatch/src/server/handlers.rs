//! HTTP request handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::models::service::HistoryEntry;
use crate::monitor::engine::RefreshKind;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "railwatch".to_string(),
        version: version.version,
    })
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// One service in the status response
#[derive(Debug, Serialize)]
pub struct ServiceView {
    pub id: String,
    pub name: String,
    pub status: String,
    pub deployment_id: Option<String>,
    pub time_in_state: Option<String>,
    pub dashboard_url: Option<String>,
}

/// One group in the status response
#[derive(Debug, Serialize)]
pub struct GroupView {
    pub id: String,
    pub name: String,
    pub status: String,
    pub service_ids: Vec<String>,
}

/// Status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub configured: bool,
    pub overall_status: String,
    pub last_error: Option<String>,
    pub services: Vec<ServiceView>,
    pub groups: Vec<GroupView>,
}

/// Current status handler
pub async fn status_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let snapshot = state.monitor.snapshot();
    let groups = state
        .monitor
        .group_statuses()
        .await
        .into_iter()
        .map(|(app, status)| GroupView {
            id: app.id.to_string(),
            name: app.name,
            status: status.display_name().to_string(),
            service_ids: app.service_ids,
        })
        .collect();

    let services = snapshot
        .services
        .iter()
        .map(|s| ServiceView {
            id: s.id.clone(),
            name: s.service_name.clone(),
            status: s.status.display_name().to_string(),
            deployment_id: s.deployment_id.clone(),
            time_in_state: s.time_in_current_state(),
            dashboard_url: s.dashboard_url().map(|u| u.to_string()),
        })
        .collect();

    Json(StatusResponse {
        configured: snapshot.is_configured,
        overall_status: snapshot.overall_status().display_name().to_string(),
        last_error: snapshot.last_error.clone(),
        services,
        groups,
    })
}

/// One history entry in the history response
#[derive(Debug, Serialize)]
pub struct HistoryView {
    pub service_id: String,
    pub service_name: String,
    pub old_status: String,
    pub new_status: String,
    pub timestamp: String,
    pub time_ago: String,
    pub deployment_duration: Option<String>,
}

impl From<&HistoryEntry> for HistoryView {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            service_id: entry.service_id.clone(),
            service_name: entry.service_name.clone(),
            old_status: entry.old_status.display_name().to_string(),
            new_status: entry.new_status.display_name().to_string(),
            timestamp: entry.timestamp.to_rfc3339(),
            time_ago: entry.time_ago(),
            deployment_duration: entry.deployment_duration(),
        }
    }
}

/// History response
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub entries: Vec<HistoryView>,
    pub total: usize,
}

/// Transition history handler, most recent first
pub async fn history_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let entries: Vec<HistoryView> = state
        .monitor
        .history()
        .await
        .iter()
        .map(HistoryView::from)
        .collect();
    let total = entries.len();

    Json(HistoryResponse { entries, total })
}

/// Refresh response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub message: String,
}

/// Manual refresh handler
pub async fn refresh_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<impl IntoResponse, StatusCode> {
    match state.monitor.refresh(RefreshKind::Manual).await {
        Ok(_) => Ok(Json(RefreshResponse {
            success: true,
            message: "Refresh completed".to_string(),
        })),
        Err(e) => Ok(Json(RefreshResponse {
            success: false,
            message: format!("Refresh failed: {}", e),
        })),
    }
}
