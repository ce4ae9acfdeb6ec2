//! Diffing of fetched deployment state against the last-known map

use std::collections::HashMap;

use chrono::Utc;

use crate::http::client::ApiError;
use crate::http::deployments::Deployment;
use crate::models::service::{HistoryEntry, MonitoredService};
use crate::models::status::DeploymentStatus;

/// Per-service result of one poll cycle.
///
/// Ids absent from the fetched map were skipped (the cycle was aborted by
/// a rate limit before reaching them).
#[derive(Debug)]
pub enum FetchOutcome {
    /// Latest deployment, if the service has one
    Fetched(Option<Deployment>),
    Fail(ApiError),
}

/// Project context applied to every rebuilt service entry
#[derive(Debug, Clone, Copy)]
pub struct ServiceContext<'a> {
    pub project_id: &'a str,
    pub project_name: &'a str,
}

/// Result of reconciling one cycle
#[derive(Debug)]
pub struct ReconcileOutput {
    /// Updated canonical snapshot, in tracked order
    pub services: Vec<MonitoredService>,

    /// Transitions detected this cycle, in tracked order
    pub transitions: Vec<HistoryEntry>,

    /// Statuses observed from successful fetches, for the baseline map
    pub observed: Vec<(String, DeploymentStatus)>,

    /// Latest per-service failure message, if any fetch failed
    pub last_error: Option<String>,
}

/// Diff newly fetched per-service state against the previous snapshot.
///
/// A transition is emitted iff the service had a previously known status
/// that differs from the new one; the very first observation only sets a
/// baseline. Failed or skipped fetches carry the previous entry forward
/// unchanged.
pub fn reconcile(
    tracked: &[String],
    ctx: &ServiceContext<'_>,
    previous_services: &[MonitoredService],
    previous_statuses: &HashMap<String, DeploymentStatus>,
    mut fetched: HashMap<String, FetchOutcome>,
) -> ReconcileOutput {
    let mut services = Vec::with_capacity(tracked.len());
    let mut transitions = Vec::new();
    let mut observed = Vec::new();
    let mut last_error = None;

    for service_id in tracked {
        let existing = previous_services.iter().find(|s| &s.id == service_id);

        match fetched.remove(service_id) {
            Some(FetchOutcome::Fetched(Some(deployment))) => {
                let service = MonitoredService {
                    id: service_id.clone(),
                    project_id: ctx.project_id.to_string(),
                    project_name: ctx.project_name.to_string(),
                    service_name: existing
                        .map(|s| s.service_name.clone())
                        .unwrap_or_else(|| service_id.clone()),
                    status: deployment.status,
                    last_updated: Utc::now(),
                    deployment_started_at: Some(deployment.created_at),
                    deployment_id: Some(deployment.id.clone()),
                };

                if let Some(&old_status) = previous_statuses.get(service_id) {
                    if old_status != deployment.status {
                        transitions.push(HistoryEntry::new(
                            service_id.clone(),
                            service.service_name.clone(),
                            ctx.project_id.to_string(),
                            Some(deployment.id.clone()),
                            old_status,
                            deployment.status,
                            Some(deployment.created_at),
                        ));
                    }
                }

                observed.push((service_id.clone(), deployment.status));
                services.push(service);
            }
            Some(FetchOutcome::Fetched(None)) => {
                // Service has no deployment; nothing to update
                if let Some(existing) = existing {
                    services.push(existing.clone());
                }
            }
            Some(FetchOutcome::Fail(err)) => {
                last_error = Some(err.to_string());
                if let Some(existing) = existing {
                    services.push(existing.clone());
                }
            }
            None => {
                // Skipped after a rate limit aborted the cycle
                if let Some(existing) = existing {
                    services.push(existing.clone());
                }
            }
        }
    }

    ReconcileOutput {
        services,
        transitions,
        observed,
        last_error,
    }
}

/// Snapshot equality for publish deduplication: id, status and deployment
/// id are the fields observers act on.
pub fn services_equal(lhs: &[MonitoredService], rhs: &[MonitoredService]) -> bool {
    lhs.len() == rhs.len()
        && lhs
            .iter()
            .zip(rhs)
            .all(|(l, r)| l.id == r.id && l.status == r.status && l.deployment_id == r.deployment_id)
}
