//! Tracked services, transition history entries, and service groups

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::models::status::DeploymentStatus;

/// A remote deployable unit the monitor tracks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredService {
    /// Stable service id
    pub id: String,

    /// Owning project id
    pub project_id: String,

    /// Owning project display name
    pub project_name: String,

    /// Human display name, falling back to the raw id
    pub service_name: String,

    /// Last observed status
    pub status: DeploymentStatus,

    /// When the status was last observed
    pub last_updated: DateTime<Utc>,

    /// Creation time of the current deployment
    #[serde(default)]
    pub deployment_started_at: Option<DateTime<Utc>>,

    /// Id of the current deployment
    #[serde(default)]
    pub deployment_id: Option<String>,
}

impl MonitoredService {
    /// Railway dashboard URL for this service
    pub fn dashboard_url(&self) -> Option<Url> {
        Url::parse(&format!(
            "https://railway.com/project/{}/service/{}",
            self.project_id, self.id
        ))
        .ok()
    }

    /// How long the current deployment has been in its state ("3m" / "42s")
    pub fn time_in_current_state(&self) -> Option<String> {
        let started_at = self.deployment_started_at?;
        let elapsed = (Utc::now() - started_at).num_seconds().max(0);
        let minutes = elapsed / 60;

        if minutes > 0 {
            Some(format!("{}m", minutes))
        } else {
            Some(format!("{}s", elapsed))
        }
    }
}

/// Immutable record of one detected status change.
///
/// Entries written by older releases may lack `project_id`,
/// `deployment_id` or `deployment_created_at`; those decode with
/// empty/absent defaults so a ledger load never fails on old data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub service_id: String,
    pub service_name: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub deployment_id: Option<String>,
    pub old_status: DeploymentStatus,
    pub new_status: DeploymentStatus,
    /// Wall-clock time the change was detected
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub deployment_created_at: Option<DateTime<Utc>>,
}

impl HistoryEntry {
    pub fn new(
        service_id: String,
        service_name: String,
        project_id: String,
        deployment_id: Option<String>,
        old_status: DeploymentStatus,
        new_status: DeploymentStatus,
        deployment_created_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_id,
            service_name,
            project_id,
            deployment_id,
            old_status,
            new_status,
            timestamp: Utc::now(),
            deployment_created_at,
        }
    }

    /// Duration from deployment creation to this change ("1m 5s" / "42s").
    ///
    /// Only rendered for terminal transitions (Success or a failed state).
    pub fn deployment_duration(&self) -> Option<String> {
        let created_at = self.deployment_created_at?;
        if !self.new_status.is_healthy() && !self.new_status.is_failed() {
            return None;
        }

        let elapsed = (self.timestamp - created_at).num_seconds().max(0);
        let minutes = elapsed / 60;
        let seconds = elapsed % 60;

        if minutes > 0 {
            Some(format!("{}m {}s", minutes, seconds))
        } else {
            Some(format!("{}s", seconds))
        }
    }

    /// Relative age for the history view ("2m ago", "just now")
    pub fn time_ago(&self) -> String {
        let elapsed = (Utc::now() - self.timestamp).num_seconds().max(0);

        if elapsed >= 86_400 {
            format!("{}d ago", elapsed / 86_400)
        } else if elapsed >= 3600 {
            format!("{}h ago", elapsed / 3600)
        } else if elapsed >= 60 {
            format!("{}m ago", elapsed / 60)
        } else if elapsed > 10 {
            format!("{}s ago", elapsed)
        } else {
            "just now".to_string()
        }
    }

    /// Railway dashboard URL, deep-linking to the deployment when known
    pub fn dashboard_url(&self) -> Option<Url> {
        let url = match &self.deployment_id {
            Some(deployment_id) => format!(
                "https://railway.com/project/{}/service/{}/deployment/{}",
                self.project_id, self.service_id, deployment_id
            ),
            None => format!(
                "https://railway.com/project/{}/service/{}",
                self.project_id, self.service_id
            ),
        };
        Url::parse(&url).ok()
    }
}

/// A user-defined group of services ("app") rolled up to one status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredApp {
    pub id: Uuid,
    pub name: String,
    /// Member service ids; duplicates and ids no longer tracked are harmless
    pub service_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl MonitoredApp {
    pub fn new(name: String, service_ids: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            service_ids,
            created_at: Utc::now(),
        }
    }

    /// Worst-wins status over the group's members present in `services`.
    ///
    /// Unknown when no member resolves to a tracked service.
    pub fn aggregate_status(&self, services: &[MonitoredService]) -> DeploymentStatus {
        services
            .iter()
            .filter(|s| self.service_ids.contains(&s.id))
            .map(|s| s.status)
            .min_by_key(|s| s.priority())
            .unwrap_or(DeploymentStatus::Unknown)
    }

    /// Members of this group present in `services`
    pub fn services<'a>(&self, services: &'a [MonitoredService]) -> Vec<&'a MonitoredService> {
        services
            .iter()
            .filter(|s| self.service_ids.contains(&s.id))
            .collect()
    }
}

/// Worst-wins status across all tracked services (the implicit whole-system group)
pub fn aggregate_status(services: &[MonitoredService]) -> DeploymentStatus {
    services
        .iter()
        .map(|s| s.status)
        .min_by_key(|s| s.priority())
        .unwrap_or(DeploymentStatus::Unknown)
}
