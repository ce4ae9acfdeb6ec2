//! Notification dispatch for status transitions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::service::HistoryEntry;
use crate::models::status::DeploymentStatus;

/// User preferences gating which transitions raise a notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyPreferences {
    #[serde(default = "default_true")]
    pub notify_on_success: bool,

    #[serde(default = "default_true")]
    pub notify_on_building: bool,

    #[serde(default = "default_true")]
    pub notify_on_deploying: bool,

    #[serde(default = "default_true")]
    pub notify_on_failure: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NotifyPreferences {
    fn default() -> Self {
        Self {
            notify_on_success: true,
            notify_on_building: true,
            notify_on_deploying: true,
            notify_on_failure: true,
        }
    }
}

impl NotifyPreferences {
    /// Whether a transition into `status` should alert the user
    pub fn should_notify(&self, status: DeploymentStatus) -> bool {
        match status {
            DeploymentStatus::Success => self.notify_on_success,
            DeploymentStatus::Building => self.notify_on_building,
            DeploymentStatus::Deploying
            | DeploymentStatus::Initializing
            | DeploymentStatus::Waiting => self.notify_on_deploying,
            DeploymentStatus::Failed | DeploymentStatus::Crashed => self.notify_on_failure,
            _ => false,
        }
    }
}

/// Receives transition events; implementations must not block or fail the
/// polling cycle.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, entry: &HistoryEntry, prefs: &NotifyPreferences);
}

/// Default notifier that emits transitions through the log.
///
/// OS-level delivery (desktop notifications, sounds) plugs in behind the
/// same trait.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, entry: &HistoryEntry, prefs: &NotifyPreferences) {
        if !prefs.should_notify(entry.new_status) {
            return;
        }

        info!(
            service = %entry.service_name,
            old = %entry.old_status.display_name(),
            new = %entry.new_status.display_name(),
            "{}: {}",
            status_title(entry.new_status, &entry.service_name),
            status_body(entry.new_status),
        );
    }
}

/// Notification title for a transition into `status`
pub fn status_title(status: DeploymentStatus, service_name: &str) -> String {
    match status {
        DeploymentStatus::Success => format!("{} Deployed", service_name),
        DeploymentStatus::Building => format!("{} Building", service_name),
        DeploymentStatus::Deploying
        | DeploymentStatus::Initializing
        | DeploymentStatus::Waiting => format!("{} Deploying", service_name),
        DeploymentStatus::Failed => format!("{} Failed", service_name),
        DeploymentStatus::Crashed => format!("{} Crashed", service_name),
        DeploymentStatus::Error => format!("{} Error", service_name),
        _ => format!("{} Status Changed", service_name),
    }
}

/// Notification body for a transition into `status`
pub fn status_body(status: DeploymentStatus) -> String {
    match status {
        DeploymentStatus::Success => "Deployment completed successfully".to_string(),
        DeploymentStatus::Building => "Build started".to_string(),
        DeploymentStatus::Deploying => "Deployment in progress".to_string(),
        DeploymentStatus::Failed => "Deployment failed - check Railway dashboard".to_string(),
        DeploymentStatus::Crashed => "Service crashed - check Railway dashboard".to_string(),
        DeploymentStatus::Error => "Service has errors - check Railway dashboard".to_string(),
        other => format!("Status: {}", other.display_name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_notify_gating() {
        let prefs = NotifyPreferences::default();
        assert!(prefs.should_notify(DeploymentStatus::Success));
        assert!(prefs.should_notify(DeploymentStatus::Building));
        assert!(prefs.should_notify(DeploymentStatus::Initializing));
        assert!(prefs.should_notify(DeploymentStatus::Crashed));
        // Housekeeping states never notify
        assert!(!prefs.should_notify(DeploymentStatus::Removed));
        assert!(!prefs.should_notify(DeploymentStatus::Sleeping));
        assert!(!prefs.should_notify(DeploymentStatus::Unknown));
    }

    #[test]
    fn test_should_notify_respects_disabled_preferences() {
        let prefs = NotifyPreferences {
            notify_on_success: false,
            notify_on_failure: false,
            ..NotifyPreferences::default()
        };
        assert!(!prefs.should_notify(DeploymentStatus::Success));
        assert!(!prefs.should_notify(DeploymentStatus::Failed));
        assert!(prefs.should_notify(DeploymentStatus::Building));
    }
}
