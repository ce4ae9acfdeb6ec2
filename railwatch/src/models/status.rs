//! Deployment status model

use serde::{Deserialize, Serialize};

/// Status of a service's latest deployment, as reported by the Railway API.
///
/// Any wire value not listed here decodes as `Unknown` so a new API status
/// never breaks parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    Success,
    Building,
    Deploying,
    Failed,
    Crashed,
    Error,
    Removed,
    Removing,
    Initializing,
    Waiting,
    Sleeping,
    #[serde(other)]
    Unknown,
}

impl DeploymentStatus {
    /// Priority for worst-wins aggregation (lower = worse = show first).
    pub fn priority(&self) -> u8 {
        match self {
            Self::Failed | Self::Crashed | Self::Error => 0,
            Self::Building => 1,
            Self::Deploying | Self::Initializing | Self::Waiting => 2,
            Self::Success => 3,
            Self::Sleeping => 4,
            Self::Removed | Self::Removing | Self::Unknown => 5,
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed | Self::Crashed | Self::Error)
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            Self::Building | Self::Deploying | Self::Initializing | Self::Waiting
        )
    }

    /// Human-readable name used in notifications and the status view.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Success => "Online",
            Self::Building => "Building",
            Self::Deploying => "Deploying",
            Self::Failed => "Failed",
            Self::Crashed => "Crashed",
            Self::Error => "Error",
            Self::Removed => "Removed",
            Self::Removing => "Removing",
            Self::Initializing => "Initializing",
            Self::Waiting => "Waiting",
            Self::Sleeping => "Sleeping",
            Self::Unknown => "Unknown",
        }
    }
}
