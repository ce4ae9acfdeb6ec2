//! Boundary trait for the remote status source

use async_trait::async_trait;

use crate::http::client::{ApiClient, ApiError};
use crate::http::deployments::{Deployment, ProjectInfo};

/// The engine's view of the remote platform API.
///
/// Production uses `ApiClient`; tests substitute scripted sources.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Latest deployment for a service, optionally scoped to an environment
    async fn fetch_deployment(
        &self,
        service_id: &str,
        environment_id: Option<&str>,
    ) -> Result<Option<Deployment>, ApiError>;

    /// Project metadata, used for one-time environment resolution
    async fn fetch_project(&self, project_id: &str) -> Result<Option<ProjectInfo>, ApiError>;

    /// Restart a deployment in place
    async fn restart_deployment(&self, deployment_id: &str) -> Result<(), ApiError>;

    /// Trigger a fresh build and deploy
    async fn redeploy_deployment(&self, deployment_id: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl StatusSource for ApiClient {
    async fn fetch_deployment(
        &self,
        service_id: &str,
        environment_id: Option<&str>,
    ) -> Result<Option<Deployment>, ApiError> {
        ApiClient::fetch_deployment(self, service_id, environment_id).await
    }

    async fn fetch_project(&self, project_id: &str) -> Result<Option<ProjectInfo>, ApiError> {
        ApiClient::fetch_project(self, project_id).await
    }

    async fn restart_deployment(&self, deployment_id: &str) -> Result<(), ApiError> {
        ApiClient::restart_deployment(self, deployment_id).await
    }

    async fn redeploy_deployment(&self, deployment_id: &str) -> Result<(), ApiError> {
        ApiClient::redeploy_deployment(self, deployment_id).await
    }
}
