//! Deployment and project queries against the Railway API

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::http::client::{ApiClient, ApiError};
use crate::models::status::DeploymentStatus;

/// Latest deployment for a service
#[derive(Debug, Clone, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub status: DeploymentStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Relay-style connection wrapper
#[derive(Debug, Clone, Deserialize)]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Edge<T> {
    pub node: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentInfo {
    pub id: String,
    pub name: String,
}

/// Project metadata, used during discovery and environment migration
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub services: Option<Connection<ServiceInfo>>,
    #[serde(default)]
    pub environments: Option<Connection<EnvironmentInfo>>,
}

impl ProjectInfo {
    /// Pick the environment to scope deployment queries to: the one named
    /// "production" when present, otherwise the first listed.
    pub fn production_environment(&self) -> Option<&EnvironmentInfo> {
        let environments = self.environments.as_ref()?;
        environments
            .edges
            .iter()
            .map(|e| &e.node)
            .find(|env| env.name.eq_ignore_ascii_case("production"))
            .or_else(|| environments.edges.first().map(|e| &e.node))
    }

    /// Services listed on the project
    pub fn service_list(&self) -> Vec<&ServiceInfo> {
        self.services
            .as_ref()
            .map(|c| c.edges.iter().map(|e| &e.node).collect())
            .unwrap_or_default()
    }
}

const SERVICE_DEPLOYMENTS_QUERY: &str = r#"
query ServiceDeployments($serviceId: String!, $environmentId: String) {
  deployments(
    first: 1
    input: { serviceId: $serviceId, environmentId: $environmentId }
  ) {
    edges {
      node {
        id
        status
        createdAt
      }
    }
  }
}"#;

const PROJECT_QUERY: &str = r#"
query Project($id: String!) {
  project(id: $id) {
    id
    name
    services {
      edges {
        node {
          id
          name
        }
      }
    }
    environments {
      edges {
        node {
          id
          name
        }
      }
    }
  }
}"#;

const PROJECTS_QUERY: &str = r#"
query Projects {
  projects {
    edges {
      node {
        id
        name
        services {
          edges {
            node {
              id
              name
            }
          }
        }
        environments {
          edges {
            node {
              id
              name
            }
          }
        }
      }
    }
  }
}"#;

const DEPLOYMENT_RESTART_MUTATION: &str = r#"
mutation DeploymentRestart($id: String!) {
  deploymentRestart(id: $id)
}"#;

const DEPLOYMENT_REDEPLOY_MUTATION: &str = r#"
mutation DeploymentRedeploy($id: String!) {
  deploymentRedeploy(id: $id) {
    id
    status
  }
}"#;

#[derive(Debug, Deserialize)]
struct DeploymentsData {
    deployments: Connection<Deployment>,
}

#[derive(Debug, Deserialize)]
struct ProjectData {
    project: Option<ProjectInfo>,
}

#[derive(Debug, Deserialize)]
struct ProjectsData {
    projects: Connection<ProjectInfo>,
}

#[derive(Debug, Deserialize)]
struct DeploymentRestartData {
    #[serde(rename = "deploymentRestart")]
    _restarted: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct DeploymentRedeployData {
    #[serde(rename = "deploymentRedeploy")]
    _deployment: serde_json::Value,
}

impl ApiClient {
    /// Fetch the latest deployment for a service, optionally scoped to an
    /// environment. None when the service has no deployments.
    pub async fn fetch_deployment(
        &self,
        service_id: &str,
        environment_id: Option<&str>,
    ) -> Result<Option<Deployment>, ApiError> {
        let data: DeploymentsData = self
            .execute(
                SERVICE_DEPLOYMENTS_QUERY,
                json!({
                    "serviceId": service_id,
                    "environmentId": environment_id,
                }),
            )
            .await?;

        Ok(data.deployments.edges.into_iter().next().map(|e| e.node))
    }

    /// Fetch project metadata by id
    pub async fn fetch_project(&self, project_id: &str) -> Result<Option<ProjectInfo>, ApiError> {
        let data: ProjectData = self
            .execute(PROJECT_QUERY, json!({ "id": project_id }))
            .await?;
        Ok(data.project)
    }

    /// Fetch all projects visible to the token (service discovery)
    pub async fn fetch_projects(&self) -> Result<Vec<ProjectInfo>, ApiError> {
        let data: ProjectsData = self.execute(PROJECTS_QUERY, json!({})).await?;
        Ok(data.projects.edges.into_iter().map(|e| e.node).collect())
    }

    /// Check whether the token can query the API at all
    pub async fn validate_token(&self) -> Result<bool, ApiError> {
        match self.fetch_projects().await {
            Ok(_) => Ok(true),
            Err(ApiError::Unauthorized) | Err(ApiError::Api(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Restart a deployment (keeps the same build)
    pub async fn restart_deployment(&self, deployment_id: &str) -> Result<(), ApiError> {
        let _: DeploymentRestartData = self
            .execute(DEPLOYMENT_RESTART_MUTATION, json!({ "id": deployment_id }))
            .await?;
        Ok(())
    }

    /// Redeploy a deployment (triggers a new build)
    pub async fn redeploy_deployment(&self, deployment_id: &str) -> Result<(), ApiError> {
        let _: DeploymentRedeployData = self
            .execute(DEPLOYMENT_REDEPLOY_MUTATION, json!({ "id": deployment_id }))
            .await?;
        Ok(())
    }
}
