//! GraphQL client for the Railway API

use reqwest::{header, Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error};

/// Public Railway GraphQL endpoint
pub const DEFAULT_BASE_URL: &str = "https://backboard.railway.com/graphql/v2";

/// Typed failure modes of the remote status source
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid or expired API token")]
    Unauthorized,

    #[error("Rate limited by the Railway API")]
    RateLimited,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse response: {0}")]
    Decode(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error: {0}")]
    Api(String),
}

impl ApiError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphQlError>>,
}

/// HTTP client for the Railway GraphQL API
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: SecretString,
}

impl ApiClient {
    /// Create a new API client with a bearer token
    pub fn new(base_url: &str, token: SecretString) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Execute a GraphQL document and unwrap the data envelope
    pub(crate) async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, ApiError> {
        debug!("POST {}", self.base_url);

        let body = json!({
            "query": query,
            "variables": variables,
        });

        let response = self
            .client
            .post(&self.base_url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.token.expose_secret()),
            )
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => return Err(ApiError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => return Err(ApiError::RateLimited),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                error!("GraphQL request failed: {} - {}", status, body);
                return Err(ApiError::Api(format!("{}: {}", status, body)));
            }
            _ => {}
        }

        let parsed: GraphQlResponse<T> = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        if let Some(errors) = parsed.errors {
            if !errors.is_empty() {
                let message = errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(ApiError::Api(message));
            }
        }

        parsed
            .data
            .ok_or_else(|| ApiError::Decode("no data returned from API".to_string()))
    }
}
