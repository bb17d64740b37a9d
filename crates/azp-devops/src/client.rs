use crate::config::DevOpsConfig;
use crate::retry_after::status_error;
use async_trait::async_trait;
use azp_core::ports::AgentPoolGateway;
use azp_core::{Agent, AgentPool, Error, JobRequest, Result};
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

const POOLS_ENDPOINT: &str = "/_apis/distributedtask/pools";

const ACCEPT_HEADER: &str = "application/json;api-version=5.0-preview.1";

const USER_AGENT: &str = concat!("azp-agent-autoscaler/", env!("CARGO_PKG_VERSION"));

/// The `{ "count": n, "value": [...] }` envelope of list responses.
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

/// Client for the Azure DevOps distributed task API.
pub struct DevOpsClient {
    client: Client,
    base_url: String,
    token: String,
}

impl DevOpsClient {
    pub fn new(config: &DevOpsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Upstream(format!("Could not build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(endpoint, "Calling Azure DevOps");

        let res = self
            .client
            .get(&url)
            .header(ACCEPT, ACCEPT_HEADER)
            .basic_auth("user", Some(&self.token))
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Request to {} failed: {}", endpoint, e)))?;

        let status = res.status();
        if !status.is_success() {
            return Err(status_error(
                status,
                res.url().path(),
                res.headers(),
                chrono::Utc::now(),
            ));
        }

        res.json().await.map_err(|e| {
            Error::Upstream(format!(
                "Could not parse JSON response from {}: {}",
                endpoint, e
            ))
        })
    }

    async fn list<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>> {
        let response: ListResponse<T> = self.get(endpoint).await?;
        Ok(response.value)
    }
}

#[async_trait]
impl AgentPoolGateway for DevOpsClient {
    async fn list_pools(&self) -> Result<Vec<AgentPool>> {
        self.list(POOLS_ENDPOINT).await
    }

    async fn list_pool_agents(&self, pool_id: u64) -> Result<Vec<Agent>> {
        self.list(&format!(
            "{}/{}/agents?includeCapabilities=true&includeAssignedRequest=true&includeLastCompletedRequest=true",
            POOLS_ENDPOINT, pool_id
        ))
        .await
    }

    async fn list_job_requests(&self, pool_id: u64) -> Result<Vec<JobRequest>> {
        self.list(&format!("{}/{}/jobrequests", POOLS_ENDPOINT, pool_id))
            .await
    }
}
