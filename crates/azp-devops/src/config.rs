//! Configuration for the Azure DevOps client.

use std::time::Duration;

/// Configuration for the Azure DevOps client.
#[derive(Debug, Clone)]
pub struct DevOpsConfig {
    /// Organization URL, ex: https://dev.azure.com/AccountName
    pub url: String,
    /// Personal access token.
    pub token: String,
    /// Timeout for a single request, connect through body.
    pub request_timeout: Duration,
}

impl DevOpsConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
