//! HTTP health probe against the supervised server

use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Result of one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 2xx response
    Healthy {
        /// `status` field of the JSON body, when present
        status: Option<String>,
    },
    /// Non-2xx response or connection failure
    Unhealthy {
        /// Why the probe failed
        reason: String,
    },
}

impl HealthStatus {
    /// Whether the probe succeeded
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy { .. })
    }
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    status: Option<String>,
}

/// Probe issuing `GET` requests to a fixed health URL
#[derive(Debug, Clone)]
pub struct HealthProbe {
    client: reqwest::Client,
    url: String,
}

impl HealthProbe {
    /// Create a probe whose requests give up after `timeout`
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// URL being probed
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Probe once; never fails, failures are reported as unhealthy
    pub async fn check(&self) -> HealthStatus {
        let response = match self.client.get(&self.url).send().await {
            Ok(response) => response,
            Err(e) => {
                return HealthStatus::Unhealthy {
                    reason: format!("request failed: {e}"),
                };
            }
        };

        let code = response.status();
        if !code.is_success() {
            return HealthStatus::Unhealthy {
                reason: format!("status {code}"),
            };
        }

        let status = response
            .json::<HealthBody>()
            .await
            .ok()
            .and_then(|body| body.status);
        HealthStatus::Healthy { status }
    }
}
