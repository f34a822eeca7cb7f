//! HTTP probe reading `NodeInfo` and admin accounts from remote instances.

use std::time::Duration;

use async_trait::async_trait;
use fediseer_common::config::ProbeConfig;
use fediseer_core::{InstanceMetadata, MetadataProbe, ProbeError};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::{
    admins::AdminStrategy,
    nodeinfo::{NodeInfo, WELL_KNOWN_PATH, WellKnown},
};

/// Probe backed by `reqwest`.
#[derive(Clone)]
pub struct NodeInfoProbe {
    client: Client,
}

impl NodeInfoProbe {
    /// Create a new probe.
    pub fn new(config: &ProbeConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(5)))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    async fn nodeinfo(&self, domain: &str) -> Result<NodeInfo, ProbeError> {
        let url = base_url(domain)?
            .join(WELL_KNOWN_PATH)
            .map_err(|e| invalid(domain, e.to_string()))?;
        let well_known: WellKnown = self.get_json(domain, url).await?;
        let href = well_known
            .best_link()
            .ok_or_else(|| invalid(domain, "no nodeinfo links advertised".to_string()))?;
        let url = Url::parse(href).map_err(|e| invalid(domain, e.to_string()))?;
        self.get_json(domain, url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, domain: &str, url: Url) -> Result<T, ProbeError> {
        debug!(url = %url, "Fetching");
        let response = self
            .client
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| unreachable(domain, e.to_string()))?;
        Self::decode(domain, &url, response).await
    }

    async fn post_json<T: DeserializeOwned>(&self, domain: &str, url: Url) -> Result<T, ProbeError> {
        debug!(url = %url, "Posting");
        let response = self
            .client
            .post(url.clone())
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| unreachable(domain, e.to_string()))?;
        Self::decode(domain, &url, response).await
    }

    async fn decode<T: DeserializeOwned>(
        domain: &str,
        url: &Url,
        response: reqwest::Response,
    ) -> Result<T, ProbeError> {
        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = %status, "Remote instance returned an error");
            return Err(unreachable(domain, format!("HTTP {status} from {url}")));
        }
        response
            .json()
            .await
            .map_err(|e| invalid(domain, e.to_string()))
    }
}

#[async_trait]
impl MetadataProbe for NodeInfoProbe {
    async fn probe(&self, domain: &str) -> Result<InstanceMetadata, ProbeError> {
        let metadata = self.nodeinfo(domain).await?.to_metadata();
        debug!(domain = %domain, software = %metadata.software, "Probed instance");
        Ok(metadata)
    }

    async fn admins(&self, domain: &str, software: &str) -> Result<Vec<String>, ProbeError> {
        let strategy = AdminStrategy::for_software(software);
        let Some(path) = strategy.path() else {
            return Ok(self.nodeinfo(domain).await?.staff_accounts());
        };
        let url = base_url(domain)?
            .join(path)
            .map_err(|e| invalid(domain, e.to_string()))?;
        let body: Value = if strategy.uses_post() {
            self.post_json(domain, url).await?
        } else {
            self.get_json(domain, url).await?
        };
        let admins = strategy.parse(&body);
        debug!(domain = %domain, strategy = ?strategy, count = admins.len(), "Discovered admins");
        Ok(admins)
    }
}

fn base_url(domain: &str) -> Result<Url, ProbeError> {
    Url::parse(&format!("https://{domain}")).map_err(|e| invalid(domain, e.to_string()))
}

fn unreachable(domain: &str, reason: String) -> ProbeError {
    ProbeError::Unreachable {
        domain: domain.to_string(),
        reason,
    }
}

fn invalid(domain: &str, reason: String) -> ProbeError {
    ProbeError::InvalidResponse {
        domain: domain.to_string(),
        reason,
    }
}
