//! Client for a running controller's admin API.

use anyhow::{anyhow, bail, Result};
use fleet_common::{AddNodeRequest, ScaleRequest};
use serde_json::Value;

/// Thin reqwest wrapper over `/scale`, `/add-node` and `/status`.
///
/// Responses are returned as raw JSON so the CLI can print them unchanged.
pub struct AdminClient {
    base: String,
    client: reqwest::Client,
}

impl AdminClient {
    /// Creates a client for the controller at `addr` (e.g. `http://127.0.0.1:8000`).
    pub fn new(addr: &str) -> Result<Self> {
        if !addr.starts_with("http://") && !addr.starts_with("https://") {
            bail!(
                "Invalid controller address: '{}' must start with http:// or https://",
                addr
            );
        }
        Ok(Self {
            base: addr.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        })
    }

    pub async fn scale(&self, count: i64) -> Result<Value> {
        let response = self
            .client
            .post(self.url("/scale"))
            .json(&ScaleRequest { count })
            .send()
            .await?;
        Self::read(response).await
    }

    pub async fn add_node(&self, url: &str) -> Result<Value> {
        let response = self
            .client
            .post(self.url("/add-node"))
            .json(&AddNodeRequest {
                url: url.to_string(),
            })
            .send()
            .await?;
        Self::read(response).await
    }

    pub async fn status(&self) -> Result<Value> {
        let response = self.client.get(self.url("/status")).send().await?;
        Self::read(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn read(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            bail!("Controller returned {}: {}", status, body.trim());
        }
        serde_json::from_str(&body).map_err(|e| anyhow!("Invalid JSON from controller: {}", e))
    }
}
