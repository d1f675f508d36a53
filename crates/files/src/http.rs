//! IPFS HTTP API content store.

use crate::store::{ContentStore, Result, StoreError};
use async_trait::async_trait;
use hashvault_types::ContentAddress;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

/// Default IPFS HTTP API endpoint of a local node.
pub const DEFAULT_API_URL: &str = "http://localhost:5001";
/// Default read-only gateway of a local node.
pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:8080";

/// Client for the `/api/v0/add` endpoint of an IPFS node.
#[derive(Clone, Debug)]
pub struct HttpContentStore {
    client: reqwest::Client,
    api_url: String,
}

impl HttpContentStore {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
        }
    }

    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for HttpContentStore {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn put(&self, data: &[u8]) -> Result<ContentAddress> {
        let url = self.endpoint("api/v0/add");
        let form = Form::new().part("file", Part::bytes(data.to_vec()).file_name("upload"));

        debug!(url = %url, bytes = data.len(), "adding blob to content store");
        let response = self
            .client
            .post(url)
            .query(&[("pin", "true")])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(StoreError::Server {
                status: status.as_u16(),
                body,
            });
        }

        // A directory add streams one JSON object per line; the blob itself
        // is the last entry.
        let last = body
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| StoreError::MalformedResponse("empty body".to_string()))?;
        let added: AddResponse = serde_json::from_str(last)
            .map_err(|err| StoreError::MalformedResponse(err.to_string()))?;

        Ok(ContentAddress::new(added.hash)?)
    }
}

/// Public gateway URL for a stored blob.
pub fn gateway_url(gateway: &str, address: &ContentAddress) -> String {
    format!("{}/ipfs/{}", gateway.trim_end_matches('/'), address)
}
