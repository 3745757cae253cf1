use crate::http::{self, HttpError};
use crate::metadata::{MetadataApi, TokenResponse};
use crate::retry::RetryPolicy;
use alloy_primitives::U256;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

pub const DEFAULT_API_URL: &str = "https://api.poap.xyz";
const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Deserialize)]
struct AliasResponse {
    ens: Option<String>,
}

/// HTTP client for the POAP REST API.
pub struct PoapApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl PoapApiClient {
    pub fn new(base_url: &str, api_key: Option<String>, retry: RetryPolicy) -> anyhow::Result<Self> {
        Ok(Self {
            http: http::build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            retry,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.http.get(url);
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, HttpError> {
        let url = self.url(path);
        http::fetch_json(&self.retry, &url, || self.get(&url)).await
    }
}

#[async_trait]
impl MetadataApi for PoapApiClient {
    async fn token(&self, token_id: U256) -> Result<TokenResponse, HttpError> {
        self.get_json(&format!("token/{token_id}")).await
    }

    async fn scan_count(&self, address: &str) -> Result<u64, HttpError> {
        let holdings: Value = self.get_json(&format!("actions/scan/{address}")).await?;
        Ok(count_holdings(&holdings))
    }

    async fn alias(&self, address: &str) -> Result<Option<String>, HttpError> {
        let response: AliasResponse = self
            .get_json(&format!("actions/ens_lookup/{address}"))
            .await?;
        Ok(response.ens)
    }
}

fn count_holdings(holdings: &Value) -> u64 {
    holdings.as_array().map_or(0, |tokens| tokens.len() as u64)
}
