use crate::retry::RetryPolicy;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("HTTP {status} from {url}")]
    Status { status: StatusCode, url: String },
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("invalid response body: {0}")]
    Decode(#[source] reqwest::Error),
}

impl HttpError {
    /// Upstream failures (status >= 400, connection errors, timeouts) are worth
    /// another attempt; a body we cannot parse is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::Status { status, .. } => status.as_u16() >= 400,
            HttpError::Transport(_) => true,
            HttpError::Decode(_) => false,
        }
    }
}

pub fn build_client() -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    Ok(client)
}

pub async fn send_checked(request: RequestBuilder) -> Result<Response, HttpError> {
    let response = request.send().await.map_err(HttpError::Transport)?;
    let status = response.status();
    if status.as_u16() >= 400 {
        return Err(HttpError::Status {
            status,
            url: response.url().to_string(),
        });
    }
    Ok(response)
}

/// Sends the request built by `build` under `policy`, decoding a JSON body.
pub async fn fetch_json<T, F>(policy: &RetryPolicy, label: &str, build: F) -> Result<T, HttpError>
where
    T: DeserializeOwned,
    F: Fn() -> RequestBuilder,
{
    let build = &build;
    policy
        .run(
            label,
            move || async move {
                let response = send_checked(build()).await?;
                response.json::<T>().await.map_err(HttpError::Decode)
            },
            HttpError::is_retryable,
        )
        .await
}

/// Like [`fetch_json`] but discards the body.
pub async fn send_with_retry<F>(policy: &RetryPolicy, label: &str, build: F) -> Result<(), HttpError>
where
    F: Fn() -> RequestBuilder,
{
    let build = &build;
    policy
        .run(
            label,
            move || async move {
                send_checked(build()).await?;
                Ok(())
            },
            HttpError::is_retryable,
        )
        .await
}
