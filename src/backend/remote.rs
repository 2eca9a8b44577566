use crate::backend::error::{BackendError, BackendResult};
use crate::backend::timeout::{with_timeout, DEFAULT_TIMEOUT};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// HTTP client shared by the remote adapters. Every request is bounded by
/// the configured deadline.
#[derive(Clone, Debug)]
pub struct RemoteClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for RemoteClient {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl RemoteClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// GET `url` with `params` and decode the JSON body
    pub async fn get_json<T>(&self, url: &str, params: &[(&str, String)]) -> BackendResult<T>
    where
        T: DeserializeOwned,
    {
        debug!(url, ?params, "GET");
        let request = self.client.get(url).query(params);
        with_timeout(self.timeout, async move {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(BackendError::Http {
                    status: status.as_u16(),
                    body,
                });
            }
            let bytes = response.bytes().await?;
            Ok(serde_json::from_slice(&bytes)?)
        })
        .await
    }
}
