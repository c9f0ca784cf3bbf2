//! Object storage over HTTP

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Response};
use tracing::debug;

use super::{validate_relative_path, FileStore};
use crate::error::StoreError;

/// A bucket addressed as `{base_url}/{path}`
///
/// Objects are written with `PUT` and `content-type: text/plain` and read
/// with `GET`. An optional bearer token authorizes both.
#[derive(Debug, Clone)]
pub struct HttpBucketStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBucketStore {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Connection(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> Result<String, StoreError> {
        validate_relative_path(path)?;
        Ok(format!("{}/{}", self.base_url, path))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::from_status(status.as_u16(), body))
    }
}

#[async_trait]
impl FileStore for HttpBucketStore {
    fn describe(&self) -> String {
        self.base_url.clone()
    }

    async fn put(&self, path: &str, content: &[u8]) -> Result<(), StoreError> {
        let url = self.url(path)?;
        let request = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, "text/plain")
            .body(content.to_vec());
        let response = self.authorize(request).send().await?;
        Self::check(response).await?;
        debug!(url = %url, bytes = content.len(), "Uploaded object");
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let url = self.url(path)?;
        let response = self.authorize(self.client.get(&url)).send().await?;
        let response = Self::check(response).await?;
        let bytes = response.bytes().await?;
        debug!(url = %url, bytes = bytes.len(), "Downloaded object");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_base_and_path() {
        let store = HttpBucketStore::new("https://backup.example.com/accumulation/", None, Duration::from_secs(5)).unwrap();
        assert_eq!(
            store.url("ANTHEM/ANTHEM_20250101").unwrap(),
            "https://backup.example.com/accumulation/ANTHEM/ANTHEM_20250101"
        );
        assert!(store.url("../other-bucket").is_err());
    }
}
