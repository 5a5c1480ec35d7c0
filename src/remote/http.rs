//! HTTP remote store.
//!
//! Talks to a document service exposing one resource per user:
//!
//! - `GET    {base}/bundles/{user}` reads the bundle (404 means none)
//! - `PATCH  {base}/bundles/{user}` merges top-level fields
//! - `DELETE {base}/bundles/{user}` removes it

use reqwest::{StatusCode, Url};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::RemoteBundle;

use super::store::RemoteStore;

/// Remote store backed by a JSON document service.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: Option<String>,
    token: Option<String>,
}

impl HttpRemoteStore {
    /// Create a store for the given base URL.
    ///
    /// With no base URL every call fails with a configuration error, so
    /// capture keeps working offline and sync reports why it cannot run.
    #[must_use]
    pub fn new(base_url: Option<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.filter(|u| !u.trim().is_empty()),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    fn bundle_url(&self, user: &str) -> Result<Url> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| Error::Config("remote_url is not configured".to_string()))?;
        let mut url = Url::parse(base)
            .map_err(|e| Error::Config(format!("invalid remote_url '{base}': {e}")))?;
        url.path_segments_mut()
            .map_err(|()| Error::Config(format!("remote_url cannot be a base: '{base}'")))?
            .pop_if_empty()
            .push("bundles")
            .push(user);
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.header("Authorization", format!("Bearer {token}")),
            None => builder,
        }
    }
}

/// Turn a non-success response into a transport error carrying the body.
async fn error_for_status(response: reqwest::Response, op: &str) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Error::Transport(format!("{op} failed with {status}: {body}"))
}

impl RemoteStore for HttpRemoteStore {
    async fn get_bundle(&self, user: &str) -> Result<Option<RemoteBundle>> {
        let url = self.bundle_url(user)?;
        debug!(%url, "Fetching remote bundle");

        let response = self.request(reqwest::Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_for_status(response, "get bundle").await);
        }

        let bundle: RemoteBundle = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("failed to parse remote bundle: {e}")))?;
        Ok(Some(bundle))
    }

    async fn merge_write_bundle(&self, user: &str, bundle: &RemoteBundle) -> Result<()> {
        let url = self.bundle_url(user)?;
        let fields = bundle.to_fields()?;
        debug!(%url, records = bundle.records.len(), "Merge-writing remote bundle");

        let response = self
            .request(reqwest::Method::PATCH, url)
            .json(&fields)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_for_status(response, "merge-write bundle").await);
        }
        Ok(())
    }

    async fn delete_bundle(&self, user: &str) -> Result<()> {
        let url = self.bundle_url(user)?;
        debug!(%url, "Deleting remote bundle");

        let response = self.request(reqwest::Method::DELETE, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND || response.status().is_success() {
            return Ok(());
        }
        Err(error_for_status(response, "delete bundle").await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_url_escapes_user() {
        let store = HttpRemoteStore::new(Some("https://sync.example.com/api/".into()), None);
        let url = store.bundle_url("ana maría/x").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sync.example.com/api/bundles/ana%20mar%C3%ADa%2Fx"
        );
    }

    #[test]
    fn test_bundle_url_without_trailing_slash() {
        let store = HttpRemoteStore::new(Some("http://localhost:8080".into()), None);
        let url = store.bundle_url("alice").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/bundles/alice");
    }

    #[tokio::test]
    async fn test_unconfigured_store_reports_config_error() {
        let store = HttpRemoteStore::new(Some("  ".into()), None);
        assert!(matches!(
            store.get_bundle("alice").await,
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let store = HttpRemoteStore::new(Some("not a url".into()), None);
        assert!(matches!(store.bundle_url("a"), Err(Error::Config(_))));
    }
}
