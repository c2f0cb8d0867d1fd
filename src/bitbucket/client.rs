//! Bitbucket Cloud API client.

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::config::Credentials;
use crate::error::{ForkRequestError, ForkerError, Result};

/// Base URL of the Bitbucket Cloud REST API.
pub const DEFAULT_API_BASE: &str = "https://api.bitbucket.org/2.0";

/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Bitbucket API, authenticated with an app password.
#[derive(Clone)]
pub struct BitbucketClient {
    pub(crate) credentials: Credentials,
    pub(crate) base_url: Url,
    pub(crate) client: Client,
}

impl BitbucketClient {
    /// Create a client for Bitbucket Cloud with the default timeout.
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_base_url(credentials, DEFAULT_API_BASE, DEFAULT_TIMEOUT)
    }

    /// Create a client against a custom API base URL.
    pub fn with_base_url(
        credentials: Credentials,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| ForkerError::InvalidConfig(format!("API base URL {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ForkerError::InvalidConfig(format!(
                "API base URL {base_url} cannot carry a path"
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(Self::headers())
            .build()?;

        Ok(Self {
            credentials,
            base_url,
            client,
        })
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("repo-forker/", env!("CARGO_PKG_VERSION"))),
        );
        headers
    }

    /// Build an API URL from path segments, percent-encoding each one.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send an authenticated POST with a JSON body.
    ///
    /// Only transport failures are errors here; the caller interprets the status.
    pub(crate) fn post<B: Serialize>(
        &self,
        url: Url,
        body: &B,
    ) -> std::result::Result<Response, ForkRequestError> {
        let response = self
            .client
            .post(url)
            .basic_auth(
                &self.credentials.username,
                Some(self.credentials.app_password()),
            )
            .json(body)
            .send()?;
        Ok(response)
    }

    /// Get the account used to authenticate.
    pub fn username(&self) -> &str {
        &self.credentials.username
    }
}
