//! Thin client for the platform REST calls the kit needs.
//!
//! One `PlatformClient` is bound to one access token: the reader gets a
//! client holding the file read token, the writer one holding the write
//! token. The underlying `reqwest::Client` is shared and cheap to clone.

use std::time::Duration;

use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::Serialize;
use tracing::debug;

use crate::error::SkillsError;
use crate::representation::{RepresentationEntry, RepresentationsResponse};

/// HTTP connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// User-Agent header sent with requests.
const USER_AGENT: &str = concat!("box-skills-kit/", env!("CARGO_PKG_VERSION"));

/// Builds the shared HTTP client. `timeout` bounds each single request.
pub fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

#[derive(Clone)]
pub struct PlatformClient {
    http: Client,
    api_base: String,
    token: String,
}

impl PlatformClient {
    pub fn new(http: Client, api_base: &str, token: &str) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// `GET /files/{id}/content`, returned unread so callers can stream it.
    pub async fn get_file_content(&self, file_id: &str) -> Result<Response, SkillsError> {
        let url = format!("{}/files/{file_id}/content", self.api_base);
        self.get(&url).await
    }

    /// `GET /files/{id}?fields=representations` with an `x-rep-hints` header.
    pub async fn get_representations(
        &self,
        file_id: &str,
        hint: &str,
    ) -> Result<Vec<RepresentationEntry>, SkillsError> {
        let url = format!("{}/files/{file_id}", self.api_base);
        debug!("Querying representation {hint} of file {file_id}");

        let response = self
            .http
            .get(&url)
            .query(&[("fields", "representations")])
            .bearer_auth(&self.token)
            .header("x-rep-hints", hint)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let body: RepresentationsResponse = response.json().await?;
        Ok(body
            .representations
            .map(|r| r.entries)
            .unwrap_or_default())
    }

    /// Authenticated GET of an absolute URL (representation content).
    pub async fn get(&self, url: &str) -> Result<Response, SkillsError> {
        debug!("GET {url}");
        let response = self.http.get(url).bearer_auth(&self.token).send().await?;
        ensure_success(response).await
    }

    /// `PUT /skill_invocations/{skill_id}`
    pub async fn put_skill_invocation<T: Serialize>(
        &self,
        skill_id: &str,
        body: &T,
    ) -> Result<(), SkillsError> {
        let url = format!("{}/skill_invocations/{skill_id}", self.api_base);
        debug!("PUT {url}");

        let response = self
            .http
            .put(&url)
            .bearer_auth(&self.token)
            .header(CACHE_CONTROL, "no-cache")
            .header(CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

/// Turns a non-2xx response into `SkillsError::Api` with the body text.
async fn ensure_success(response: Response) -> Result<Response, SkillsError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SkillsError::Api {
        status: status.as_u16(),
        body,
    })
}
