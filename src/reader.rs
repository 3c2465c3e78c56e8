//! Read side of a skill invocation: file context and file content.
//!
//! Content comes in two flavours. The *original* file is downloaded
//! as-is. The *basic format* is a platform-generated representation
//! that every skill can consume without format-specific decoding (mp3
//! for audio, mp4 for video, jpg for images, extracted text for
//! documents); it may need to be polled for until it is ready.

use base64::Engine;
use bytes::Bytes;
use futures::Stream;
use reqwest::{Client, Response};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::api::PlatformClient;
use crate::backoff::Backoff;
use crate::config::{PlatformConfig, RepresentationConfig};
use crate::error::SkillsError;
use crate::event::FileContext;
use crate::representation::{expand_url_template, hint_for, wait_until_ready};

pub struct FilesReader {
    context: FileContext,
    client: PlatformClient,
    backoff: Backoff,
}

impl FilesReader {
    /// Parses an event body and binds a read client to its read token.
    pub fn new(
        body: &str,
        http: Client,
        platform: &PlatformConfig,
        representation: &RepresentationConfig,
    ) -> Result<Self, SkillsError> {
        let context = FileContext::from_json(body, platform.api_base())?;
        let backoff = Backoff::fixed(
            representation.poll_interval(),
            representation.max_poll_attempts,
        );
        Ok(Self::from_context(context, http, platform.api_base(), backoff))
    }

    pub fn from_context(
        context: FileContext,
        http: Client,
        api_base: &str,
        backoff: Backoff,
    ) -> Self {
        let client = PlatformClient::new(http, api_base, &context.file_read_token);
        Self {
            context,
            client,
            backoff,
        }
    }

    /// Bounds representation polling by the invocation's deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.backoff = self.backoff.with_deadline(deadline);
        self
    }

    pub fn file_context(&self) -> &FileContext {
        &self.context
    }

    pub fn validate_format(&self, allowed: &[&str]) -> Result<bool, SkillsError> {
        self.context.validate_format(allowed)
    }

    pub fn validate_size(&self, max_mb: f64) -> Result<bool, SkillsError> {
        self.context.validate_size(max_mb)
    }

    // ── Original file ────────────────────────────────────

    pub async fn content(&self) -> Result<Bytes, SkillsError> {
        let response = self.original_response().await?;
        Ok(response.bytes().await?)
    }

    pub async fn content_base64(&self) -> Result<String, SkillsError> {
        let data = self.content().await?;
        Ok(base64::engine::general_purpose::STANDARD.encode(&data))
    }

    pub async fn content_stream(
        &self,
    ) -> Result<impl Stream<Item = reqwest::Result<Bytes>>, SkillsError> {
        let response = self.original_response().await?;
        Ok(response.bytes_stream())
    }

    async fn original_response(&self) -> Result<Response, SkillsError> {
        debug!("Downloading file {}", self.context.file_id);
        self.client
            .get_file_content(&self.context.file_id)
            .await
            .map_err(content_error)
    }

    // ── Basic format (representation) ────────────────────

    /// Waits for the basic-format representation and returns a URL to it
    /// that carries the read token.
    pub async fn basic_format_file_url(&self) -> Result<String, SkillsError> {
        let hint = hint_for(self.context.file_type);
        info!(
            "Resolving {hint} representation of {} ({})",
            self.context.file_name, self.context.file_type
        );
        let template =
            wait_until_ready(&self.client, &self.context.file_id, hint, self.backoff.clone())
                .await?;
        expand_url_template(&template, &self.context.file_read_token)
    }

    pub async fn basic_format_content(&self) -> Result<Bytes, SkillsError> {
        let response = self.basic_format_response().await?;
        Ok(response.bytes().await?)
    }

    pub async fn basic_format_content_base64(&self) -> Result<String, SkillsError> {
        let data = self.basic_format_content().await?;
        Ok(base64::engine::general_purpose::STANDARD.encode(&data))
    }

    pub async fn basic_format_content_stream(
        &self,
    ) -> Result<impl Stream<Item = reqwest::Result<Bytes>>, SkillsError> {
        let response = self.basic_format_response().await?;
        Ok(response.bytes_stream())
    }

    async fn basic_format_response(&self) -> Result<Response, SkillsError> {
        let url = self.basic_format_file_url().await?;
        self.client.get(&url).await.map_err(content_error)
    }
}

/// 401 is an authorization problem; every other failure to fetch
/// content is a processing error.
fn content_error(err: SkillsError) -> SkillsError {
    match err {
        SkillsError::Api { status: 401, body } => SkillsError::ExternalAuth(body),
        SkillsError::Api { status, body } => {
            SkillsError::FileProcessing(format!("content request failed ({status}): {body}"))
        }
        SkillsError::Http(e) => SkillsError::FileProcessing(format!("content request failed: {e}")),
        other => other,
    }
}
