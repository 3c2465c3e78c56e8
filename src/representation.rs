//! Representation readiness polling.
//!
//! The platform renders representations (transcoded media, extracted
//! text, downscaled images) asynchronously. A representation moves
//! through `none`/`pending` until it becomes `viewable`/`success`, or
//! fails with `error`. [`wait_until_ready`] re-queries on a fixed delay
//! until one of those terminal states, or until its [`Backoff`] runs out.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::api::PlatformClient;
use crate::backoff::Backoff;
use crate::error::SkillsError;
use crate::event::FileType;

/// Placeholder the platform leaves in content URL templates.
const ASSET_PATH_PLACEHOLDER: &str = "{+asset_path}";

/// Representation requested for each file type.
pub fn hint_for(file_type: FileType) -> &'static str {
    match file_type {
        FileType::Audio => "[mp3]",
        FileType::Video => "[mp4]",
        FileType::Image => "[jpg?dimensions=1024x1024]",
        FileType::Document => "[extracted_text]",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum RepresentationState {
    None,
    Pending,
    Viewable,
    Success,
    Error,
    /// Anything the platform is not documented to send.
    Unknown(String),
}

impl From<String> for RepresentationState {
    fn from(state: String) -> Self {
        match state.as_str() {
            "none" => RepresentationState::None,
            "pending" => RepresentationState::Pending,
            "viewable" => RepresentationState::Viewable,
            "success" => RepresentationState::Success,
            "error" => RepresentationState::Error,
            _ => RepresentationState::Unknown(state),
        }
    }
}

impl Default for RepresentationState {
    fn default() -> Self {
        RepresentationState::Unknown(String::new())
    }
}

// ── Wire types ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct RepresentationsResponse {
    pub representations: Option<RepresentationList>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RepresentationList {
    #[serde(default)]
    pub entries: Vec<RepresentationEntry>,
}

/// One entry of a file's `representations` field.
#[derive(Debug, Clone, Deserialize)]
pub struct RepresentationEntry {
    pub representation: Option<String>,
    #[serde(default)]
    pub status: RepresentationStatus,
    pub content: Option<RepresentationContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepresentationStatus {
    #[serde(default)]
    pub state: RepresentationState,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepresentationContent {
    pub url_template: String,
}

impl RepresentationEntry {
    pub fn state(&self) -> &RepresentationState {
        &self.status.state
    }

    pub fn url_template(&self) -> Option<&str> {
        self.content.as_ref().map(|c| c.url_template.as_str())
    }
}

// ── Source abstraction ───────────────────────────────────

/// Anything that can report the current state of a file representation.
#[async_trait]
pub trait RepresentationSource: Send + Sync {
    async fn representation_info(
        &self,
        file_id: &str,
        hint: &str,
    ) -> Result<RepresentationEntry, SkillsError>;
}

#[async_trait]
impl RepresentationSource for PlatformClient {
    async fn representation_info(
        &self,
        file_id: &str,
        hint: &str,
    ) -> Result<RepresentationEntry, SkillsError> {
        self.get_representations(file_id, hint)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                SkillsError::FileProcessing(format!("no {hint} representation for file {file_id}"))
            })
    }
}

// ── Polling ──────────────────────────────────────────────

/// Polls until the representation is ready and returns its URL template.
///
/// `none`/`pending` sleep for the backoff delay and query again.
/// `error`, any unknown state, or an exhausted backoff fail with
/// `SkillsError::FileProcessing`.
pub async fn wait_until_ready<S: RepresentationSource + ?Sized>(
    source: &S,
    file_id: &str,
    hint: &str,
    mut backoff: Backoff,
) -> Result<String, SkillsError> {
    loop {
        let entry = source.representation_info(file_id, hint).await?;

        match entry.state() {
            RepresentationState::Viewable | RepresentationState::Success => {
                return entry.url_template().map(str::to_string).ok_or_else(|| {
                    SkillsError::FileProcessing(format!(
                        "{hint} representation of file {file_id} is ready but has no content URL"
                    ))
                });
            }
            RepresentationState::None | RepresentationState::Pending => {
                let Some(delay) = backoff.next_delay() else {
                    return Err(SkillsError::FileProcessing(format!(
                        "{hint} representation of file {file_id} not ready after {} retries",
                        backoff.attempt
                    )));
                };
                debug!(
                    "Representation {hint} of file {file_id} not ready, retry {} in {}ms",
                    backoff.attempt,
                    delay.as_millis()
                );
                sleep(delay).await;
            }
            RepresentationState::Error => {
                return Err(SkillsError::FileProcessing(format!(
                    "platform failed to generate {hint} representation of file {file_id}"
                )));
            }
            RepresentationState::Unknown(state) => {
                warn!("Unexpected representation state '{state}' for file {file_id}");
                return Err(SkillsError::FileProcessing(format!(
                    "unexpected representation state '{state}'"
                )));
            }
        }
    }
}

/// Expands `{+asset_path}` to nothing and appends the access token.
pub fn expand_url_template(template: &str, access_token: &str) -> Result<String, SkillsError> {
    let expanded = template.replace(ASSET_PATH_PLACEHOLDER, "");
    let mut url = Url::parse(&expanded).map_err(|e| {
        SkillsError::FileProcessing(format!("invalid representation URL '{expanded}': {e}"))
    })?;
    url.query_pairs_mut().append_pair("access_token", access_token);
    Ok(url.to_string())
}
