//! Write side of a skill invocation: cards, status and usage.
//!
//! Each save call replaces whatever status or error card the platform
//! was showing for the file version. Cards passed together in one call
//! all show up together.

use std::fmt;
use std::str::FromStr;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::api::PlatformClient;
use crate::cards::{
    process_data_list, CardEntry, CardFactory, CardStatus, CardType, DataEntry, MetadataCard,
};
use crate::error::{ErrorCode, SkillsError};
use crate::event::FileContext;
use crate::thumbnail::inline_thumbnails;

const PENDING_STATUS_CODE: &str = "skills_pending_status";
const PENDING_STATUS_MESSAGE: &str = "We're preparing to process your file. Please hold on!";

// ── Invocation status ────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    Invoked,
    Processing,
    Pending,
    TransientFailure,
    PermanentFailure,
    Success,
}

impl InvocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationStatus::Invoked => "invoked",
            InvocationStatus::Processing => "processing",
            InvocationStatus::Pending => "pending",
            InvocationStatus::TransientFailure => "transient_failure",
            InvocationStatus::PermanentFailure => "permanent_failure",
            InvocationStatus::Success => "success",
        }
    }

    /// Lenient parse for data-card saves: anything unrecognized is `success`.
    pub fn parse_or_success(status: &str) -> Self {
        status.parse().unwrap_or(InvocationStatus::Success)
    }
}

impl FromStr for InvocationStatus {
    type Err = SkillsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invoked" => Ok(InvocationStatus::Invoked),
            "processing" => Ok(InvocationStatus::Processing),
            "pending" => Ok(InvocationStatus::Pending),
            "transient_failure" => Ok(InvocationStatus::TransientFailure),
            "permanent_failure" => Ok(InvocationStatus::PermanentFailure),
            "success" => Ok(InvocationStatus::Success),
            other => Err(SkillsError::InvalidEvent(format!(
                "unknown invocation status '{other}'"
            ))),
        }
    }
}

impl fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Usage ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageUnit {
    Files,
    Seconds,
    Pages,
    Words,
}

/// What an invocation consumed, for billing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub unit: UsageUnit,
    pub value: u64,
}

impl Default for Usage {
    /// One file.
    fn default() -> Self {
        Self {
            unit: UsageUnit::Files,
            value: 1,
        }
    }
}

impl Usage {
    pub fn new(unit: UsageUnit, value: u64) -> Self {
        Self { unit, value }
    }

    /// Lenient parse of an untyped usage record: an unknown unit or a
    /// non-integer value yields the one-file default.
    pub fn from_value_or_default(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

// ── Request body ─────────────────────────────────────────

#[derive(Debug, Serialize)]
struct InvocationUpdate<'a> {
    status: InvocationStatus,
    file: FileRef<'a>,
    metadata: CardsMetadata<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<Usage>,
}

#[derive(Debug, Serialize)]
struct FileRef<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    id: &'a str,
}

#[derive(Debug, Serialize)]
struct CardsMetadata<'a> {
    cards: &'a [MetadataCard],
}

// ── SkillsWriter ─────────────────────────────────────────

pub struct SkillsWriter {
    cards: CardFactory,
    client: PlatformClient,
    skill_id: String,
    file_id: String,
    thumbnail_size: u32,
}

impl SkillsWriter {
    /// Binds a write client to the context's write token.
    pub fn new(context: &FileContext, http: Client, api_base: &str, thumbnail_size: u32) -> Self {
        Self {
            cards: CardFactory::new(&context.skill_id, &context.request_id),
            client: PlatformClient::new(http, api_base, &context.file_write_token),
            skill_id: context.skill_id.clone(),
            file_id: context.file_id.clone(),
            thumbnail_size,
        }
    }

    pub fn card_factory(&self) -> &CardFactory {
        &self.cards
    }

    // ── Card construction ────────────────────────────────

    pub fn create_metadata_card(
        &self,
        card_type: CardType,
        title: &str,
        status: CardStatus,
        entries: Option<Vec<CardEntry>>,
        duration: Option<f64>,
    ) -> MetadataCard {
        self.cards
            .create_metadata_card(card_type, title, status, entries, duration)
    }

    pub fn create_topics_card(
        &self,
        topics: Vec<DataEntry>,
        duration: Option<f64>,
        title: Option<&str>,
    ) -> MetadataCard {
        self.cards.create_topics_card(topics, duration, title)
    }

    pub fn create_transcripts_card(
        &self,
        transcripts: Vec<DataEntry>,
        duration: Option<f64>,
        title: Option<&str>,
    ) -> MetadataCard {
        self.cards.create_transcripts_card(transcripts, duration, title)
    }

    /// Faces card with every image inlined as a small thumbnail. Images
    /// that cannot be fetched keep their original URL.
    pub async fn create_faces_card(
        &self,
        faces: Vec<DataEntry>,
        duration: Option<f64>,
        title: Option<&str>,
    ) -> MetadataCard {
        let entries = inline_thumbnails(
            self.client.http(),
            process_data_list(faces),
            self.thumbnail_size,
        )
        .await;
        self.cards
            .create_data_card(CardType::Timeline, entries, duration, title)
    }

    // ── Saving ───────────────────────────────────────────

    /// Shows a "preparing to process" status card.
    pub async fn save_processing_card(&self) -> Result<(), SkillsError> {
        let card = self.cards.create_metadata_card(
            CardType::Status,
            CardType::Status.default_title(),
            CardStatus::new(PENDING_STATUS_CODE, Some(PENDING_STATUS_MESSAGE)),
            None,
            None,
        );
        self.save_data_cards(vec![card], Some(InvocationStatus::Processing), None)
            .await
    }

    /// Shows an error card.
    ///
    /// A custom message turns the code into `custom_error`. The invocation
    /// is marked `transient_failure` only when asked for, otherwise
    /// `permanent_failure`.
    pub async fn save_error_card(
        &self,
        error: impl Into<ErrorCode>,
        custom_message: Option<&str>,
        failure_type: Option<InvocationStatus>,
    ) -> Result<(), SkillsError> {
        let card = self.error_card(error.into(), custom_message);
        let status = match failure_type {
            Some(InvocationStatus::TransientFailure) => InvocationStatus::TransientFailure,
            _ => InvocationStatus::PermanentFailure,
        };
        self.save_data_cards(vec![card], Some(status), None).await
    }

    fn error_card(&self, code: ErrorCode, custom_message: Option<&str>) -> MetadataCard {
        let status = match custom_message {
            Some(message) => CardStatus::new(ErrorCode::Custom.as_str(), Some(message)),
            None => CardStatus::new(code.as_str(), Some(code.default_message())),
        };
        self.cards.create_metadata_card(
            CardType::Error,
            CardType::Error.default_title(),
            status,
            None,
            None,
        )
    }

    /// Submits `cards` with `status` (default `success`). Usage is only
    /// sent with `success` and defaults to one file.
    pub async fn save_data_cards(
        &self,
        cards: Vec<MetadataCard>,
        status: Option<InvocationStatus>,
        usage: Option<Usage>,
    ) -> Result<(), SkillsError> {
        let status = status.unwrap_or(InvocationStatus::Success);
        let usage = (status == InvocationStatus::Success).then(|| usage.unwrap_or_default());

        let body = InvocationUpdate {
            status,
            file: FileRef {
                kind: "file",
                id: &self.file_id,
            },
            metadata: CardsMetadata { cards: &cards },
            usage,
        };

        self.client
            .put_skill_invocation(&self.skill_id, &body)
            .await?;
        info!(
            "Saved {} card(s) for file {} with status {status}",
            cards.len(),
            self.file_id
        );
        Ok(())
    }
}
