//! Metadata cards shown in the platform's file preview.
//!
//! Every card type goes through [`CardFactory::create_metadata_card`];
//! the topic/transcript helpers only fix the card type and default title
//! and normalize the entry list first.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    Transcript,
    /// Topics.
    Keyword,
    /// Faces.
    Timeline,
    Status,
    Error,
}

impl CardType {
    pub fn default_title(&self) -> &'static str {
        match self {
            CardType::Transcript => "Transcript",
            CardType::Keyword => "Topics",
            CardType::Timeline => "Faces",
            CardType::Status => "Status",
            CardType::Error => "Error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardTitle {
    pub code: String,
    pub message: String,
}

impl CardTitle {
    /// `"Key Phrases"` → code `skills_key_phrases`
    pub fn new(title: &str) -> Self {
        Self {
            code: format!("skills_{}", title.to_lowercase().replace(' ', "_")),
            message: title.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CardStatus {
    pub fn new(code: &str, message: Option<&str>) -> Self {
        Self {
            code: Some(code.to_string()),
            message: message.map(str::to_string),
        }
    }
}

/// `{type, id}` pair used for the skill and invocation references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataCard {
    pub created_at: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub skill_card_type: CardType,
    pub skill_card_title: CardTitle,
    pub skill: Reference,
    pub invocation: Reference,
    pub status: CardStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<CardEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// Time range (seconds) in which an entry appears in the media.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Appearance {
    pub start: f64,
    pub end: f64,
}

/// An entry as produced by application logic, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataEntry {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appears: Option<Vec<Appearance>>,
}

impl DataEntry {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn image(image_url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_url: Some(image_url.into()),
            appears: None,
        }
    }

    pub fn appearing(mut self, start: f64, end: f64) -> Self {
        self.appears
            .get_or_insert_with(Vec::new)
            .push(Appearance { start, end });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Image,
    Text,
}

/// A normalized card entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardEntry {
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appears: Option<Vec<Appearance>>,
}

/// Drops entries whose text is blank, trims the rest and tags each one
/// `image` or `text` depending on whether it carries an image URL.
pub fn process_data_list(entries: Vec<DataEntry>) -> Vec<CardEntry> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let text = entry.text.trim();
            if text.is_empty() {
                return None;
            }
            let image_url = entry.image_url.filter(|url| !url.trim().is_empty());
            Some(CardEntry {
                entry_type: if image_url.is_some() {
                    EntryType::Image
                } else {
                    EntryType::Text
                },
                text: text.to_string(),
                image_url,
                appears: entry.appears,
            })
        })
        .collect()
}

/// Builds cards stamped with one invocation's skill and request ids.
#[derive(Debug, Clone)]
pub struct CardFactory {
    skill_id: String,
    request_id: String,
}

impl CardFactory {
    pub fn new(skill_id: &str, request_id: &str) -> Self {
        Self {
            skill_id: skill_id.to_string(),
            request_id: request_id.to_string(),
        }
    }

    pub fn create_metadata_card(
        &self,
        card_type: CardType,
        title: &str,
        status: CardStatus,
        entries: Option<Vec<CardEntry>>,
        duration: Option<f64>,
    ) -> MetadataCard {
        MetadataCard {
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            kind: "skill_card".to_string(),
            skill_card_type: card_type,
            skill_card_title: CardTitle::new(title),
            skill: Reference {
                kind: "service".to_string(),
                id: self.skill_id.clone(),
            },
            invocation: Reference {
                kind: "skill_invocation".to_string(),
                id: self.request_id.clone(),
            },
            status,
            entries,
            duration,
        }
    }

    pub fn create_topics_card(
        &self,
        topics: Vec<DataEntry>,
        duration: Option<f64>,
        title: Option<&str>,
    ) -> MetadataCard {
        self.create_data_card(CardType::Keyword, process_data_list(topics), duration, title)
    }

    pub fn create_transcripts_card(
        &self,
        transcripts: Vec<DataEntry>,
        duration: Option<f64>,
        title: Option<&str>,
    ) -> MetadataCard {
        self.create_data_card(
            CardType::Transcript,
            process_data_list(transcripts),
            duration,
            title,
        )
    }

    /// Card around entries that are already normalized.
    pub(crate) fn create_data_card(
        &self,
        card_type: CardType,
        entries: Vec<CardEntry>,
        duration: Option<f64>,
        title: Option<&str>,
    ) -> MetadataCard {
        self.create_metadata_card(
            card_type,
            title.unwrap_or(card_type.default_title()),
            CardStatus::default(),
            Some(entries),
            duration,
        )
    }
}
