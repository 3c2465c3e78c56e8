//! Application logic seam.
//!
//! The entry point knows nothing about what a skill actually computes.
//! It hands a [`Skill`] the reader and writer for the current invocation
//! and persists whatever cards come back.

use async_trait::async_trait;

use crate::cards::{DataEntry, MetadataCard};
use crate::error::{ErrorCode, SkillsError};
use crate::event::FileType;
use crate::reader::FilesReader;
use crate::writer::{SkillsWriter, Usage, UsageUnit};

/// What a skill produced for one file.
#[derive(Debug, Clone)]
pub enum SkillOutput {
    /// Cards to save with `success`. Usage defaults to one file.
    Cards {
        cards: Vec<MetadataCard>,
        usage: Option<Usage>,
    },
    /// The file is not something this skill handles. Reported as an
    /// error card but answered with 200, since retrying will not help.
    NotApplicable {
        code: ErrorCode,
        message: Option<String>,
    },
}

#[async_trait]
pub trait Skill: Send + Sync {
    fn name(&self) -> &str;

    /// Runs the skill against one file.
    ///
    /// Returned errors become an error card; a [`SkillsError`] anywhere
    /// in the chain picks the card's code, anything else is reported as
    /// `unknown_error`.
    async fn process(
        &self,
        reader: &FilesReader,
        writer: &SkillsWriter,
    ) -> anyhow::Result<SkillOutput>;
}

// ── Demo skill ───────────────────────────────────────────

/// Emits sample cards derived from the file metadata, plus a faces card
/// built from the preview rendition for images. Useful to check a
/// deployment end to end before wiring real analysis in.
pub struct DemoSkill {
    max_size_mb: f64,
}

impl DemoSkill {
    pub fn new(max_size_mb: f64) -> Self {
        Self { max_size_mb }
    }
}

impl Default for DemoSkill {
    fn default() -> Self {
        Self::new(100.0)
    }
}

#[async_trait]
impl Skill for DemoSkill {
    fn name(&self) -> &str {
        "demo"
    }

    async fn process(
        &self,
        reader: &FilesReader,
        writer: &SkillsWriter,
    ) -> anyhow::Result<SkillOutput> {
        if let Err(e @ SkillsError::InvalidFileSize { .. }) = reader.validate_size(self.max_size_mb) {
            return Ok(SkillOutput::NotApplicable {
                code: e.code(),
                message: None,
            });
        }

        let ctx = reader.file_context();
        let topics = name_keywords(&ctx.file_name)
            .into_iter()
            .map(DataEntry::text)
            .collect();
        let summary = format!(
            "{} is a {} file of {} bytes",
            ctx.file_name,
            ctx.file_type.as_str().to_lowercase(),
            ctx.file_size
        );

        let (duration, usage) = match ctx.file_type {
            // Without decoding the media, pretend it is one minute long
            FileType::Audio | FileType::Video => {
                (Some(60.0), Some(Usage::new(UsageUnit::Seconds, 60)))
            }
            _ => (None, None),
        };
        let transcript = match duration {
            Some(end) => DataEntry::text(summary).appearing(0.0, end),
            None => DataEntry::text(summary),
        };

        let mut cards = vec![
            writer.create_topics_card(topics, duration, None),
            writer.create_transcripts_card(vec![transcript], duration, None),
        ];
        if ctx.file_type == FileType::Image {
            // The 1024px rendition stands in for a detected face
            let preview = reader.basic_format_file_url().await?;
            cards.push(
                writer
                    .create_faces_card(vec![DataEntry::image(preview, &ctx.file_name)], None, None)
                    .await,
            );
        }
        Ok(SkillOutput::Cards { cards, usage })
    }
}

/// Lowercased words of a file name, extension excluded, deduplicated in
/// order of appearance.
fn name_keywords(file_name: &str) -> Vec<String> {
    let stem = file_name
        .rsplit_once('.')
        .map_or(file_name, |(stem, _)| stem);
    let mut words: Vec<String> = Vec::new();
    for word in stem
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
    {
        if !words.contains(&word) {
            words.push(word);
        }
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::Backoff;
    use crate::cards::CardType;
    use crate::event::tests::{context, event_json, API};
    use crate::event::FileContext;
    use crate::thumbnail::tests::png_bytes;
    use mockito::Matcher;
    use reqwest::Client;
    use serde_json::json;
    use std::time::Duration;

    fn pair(name: &str, size: u64) -> (FilesReader, SkillsWriter) {
        let ctx = context(name, size);
        let writer = SkillsWriter::new(&ctx, Client::new(), API, 45);
        let reader = FilesReader::from_context(
            ctx,
            Client::new(),
            API,
            Backoff::fixed(Duration::from_millis(10), 1),
        );
        (reader, writer)
    }

    #[test]
    fn test_name_keywords() {
        assert_eq!(
            name_keywords("Quarterly_Review-2024 quarterly.final.mp4"),
            vec!["quarterly", "review", "2024", "final"]
        );
        assert_eq!(name_keywords("README"), vec!["readme"]);
        assert!(name_keywords(".mp3").is_empty());
    }

    #[tokio::test]
    async fn test_demo_media_file() {
        let (reader, writer) = pair("team-sync.mp3", 2048);
        let output = DemoSkill::default().process(&reader, &writer).await.unwrap();

        let SkillOutput::Cards { cards, usage } = output else {
            panic!("expected cards");
        };
        assert_eq!(usage, Some(Usage::new(UsageUnit::Seconds, 60)));
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].skill_card_type, CardType::Keyword);
        let topics: Vec<_> = cards[0]
            .entries
            .as_ref()
            .unwrap()
            .iter()
            .map(|e| e.text.as_str())
            .collect();
        assert_eq!(topics, vec!["team", "sync"]);
        assert_eq!(cards[1].skill_card_type, CardType::Transcript);
        assert_eq!(cards[1].duration, Some(60.0));
    }

    #[tokio::test]
    async fn test_demo_document_uses_default_usage() {
        let (reader, writer) = pair("notes.pdf", 10);
        let output = DemoSkill::default().process(&reader, &writer).await.unwrap();
        let SkillOutput::Cards { cards, usage } = output else {
            panic!("expected cards");
        };
        assert!(usage.is_none());
        assert!(cards[1].duration.is_none());
        assert_eq!(
            cards[1].entries.as_ref().unwrap()[0].text,
            "notes.pdf is a document file of 10 bytes"
        );
    }

    #[tokio::test]
    async fn test_demo_image_adds_faces_card() {
        let mut server = mockito::Server::new_async().await;
        let template = format!("{}/reps/jpg/{{+asset_path}}", server.url());
        server
            .mock("GET", "/files/file-123")
            .match_query(Matcher::Any)
            .match_header("x-rep-hints", "[jpg?dimensions=1024x1024]")
            .with_status(200)
            .with_body(
                json!({"representations": {"entries": [{
                    "representation": "jpg",
                    "status": {"state": "success"},
                    "content": {"url_template": template}
                }]}})
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("GET", "/reps/jpg/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(png_bytes(100, 80))
            .create_async()
            .await;

        let ctx = FileContext::from_value(event_json("group photo.png", 512), &server.url()).unwrap();
        let writer = SkillsWriter::new(&ctx, Client::new(), &server.url(), 45);
        let reader = FilesReader::from_context(
            ctx,
            Client::new(),
            &server.url(),
            Backoff::fixed(Duration::from_millis(10), 1),
        );

        let output = DemoSkill::default().process(&reader, &writer).await.unwrap();
        let SkillOutput::Cards { cards, .. } = output else {
            panic!("expected cards");
        };
        assert_eq!(cards.len(), 3);
        assert_eq!(cards[2].skill_card_type, CardType::Timeline);
        let face = &cards[2].entries.as_ref().unwrap()[0];
        assert_eq!(face.text, "group photo.png");
        assert!(face
            .image_url
            .as_deref()
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_demo_too_large_is_not_applicable() {
        let (reader, writer) = pair("huge.mov", 3 * 1_048_576);
        let output = DemoSkill::new(2.0).process(&reader, &writer).await.unwrap();
        assert!(matches!(
            output,
            SkillOutput::NotApplicable {
                code: ErrorCode::InvalidFileSize,
                message: None
            }
        ));
    }
}
