//! Skill invocation events and the file context derived from them.
//!
//! The platform posts one event per uploaded file version. Everything a
//! skill needs to know about that file (ids, tokens, name, size, and the
//! derived format/type) is captured once into an immutable [`FileContext`].

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::SkillsError;

/// Bytes per megabyte, as the platform counts them.
pub const MB_INTO_BYTES: u64 = 1_048_576;

const AUDIO_FORMATS: &[&str] = &[
    "aac", "aif", "aifc", "aiff", "amr", "au", "flac", "m4a", "mp3", "ra", "wav", "wma",
];

const IMAGE_FORMATS: &[&str] = &[
    "ai", "bmp", "gif", "eps", "heic", "jpeg", "jpg", "png", "ps", "psd", "svg", "tif", "tiff",
    "dcm", "dicm", "dicom", "svs", "tga",
];

const VIDEO_FORMATS: &[&str] = &[
    "3g2", "3gp", "avi", "flv", "m2v", "m2ts", "m4v", "mkv", "mov", "mp4", "mpeg", "mpg", "ogg",
    "mts", "qt", "ts", "wmv",
];

/// Coarse file classification derived from the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileType {
    Audio,
    Video,
    Image,
    Document,
}

impl FileType {
    /// Audio is checked first, then image, then video. Anything else
    /// (including an empty format) is a document.
    pub fn from_format(format: &str) -> Self {
        let format = format.to_ascii_lowercase();
        let format = format.as_str();
        if AUDIO_FORMATS.contains(&format) {
            FileType::Audio
        } else if IMAGE_FORMATS.contains(&format) {
            FileType::Image
        } else if VIDEO_FORMATS.contains(&format) {
            FileType::Video
        } else {
            FileType::Document
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Audio => "AUDIO",
            FileType::Video => "VIDEO",
            FileType::Image => "IMAGE",
            FileType::Document => "DOCUMENT",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase extension without the leading dot, or `""`.
pub fn file_format(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

// ── Wire format ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    id: Option<String>,
    skill: Option<RawSkill>,
    source: Option<RawSource>,
    token: Option<RawTokens>,
}

#[derive(Debug, Deserialize)]
struct RawSkill {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    id: Option<String>,
    name: Option<String>,
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawTokens {
    read: Option<RawToken>,
    write: Option<RawToken>,
}

#[derive(Debug, Deserialize)]
struct RawToken {
    access_token: Option<String>,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, SkillsError> {
    value.ok_or_else(|| SkillsError::InvalidEvent(format!("missing {field}")))
}

// ── FileContext ──────────────────────────────────────────

/// Everything known about the file an invocation was triggered for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileContext {
    pub request_id: String,
    pub skill_id: String,
    pub file_id: String,
    pub file_name: String,
    /// Size in bytes.
    pub file_size: u64,
    pub file_format: String,
    pub file_type: FileType,
    pub file_read_token: String,
    pub file_write_token: String,
    pub file_download_url: String,
}

impl FileContext {
    /// Parses a serialized event body.
    pub fn from_json(body: &str, api_base: &str) -> Result<Self, SkillsError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| SkillsError::InvalidEvent(format!("body is not JSON: {e}")))?;
        Self::from_value(value, api_base)
    }

    /// Builds the context from an already-parsed event.
    pub fn from_value(value: Value, api_base: &str) -> Result<Self, SkillsError> {
        let raw: RawEvent = serde_json::from_value(value)
            .map_err(|e| SkillsError::InvalidEvent(e.to_string()))?;

        let skill = required(raw.skill, "skill")?;
        let source = required(raw.source, "source")?;
        let token = required(raw.token, "token")?;

        let skill_id = required(skill.id, "skill.id")?;
        let file_id = required(source.id, "source.id")?;
        let file_name = required(source.name, "source.name")?;
        let file_size = required(source.size, "source.size")?;
        let file_read_token = required(
            token.read.and_then(|t| t.access_token),
            "token.read.access_token",
        )?;
        let file_write_token = required(
            token.write.and_then(|t| t.access_token),
            "token.write.access_token",
        )?;

        let file_format = file_format(&file_name);
        let file_type = FileType::from_format(&file_format);
        let file_download_url = content_url(api_base, &file_id, &file_read_token)?;

        Ok(Self {
            request_id: raw.id.unwrap_or_default(),
            skill_id,
            file_id,
            file_name,
            file_size,
            file_format,
            file_type,
            file_read_token,
            file_write_token,
            file_download_url,
        })
    }

    /// `Ok(true)` iff the file format is in `allowed` (case-insensitive).
    pub fn validate_format(&self, allowed: &[&str]) -> Result<bool, SkillsError> {
        if allowed
            .iter()
            .any(|f| f.trim_start_matches('.').eq_ignore_ascii_case(&self.file_format))
        {
            Ok(true)
        } else {
            Err(SkillsError::InvalidFileFormat {
                format: self.file_format.clone(),
            })
        }
    }

    /// `Ok(true)` iff the size in megabytes is at most `max_mb`.
    pub fn validate_size(&self, max_mb: f64) -> Result<bool, SkillsError> {
        let size_mb = self.file_size as f64 / MB_INTO_BYTES as f64;
        if size_mb <= max_mb {
            Ok(true)
        } else {
            Err(SkillsError::InvalidFileSize {
                size: self.file_size,
                max_mb,
            })
        }
    }
}

/// `{api}/files/{id}/content?access_token={token}`
fn content_url(api_base: &str, file_id: &str, token: &str) -> Result<String, SkillsError> {
    let mut url = Url::parse(&format!("{api_base}/files/{file_id}/content"))
        .map_err(|e| SkillsError::InvalidEvent(format!("cannot build download URL: {e}")))?;
    url.query_pairs_mut().append_pair("access_token", token);
    Ok(url.to_string())
}
