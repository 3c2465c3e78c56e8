//! Error types shared by the reader and writer halves of the kit.
//!
//! `SkillsError` is what library calls return. `ErrorCode` is the closed
//! set of codes the platform understands on an error card; every
//! `SkillsError` maps onto one of them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors raised by `FilesReader`, `SkillsWriter` and the platform client.
#[derive(Debug, thiserror::Error)]
pub enum SkillsError {
    /// The inbound event is missing a required field or is not JSON.
    /// Never retryable.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("file format '{format}' is not allowed")]
    InvalidFileFormat { format: String },

    #[error("file size {size} bytes exceeds the {max_mb} MB limit")]
    InvalidFileSize { size: u64, max_mb: f64 },

    /// Representation generation failed, or content could not be fetched.
    #[error("file processing failed: {0}")]
    FileProcessing(String),

    /// The platform answered 401 to a read with the file read token.
    #[error("platform rejected the access token: {0}")]
    ExternalAuth(String),

    /// Non-2xx answer from the platform API.
    #[error("platform API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SkillsError {
    /// The error-card code this error is reported under.
    pub fn code(&self) -> ErrorCode {
        match self {
            SkillsError::InvalidEvent(_) => ErrorCode::InvalidEvent,
            SkillsError::InvalidFileFormat { .. } => ErrorCode::InvalidFileFormat,
            SkillsError::InvalidFileSize { .. } => ErrorCode::InvalidFileSize,
            SkillsError::FileProcessing(_) => ErrorCode::FileProcessing,
            SkillsError::ExternalAuth(_) => ErrorCode::ExternalAuth,
            SkillsError::Api { .. } => ErrorCode::Invocations,
            SkillsError::Http(_) => ErrorCode::Unknown,
        }
    }
}

/// Closed set of error-card codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    #[serde(rename = "file_processing_error")]
    FileProcessing,
    #[serde(rename = "invalid_file_size_error")]
    InvalidFileSize,
    #[serde(rename = "invalid_file_format_error")]
    InvalidFileFormat,
    #[serde(rename = "invalid_event_error")]
    InvalidEvent,
    NoInfoFound,
    #[serde(rename = "invocations_error")]
    Invocations,
    #[serde(rename = "external_auth_error")]
    ExternalAuth,
    #[serde(rename = "billing_error")]
    Billing,
    #[serde(rename = "unknown_error")]
    Unknown,
    /// Only produced when a custom message is attached to an error card.
    #[serde(rename = "custom_error")]
    Custom,
}

impl ErrorCode {
    const ALL: [ErrorCode; 10] = [
        ErrorCode::FileProcessing,
        ErrorCode::InvalidFileSize,
        ErrorCode::InvalidFileFormat,
        ErrorCode::InvalidEvent,
        ErrorCode::NoInfoFound,
        ErrorCode::Invocations,
        ErrorCode::ExternalAuth,
        ErrorCode::Billing,
        ErrorCode::Unknown,
        ErrorCode::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::FileProcessing => "file_processing_error",
            ErrorCode::InvalidFileSize => "invalid_file_size_error",
            ErrorCode::InvalidFileFormat => "invalid_file_format_error",
            ErrorCode::InvalidEvent => "invalid_event_error",
            ErrorCode::NoInfoFound => "no_info_found",
            ErrorCode::Invocations => "invocations_error",
            ErrorCode::ExternalAuth => "external_auth_error",
            ErrorCode::Billing => "billing_error",
            ErrorCode::Unknown => "unknown_error",
            ErrorCode::Custom => "custom_error",
        }
    }

    /// Strict lookup. `None` for anything outside the closed set.
    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == code)
    }

    /// Message shown on the error card when the caller gives none.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::FileProcessing => {
                "We're sorry, something went wrong with processing the file."
            }
            ErrorCode::InvalidFileSize => {
                "Something went wrong with processing the file. This file size is currently not supported."
            }
            ErrorCode::InvalidFileFormat => {
                "Something went wrong with processing the file. This file format is currently not supported."
            }
            ErrorCode::InvalidEvent => {
                "Something went wrong with processing the file. Invalid information received."
            }
            ErrorCode::NoInfoFound => "We're sorry, no skills information was found.",
            ErrorCode::Invocations => {
                "Something went wrong with running this skill or fetching its data."
            }
            ErrorCode::ExternalAuth => {
                "Something went wrong with authenticating against the external service."
            }
            ErrorCode::Billing => "Something went wrong with the billing of this skill.",
            ErrorCode::Unknown | ErrorCode::Custom => {
                "Something went wrong with running this skill or fetching its data."
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lenient conversion: unrecognized codes collapse to `unknown_error`.
impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        ErrorCode::parse(code).unwrap_or(ErrorCode::Unknown)
    }
}

impl From<&SkillsError> for ErrorCode {
    fn from(err: &SkillsError) -> Self {
        err.code()
    }
}
