//! HTTP entry point for skill invocations.
//!
//! One request is one invocation: check the signature, parse the event,
//! show a processing card, run the skill and save its cards, all inside
//! the configured time budget. Every failure past the signature check is
//! answered with 400 so the platform retries with backoff.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, warn};

use crate::api::http_client;
use crate::config::Config;
use crate::error::{ErrorCode, SkillsError};
use crate::reader::FilesReader;
use crate::skill::{Skill, SkillOutput};
use crate::webhook::SignatureValidator;
use crate::writer::SkillsWriter;

type Reply = (StatusCode, &'static str);

/// Shared by every request.
pub struct AppState {
    pub config: Config,
    pub http: Client,
    pub validator: SignatureValidator,
    pub skill: Arc<dyn Skill>,
}

impl AppState {
    pub fn new(config: Config, skill: Arc<dyn Skill>) -> Self {
        let http = http_client(config.server.invocation_timeout());
        let validator = SignatureValidator::from_config(&config.platform);
        Self {
            config,
            http,
            validator,
            skill,
        }
    }
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /`
pub async fn invoke(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Reply {
    let deadline = Instant::now() + state.config.server.invocation_timeout();

    if !state.validator.validate(&body, &headers, Utc::now()) {
        warn!("Rejected invocation with an invalid signature");
        return (StatusCode::UNAUTHORIZED, "Invalid signature");
    }

    let Ok(body) = std::str::from_utf8(&body) else {
        warn!("Rejected invocation: body is not UTF-8");
        return (StatusCode::BAD_REQUEST, "Invalid event");
    };
    let reader = match FilesReader::new(
        body,
        state.http.clone(),
        &state.config.platform,
        &state.config.representation,
    ) {
        Ok(reader) => reader.with_deadline(deadline),
        Err(e) => {
            warn!("Rejected invocation: {e}");
            return (StatusCode::BAD_REQUEST, "Invalid event");
        }
    };
    let writer = SkillsWriter::new(
        reader.file_context(),
        state.http.clone(),
        state.config.platform.api_base(),
        state.config.cards.thumbnail_size,
    );

    let ctx = reader.file_context();
    info!(
        "Invocation {} for file {} ({}, {} bytes) with skill '{}'",
        ctx.request_id,
        ctx.file_name,
        ctx.file_type,
        ctx.file_size,
        state.skill.name()
    );

    let run = async {
        if let Err(e) = writer.save_processing_card().await {
            warn!("Could not save processing card: {e}");
        }
        run_skill(state.skill.as_ref(), &reader, &writer).await
    };

    match timeout_at(deadline, run).await {
        Ok(Ok(reply)) => (StatusCode::OK, reply),
        Ok(Err(e)) => {
            error!("Invocation {} failed: {e:#}", ctx.request_id);
            if let Err(write_err) = writer.save_error_card(error_code(&e), None, None).await {
                warn!("Could not save error card: {write_err}");
            }
            (StatusCode::BAD_REQUEST, "Processing failed")
        }
        Err(_) => {
            error!(
                "Invocation {} ran out of its {}s budget",
                ctx.request_id, state.config.server.invocation_timeout_secs
            );
            (StatusCode::BAD_REQUEST, "Processing timed out")
        }
    }
}

async fn run_skill(
    skill: &dyn Skill,
    reader: &FilesReader,
    writer: &SkillsWriter,
) -> anyhow::Result<&'static str> {
    match skill.process(reader, writer).await? {
        SkillOutput::Cards { cards, usage } => {
            writer.save_data_cards(cards, None, usage).await?;
            Ok("Cards saved")
        }
        SkillOutput::NotApplicable { code, message } => {
            info!("File not applicable to skill '{}': {code}", skill.name());
            if let Err(e) = writer.save_error_card(code, message.as_deref(), None).await {
                warn!("Could not save error card: {e}");
            }
            Ok("File not applicable")
        }
    }
}

/// Code of the first `SkillsError` in the chain, else `unknown_error`.
fn error_code(err: &anyhow::Error) -> ErrorCode {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<SkillsError>())
        .map_or(ErrorCode::Unknown, SkillsError::code)
}
