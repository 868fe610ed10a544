//! Axum route handlers exposing the controller to the viewer/editor.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::options::{GenerationOptions, Provider};
use crate::orchestration::artifact::{ArtifactInfo, ArtifactSnapshot};
use crate::orchestration::controller::{CompileStatus, ControllerStatus, SourceView};
use crate::orchestration::export::DOWNLOAD_FILENAME;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    /// Raw profile text as typed in the editor; parsed server-side.
    pub profile: String,
    pub job_description: String,
    pub provider: Option<Provider>,
    #[serde(default)]
    pub allow_bold: bool,
}

#[derive(Debug, Deserialize)]
pub struct EditSourceBody {
    pub source: String,
}

#[derive(Debug, Serialize)]
pub struct EditSourceResponse {
    pub changed: bool,
    pub revision: u64,
    pub compile_pending: bool,
}

#[derive(Debug, Serialize)]
pub struct RecompileResponse {
    pub result: CompileStatus,
    pub status: ControllerStatus,
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub artifact: ArtifactInfo,
    pub path: String,
}

fn artifact_response(artifact: ArtifactSnapshot, attachment: bool) -> Response {
    let content_type = artifact.info.content_type.clone();
    if attachment {
        (
            [
                (header::CONTENT_TYPE, content_type),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{DOWNLOAD_FILENAME}\""),
                ),
            ],
            artifact.bytes,
        )
            .into_response()
    } else {
        ([(header::CONTENT_TYPE, content_type)], artifact.bytes).into_response()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/status
pub async fn handle_status(State(state): State<AppState>) -> Json<ControllerStatus> {
    Json(state.controller.status())
}

/// GET /api/v1/source
pub async fn handle_get_source(State(state): State<AppState>) -> Json<SourceView> {
    Json(state.controller.source())
}

/// PUT /api/v1/source
///
/// Manual edit from the editor. Schedules a debounced compile unless the new
/// text is the placeholder.
pub async fn handle_edit_source(
    State(state): State<AppState>,
    Json(body): Json<EditSourceBody>,
) -> Json<EditSourceResponse> {
    let changed = state.controller.edit_source(body.source);
    let status = state.controller.status();
    Json(EditSourceResponse {
        changed,
        revision: status.source_revision,
        compile_pending: status.compile_pending,
    })
}

/// POST /api/v1/generate
///
/// Runs the generate action to completion. The resulting source change
/// schedules a compile; poll `/api/v1/status` for the artifact.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(body): Json<GenerateBody>,
) -> Result<Json<ControllerStatus>, AppError> {
    let options = GenerationOptions {
        provider: body.provider.unwrap_or(state.config.default_provider),
        allow_bold: body.allow_bold,
    };
    state
        .controller
        .generate(&body.profile, &body.job_description, options)
        .await?;
    Ok(Json(state.controller.status()))
}

/// POST /api/v1/recompile
pub async fn handle_recompile(
    State(state): State<AppState>,
) -> Result<Json<RecompileResponse>, AppError> {
    let result = state.controller.recompile().await?;
    Ok(Json(RecompileResponse {
        result,
        status: state.controller.status(),
    }))
}

/// GET /api/v1/artifact
pub async fn handle_artifact_info(
    State(state): State<AppState>,
) -> Result<Json<ArtifactInfo>, AppError> {
    state
        .controller
        .artifact()
        .map(|a| Json(a.info))
        .ok_or_else(|| AppError::NotFound("No artifact has been rendered yet".to_string()))
}

/// GET /api/v1/artifacts/:id
///
/// Only the live handle resolves; released ids are gone.
pub async fn handle_artifact_bytes(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let artifact = state
        .controller
        .resolve_artifact(id)
        .ok_or_else(|| AppError::NotFound(format!("Artifact {id} is not live")))?;
    Ok(artifact_response(artifact, false))
}

/// GET /api/v1/artifact/download
pub async fn handle_download(State(state): State<AppState>) -> Result<Response, AppError> {
    let artifact = state
        .controller
        .artifact()
        .ok_or_else(|| AppError::NotFound("No artifact to download".to_string()))?;
    Ok(artifact_response(artifact, true))
}

/// POST /api/v1/artifact/export
///
/// Saves the live artifact into `EXPORT_DIR`.
pub async fn handle_export(
    State(state): State<AppState>,
) -> Result<Json<ExportResponse>, AppError> {
    let exporter = state
        .exporter
        .as_ref()
        .ok_or_else(|| AppError::Validation("EXPORT_DIR is not configured".to_string()))?;

    let artifact = state
        .controller
        .download(exporter.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("No artifact to download".to_string()))?;

    Ok(Json(ExportResponse {
        artifact,
        path: exporter.target(DOWNLOAD_FILENAME).display().to_string(),
    }))
}
