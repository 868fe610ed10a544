//! Remote collaborators: the generation service and the compilation service.
//!
//! The orchestration layer only sees the `GenerateBackend` / `CompileBackend`
//! traits; `RemoteClient` is the HTTP implementation used in production.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header::CONTENT_TYPE, Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::options::Provider;
use crate::models::profile::ProfileDocument;

/// Content type assumed when the compile service does not send one.
pub const DEFAULT_ARTIFACT_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Service returned status {status}")]
    Status {
        status: u16,
        /// Message from the service's `{ "error": ... }` payload, if it sent one.
        message: Option<String>,
    },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        RemoteError::Transport(e.to_string())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

/// Body sent to the generation service.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    #[serde(rename = "cv")]
    pub profile: ProfileDocument,
    #[serde(rename = "jd")]
    pub job_description: String,
    #[serde(rename = "allowBold")]
    pub allow_bold: bool,
    pub provider: Provider,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    #[serde(rename = "latex")]
    pub document_source: String,
    #[serde(rename = "optimizedData", default)]
    pub optimized_metadata: Option<Value>,
}

/// Body sent to the compilation service.
#[derive(Debug, Clone, Serialize)]
pub struct CompileRequest {
    #[serde(rename = "latex")]
    pub document_source: String,
}

/// Raw artifact returned by the compilation service.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub bytes: Bytes,
    pub content_type: String,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: Option<String>,
}

/// Pulls the `error` string out of a failure body. Missing or malformed
/// payloads yield `None`.
fn error_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorPayload>(body)
        .ok()
        .and_then(|p| p.error)
        .filter(|m| !m.trim().is_empty())
}

// ────────────────────────────────────────────────────────────────────────────
// Collaborator contracts
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait GenerateBackend: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, RemoteError>;
}

#[async_trait]
pub trait CompileBackend: Send + Sync {
    async fn compile(&self, request: &CompileRequest) -> Result<RenderedDocument, RemoteError>;
}

// ────────────────────────────────────────────────────────────────────────────
// HTTP implementation
// ────────────────────────────────────────────────────────────────────────────

/// HTTP client for both collaborators. Cheap to clone.
#[derive(Clone)]
pub struct RemoteClient {
    client: Client,
    generate_url: String,
    compile_url: String,
}

impl RemoteClient {
    pub fn new(
        generate_url: impl Into<String>,
        compile_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            generate_url: generate_url.into(),
            compile_url: compile_url.into(),
        })
    }

    /// Converts a non-success response into `RemoteError::Status`.
    async fn failure(response: Response, service: &str) -> RemoteError {
        let status = response.status();
        let body = response.bytes().await.unwrap_or_default();
        let message = error_message(&body);
        warn!(
            "{} service returned {}: {}",
            service,
            status,
            message.as_deref().unwrap_or("<no error payload>")
        );
        RemoteError::Status {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl GenerateBackend for RemoteClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, RemoteError> {
        let response = self
            .client
            .post(&self.generate_url)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::failure(response, "Generate").await);
        }

        let body = response.bytes().await?;
        let parsed: GenerateResponse = serde_json::from_slice(&body)
            .map_err(|e| RemoteError::Malformed(format!("generate response: {e}")))?;

        debug!(
            "Generate succeeded: provider={}, source_len={}",
            request.provider,
            parsed.document_source.len()
        );
        Ok(parsed)
    }
}

#[async_trait]
impl CompileBackend for RemoteClient {
    async fn compile(&self, request: &CompileRequest) -> Result<RenderedDocument, RemoteError> {
        let response = self
            .client
            .post(&self.compile_url)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::failure(response, "Compile").await);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_ARTIFACT_CONTENT_TYPE)
            .to_string();
        let bytes = response.bytes().await?;

        debug!("Compile succeeded: {} bytes ({})", bytes.len(), content_type);
        Ok(RenderedDocument {
            bytes,
            content_type,
        })
    }
}
