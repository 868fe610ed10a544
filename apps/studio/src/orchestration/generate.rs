//! Generate Invoker: validates the user's inputs and asks the generation
//! service for a tailored document source.
//!
//! Validation happens before any network call: an empty job description or a
//! profile that is not valid JSON never reaches the service.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::options::GenerationOptions;
use crate::models::profile::ProfileDocument;
use crate::remote::{GenerateBackend, GenerateRequest, RemoteError};

pub const EMPTY_JOB_DESCRIPTION_MESSAGE: &str = "Please enter a job description";
pub const GENERATE_FAILED_MESSAGE: &str = "Failed to generate optimized CV";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("CV JSON is invalid. Please check the format.")]
    InvalidProfileFormat,

    #[error("{0}")]
    Remote(String),

    #[error("{0}")]
    Network(String),
}

impl From<RemoteError> for GenerationError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Status { message, .. } => GenerationError::Remote(
                message.unwrap_or_else(|| GENERATE_FAILED_MESSAGE.to_string()),
            ),
            RemoteError::Malformed(detail) => {
                warn!("Generation service sent a malformed response: {detail}");
                GenerationError::Remote(GENERATE_FAILED_MESSAGE.to_string())
            }
            RemoteError::Transport(message) => GenerationError::Network(message),
        }
    }
}

/// Successful generation result.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedDocument {
    pub source: String,
    pub optimized_metadata: Option<Value>,
}

pub struct GenerateInvoker {
    backend: Arc<dyn GenerateBackend>,
    timeout: Duration,
}

impl GenerateInvoker {
    pub fn new(backend: Arc<dyn GenerateBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Checks the preconditions and builds the request. No network I/O.
    pub fn prepare(
        &self,
        profile_text: &str,
        job_description: &str,
        options: GenerationOptions,
    ) -> Result<GenerateRequest, GenerationError> {
        if job_description.trim().is_empty() {
            return Err(GenerationError::InvalidInput(
                EMPTY_JOB_DESCRIPTION_MESSAGE.to_string(),
            ));
        }

        let profile = ProfileDocument::parse(profile_text).map_err(|e| {
            warn!("Profile JSON rejected before generation: {e}");
            GenerationError::InvalidProfileFormat
        })?;
        debug!(
            "Profile parsed ({} top-level fields)",
            profile.as_value().as_object().map_or(0, |o| o.len())
        );

        Ok(GenerateRequest {
            profile,
            job_description: job_description.to_string(),
            allow_bold: options.allow_bold,
            provider: options.provider,
        })
    }

    /// Sends a prepared request, bounded by the configured timeout.
    pub async fn invoke(
        &self,
        request: &GenerateRequest,
    ) -> Result<GeneratedDocument, GenerationError> {
        info!(
            "Requesting generation (provider={}, allow_bold={}, jd_len={})",
            request.provider,
            request.allow_bold,
            request.job_description.len()
        );

        let response = tokio::time::timeout(self.timeout, self.backend.generate(request))
            .await
            .map_err(|_| {
                GenerationError::Network(format!(
                    "Generation request timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;

        info!(
            "Generation returned {} bytes of source",
            response.document_source.len()
        );
        Ok(GeneratedDocument {
            source: response.document_source,
            optimized_metadata: response.optimized_metadata,
        })
    }

    pub async fn generate(
        &self,
        profile_text: &str,
        job_description: &str,
        options: GenerationOptions,
    ) -> Result<GeneratedDocument, GenerationError> {
        let request = self.prepare(profile_text, job_description, options)?;
        self.invoke(&request).await
    }
}
