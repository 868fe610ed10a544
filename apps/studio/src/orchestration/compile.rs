//! Compile Invoker: sends document source to the compilation service and
//! wraps the rendered bytes in an artifact handle.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::models::document::is_placeholder;
use crate::orchestration::activity::{ActivityBoard, ErrorScope};
use crate::orchestration::artifact::{ArtifactHandle, ArtifactManager};
use crate::remote::{CompileBackend, CompileRequest, RemoteError};

pub const COMPILE_FAILED_MESSAGE: &str = "Failed to compile LaTeX";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("{0}")]
    Remote(String),

    #[error("{0}")]
    Network(String),
}

impl From<RemoteError> for CompileError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Status { message, .. } => CompileError::Remote(
                message.unwrap_or_else(|| COMPILE_FAILED_MESSAGE.to_string()),
            ),
            RemoteError::Malformed(_) => CompileError::Remote(COMPILE_FAILED_MESSAGE.to_string()),
            RemoteError::Transport(message) => CompileError::Network(message),
        }
    }
}

#[derive(Debug)]
pub enum CompileOutcome {
    /// The source was the placeholder; nothing was sent.
    Unchanged,
    /// A new, not yet installed, artifact handle.
    Compiled(ArtifactHandle),
}

pub struct CompileInvoker {
    backend: Arc<dyn CompileBackend>,
    artifacts: Arc<ArtifactManager>,
    activity: Arc<ActivityBoard>,
    timeout: Duration,
}

impl CompileInvoker {
    pub fn new(
        backend: Arc<dyn CompileBackend>,
        artifacts: Arc<ArtifactManager>,
        activity: Arc<ActivityBoard>,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            artifacts,
            activity,
            timeout,
        }
    }

    /// Compiles `source`. The `compiling` flag is held for the whole call and
    /// dropped on every exit path.
    pub async fn compile(&self, source: &str) -> Result<CompileOutcome, CompileError> {
        if is_placeholder(source) {
            return Ok(CompileOutcome::Unchanged);
        }

        let _in_flight = self.activity.begin(ErrorScope::Compile);
        info!("Compiling document source ({} bytes)", source.len());

        let request = CompileRequest {
            document_source: source.to_string(),
        };
        let rendered = match tokio::time::timeout(self.timeout, self.backend.compile(&request)).await
        {
            Ok(Ok(rendered)) => rendered,
            Ok(Err(e)) => {
                warn!("Compile failed: {e}");
                return Err(e.into());
            }
            Err(_) => {
                warn!("Compile timed out after {}s", self.timeout.as_secs());
                return Err(CompileError::Network(format!(
                    "Compile request timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        Ok(CompileOutcome::Compiled(
            self.artifacts.acquire(rendered.bytes, rendered.content_type),
        ))
    }
}
