//! Scripted collaborator doubles shared by the orchestration tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::remote::{
    CompileBackend, CompileRequest, GenerateBackend, GenerateRequest, GenerateResponse,
    RemoteError, RenderedDocument, DEFAULT_ARTIFACT_CONTENT_TYPE,
};

struct Step<T> {
    delay: Duration,
    result: Result<T, RemoteError>,
}

/// Compile service double. Each call pops the next scripted step; once the
/// script runs out, calls succeed immediately with `pdf:<n>`.
#[derive(Default)]
pub struct FakeCompiler {
    calls: Mutex<Vec<String>>,
    script: Mutex<VecDeque<Step<RenderedDocument>>>,
}

impl FakeCompiler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_ok(&self, delay: Duration, body: &'static [u8]) {
        self.script.lock().push_back(Step {
            delay,
            result: Ok(RenderedDocument {
                bytes: Bytes::from_static(body),
                content_type: DEFAULT_ARTIFACT_CONTENT_TYPE.to_string(),
            }),
        });
    }

    pub fn push_err(&self, delay: Duration, error: RemoteError) {
        self.script.lock().push_back(Step {
            delay,
            result: Err(error),
        });
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl CompileBackend for FakeCompiler {
    async fn compile(&self, request: &CompileRequest) -> Result<RenderedDocument, RemoteError> {
        let (n, step) = {
            let mut calls = self.calls.lock();
            calls.push(request.document_source.clone());
            (calls.len(), self.script.lock().pop_front())
        };
        match step {
            Some(step) => {
                tokio::time::sleep(step.delay).await;
                step.result
            }
            None => Ok(RenderedDocument {
                bytes: Bytes::from(format!("pdf:{n}")),
                content_type: DEFAULT_ARTIFACT_CONTENT_TYPE.to_string(),
            }),
        }
    }
}

/// Generation service double. Unscripted calls echo the job description back
/// as the generated source.
#[derive(Default)]
pub struct FakeGenerator {
    calls: Mutex<Vec<GenerateRequest>>,
    script: Mutex<VecDeque<Step<GenerateResponse>>>,
}

impl FakeGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, delay: Duration, result: Result<GenerateResponse, RemoteError>) {
        self.script.lock().push_back(Step { delay, result });
    }

    pub fn push_source(&self, delay: Duration, source: &str) {
        self.push(
            delay,
            Ok(GenerateResponse {
                document_source: source.to_string(),
                optimized_metadata: None,
            }),
        );
    }

    pub fn calls(&self) -> Vec<GenerateRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl GenerateBackend for FakeGenerator {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, RemoteError> {
        self.calls.lock().push(request.clone());
        let step = self.script.lock().pop_front();
        match step {
            Some(step) => {
                tokio::time::sleep(step.delay).await;
                step.result
            }
            None => Ok(GenerateResponse {
                document_source: format!("\\section{{{}}}", request.job_description),
                optimized_metadata: None,
            }),
        }
    }
}
