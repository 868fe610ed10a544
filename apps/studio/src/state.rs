use std::sync::Arc;

use crate::config::Config;
use crate::orchestration::controller::Controller;
use crate::orchestration::export::DirectorySaver;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub controller: Controller,
    pub config: Config,
    /// Present only when `EXPORT_DIR` is configured.
    pub exporter: Option<Arc<DirectorySaver>>,
}
