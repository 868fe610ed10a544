//! Orchestration Controller: sequences generate → source update → debounce →
//! compile → artifact install, and exposes the observable status.
//!
//! Compile results are epoch-tagged: every compile that reaches the service
//! takes the next epoch, and a result (artifact or error) is applied only if
//! its epoch is still the latest issued. Older results are dropped silently.
//!
//! The source cell's subscriber and the debounce action hold `Weak`
//! references, so the controller is freed (and torn down) once the last
//! `Controller` clone is dropped.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::document::{is_placeholder, PLACEHOLDER_SOURCE};
use crate::models::options::GenerationOptions;
use crate::orchestration::activity::{ActivityBoard, ErrorScope};
use crate::orchestration::artifact::{
    ArtifactCounters, ArtifactInfo, ArtifactManager, ArtifactSnapshot, InstallOutcome,
};
use crate::orchestration::compile::{CompileError, CompileInvoker, CompileOutcome};
use crate::orchestration::debounce::{DebounceScheduler, DEFAULT_DEBOUNCE};
use crate::orchestration::export::{ArtifactSaver, SaveError, DOWNLOAD_FILENAME};
use crate::orchestration::generate::{GenerateInvoker, GenerationError};
use crate::orchestration::source::{SourceCell, SourceSnapshot};
use crate::remote::{CompileBackend, GenerateBackend, GenerateRequest};

#[derive(Debug, Clone, Copy)]
pub struct ControllerSettings {
    pub debounce: Duration,
    pub request_timeout: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Observable controller state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerStatus {
    pub generating: bool,
    pub compiling: bool,
    pub error: Option<String>,
    pub generate_error: Option<String>,
    pub compile_error: Option<String>,
    pub has_artifact: bool,
    pub artifact: Option<ArtifactInfo>,
    pub source_revision: u64,
    pub compile_epoch: u64,
    pub compile_pending: bool,
    /// Edits that (re)armed the compile timer since startup.
    pub compile_requests: u64,
    pub artifacts: ArtifactCounters,
}

/// What happened to one compile attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompileStatus {
    /// Placeholder source; nothing was sent.
    Unchanged,
    Installed { artifact: Uuid, epoch: u64 },
    /// A newer compile was issued before this one resolved; its result was dropped.
    Superseded { epoch: u64 },
    /// The controller was torn down while the compile was in flight.
    Closed { epoch: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Debounced,
    Manual,
}

/// Current source plus the metadata of the generation that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceView {
    #[serde(flatten)]
    pub snapshot: SourceSnapshot,
    pub optimized_metadata: Option<Value>,
}

/// Cheap to clone; all clones drive the same controller.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Inner>,
}

struct Inner {
    me: Weak<Inner>,
    settings: ControllerSettings,
    generator: GenerateInvoker,
    compiler: CompileInvoker,
    artifacts: Arc<ArtifactManager>,
    activity: Arc<ActivityBoard>,
    source: SourceCell,
    scheduler: DebounceScheduler,
    epoch: AtomicU64,
    optimized_metadata: Mutex<Option<Value>>,
    torn_down: AtomicBool,
}

impl Controller {
    pub fn new(
        generate_backend: Arc<dyn GenerateBackend>,
        compile_backend: Arc<dyn CompileBackend>,
        settings: ControllerSettings,
    ) -> Self {
        let inner = Arc::new_cyclic(|me: &Weak<Inner>| {
            let artifacts = Arc::new(ArtifactManager::new());
            let activity = ActivityBoard::new();
            let source = SourceCell::new(PLACEHOLDER_SOURCE);

            let subscriber = me.clone();
            source.subscribe(move |text, revision| {
                if let Some(inner) = subscriber.upgrade() {
                    inner.on_source_changed(text, revision);
                }
            });

            Inner {
                me: me.clone(),
                settings,
                generator: GenerateInvoker::new(generate_backend, settings.request_timeout),
                compiler: CompileInvoker::new(
                    compile_backend,
                    artifacts.clone(),
                    activity.clone(),
                    settings.request_timeout,
                ),
                artifacts,
                activity,
                source,
                scheduler: DebounceScheduler::new(),
                epoch: AtomicU64::new(0),
                optimized_metadata: Mutex::new(None),
                torn_down: AtomicBool::new(false),
            }
        });

        info!(
            "Controller ready (debounce={}ms, timeout={}s)",
            settings.debounce.as_millis(),
            settings.request_timeout.as_secs()
        );
        Self { inner }
    }

    pub fn status(&self) -> ControllerStatus {
        let activity = self.inner.activity.snapshot();
        let artifact = self.inner.artifacts.info();
        ControllerStatus {
            generating: activity.generating,
            compiling: activity.compiling,
            error: activity.error,
            generate_error: activity.generate_error,
            compile_error: activity.compile_error,
            has_artifact: artifact.is_some(),
            artifact,
            source_revision: self.inner.source.revision(),
            compile_epoch: self.inner.epoch.load(Ordering::SeqCst),
            compile_pending: self.inner.scheduler.is_pending(),
            compile_requests: self.inner.scheduler.armed_count(),
            artifacts: self.inner.artifacts.counters(),
        }
    }

    pub fn source(&self) -> SourceView {
        SourceView {
            snapshot: self.inner.source.snapshot(),
            optimized_metadata: self.inner.optimized_metadata.lock().clone(),
        }
    }

    /// Manual edit from the editor. Returns false if the text did not change.
    pub fn edit_source(&self, source: impl Into<String>) -> bool {
        self.inner.source.set(source)
    }

    /// Generate action. Validation failures are recorded without a network
    /// call; otherwise `generating` is held for the duration of the call.
    /// The call runs on its own task and completes even if the caller is
    /// dropped.
    pub async fn generate(
        &self,
        profile_text: &str,
        job_description: &str,
        options: GenerationOptions,
    ) -> Result<(), GenerationError> {
        let inner = &self.inner;
        let request = match inner.generator.prepare(profile_text, job_description, options) {
            Ok(request) => request,
            Err(e) => {
                inner.activity.record_error(ErrorScope::Generate, e.to_string());
                return Err(e);
            }
        };

        detached(Arc::clone(inner).run_generate(request)).await
    }

    /// Compiles the current source now, bypassing the debounce. Like
    /// `generate`, the compile outlives a dropped caller so its epoch is
    /// always resolved.
    pub async fn recompile(&self) -> Result<CompileStatus, CompileError> {
        let inner = Arc::clone(&self.inner);
        detached(async move { inner.compile_current(Trigger::Manual).await }).await
    }

    /// Hands the live artifact to `saver` under the fixed download name.
    /// Returns `None` without calling the saver when there is no artifact.
    pub async fn download(
        &self,
        saver: &dyn ArtifactSaver,
    ) -> Result<Option<ArtifactInfo>, SaveError> {
        let Some(artifact) = self.inner.artifacts.current() else {
            debug!("Download requested with no artifact; ignoring");
            return Ok(None);
        };
        saver.save(&artifact, DOWNLOAD_FILENAME).await?;
        Ok(Some(artifact.info))
    }

    pub fn artifact(&self) -> Option<ArtifactSnapshot> {
        self.inner.artifacts.current()
    }

    pub fn resolve_artifact(&self, id: Uuid) -> Option<ArtifactSnapshot> {
        self.inner.artifacts.resolve(id)
    }

    /// Cancels the pending compile timer and releases the held artifact.
    /// Only the first call has an effect.
    pub fn teardown(&self) {
        self.inner.teardown();
    }
}

/// Runs `work` on its own task and waits for it.
async fn detached<T, F>(work: F) -> T
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(value) => value,
        // The handle is never aborted, so a join error is a panic.
        Err(e) => std::panic::resume_unwind(e.into_panic()),
    }
}

impl Inner {
    async fn run_generate(
        self: Arc<Self>,
        request: GenerateRequest,
    ) -> Result<(), GenerationError> {
        let _in_flight = self.activity.begin(ErrorScope::Generate);
        self.activity.clear_error(ErrorScope::Generate);

        match self.generator.invoke(&request).await {
            Ok(document) => {
                if let Some(metadata) = &document.optimized_metadata {
                    debug!("Optimized metadata received: {metadata}");
                }
                *self.optimized_metadata.lock() = document.optimized_metadata;
                self.source.set(document.source);
                self.activity.clear_error(ErrorScope::Generate);
                Ok(())
            }
            Err(e) => {
                warn!("Generate failed: {e}");
                self.activity.record_error(ErrorScope::Generate, e.to_string());
                Err(e)
            }
        }
    }

    fn on_source_changed(&self, text: &str, revision: u64) {
        if self.torn_down.load(Ordering::SeqCst) {
            return;
        }
        let latest = self.source.revision();
        if revision != latest {
            debug!("Source revision {revision} superseded by {latest}; notification ignored");
            return;
        }
        if is_placeholder(text) {
            debug!("Source revision {revision} is the placeholder; compile not scheduled");
            self.scheduler.cancel();
            return;
        }

        let me = self.me.clone();
        self.scheduler.arm(self.settings.debounce, async move {
            if let Some(inner) = me.upgrade() {
                // Errors are already recorded in the activity board.
                let _ = inner.compile_current(Trigger::Debounced).await;
            }
        });
    }

    fn is_latest(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    async fn compile_current(&self, trigger: Trigger) -> Result<CompileStatus, CompileError> {
        let source = self.source.get();
        if is_placeholder(&source) {
            debug!("{trigger:?} compile skipped: placeholder source");
            return Ok(CompileStatus::Unchanged);
        }

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.activity.clear_error(ErrorScope::Compile);
        debug!("{trigger:?} compile issued (epoch {epoch})");

        match self.compiler.compile(&source).await {
            Ok(CompileOutcome::Unchanged) => Ok(CompileStatus::Unchanged),
            Ok(CompileOutcome::Compiled(handle)) => {
                let artifact = handle.id();
                match self.artifacts.install_if(handle, || self.is_latest(epoch)) {
                    InstallOutcome::Installed { replaced } => {
                        info!("Artifact {artifact} installed (epoch {epoch}, replaced {replaced:?})");
                        Ok(CompileStatus::Installed { artifact, epoch })
                    }
                    InstallOutcome::Rejected => {
                        debug!("Discarded stale artifact from epoch {epoch}");
                        Ok(CompileStatus::Superseded { epoch })
                    }
                    InstallOutcome::Closed => Ok(CompileStatus::Closed { epoch }),
                }
            }
            Err(e) => {
                let message = e.to_string();
                if self
                    .activity
                    .record_error_if(ErrorScope::Compile, message, || self.is_latest(epoch))
                {
                    Err(e)
                } else {
                    debug!("Discarded stale compile failure from epoch {epoch}: {e}");
                    Ok(CompileStatus::Superseded { epoch })
                }
            }
        }
    }

    fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let cancelled = self.scheduler.close();
        let released = self.artifacts.release_all();
        info!("Controller torn down (timer cancelled: {cancelled}, released: {released:?})");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio::time::{sleep, Instant};

    use crate::orchestration::testing::{FakeCompiler, FakeGenerator};
    use crate::remote::{GenerateResponse, RemoteError};

    const PROFILE: &str = r#"{"name": "Ada Lovelace", "work": [{"company": "Engines Ltd"}]}"#;
    const JD: &str = "Senior Rust engineer for a document pipeline";

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    fn setup() -> (Controller, Arc<FakeGenerator>, Arc<FakeCompiler>) {
        setup_with(ControllerSettings::default())
    }

    fn setup_with(settings: ControllerSettings) -> (Controller, Arc<FakeGenerator>, Arc<FakeCompiler>) {
        let generator = FakeGenerator::new();
        let compiler = FakeCompiler::new();
        let controller = Controller::new(generator.clone(), compiler.clone(), settings);
        (controller, generator, compiler)
    }

    fn current_bytes(controller: &Controller) -> Option<Vec<u8>> {
        controller.artifact().map(|a| a.bytes.to_vec())
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_coalesce_into_one_compile_with_last_content() {
        let (controller, _, compiler) = setup();
        let start = Instant::now();

        controller.edit_source("\\doc{v1}");
        sleep(Duration::from_millis(200)).await;
        controller.edit_source("\\doc{v2}");
        sleep(Duration::from_millis(100)).await;
        controller.edit_source("\\doc{v3}");

        sleep(Duration::from_millis(799)).await;
        settle().await;
        assert_eq!(compiler.call_count(), 0, "nothing fires before t=1100ms");
        assert_eq!(Instant::now() - start, Duration::from_millis(1099));

        sleep(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(compiler.calls(), vec!["\\doc{v3}".to_string()]);

        sleep(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(compiler.call_count(), 1);
        assert!(controller.status().has_artifact);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_success_replaces_source_and_schedules_compile() {
        let (controller, generator, compiler) = setup();
        generator.push(
            Duration::from_millis(50),
            Ok(GenerateResponse {
                document_source: "\\section{Tailored}".to_string(),
                optimized_metadata: Some(json!({"matched": 12})),
            }),
        );

        controller
            .generate(PROFILE, JD, GenerationOptions::default())
            .await
            .unwrap();

        let view = controller.source();
        assert_eq!(view.snapshot.source, "\\section{Tailored}");
        assert_eq!(view.optimized_metadata, Some(json!({"matched": 12})));
        let status = controller.status();
        assert!(!status.generating);
        assert!(status.error.is_none());
        assert!(status.compile_pending);
        assert_eq!(compiler.call_count(), 0);

        sleep(Duration::from_millis(801)).await;
        settle().await;
        assert_eq!(compiler.calls(), vec!["\\section{Tailored}".to_string()]);
        assert!(controller.status().has_artifact);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generating_flag_spans_the_call() {
        let (controller, generator, _) = setup();
        generator.push_source(Duration::from_millis(300), "\\section{Slow}");

        let c = controller.clone();
        let task = tokio::spawn(async move {
            c.generate(PROFILE, JD, GenerationOptions::default()).await
        });

        sleep(Duration::from_millis(100)).await;
        assert!(controller.status().generating);

        task.await.unwrap().unwrap();
        assert!(!controller.status().generating);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_job_description_is_rejected_locally() {
        let (controller, generator, _) = setup();

        let result = controller
            .generate(PROFILE, "", GenerationOptions::default())
            .await;

        assert!(matches!(result, Err(GenerationError::InvalidInput(_))));
        assert_eq!(generator.call_count(), 0);
        let status = controller.status();
        assert_eq!(status.error.as_deref(), Some("Please enter a job description"));
        assert!(!status.generating);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_profile_is_rejected_locally() {
        let (controller, generator, _) = setup();

        let result = controller
            .generate("{invalid json", JD, GenerationOptions::default())
            .await;

        assert_eq!(result, Err(GenerationError::InvalidProfileFormat));
        assert_eq!(generator.call_count(), 0);
        assert_eq!(
            controller.status().generate_error.as_deref(),
            Some("CV JSON is invalid. Please check the format.")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_failure_keeps_source_and_artifact() {
        let (controller, generator, _) = setup();
        controller.edit_source("\\doc{good}");
        controller.recompile().await.unwrap();
        let before = current_bytes(&controller);

        generator.push(
            Duration::ZERO,
            Err(RemoteError::Status {
                status: 502,
                message: Some("Upstream model unavailable".to_string()),
            }),
        );
        let result = controller
            .generate(PROFILE, JD, GenerationOptions::default())
            .await;

        assert_eq!(
            result,
            Err(GenerationError::Remote("Upstream model unavailable".to_string()))
        );
        let status = controller.status();
        assert_eq!(status.generate_error.as_deref(), Some("Upstream model unavailable"));
        assert!(status.compile_error.is_none(), "generate failure stays in its own scope");
        assert_eq!(controller.source().snapshot.source, "\\doc{good}");
        assert_eq!(current_bytes(&controller), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_compile_failure_surfaces_message_and_keeps_artifact() {
        let (controller, _, compiler) = setup();
        controller.edit_source("\\doc{ok}");
        let first = controller.recompile().await.unwrap();
        let CompileStatus::Installed { artifact, .. } = first else {
            panic!("expected install, got {first:?}");
        };

        compiler.push_err(
            Duration::ZERO,
            RemoteError::Status {
                status: 400,
                message: Some("syntax error line 4".to_string()),
            },
        );
        controller.edit_source("\\doc{broken");
        let result = controller.recompile().await;

        assert_eq!(
            result,
            Err(CompileError::Remote("syntax error line 4".to_string()))
        );
        let status = controller.status();
        assert_eq!(status.error.as_deref(), Some("syntax error line 4"));
        assert!(!status.compiling);
        assert_eq!(status.artifact.map(|a| a.id), Some(artifact));
        assert!(controller.resolve_artifact(artifact).is_some());
        assert!(status.generate_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_compile_clears_previous_compile_error() {
        let (controller, _, compiler) = setup();
        compiler.push_err(
            Duration::ZERO,
            RemoteError::Status {
                status: 500,
                message: None,
            },
        );
        controller.edit_source("\\doc{a}");
        assert!(controller.recompile().await.is_err());
        assert_eq!(
            controller.status().error.as_deref(),
            Some("Failed to compile LaTeX")
        );

        controller.recompile().await.unwrap();
        assert!(controller.status().error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_installs_release_previous_and_teardown_releases_last() {
        let (controller, _, _) = setup();
        let n = 5u64;
        for i in 0..n {
            controller.edit_source(format!("\\doc{{{i}}}"));
            controller.recompile().await.unwrap();
        }

        let counters = controller.status().artifacts;
        assert_eq!(counters.acquired, n);
        assert_eq!(counters.released, n - 1);
        assert!(counters.live);

        controller.teardown();
        let counters = controller.status().artifacts;
        assert_eq!(counters.released, n);
        assert!(!counters.live);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_from_older_epoch_is_discarded() {
        let (controller, _, compiler) = setup();
        controller.edit_source("\\doc{race}");
        compiler.push_ok(Duration::from_millis(500), b"epoch-1");
        compiler.push_ok(Duration::from_millis(100), b"epoch-2");

        let (first, second) = tokio::join!(controller.recompile(), async {
            sleep(Duration::from_millis(10)).await;
            controller.recompile().await
        });

        assert_eq!(first.unwrap(), CompileStatus::Superseded { epoch: 1 });
        assert!(matches!(second.unwrap(), CompileStatus::Installed { epoch: 2, .. }));
        assert_eq!(current_bytes(&controller).as_deref(), Some(&b"epoch-2"[..]));

        let counters = controller.status().artifacts;
        assert_eq!((counters.acquired, counters.released), (2, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_failure_from_older_epoch_is_not_reported() {
        let (controller, _, compiler) = setup();
        controller.edit_source("\\doc{race}");
        compiler.push_err(
            Duration::from_millis(500),
            RemoteError::Status {
                status: 400,
                message: Some("stale failure".to_string()),
            },
        );
        compiler.push_ok(Duration::from_millis(100), b"fresh");

        let (first, second) = tokio::join!(controller.recompile(), async {
            sleep(Duration::from_millis(10)).await;
            controller.recompile().await
        });

        assert_eq!(first, Ok(CompileStatus::Superseded { epoch: 1 }));
        assert!(second.is_ok());
        assert!(controller.status().error.is_none());
        assert_eq!(current_bytes(&controller).as_deref(), Some(&b"fresh"[..]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_recompile_still_resolves_its_epoch() {
        let (controller, _, compiler) = setup();
        controller.edit_source("\\doc{v1}");
        compiler.push_ok(Duration::from_millis(500), b"debounced");
        compiler.push_ok(Duration::from_millis(500), b"manual");

        // debounced compile issued at t=800 (epoch 1)
        sleep(Duration::from_millis(900)).await;
        settle().await;
        assert_eq!(compiler.call_count(), 1);

        // manual compile issued at t=900 (epoch 2); its caller goes away at t=950
        let m = controller.clone();
        let manual = tokio::spawn(async move { m.recompile().await });
        sleep(Duration::from_millis(50)).await;
        manual.abort();
        assert!(manual.await.unwrap_err().is_cancelled());

        sleep(Duration::from_secs(1)).await;
        settle().await;

        let status = controller.status();
        assert_eq!(compiler.call_count(), 2);
        assert_eq!(status.compile_epoch, 2);
        assert!(!status.compiling);
        assert!(status.error.is_none());
        assert_eq!(current_bytes(&controller).as_deref(), Some(&b"manual"[..]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_generate_still_updates_source() {
        let (controller, generator, _) = setup();
        generator.push_source(Duration::from_millis(500), "\\doc{generated}");

        let g = controller.clone();
        let request = tokio::spawn(async move {
            g.generate(PROFILE, JD, GenerationOptions::default()).await
        });
        sleep(Duration::from_millis(100)).await;
        request.abort();
        let _ = request.await;

        sleep(Duration::from_millis(500)).await;
        settle().await;

        let status = controller.status();
        assert!(!status.generating);
        assert!(status.compile_pending);
        assert_eq!(controller.source().snapshot.source, "\\doc{generated}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_placeholder_notification_keeps_timer_armed() {
        let (controller, _, compiler) = setup();
        controller.edit_source("");
        controller.edit_source("\\doc{real}");
        assert_eq!(controller.status().source_revision, 2);

        // revision 1 reported after revision 2 armed the timer
        controller.inner.on_source_changed("", 1);
        assert!(controller.status().compile_pending);

        sleep(Duration::from_millis(900)).await;
        settle().await;
        assert_eq!(compiler.calls(), vec!["\\doc{real}".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_placeholder_never_reaches_compile_service() {
        let (controller, _, compiler) = setup();

        assert_eq!(controller.recompile().await, Ok(CompileStatus::Unchanged));

        controller.edit_source("\\doc{real}");
        controller.edit_source(PLACEHOLDER_SOURCE);
        controller.edit_source("");
        assert_eq!(controller.recompile().await, Ok(CompileStatus::Unchanged));

        sleep(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(compiler.call_count(), 0);
        assert_eq!(controller.status().compile_epoch, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_placeholder_edit_does_not_arm_timer() {
        let (controller, _, _) = setup();
        controller.edit_source("");
        assert!(!controller.status().compile_pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_timer_and_releases_artifact() {
        let (controller, _, compiler) = setup();
        controller.edit_source("\\doc{held}");
        controller.recompile().await.unwrap();
        assert!(controller.status().has_artifact);

        controller.edit_source("\\doc{pending}");
        assert!(controller.status().compile_pending);

        controller.teardown();
        sleep(Duration::from_secs(5)).await;
        settle().await;

        assert_eq!(compiler.call_count(), 1, "pending compile must never fire");
        let status = controller.status();
        assert!(!status.has_artifact);
        assert!(!status.compile_pending);
        let counters = controller.status().artifacts;
        assert_eq!(counters.acquired, counters.released);

        controller.teardown();
        assert_eq!(controller.status().artifacts, counters);
    }

    #[tokio::test(start_paused = true)]
    async fn test_compile_resolving_after_teardown_is_released() {
        let (controller, _, compiler) = setup();
        controller.edit_source("\\doc{slow}");
        compiler.push_ok(Duration::from_millis(500), b"late");

        let c = controller.clone();
        let task = tokio::spawn(async move { c.recompile().await });
        sleep(Duration::from_millis(100)).await;
        controller.teardown();

        assert_eq!(task.await.unwrap(), Ok(CompileStatus::Closed { epoch: 1 }));
        let counters = controller.status().artifacts;
        assert_eq!((counters.acquired, counters.released), (1, 1));
        assert!(!counters.live);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_last_clone_tears_down() {
        let (controller, _, compiler) = setup();
        controller.edit_source("\\doc{dropped}");
        drop(controller);

        sleep(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(compiler.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_recompile_resolving_before_debounced_compile_is_installed() {
        let (controller, generator, compiler) = setup();
        controller.edit_source("\\doc{v0}");
        generator.push_source(Duration::from_millis(300), "\\doc{generated}");
        compiler.push_ok(Duration::from_millis(1000), b"manual");
        compiler.push_ok(Duration::from_millis(100), b"debounced");

        let g = controller.clone();
        let generate = tokio::spawn(async move {
            g.generate(PROFILE, JD, GenerationOptions::default()).await
        });
        let m = controller.clone();
        let manual = tokio::spawn(async move { m.recompile().await });

        // manual resolves at t=1000; the debounced compile is issued at t=1100
        sleep(Duration::from_millis(1050)).await;
        settle().await;
        assert!(matches!(
            manual.await.unwrap(),
            Ok(CompileStatus::Installed { epoch: 1, .. })
        ));
        assert_eq!(current_bytes(&controller).as_deref(), Some(&b"manual"[..]));
        generate.await.unwrap().unwrap();

        sleep(Duration::from_millis(500)).await;
        settle().await;
        assert_eq!(
            compiler.calls(),
            vec!["\\doc{v0}".to_string(), "\\doc{generated}".to_string()]
        );
        assert_eq!(current_bytes(&controller).as_deref(), Some(&b"debounced"[..]));
        assert_eq!(controller.status().artifacts.released, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_recompile_resolving_after_debounced_compile_is_discarded() {
        let (controller, generator, compiler) = setup();
        controller.edit_source("\\doc{v0}");
        generator.push_source(Duration::from_millis(300), "\\doc{generated}");
        compiler.push_ok(Duration::from_millis(1500), b"manual");
        compiler.push_ok(Duration::from_millis(100), b"debounced");

        let g = controller.clone();
        let generate = tokio::spawn(async move {
            g.generate(PROFILE, JD, GenerationOptions::default()).await
        });
        let m = controller.clone();
        let manual = tokio::spawn(async move { m.recompile().await });

        generate.await.unwrap().unwrap();
        // debounced compile issued at t=1100 (epoch 2), installed at t=1200;
        // manual (epoch 1) resolves at t=1500
        assert_eq!(
            manual.await.unwrap(),
            Ok(CompileStatus::Superseded { epoch: 1 })
        );
        settle().await;

        assert_eq!(current_bytes(&controller).as_deref(), Some(&b"debounced"[..]));
        let counters = controller.status().artifacts;
        assert_eq!((counters.acquired, counters.released), (2, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recompile_while_generating_sets_both_flags() {
        let (controller, generator, compiler) = setup();
        controller.edit_source("\\doc{v0}");
        generator.push_source(Duration::from_millis(400), "\\doc{next}");
        compiler.push_ok(Duration::from_millis(400), b"pdf");

        let g = controller.clone();
        let generate = tokio::spawn(async move {
            g.generate(PROFILE, JD, GenerationOptions::default()).await
        });
        let m = controller.clone();
        let manual = tokio::spawn(async move { m.recompile().await });

        sleep(Duration::from_millis(100)).await;
        let status = controller.status();
        assert!(status.generating && status.compiling);

        generate.await.unwrap().unwrap();
        manual.await.unwrap().unwrap();
        let status = controller.status();
        assert!(!status.generating && !status.compiling);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_surfaces_network_error() {
        let (controller, _, compiler) = setup_with(ControllerSettings {
            debounce: Duration::from_secs(600),
            request_timeout: Duration::from_secs(3),
        });
        controller.edit_source("\\doc{stuck}");
        compiler.push_ok(Duration::from_secs(60), b"never");

        let result = controller.recompile().await;
        assert!(matches!(result, Err(CompileError::Network(_))));
        let status = controller.status();
        assert!(!status.compiling);
        assert!(status.error.unwrap().contains("timed out"));
    }

    struct RecordingSaver {
        saved: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait::async_trait]
    impl ArtifactSaver for RecordingSaver {
        async fn save(&self, artifact: &ArtifactSnapshot, filename: &str) -> Result<(), SaveError> {
            self.saved
                .lock()
                .push((filename.to_string(), artifact.bytes.to_vec()));
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_without_artifact_is_noop() {
        let (controller, _, _) = setup();
        let saver = RecordingSaver {
            saved: Mutex::new(Vec::new()),
        };
        assert_eq!(controller.download(&saver).await.unwrap(), None);
        assert!(saver.saved.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_uses_fixed_filename_and_leaves_state_alone() {
        let (controller, _, compiler) = setup();
        compiler.push_ok(Duration::ZERO, b"%PDF cv");
        controller.edit_source("\\doc{cv}");
        controller.recompile().await.unwrap();
        let before = controller.status();

        let saver = RecordingSaver {
            saved: Mutex::new(Vec::new()),
        };
        let info = controller.download(&saver).await.unwrap().unwrap();

        assert_eq!(
            *saver.saved.lock(),
            vec![(DOWNLOAD_FILENAME.to_string(), b"%PDF cv".to_vec())]
        );
        assert_eq!(Some(info), before.artifact);
        assert_eq!(controller.status(), before);
    }
}
