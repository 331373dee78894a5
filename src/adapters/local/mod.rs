//! Local pipeline adapter with an explicit model lifecycle.
//!
//! The model moves through [`ModelState`] under a mutex. The first caller of
//! [`LocalModel::load`] performs the load; callers arriving while it runs
//! block on a condvar and share its outcome. A failed load may be retried.

pub mod truncate;

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use crate::error::GenError;
use crate::ports::image_generator::{
    GenerateFuture, GeneratedImage, GenerationRequest, ImageGenerator,
};
use crate::ports::{LoadedPipeline, PipelineLoader};

pub use truncate::{truncate_prompt, MAX_PROMPT_TOKENS};

/// Lifecycle of the local model.
#[derive(Debug)]
pub enum ModelState {
    /// Nothing has been loaded yet.
    Unloaded,
    /// A load is in progress on some thread.
    Loading,
    /// The pipeline is ready to run.
    Ready(Arc<LoadedPipeline>),
    /// The last load attempt failed with this message.
    Failed(String),
}

/// Payload-free view of [`ModelState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelStatus {
    /// Nothing has been loaded yet.
    Unloaded,
    /// A load is in progress.
    Loading,
    /// The pipeline is ready.
    Ready,
    /// The last load failed.
    Failed(String),
}

/// A locally loaded diffusion model.
pub struct LocalModel {
    loader: Box<dyn PipelineLoader>,
    credential: Option<String>,
    state: Mutex<ModelState>,
    settled: Condvar,
}

impl LocalModel {
    /// Wrap `loader`; nothing is loaded until [`LocalModel::load`] runs.
    #[must_use]
    pub fn new(loader: Box<dyn PipelineLoader>, credential: Option<String>) -> Self {
        Self {
            loader,
            credential,
            state: Mutex::new(ModelState::Unloaded),
            settled: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ModelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> ModelStatus {
        match &*self.lock() {
            ModelState::Unloaded => ModelStatus::Unloaded,
            ModelState::Loading => ModelStatus::Loading,
            ModelState::Ready(_) => ModelStatus::Ready,
            ModelState::Failed(msg) => ModelStatus::Failed(msg.clone()),
        }
    }

    /// Load the model if it is not loaded yet.
    ///
    /// Blocks until the model is ready. A call made while another thread is
    /// loading waits for that load instead of starting a second one.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::Load`] if the load this call performed or waited
    /// on failed.
    pub fn load(&self) -> Result<Arc<LoadedPipeline>, GenError> {
        let mut state = self.lock();
        let mut waited = false;
        loop {
            let in_progress = match &*state {
                ModelState::Ready(pipeline) => return Ok(Arc::clone(pipeline)),
                ModelState::Failed(msg) if waited => return Err(GenError::Load(msg.clone())),
                ModelState::Loading => true,
                ModelState::Unloaded | ModelState::Failed(_) => false,
            };
            if !in_progress {
                break;
            }
            waited = true;
            state = self.settled.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        *state = ModelState::Loading;
        drop(state);

        info!("Loading Stable Diffusion model");
        let mut guard = LoadingGuard { model: self, settled: false };
        let outcome = self.loader.load(self.credential.as_deref());

        let mut state = self.lock();
        let result = match outcome {
            Ok(pipeline) => {
                let pipeline = Arc::new(pipeline);
                *state = ModelState::Ready(Arc::clone(&pipeline));
                info!("Model loaded");
                Ok(pipeline)
            }
            Err(msg) => {
                warn!(error = %msg, "Model load failed");
                *state = ModelState::Failed(msg.clone());
                Err(GenError::Load(msg))
            }
        };
        guard.settled = true;
        drop(state);
        self.settled.notify_all();
        result
    }

    /// Bound `text` to [`MAX_PROMPT_TOKENS`] tokens of the model's tokenizer.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::NotReady`] unless the model is loaded.
    pub fn truncate(&self, text: &str) -> Result<String, GenError> {
        let pipeline = match &*self.lock() {
            ModelState::Ready(pipeline) => Arc::clone(pipeline),
            _ => return Err(GenError::NotReady),
        };
        Ok(truncate_prompt(pipeline.tokenizer.as_ref(), text, MAX_PROMPT_TOKENS))
    }

    /// Load if needed, truncate both prompts, and run the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::Load`] if the model cannot be loaded and
    /// [`GenError::Pipeline`] if the run fails.
    pub fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage, GenError> {
        let pipeline = self.load()?;

        let prompt = self.truncate(&request.prompt)?;
        let negative_prompt = self.truncate(&request.negative_prompt)?;
        if prompt != request.prompt {
            info!(
                original_chars = request.prompt.chars().count(),
                "Prompt was truncated due to token limit"
            );
        }

        let truncated = GenerationRequest { prompt, negative_prompt, ..request.clone() };
        let image = pipeline.pipeline.run(&truncated).map_err(GenError::Pipeline)?;
        Ok(GeneratedImage { image })
    }
}

/// Marks the model failed if the loader unwinds before settling the state.
struct LoadingGuard<'a> {
    model: &'a LocalModel,
    settled: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            *self.model.lock() = ModelState::Failed("model loader panicked".to_string());
            self.model.settled.notify_all();
        }
    }
}

/// [`ImageGenerator`] backed by a [`LocalModel`].
pub struct LocalGenerator {
    model: Arc<LocalModel>,
}

impl LocalGenerator {
    /// Create a generator that runs on `model`.
    #[must_use]
    pub fn new(model: Arc<LocalModel>) -> Self {
        Self { model }
    }
}

impl ImageGenerator for LocalGenerator {
    fn generate(&self, request: &GenerationRequest) -> GenerateFuture<'_> {
        let model = Arc::clone(&self.model);
        let request = request.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || model.generate(&request))
                .await
                .map_err(|e| GenError::Pipeline(format!("pipeline task failed: {e}")))?
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::thread;
    use std::time::Duration;

    use image::DynamicImage;

    use super::truncate::tests::CharTokenizer;
    use super::*;
    use crate::ports::DiffusionPipeline;

    /// Records the last request it ran and returns a blank image.
    struct RecordingPipeline {
        last: Arc<StdMutex<Option<GenerationRequest>>>,
    }

    impl DiffusionPipeline for RecordingPipeline {
        fn run(&self, request: &GenerationRequest) -> Result<DynamicImage, String> {
            *self.last.lock().unwrap() = Some(request.clone());
            Ok(DynamicImage::new_rgb8(64, 32))
        }
    }

    struct FailingPipeline;

    impl DiffusionPipeline for FailingPipeline {
        fn run(&self, _request: &GenerationRequest) -> Result<DynamicImage, String> {
            Err("out of memory".into())
        }
    }

    struct FakeLoader {
        calls: Arc<AtomicUsize>,
        fail_first: usize,
        delay: Duration,
        seen_credential: Arc<StdMutex<Option<String>>>,
        last_request: Arc<StdMutex<Option<GenerationRequest>>>,
        failing_pipeline: bool,
    }

    impl FakeLoader {
        fn new() -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                fail_first: 0,
                delay: Duration::ZERO,
                seen_credential: Arc::new(StdMutex::new(None)),
                last_request: Arc::new(StdMutex::new(None)),
                failing_pipeline: false,
            }
        }
    }

    impl PipelineLoader for FakeLoader {
        fn load(&self, credential: Option<&str>) -> Result<LoadedPipeline, String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen_credential.lock().unwrap() = credential.map(str::to_string);
            thread::sleep(self.delay);
            if call < self.fail_first {
                return Err("weights not found".into());
            }
            let pipeline: Box<dyn DiffusionPipeline> = if self.failing_pipeline {
                Box::new(FailingPipeline)
            } else {
                Box::new(RecordingPipeline { last: Arc::clone(&self.last_request) })
            };
            Ok(LoadedPipeline { tokenizer: Box::new(CharTokenizer), pipeline })
        }
    }

    #[test]
    fn truncate_before_load_is_not_ready() {
        let model = LocalModel::new(Box::new(FakeLoader::new()), None);
        assert!(matches!(model.truncate("a cat"), Err(GenError::NotReady)));
        assert_eq!(model.status(), ModelStatus::Unloaded);
    }

    #[test]
    fn load_is_idempotent() {
        let loader = FakeLoader::new();
        let calls = Arc::clone(&loader.calls);
        let model = LocalModel::new(Box::new(loader), None);

        model.load().unwrap();
        model.load().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(model.status(), ModelStatus::Ready);
        assert_eq!(model.truncate("a cat").unwrap(), "a cat");
    }

    #[test]
    fn credential_is_passed_to_loader() {
        let loader = FakeLoader::new();
        let seen = Arc::clone(&loader.seen_credential);
        let model = LocalModel::new(Box::new(loader), Some("hf_abc".into()));
        model.load().unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("hf_abc"));
    }

    #[test]
    fn concurrent_loads_share_one_attempt() {
        let mut loader = FakeLoader::new();
        loader.delay = Duration::from_millis(100);
        let calls = Arc::clone(&loader.calls);
        let model = Arc::new(LocalModel::new(Box::new(loader), None));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let model = Arc::clone(&model);
                thread::spawn(move || model.load().is_ok())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_load_reports_and_can_retry() {
        let mut loader = FakeLoader::new();
        loader.fail_first = 1;
        let calls = Arc::clone(&loader.calls);
        let model = LocalModel::new(Box::new(loader), None);

        let err = model.load().unwrap_err();
        assert!(matches!(err, GenError::Load(ref m) if m == "weights not found"));
        assert_eq!(model.status(), ModelStatus::Failed("weights not found".into()));
        assert!(matches!(model.truncate("x"), Err(GenError::NotReady)));

        model.load().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(model.status(), ModelStatus::Ready);
    }

    #[test]
    fn ready_state_debug_hides_runtime() {
        let model = LocalModel::new(Box::new(FakeLoader::new()), None);
        let loaded = model.load().unwrap();
        assert_eq!(format!("{loaded:?}"), "LoadedPipeline { .. }");
        assert!(format!("{:?}", *model.lock()).starts_with("Ready("));
    }

    #[test]
    fn generate_truncates_both_prompts() {
        let loader = FakeLoader::new();
        let last = Arc::clone(&loader.last_request);
        let model = LocalModel::new(Box::new(loader), None);

        let request = GenerationRequest {
            prompt: "p".repeat(200),
            steps: 28,
            guidance_scale: 3.5,
            negative_prompt: "n".repeat(100),
        };
        let image = model.generate(&request).unwrap();
        assert_eq!((image.width(), image.height()), (64, 32));

        let ran = last.lock().unwrap().clone().unwrap();
        assert_eq!(ran.prompt, "p".repeat(MAX_PROMPT_TOKENS));
        assert_eq!(ran.negative_prompt, "n".repeat(MAX_PROMPT_TOKENS));
        assert_eq!(ran.steps, 28);
    }

    #[test]
    fn generate_surfaces_load_error() {
        let mut loader = FakeLoader::new();
        loader.fail_first = usize::MAX;
        let model = LocalModel::new(Box::new(loader), None);
        let err = model.generate(&GenerationRequest::new("a cat")).unwrap_err();
        assert!(matches!(err, GenError::Load(_)));
    }

    #[tokio::test]
    async fn local_generator_runs_pipeline() {
        let model = Arc::new(LocalModel::new(Box::new(FakeLoader::new()), None));
        let generator = LocalGenerator::new(model);
        let image = generator.generate(&GenerationRequest::new("a cat")).await.unwrap();
        assert_eq!(image.width(), 64);
    }

    #[tokio::test]
    async fn local_generator_pipeline_failure() {
        let mut loader = FakeLoader::new();
        loader.failing_pipeline = true;
        let generator = LocalGenerator::new(Arc::new(LocalModel::new(Box::new(loader), None)));
        let err = generator.generate(&GenerationRequest::new("a cat")).await.unwrap_err();
        assert!(matches!(err, GenError::Pipeline(ref m) if m == "out of memory"));
    }
}
