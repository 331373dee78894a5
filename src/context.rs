//! Service context that bundles the generator trait object.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::adapters::live::remote::RemoteGenerator;
use crate::adapters::local::{LocalGenerator, LocalModel};
use crate::adapters::recording::image_generator::RecordingImageGenerator;
use crate::adapters::replaying::image_generator::ReplayingImageGenerator;
use crate::cassette::config::load_cassette;
use crate::cassette::recorder::CassetteRecorder;
use crate::config::Config;
use crate::error::GenError;
use crate::ports::{ImageGenerator, PipelineLoader};

/// Directory, relative to the working directory, that recordings land in.
pub const CASSETTE_ROOT: &str = ".sdgen/cassettes";

/// Bundles the generator port behind one handle.
pub struct ServiceContext {
    /// Image generator port.
    pub generator: Box<dyn ImageGenerator>,
}

/// Handle to a recording session that must be finished after use.
pub struct RecordingSession {
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingSession {
    /// Finish the recording and write the cassette file to disk.
    ///
    /// Every generator built by [`ServiceContext::recording`] must be dropped
    /// first. Returns `Ok(None)` when nothing was recorded, leaving no file
    /// behind.
    ///
    /// # Errors
    ///
    /// Returns an error if a generator still holds the recorder or the
    /// cassette file cannot be written.
    pub fn finish(self) -> Result<Option<PathBuf>, String> {
        let recorder = Arc::try_unwrap(self.recorder)
            .map_err(|_| "Recording adapter still has references".to_string())?
            .into_inner()
            .map_err(|e| format!("Recorder lock poisoned: {e}"))?;
        if recorder.is_empty() {
            debug!(path = %recorder.path().display(), "nothing recorded, skipping cassette");
            return Ok(None);
        }
        recorder.finish().map(Some).map_err(|e| format!("Failed to write cassette: {e}"))
    }
}

impl ServiceContext {
    /// Create a live context talking to the configured HTTP service.
    #[must_use]
    pub fn live(config: &Config, base_url: Option<&str>) -> Self {
        let base_url = base_url.map_or_else(|| config.base_url(), str::to_string);
        let generator = RemoteGenerator::new(&base_url).with_api_token(config.api_token());
        Self { generator: Box::new(generator) }
    }

    /// Create a context that runs a locally loaded pipeline.
    ///
    /// The returned model handle lets a front-end trigger the load ahead of
    /// the first generation.
    #[must_use]
    pub fn local(loader: Box<dyn PipelineLoader>, config: &Config) -> (Self, Arc<LocalModel>) {
        let model = Arc::new(LocalModel::new(loader, config.hf_token()));
        let generator = LocalGenerator::new(Arc::clone(&model));
        (Self { generator: Box::new(generator) }, model)
    }

    /// Wrap this context's generator with a cassette recorder writing under
    /// `.sdgen/cassettes`.
    #[must_use]
    pub fn recording(self) -> (Self, RecordingSession) {
        self.recording_under(Path::new(CASSETTE_ROOT))
    }

    /// Like [`ServiceContext::recording`], with the cassette root at `root`.
    #[must_use]
    pub fn recording_under(self, root: &Path) -> (Self, RecordingSession) {
        let stamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string();
        let recorder =
            Arc::new(Mutex::new(CassetteRecorder::for_session(root, &stamp, get_commit_hash())));

        let recording_gen = RecordingImageGenerator::new(self.generator, Arc::clone(&recorder));
        (Self { generator: Box::new(recording_gen) }, RecordingSession { recorder })
    }

    /// Create a replaying context from a cassette file.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette file cannot be loaded.
    pub fn replaying(path: &Path) -> Result<Self, GenError> {
        let replayer = load_cassette(path)
            .map_err(|e| GenError::Config(format!("Failed to load cassette: {e}")))?;
        let replayer = Arc::new(Mutex::new(replayer));
        let generator = Box::new(ReplayingImageGenerator::new(replayer));
        Ok(Self { generator })
    }
}

/// Get the current git commit hash, or "unknown" if unavailable.
fn get_commit_hash() -> String {
    std::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map_or_else(|| "unknown".to_string(), |s| s.trim().to_string())
}
