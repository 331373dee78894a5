//! Builds a cassette in memory and writes it out when the session ends.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use super::format::{Cassette, Interaction};
use super::IMAGE_GENERATOR_PORT;

/// Accumulates generator interactions for one CLI session.
#[derive(Debug)]
pub struct CassetteRecorder {
    path: PathBuf,
    cassette: Cassette,
}

impl CassetteRecorder {
    /// Create a recorder that will write to `path`.
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        commit: impl Into<String>,
    ) -> Self {
        let cassette = Cassette {
            name: name.into(),
            recorded_at: Utc::now(),
            commit: commit.into(),
            interactions: Vec::new(),
        };
        Self { path: path.into(), cassette }
    }

    /// Recorder for one session stamped `stamp` under `root`.
    ///
    /// Writes `{root}/{stamp}/image_generator.cassette.yaml`.
    pub fn for_session(root: &Path, stamp: &str, commit: impl Into<String>) -> Self {
        let path = root.join(stamp).join(format!("{IMAGE_GENERATOR_PORT}.cassette.yaml"));
        Self::new(path, format!("{stamp}-{IMAGE_GENERATOR_PORT}"), commit)
    }

    /// Where [`CassetteRecorder::finish`] will write.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one interaction, numbered in call order.
    pub fn record(
        &mut self,
        port: &str,
        method: &str,
        input: serde_json::Value,
        output: serde_json::Value,
    ) {
        let seq = u64::try_from(self.cassette.interactions.len()).unwrap_or(u64::MAX);
        debug!(seq, %port, %method, "recorded interaction");
        self.cassette.interactions.push(Interaction {
            seq,
            port: port.to_string(),
            method: method.to_string(),
            input,
            output,
        });
    }

    /// Number of interactions recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cassette.interactions.len()
    }

    /// Whether no generator call has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cassette.interactions.is_empty()
    }

    /// Stamp the cassette and write it as YAML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn finish(mut self) -> Result<PathBuf, std::io::Error> {
        self.cassette.recorded_at = Utc::now();
        let yaml = serde_yaml::to_string(&self.cassette).map_err(std::io::Error::other)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, yaml)?;
        debug!(path = %self.path.display(), interactions = self.len(), "cassette written");
        Ok(self.path)
    }
}
