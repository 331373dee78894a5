//! Ports for a locally loaded diffusion pipeline.
//!
//! The model itself lives in an external ML runtime. These traits are the
//! fixed surface sdgen drives it through.

use std::fmt;

use image::DynamicImage;

use super::image_generator::GenerationRequest;

/// Subword tokenizer of the pipeline's text encoder.
pub trait Tokenizer: Send + Sync {
    /// Encode text into token ids.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Decode token ids back into text.
    fn decode(&self, tokens: &[u32]) -> String;
}

/// A loaded text-to-image pipeline.
pub trait DiffusionPipeline: Send + Sync {
    /// Run the pipeline for an already truncated request.
    ///
    /// # Errors
    ///
    /// Returns a description of the failure reported by the runtime.
    fn run(&self, request: &GenerationRequest) -> Result<DynamicImage, String>;
}

/// Everything produced by a successful model load.
pub struct LoadedPipeline {
    /// Tokenizer used for prompt truncation.
    pub tokenizer: Box<dyn Tokenizer>,
    /// The pipeline that produces images.
    pub pipeline: Box<dyn DiffusionPipeline>,
}

impl fmt::Debug for LoadedPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedPipeline").finish_non_exhaustive()
    }
}

/// Loads model weights into a runnable pipeline.
pub trait PipelineLoader: Send + Sync {
    /// Load the model, authenticating with `credential` when one is set.
    ///
    /// This blocks for as long as the download and weight upload take.
    ///
    /// # Errors
    ///
    /// Returns a description of why the model could not be loaded.
    fn load(&self, credential: Option<&str>) -> Result<LoadedPipeline, String>;
}
