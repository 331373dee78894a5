//! Replaying adapter for the `ImageGenerator` port.

use std::sync::{Arc, Mutex};

use super::{next_output, replay_result, Replayed};
use crate::cassette::replayer::CassetteReplayer;
use crate::cassette::{GENERATE_METHOD, IMAGE_GENERATOR_PORT};
use crate::error::GenError;
use crate::ports::image_generator::{
    GenerateFuture, GeneratedImage, GenerationRequest, ImageGenerator,
};

/// Serves recorded generation results from a cassette.
pub struct ReplayingImageGenerator {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingImageGenerator {
    /// Create a replaying generator backed by the given replayer.
    #[must_use]
    pub fn new(replayer: Arc<Mutex<CassetteReplayer>>) -> Self {
        Self { replayer }
    }
}

impl ImageGenerator for ReplayingImageGenerator {
    fn generate(&self, _request: &GenerationRequest) -> GenerateFuture<'_> {
        let output = next_output(&self.replayer, IMAGE_GENERATOR_PORT, GENERATE_METHOD);
        Box::pin(async move {
            let output = output.map_err(GenError::Config)?;
            match replay_result::<GeneratedImage>(output) {
                Ok(Replayed::Ok(image)) => Ok(image),
                Ok(Replayed::Err(msg)) => Err(GenError::Replayed(msg)),
                Err(e) => Err(GenError::Config(format!("Malformed cassette output: {e}"))),
            }
        })
    }
}
