//! Image generator port for Stable Diffusion backends.

use std::future::Future;
use std::pin::Pin;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::GenError;
use crate::params::{DEFAULT_GUIDANCE_SCALE, DEFAULT_NEGATIVE_PROMPT, DEFAULT_STEPS};

/// A single text-to-image request.
///
/// Field names follow the `/predict` wire body, so the struct serializes
/// directly into the request JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The text prompt describing the desired image.
    pub prompt: String,
    /// Number of denoising steps.
    #[serde(rename = "num_inference_steps")]
    pub steps: u32,
    /// How closely the image follows the prompt.
    pub guidance_scale: f64,
    /// Attributes to steer the image away from.
    pub negative_prompt: String,
}

impl GenerationRequest {
    /// Build a request with the one-shot CLI defaults.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            steps: DEFAULT_STEPS,
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
        }
    }
}

/// A decoded image returned by a generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// The decoded raster image, owned by the caller.
    #[serde(with = "png_base64")]
    pub image: DynamicImage,
}

impl GeneratedImage {
    /// Decode raw encoded image bytes (PNG, JPEG, ...).
    ///
    /// # Errors
    ///
    /// Returns [`GenError::Decode`] if the bytes are not a supported image.
    pub fn decode(data: &[u8]) -> Result<Self, GenError> {
        let image = image::load_from_memory(data)
            .map_err(|e| GenError::Decode(format!("Failed to decode image: {e}")))?;
        Ok(Self { image })
    }

    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Boxed future type returned by [`ImageGenerator::generate`].
pub type GenerateFuture<'a> =
    Pin<Box<dyn Future<Output = Result<GeneratedImage, GenError>> + Send + 'a>>;

/// Generates an image from a text prompt.
pub trait ImageGenerator: Send + Sync {
    /// Generate one image for the given request.
    fn generate(&self, request: &GenerationRequest) -> GenerateFuture<'_>;
}

/// Serde helper storing images as base64-encoded PNG in cassettes.
mod png_base64 {
    use std::io::Cursor;

    use base64::Engine;
    use image::{DynamicImage, ImageFormat};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize an image as a base64 PNG string.
    pub fn serialize<S: Serializer>(image: &DynamicImage, serializer: S) -> Result<S::Ok, S::Error> {
        let mut buf = Cursor::new(Vec::new());
        image
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(<S::Error as serde::ser::Error>::custom)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(buf.into_inner());
        serializer.serialize_str(&encoded)
    }

    /// Deserialize a base64 string into a decoded image.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DynamicImage, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&s)
            .map_err(<D::Error as serde::de::Error>::custom)?;
        image::load_from_memory(&bytes).map_err(serde::de::Error::custom)
    }
}
