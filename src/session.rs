//! Interactive front-end: one form, one submit, one outcome.
//!
//! [`Session::submit`] is the only place failures are caught. Whatever goes
//! wrong, the caller gets an image to show and a status line.

use std::path::PathBuf;

use image::{DynamicImage, Rgb, RgbImage};
use tracing::{info, warn};

use crate::error::GenError;
use crate::output::{save_image_with_timestamp, SavedArtifact};
use crate::params::{
    validate_interactive_guidance, validate_interactive_steps, DEFAULT_NEGATIVE_PROMPT,
    INTERACTIVE_GUIDANCE_SCALE, INTERACTIVE_STEPS,
};
use crate::ports::{GenerationRequest, ImageGenerator};

/// Side length of the placeholder shown after a failure.
pub const PLACEHOLDER_SIZE: u32 = 512;

/// Fill color of the placeholder shown after a failure.
pub const PLACEHOLDER_COLOR: [u8; 3] = [255, 200, 200];

/// What the front-end displays after a submit.
#[derive(Debug)]
pub struct Outcome {
    /// The generated image, or the placeholder on failure.
    pub image: DynamicImage,
    /// Status line for the user.
    pub message: String,
    /// Where the image was saved, if it was.
    pub artifact: Option<SavedArtifact>,
}

impl Outcome {
    /// Whether the submit produced and saved an image.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.artifact.is_some()
    }
}

/// Flat-color image shown in place of a failed generation.
#[must_use]
pub fn placeholder_image() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(
        PLACEHOLDER_SIZE,
        PLACEHOLDER_SIZE,
        Rgb(PLACEHOLDER_COLOR),
    ))
}

/// A front-end session bound to one generator and output directory.
pub struct Session {
    generator: Box<dyn ImageGenerator>,
    output_dir: PathBuf,
}

impl Session {
    /// Create a session saving into `output_dir`.
    pub fn new(generator: Box<dyn ImageGenerator>, output_dir: impl Into<PathBuf>) -> Self {
        Self { generator, output_dir: output_dir.into() }
    }

    /// Generate and save one image. Never fails.
    pub async fn submit(&self, request: &GenerationRequest) -> Outcome {
        match self.try_submit(request).await {
            Ok((image, artifact)) => {
                let message = format!("Image saved to {}", artifact.filepath.display());
                info!(path = %artifact.filepath.display(), "generation succeeded");
                Outcome { image, message, artifact: Some(artifact) }
            }
            Err(e) => {
                warn!(error = %e, "generation failed");
                Outcome { image: placeholder_image(), message: format!("Error: {e}"), artifact: None }
            }
        }
    }

    async fn try_submit(
        &self,
        request: &GenerationRequest,
    ) -> Result<(DynamicImage, SavedArtifact), GenError> {
        let generated = self.generator.generate(request).await?;
        let artifact = save_image_with_timestamp(&generated.image, &request.prompt, &self.output_dir)?;
        Ok((generated.image, artifact))
    }
}

/// Editable form state of the interactive front-end.
#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    /// Inference steps, kept within the interactive range.
    pub steps: u32,
    /// Guidance scale, kept within the interactive range.
    pub guidance_scale: f64,
    /// Negative prompt sent with every request.
    pub negative_prompt: String,
}

impl Default for Form {
    fn default() -> Self {
        Self {
            steps: INTERACTIVE_STEPS,
            guidance_scale: INTERACTIVE_GUIDANCE_SCALE,
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
        }
    }
}

/// A parsed line of interactive input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Generate an image for this prompt.
    Generate(String),
    /// The form was updated; carries a confirmation line.
    Updated(String),
    /// Print the current form.
    Show,
    /// Leave the session.
    Quit,
    /// Nothing to do (blank line).
    Empty,
}

impl Form {
    /// Build a request for `prompt` from the current form values.
    #[must_use]
    pub fn request(&self, prompt: &str) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.to_string(),
            steps: self.steps,
            guidance_scale: self.guidance_scale,
            negative_prompt: self.negative_prompt.clone(),
        }
    }

    /// Apply one line of input.
    ///
    /// Lines starting with `:` edit the form; anything else is a prompt.
    ///
    /// # Errors
    ///
    /// Returns a message for unknown commands or out-of-range values.
    pub fn apply(&mut self, line: &str) -> Result<Command, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Command::Empty);
        }
        let Some(rest) = line.strip_prefix(':') else {
            return Ok(Command::Generate(line.to_string()));
        };

        let (name, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let arg = arg.trim();
        match name {
            "steps" => {
                let steps: u32 =
                    arg.parse().map_err(|_| format!("Not a whole number: '{arg}'"))?;
                validate_interactive_steps(steps)?;
                self.steps = steps;
                Ok(Command::Updated(format!("steps = {steps}")))
            }
            "guidance" => {
                let scale: f64 = arg.parse().map_err(|_| format!("Not a number: '{arg}'"))?;
                validate_interactive_guidance(scale)?;
                self.guidance_scale = scale;
                Ok(Command::Updated(format!("guidance scale = {scale}")))
            }
            "negative" => {
                self.negative_prompt = arg.to_string();
                Ok(Command::Updated(format!("negative prompt = '{arg}'")))
            }
            "show" => Ok(Command::Show),
            "quit" | "q" => Ok(Command::Quit),
            other => Err(format!(
                "Unknown command ':{other}'. Commands: :steps N, :guidance X, :negative TEXT, :show, :quit"
            )),
        }
    }
}
