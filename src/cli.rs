//! CLI argument parsing with clap.

use clap::Parser;

use crate::config::Config;
use crate::params::{validate_interactive_guidance, validate_interactive_steps};
use crate::ports::GenerationRequest;
use crate::session::Form;

/// Generate an image using Stable Diffusion.
#[derive(Parser, Debug)]
#[command(name = "sdgen", version, about)]
pub struct Cli {
    /// Text prompt for image generation.
    #[arg(required_unless_present = "interactive")]
    pub prompt: Option<String>,

    /// Directory to save generated images [default: generated_images].
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Number of denoising steps [default: 20].
    #[arg(short, long)]
    pub steps: Option<u32>,

    /// How closely to follow the prompt [default: 7.5].
    #[arg(short, long)]
    pub guidance_scale: Option<f64>,

    /// What to avoid in the image.
    #[arg(short, long)]
    pub negative_prompt: Option<String>,

    /// Generation service base URL [default: http://localhost:8000].
    #[arg(short, long)]
    pub base_url: Option<String>,

    /// Config file path override.
    #[arg(long)]
    pub config: Option<String>,

    /// Read prompts from stdin and generate one image per line.
    ///
    /// Explicit `--steps`, `--guidance-scale` and `--negative-prompt` seed the
    /// form; a positional prompt is generated first.
    #[arg(short, long)]
    pub interactive: bool,

    /// Verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Output directory, falling back to the configured default.
    #[must_use]
    pub fn resolve_output_dir(&self, config: &Config) -> String {
        self.output_dir.clone().unwrap_or_else(|| config.defaults.output_dir.clone())
    }

    /// Build the one-shot request, falling back to configured defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if no prompt was given.
    pub fn build_request(&self, config: &Config) -> Result<GenerationRequest, String> {
        let prompt = self.prompt.clone().ok_or_else(|| "A prompt is required".to_string())?;
        Ok(GenerationRequest {
            prompt,
            steps: self.steps.unwrap_or(config.defaults.steps),
            guidance_scale: self.guidance_scale.unwrap_or(config.defaults.guidance_scale),
            negative_prompt: self
                .negative_prompt
                .clone()
                .unwrap_or_else(|| config.defaults.negative_prompt.clone()),
        })
    }

    /// Build the interactive form, seeded from explicit flags.
    ///
    /// Steps and guidance start at the front-end defaults unless given on the
    /// command line; the configured `[defaults]` steps and guidance belong to
    /// one-shot runs. The negative prompt falls back to the config.
    ///
    /// # Errors
    ///
    /// Returns an error if a flag lies outside the interactive slider range.
    pub fn build_form(&self, config: &Config) -> Result<Form, String> {
        let mut form = Form {
            negative_prompt: self
                .negative_prompt
                .clone()
                .unwrap_or_else(|| config.defaults.negative_prompt.clone()),
            ..Form::default()
        };
        if let Some(steps) = self.steps {
            validate_interactive_steps(steps)?;
            form.steps = steps;
        }
        if let Some(scale) = self.guidance_scale {
            validate_interactive_guidance(scale)?;
            form.guidance_scale = scale;
        }
        Ok(form)
    }
}
