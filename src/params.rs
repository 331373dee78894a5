//! Generation parameter defaults and validation.

use std::ops::RangeInclusive;

/// Default generation endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default directory for saved images.
pub const DEFAULT_OUTPUT_DIR: &str = "generated_images";

/// Default negative prompt, shared by the CLI and the interactive front-end.
pub const DEFAULT_NEGATIVE_PROMPT: &str =
    "low quality, bad anatomy, worst quality, low resolution";

/// Inference steps used by one-shot CLI runs.
pub const DEFAULT_STEPS: u32 = 20;

/// Guidance scale used by one-shot CLI runs.
pub const DEFAULT_GUIDANCE_SCALE: f64 = 7.5;

/// Inference steps preselected in the interactive front-end.
pub const INTERACTIVE_STEPS: u32 = 28;

/// Guidance scale preselected in the interactive front-end.
pub const INTERACTIVE_GUIDANCE_SCALE: f64 = 3.5;

/// Range of the interactive steps control.
pub const STEPS_RANGE: RangeInclusive<u32> = 1..=50;

/// Range of the interactive guidance control.
pub const GUIDANCE_RANGE: RangeInclusive<f64> = 1.0..=15.0;

/// Validate the number of inference steps.
///
/// The backend owns the real limits; this only rejects values no backend
/// could accept.
///
/// # Errors
///
/// Returns an error if `steps` is zero.
pub fn validate_steps(steps: u32) -> Result<(), String> {
    if steps == 0 {
        Err("Steps must be a positive integer".to_string())
    } else {
        Ok(())
    }
}

/// Validate the guidance scale.
///
/// # Errors
///
/// Returns an error if the scale is not a positive finite number.
pub fn validate_guidance_scale(scale: f64) -> Result<(), String> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        Err(format!("Guidance scale must be a positive number, got {scale}"))
    }
}

/// Validate a steps value entered in the interactive front-end.
///
/// # Errors
///
/// Returns an error if the value is outside [`STEPS_RANGE`].
pub fn validate_interactive_steps(steps: u32) -> Result<(), String> {
    if STEPS_RANGE.contains(&steps) {
        Ok(())
    } else {
        Err(format!(
            "Steps must be between {} and {}, got {steps}",
            STEPS_RANGE.start(),
            STEPS_RANGE.end()
        ))
    }
}

/// Validate a guidance value entered in the interactive front-end.
///
/// # Errors
///
/// Returns an error if the value is outside [`GUIDANCE_RANGE`].
pub fn validate_interactive_guidance(scale: f64) -> Result<(), String> {
    if GUIDANCE_RANGE.contains(&scale) {
        Ok(())
    } else {
        Err(format!(
            "Guidance scale must be between {} and {}, got {scale}",
            GUIDANCE_RANGE.start(),
            GUIDANCE_RANGE.end()
        ))
    }
}
