//! Record/replay infrastructure for deterministic testing.

pub mod config;
pub mod format;
pub mod recorder;
pub mod replayer;

/// Port name under which generator interactions are recorded.
pub const IMAGE_GENERATOR_PORT: &str = "image_generator";

/// Method name of [`crate::ports::ImageGenerator::generate`] in cassettes.
pub const GENERATE_METHOD: &str = "generate";
