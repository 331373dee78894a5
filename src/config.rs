//! Configuration file loading with environment variable overrides.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::params::{
    DEFAULT_BASE_URL, DEFAULT_GUIDANCE_SCALE, DEFAULT_NEGATIVE_PROMPT, DEFAULT_OUTPUT_DIR,
    DEFAULT_STEPS,
};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Generation service settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Credentials for model hosting.
    #[serde(default)]
    pub keys: KeysConfig,

    /// Default parameter values, used when the matching CLI flag is absent.
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Generation service settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL; requests go to `{base_url}/predict`.
    pub base_url: String,
    /// Optional bearer token for the service.
    pub api_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_BASE_URL.to_string(), api_token: None }
    }
}

/// Credentials for model hosting.
#[derive(Debug, Default, Deserialize)]
pub struct KeysConfig {
    /// Hugging Face token used when loading a local pipeline.
    pub hf_token: Option<String>,
}

/// Default parameter values from the config file.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Default inference steps.
    pub steps: u32,
    /// Default guidance scale.
    pub guidance_scale: f64,
    /// Default negative prompt.
    pub negative_prompt: String,
    /// Default output directory.
    pub output_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            steps: DEFAULT_STEPS,
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the given path, or return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
    }

    /// Service base URL, preferring `SDGEN_BASE_URL`.
    #[must_use]
    pub fn base_url(&self) -> String {
        std::env::var("SDGEN_BASE_URL").unwrap_or_else(|_| self.server.base_url.clone())
    }

    /// Service bearer token, preferring `SDGEN_API_TOKEN`.
    #[must_use]
    pub fn api_token(&self) -> Option<String> {
        std::env::var("SDGEN_API_TOKEN").ok().or_else(|| self.server.api_token.clone())
    }

    /// Hugging Face token, preferring `HF_TOKEN`.
    #[must_use]
    pub fn hf_token(&self) -> Option<String> {
        std::env::var("HF_TOKEN").ok().or_else(|| self.keys.hf_token.clone())
    }
}

/// Discover the config file path using the resolution order:
/// 1. Explicit path (from `--config` flag)
/// 2. `SDGEN_CONFIG` environment variable
/// 3. `~/.config/sdgen/config.toml`
#[must_use]
pub fn discover_config_path(explicit: Option<&str>) -> PathBuf {
    if let Some(p) = explicit {
        return PathBuf::from(p);
    }

    if let Ok(p) = std::env::var("SDGEN_CONFIG") {
        return PathBuf::from(p);
    }

    default_config_path()
}

/// Default config path: `~/.config/sdgen/config.toml`.
fn default_config_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config/sdgen/config.toml")
    } else {
        PathBuf::from("sdgen.toml")
    }
}
