//! sdgen - Stable Diffusion client.
//!
//! Sends generation requests to an HTTP service (or a locally loaded
//! pipeline), decodes the returned image, and saves it under a timestamped,
//! prompt-derived filename.

pub mod adapters;
pub mod cassette;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod output;
pub mod params;
pub mod ports;
pub mod session;

pub use error::GenError;
