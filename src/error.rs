//! Unified error type for sdgen.

use thiserror::Error;

/// Errors that can occur while generating or saving an image.
#[derive(Debug, Error)]
pub enum GenError {
    /// The generation backend answered with a non-success status.
    #[error("Error generating image ({status}): {body}")]
    Service {
        /// HTTP status code.
        status: u16,
        /// Raw response body, passed through verbatim.
        body: String,
    },

    /// A network error occurred.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body could not be decoded as an image.
    #[error("Image decode error: {0}")]
    Decode(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The local model or its weights failed to load.
    #[error("Model load failed: {0}")]
    Load(String),

    /// The tokenizer was used before the model finished loading.
    #[error("Model is not loaded; load it before generating")]
    NotReady,

    /// The local pipeline failed while producing an image.
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// A failure served from a cassette, with its recorded message.
    #[error("{0}")]
    Replayed(String),
}

impl GenError {
    /// Process exit code for this error kind.
    ///
    /// Codes `1` and `2` stay reserved for generic failures and clap usage errors.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Service { .. } | Self::Replayed(_) => 3,
            Self::Network(_) => 4,
            Self::Decode(_) => 5,
            Self::Io(_) => 6,
            Self::Config(_) => 7,
            Self::InvalidArgument(_) => 8,
            Self::Load(_) => 9,
            Self::NotReady => 10,
            Self::Pipeline(_) => 11,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_carries_body() {
        let err = GenError::Service { status: 500, body: "oops".into() };
        assert!(err.to_string().contains("oops"));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn exit_codes_are_distinct() {
        let network = reqwest::Client::new().get("http://[::1").build().unwrap_err();
        let errors = [
            GenError::Service { status: 500, body: String::new() },
            GenError::Network(network),
            GenError::Decode(String::new()),
            GenError::Io(std::io::Error::other("x")),
            GenError::Config(String::new()),
            GenError::InvalidArgument(String::new()),
            GenError::Load(String::new()),
            GenError::NotReady,
            GenError::Pipeline(String::new()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(GenError::exit_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(codes.iter().all(|&c| c > 2));
    }

    #[test]
    fn network_error_exit_code() {
        let err: GenError = reqwest::Client::new().get("http://[::1").build().unwrap_err().into();
        assert!(matches!(err, GenError::Network(_)));
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().starts_with("Network error"));
    }
}
