//! Error types for the QR rendering pipeline.
//!
//! Each stage of the pipeline owns its own error enum. [`PipelineError`] ties
//! them together and decides what the caller gets to see.

use thiserror::Error;

/// Generic body returned for every server-side failure.
pub const GENERIC_FAILURE: &str = "Error generating QR code";

/// Caller input that cannot be turned into a [`RenderRequest`](crate::params::RenderRequest).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `data` was absent or blank while the strict payload policy is active.
    #[error("Parameter 'data' is required.")]
    MissingPayload,

    /// `width` or `height` parsed to zero or a negative number.
    #[error("Width and height must be positive integers.")]
    InvalidDimensions,
}

/// The payload and parameter combination has no QR representation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// The payload does not fit the pinned (or largest) version at the chosen ECC level.
    #[error("Data too large for QR code: {0}")]
    DataTooLong(String),

    /// The requested character set is unknown.
    #[error("Unsupported charset: {0}")]
    UnsupportedCharset(String),

    /// The payload contains a character the requested charset cannot represent.
    #[error("Payload cannot be represented in charset {charset}: {ch:?}")]
    Unrepresentable { charset: String, ch: char },

    /// Any other refusal from the matrix encoder.
    #[error("Error generating QR code: {0}")]
    Encoder(String),
}

/// Failure while turning a module matrix into image bytes.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The output would exceed the configured pixel budget.
    #[error("Output of {width}x{height} pixels exceeds the {limit} pixel limit")]
    TooLarge { width: u64, height: u64, limit: u64 },

    /// The image codec refused to write the buffer.
    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Any failure of a single `/qr` request.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Render(#[from] RenderError),

    /// Unexpected failure outside the three stages (worker panic, time budget).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Whether the caller can fix the request themselves.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Validation(_) | PipelineError::Encoding(_)
        )
    }

    /// HTTP status code for this failure.
    pub fn status(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }

    /// Message safe to show the caller. Server-side causes are never exposed.
    pub fn public_message(&self) -> String {
        if self.is_client_error() {
            self.to_string()
        } else {
            GENERIC_FAILURE.to_string()
        }
    }
}

/// Problems with the service configuration, surfaced at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}
