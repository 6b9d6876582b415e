//! Error type for image extraction.
//!
//! Every image-level variant is scoped to a single image XObject: the walker
//! logs it and moves on to the next image.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExtractError>;

#[derive(Error, Debug)]
pub enum ExtractError {
    /// The color space could not be reduced to a device space
    #[error("Unsupported color space: {0}")]
    UnsupportedColorSpace(String),

    /// Raw sample length does not match width x height x bytes-per-pixel
    #[error("Malformed raster data: expected {expected} bytes, got {actual}")]
    MalformedRasterData { expected: usize, actual: usize },

    #[error("Unsupported bit depth: {0} bits per component")]
    UnsupportedBitDepth(u8),

    /// Passthrough filter with a zero-length payload
    #[error("Empty image payload")]
    EmptyPayload,

    /// CCITT image without a /K decode parameter
    #[error("Missing /DecodeParms /K for CCITT fax image")]
    MissingDecodeParams,

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Not a failure: the filter is simply not one we can write out
    #[error("Unrecognized image filter: {0}")]
    UnrecognizedFilter(String),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Image encoding error: {0}")]
    Image(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    pub fn is_unrecognized(&self) -> bool {
        matches!(self, ExtractError::UnrecognizedFilter(_))
    }
}

impl From<lopdf::Error> for ExtractError {
    fn from(e: lopdf::Error) -> Self {
        ExtractError::Pdf(e.to_string())
    }
}
