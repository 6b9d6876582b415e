//! PDF Image Extractor Library
//!
//! Pulls embedded raster images out of PDF documents without recompressing
//! them. JPEG and JPEG 2000 streams are written as-is, CCITT fax streams are
//! wrapped in a minimal TIFF container, and raw (Flate) samples are turned
//! into PNG after resolving their color space.
//!
//! The per-image work lives in [`decoder::decode`], which operates on plain
//! byte buffers; [`extract`] walks documents and writes the results.

pub mod color_space;
pub mod decoder;
pub mod error;
pub mod extract;
pub mod pdf;
pub mod predictor;
pub mod tiff;

pub use color_space::{resolve, ColorSpaceSpec, Palette, PixelFormat};
pub use decoder::{decode, DecodeParams, DecodedImage, ImageFilter, ImageObject, OutputFormat};
pub use error::{ExtractError, Result};
pub use extract::{
    collect_pdf_paths, extract_document, extract_path, extract_pdf_file, image_file_name,
    ExtractOptions, ExtractSummary, DEFAULT_OUTPUT_DIR_NAME,
};
pub use pdf::{ImageSource, LopdfSource, PageImage};
pub use predictor::Predictor;
pub use tiff::{build_fax_header, FaxGroup, FAX_HEADER_LEN};
