//! Per-image decoding
//!
//! Turns one image XObject into the bytes of a standalone image file.
//! Raw (Flate or unfiltered) samples become a PNG; JPEG and JPEG 2000
//! bitstreams are copied verbatim; CCITT fax data is wrapped in a TIFF
//! container. Nothing here touches the filesystem.

use std::borrow::Cow;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};

use crate::color_space::{cmyk_to_rgb, resolve, ColorSpaceSpec, PixelFormat};
use crate::error::{ExtractError, Result};
use crate::tiff::{build_fax_header, FaxGroup};

/// Encoding of an image XObject's payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageFilter {
    /// Already-inflated raw samples (`/FlateDecode` or no filter)
    Raw,
    /// `/DCTDecode`, a baseline JPEG bitstream
    Dct,
    /// `/JPXDecode`, a JPEG 2000 bitstream
    Jpx,
    /// `/CCITTFaxDecode`, Group 3 or Group 4 fax data
    CcittFax,
    Other(String),
}

impl ImageFilter {
    pub fn from_name(name: &[u8]) -> Self {
        match name {
            b"FlateDecode" | b"Fl" => ImageFilter::Raw,
            b"DCTDecode" | b"DCT" => ImageFilter::Dct,
            b"JPXDecode" => ImageFilter::Jpx,
            b"CCITTFaxDecode" | b"CCF" => ImageFilter::CcittFax,
            other => ImageFilter::Other(String::from_utf8_lossy(other).to_string()),
        }
    }
}

/// Filter parameters we care about (`/DecodeParms`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeParams {
    /// CCITT `/K`
    pub k: Option<i64>,
}

/// An image XObject as handed over by the PDF layer
#[derive(Debug, Clone, PartialEq)]
pub struct ImageObject {
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    pub color_space: Option<ColorSpaceSpec>,
    pub filter: ImageFilter,
    pub decode_params: Option<DecodeParams>,
    /// Payload; inflated samples for `Raw`, encoded bytes otherwise
    pub data: Vec<u8>,
}

impl ImageObject {
    pub fn new(
        width: u32,
        height: u32,
        color_space: Option<ColorSpaceSpec>,
        filter: ImageFilter,
        data: Vec<u8>,
    ) -> Self {
        Self {
            width,
            height,
            bits_per_component: 8,
            color_space,
            filter,
            decode_params: None,
            data,
        }
    }

    pub fn with_decode_params(mut self, params: DecodeParams) -> Self {
        self.decode_params = Some(params);
        self
    }

    pub fn with_bits_per_component(mut self, bits: u8) -> Self {
        self.bits_per_component = bits;
        self
    }
}

/// Container format of a decoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
    Jp2,
    Tiff,
}

impl OutputFormat {
    /// File extension, without the dot
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Jp2 => "jp2",
            OutputFormat::Tiff => "tif",
        }
    }
}

/// Bytes of a complete image file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub data: Vec<u8>,
    pub format: OutputFormat,
}

impl DecodedImage {
    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }
}

/// Decode one image object. Dispatches on the filter only; the color
/// space is consulted for raw samples alone.
pub fn decode(obj: &ImageObject) -> Result<DecodedImage> {
    match &obj.filter {
        ImageFilter::Raw => decode_raster(obj),
        ImageFilter::Dct => passthrough(obj, OutputFormat::Jpeg),
        ImageFilter::Jpx => passthrough(obj, OutputFormat::Jp2),
        ImageFilter::CcittFax => wrap_fax(obj),
        ImageFilter::Other(name) => Err(ExtractError::UnrecognizedFilter(name.clone())),
    }
}

fn passthrough(obj: &ImageObject, format: OutputFormat) -> Result<DecodedImage> {
    if obj.data.is_empty() {
        return Err(ExtractError::EmptyPayload);
    }
    Ok(DecodedImage {
        data: obj.data.clone(),
        format,
    })
}

fn wrap_fax(obj: &ImageObject) -> Result<DecodedImage> {
    let k = obj
        .decode_params
        .as_ref()
        .and_then(|p| p.k)
        .ok_or(ExtractError::MissingDecodeParams)?;
    let group = FaxGroup::from_k(k);

    let header = build_fax_header(obj.width as u64, obj.height as u64, obj.data.len(), group)?;

    let mut data = Vec::with_capacity(header.len() + obj.data.len());
    data.extend_from_slice(&header);
    data.extend_from_slice(&obj.data);

    Ok(DecodedImage {
        data,
        format: OutputFormat::Tiff,
    })
}

fn decode_raster(obj: &ImageObject) -> Result<DecodedImage> {
    let (width, height) = (obj.width, obj.height);
    if width == 0 || height == 0 {
        return Err(ExtractError::InvalidDimensions(format!(
            "{}x{} image",
            width, height
        )));
    }

    let color_space = obj.color_space.as_ref().ok_or_else(|| {
        ExtractError::UnsupportedColorSpace("image has no /ColorSpace".to_string())
    })?;
    let format = resolve(color_space)?;

    let samples = unpack_samples(obj, &format)?;

    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(format.bytes_per_pixel()))
        .ok_or_else(|| {
            ExtractError::InvalidDimensions(format!("{}x{} image is too large", width, height))
        })?;
    if samples.len() != expected {
        return Err(ExtractError::MalformedRasterData {
            expected,
            actual: samples.len(),
        });
    }

    let img = match format {
        PixelFormat::Gray8 => GrayImage::from_raw(width, height, samples.into_owned())
            .map(DynamicImage::ImageLuma8),
        PixelFormat::Rgb24 => {
            RgbImage::from_raw(width, height, samples.into_owned()).map(DynamicImage::ImageRgb8)
        }
        PixelFormat::Cmyk32 => {
            let mut rgb = Vec::with_capacity(samples.len() / 4 * 3);
            for chunk in samples.chunks_exact(4) {
                rgb.extend_from_slice(&cmyk_to_rgb(chunk[0], chunk[1], chunk[2], chunk[3]));
            }
            RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
        }
        // Palette indices expand to RGB
        PixelFormat::Palette8(palette) => {
            RgbImage::from_raw(width, height, palette.apply(&samples)).map(DynamicImage::ImageRgb8)
        }
    }
    .ok_or_else(|| ExtractError::Image("Failed to build raster from samples".to_string()))?;

    let mut png_bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| ExtractError::Image(format!("Failed to encode PNG: {}", e)))?;

    Ok(DecodedImage {
        data: png_bytes,
        format: OutputFormat::Png,
    })
}

/// Bring samples to one byte per component. Sub-byte depths are only
/// meaningful for single-component formats; rows are byte aligned.
fn unpack_samples<'a>(obj: &'a ImageObject, format: &PixelFormat) -> Result<Cow<'a, [u8]>> {
    let bits = obj.bits_per_component;
    if bits == 8 {
        return Ok(Cow::Borrowed(&obj.data));
    }

    let is_palette = match format {
        PixelFormat::Gray8 => false,
        PixelFormat::Palette8(_) => true,
        _ => return Err(ExtractError::UnsupportedBitDepth(bits)),
    };
    if !matches!(bits, 1 | 2 | 4) {
        return Err(ExtractError::UnsupportedBitDepth(bits));
    }

    let width = obj.width as usize;
    let height = obj.height as usize;
    let row_bytes = (width * bits as usize).div_ceil(8);
    let expected = row_bytes.checked_mul(height).ok_or_else(|| {
        ExtractError::InvalidDimensions(format!("{}x{} image is too large", width, height))
    })?;
    if obj.data.len() != expected {
        return Err(ExtractError::MalformedRasterData {
            expected,
            actual: obj.data.len(),
        });
    }

    let max = (1u16 << bits) - 1;
    let mut samples = Vec::with_capacity(width * height);
    for row in obj.data.chunks_exact(row_bytes) {
        for x in 0..width {
            let bit = x * bits as usize;
            let shift = 8 - bits as usize - bit % 8;
            let value = (row[bit / 8] >> shift) as u16 & max;
            samples.push(if is_palette {
                value as u8
            } else {
                (value * 255 / max) as u8
            });
        }
    }

    Ok(Cow::Owned(samples))
}
