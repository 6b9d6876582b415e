//! Color space resolution
//!
//! Reduces a PDF color space (device name, `[/Indexed ...]` or
//! `[/ICCBased ...]`) to the sample layout of the raw pixel data. ICC
//! profiles are never interpreted: the declared alternate space is taken
//! at face value.

use crate::error::{ExtractError, Result};

/// Largest palette an 8-bit index can address
pub const MAX_PALETTE_ENTRIES: usize = 256;

/// A PDF color space as declared on an image XObject
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorSpaceSpec {
    DeviceRGB,
    DeviceCMYK,
    DeviceGray,
    /// `[/Indexed base hival lookup]`
    Indexed {
        base: Box<ColorSpaceSpec>,
        hival: u32,
        lookup: Vec<u8>,
    },
    /// `[/ICCBased stream]`, carrying the stream's `/Alternate` if any
    ICCBased {
        alternate: Option<Box<ColorSpaceSpec>>,
    },
    /// Any family we do not handle (Lab, Separation, DeviceN, ...)
    Other(String),
}

impl ColorSpaceSpec {
    /// Map a color space family name to a [`ColorSpaceSpec`]. `Default*` spaces are
    /// treated as their device equivalents.
    pub fn from_name(name: &[u8]) -> Self {
        match name {
            b"DeviceRGB" | b"DefaultRGB" | b"RGB" => ColorSpaceSpec::DeviceRGB,
            b"DeviceCMYK" | b"DefaultCMYK" | b"CMYK" => ColorSpaceSpec::DeviceCMYK,
            b"DeviceGray" | b"DefaultGray" | b"G" => ColorSpaceSpec::DeviceGray,
            other => ColorSpaceSpec::Other(String::from_utf8_lossy(other).to_string()),
        }
    }
}

/// Resolved palette of RGB triples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<[u8; 3]>,
}

impl Palette {
    pub fn new(mut colors: Vec<[u8; 3]>) -> Self {
        colors.truncate(MAX_PALETTE_ENTRIES);
        Self { colors }
    }

    /// Build a palette from an Indexed lookup table whose entries are laid
    /// out in `base`'s sample format.
    fn from_lookup(base: &PixelFormat, hival: u32, lookup: &[u8]) -> Result<Self> {
        let entries = (hival as usize + 1).min(MAX_PALETTE_ENTRIES);

        let colors: Vec<[u8; 3]> = match base {
            PixelFormat::Rgb24 => lookup
                .chunks_exact(3)
                .take(entries)
                .map(|c| [c[0], c[1], c[2]])
                .collect(),
            PixelFormat::Gray8 => lookup.iter().take(entries).map(|&g| [g, g, g]).collect(),
            PixelFormat::Cmyk32 => lookup
                .chunks_exact(4)
                .take(entries)
                .map(|c| cmyk_to_rgb(c[0], c[1], c[2], c[3]))
                .collect(),
            PixelFormat::Palette8(_) => {
                return Err(ExtractError::UnsupportedColorSpace(
                    "Indexed color space over an Indexed base".to_string(),
                ));
            }
        };

        Ok(Self { colors })
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Look up an index; indices past the end of the table are black.
    pub fn color(&self, index: u8) -> [u8; 3] {
        self.colors.get(index as usize).copied().unwrap_or([0, 0, 0])
    }

    /// Expand palette indices into packed RGB24 samples
    pub fn apply(&self, indices: &[u8]) -> Vec<u8> {
        let mut rgb = Vec::with_capacity(indices.len() * 3);
        for &index in indices {
            rgb.extend_from_slice(&self.color(index));
        }
        rgb
    }
}

/// Sample layout of decoded raster data (8 bits per sample)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Cmyk32,
    Gray8,
    /// One index byte per pixel into the palette
    Palette8(Palette),
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Cmyk32 => 4,
            PixelFormat::Gray8 | PixelFormat::Palette8(_) => 1,
        }
    }
}

/// Resolve a color space to the pixel format of its samples.
///
/// Indexed spaces resolve their base first; ICCBased spaces resolve their
/// alternate. An ICCBased space without an alternate is an error rather
/// than a guess from the profile's component count.
pub fn resolve(spec: &ColorSpaceSpec) -> Result<PixelFormat> {
    match spec {
        ColorSpaceSpec::DeviceRGB => Ok(PixelFormat::Rgb24),
        ColorSpaceSpec::DeviceCMYK => Ok(PixelFormat::Cmyk32),
        ColorSpaceSpec::DeviceGray => Ok(PixelFormat::Gray8),
        ColorSpaceSpec::Indexed {
            base,
            hival,
            lookup,
        } => {
            let base_format = resolve(base)?;
            let palette = Palette::from_lookup(&base_format, *hival, lookup)?;
            Ok(PixelFormat::Palette8(palette))
        }
        ColorSpaceSpec::ICCBased {
            alternate: Some(alternate),
        } => resolve(alternate),
        ColorSpaceSpec::ICCBased { alternate: None } => Err(ExtractError::UnsupportedColorSpace(
            "ICCBased color space without /Alternate".to_string(),
        )),
        ColorSpaceSpec::Other(name) => Err(ExtractError::UnsupportedColorSpace(name.clone())),
    }
}

/// Naive CMYK to RGB, no color management
pub(crate) fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let c = c as f32 / 255.0;
    let m = m as f32 / 255.0;
    let y = y as f32 / 255.0;
    let k = k as f32 / 255.0;

    [
        ((1.0 - c) * (1.0 - k) * 255.0) as u8,
        ((1.0 - m) * (1.0 - k) * 255.0) as u8,
        ((1.0 - y) * (1.0 - k) * 255.0) as u8,
    ]
}
