//! Flate predictors (`/Predictor` in a stage's `/DecodeParms`)

use crate::error::{ExtractError, Result};

/// Predictor parameters for one Flate stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Predictor {
    /// 1 = none, 2 = TIFF horizontal differencing, 10-15 = PNG
    pub predictor: i64,
    pub colors: usize,
    pub bits_per_component: usize,
    pub columns: usize,
}

impl Default for Predictor {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
        }
    }
}

impl Predictor {
    /// Bytes in one row of samples, excluding any PNG tag byte
    fn row_bytes(&self) -> usize {
        (self.colors * self.bits_per_component * self.columns).div_ceil(8)
    }

    /// Distance in bytes to the corresponding byte of the previous pixel
    fn pixel_bytes(&self) -> usize {
        (self.colors * self.bits_per_component / 8).max(1)
    }

    /// Undo the prediction on freshly inflated data
    pub fn apply(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        match self.predictor {
            1 => Ok(data),
            2 => self.undo_tiff(data),
            10..=15 => self.undo_png(&data),
            n => Err(ExtractError::Pdf(format!("unsupported /Predictor {}", n))),
        }
    }

    fn undo_tiff(&self, mut data: Vec<u8>) -> Result<Vec<u8>> {
        if self.bits_per_component != 8 {
            return Err(ExtractError::Pdf(format!(
                "TIFF predictor with {} bits per component",
                self.bits_per_component
            )));
        }
        let bpp = self.colors;
        for row in data.chunks_mut(self.row_bytes()) {
            for i in bpp..row.len() {
                row[i] = row[i].wrapping_add(row[i - bpp]);
            }
        }
        Ok(data)
    }

    /// Each row carries its own PNG filter type byte; a trailing partial
    /// row is dropped
    fn undo_png(&self, data: &[u8]) -> Result<Vec<u8>> {
        let row_bytes = self.row_bytes();
        let bpp = self.pixel_bytes();

        let mut out = Vec::with_capacity(data.len() / (row_bytes + 1) * row_bytes);
        let mut prev = vec![0u8; row_bytes];
        let mut current = vec![0u8; row_bytes];

        for row in data.chunks_exact(row_bytes + 1) {
            let (tag, encoded) = (row[0], &row[1..]);
            for i in 0..row_bytes {
                let left = if i >= bpp { current[i - bpp] } else { 0 };
                let up = prev[i];
                let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
                let base = match tag {
                    0 => 0,
                    1 => left,
                    2 => up,
                    3 => ((left as u16 + up as u16) / 2) as u8,
                    4 => paeth(left, up, up_left),
                    t => {
                        return Err(ExtractError::Pdf(format!("invalid PNG row filter {}", t)));
                    }
                };
                current[i] = encoded[i].wrapping_add(base);
            }
            out.extend_from_slice(&current);
            std::mem::swap(&mut prev, &mut current);
        }

        Ok(out)
    }
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
