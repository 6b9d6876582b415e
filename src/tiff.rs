//! Minimal TIFF container for CCITT fax data
//!
//! PDF stores CCITT-encoded images as bare scan data. Prefixing that data
//! with a little-endian, single-IFD, single-strip TIFF header makes a file
//! any TIFF reader can open, without touching the encoded bits.

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::{ExtractError, Result};

const TIFF_VERSION: u16 = 42;
const FIRST_IFD_OFFSET: u32 = 8;
const ENTRY_COUNT: u16 = 8;
const ENTRY_LEN: usize = 12;

const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;

const TAG_IMAGE_WIDTH: u16 = 256;
const TAG_IMAGE_LENGTH: u16 = 257;
const TAG_BITS_PER_SAMPLE: u16 = 258;
const TAG_COMPRESSION: u16 = 259;
const TAG_PHOTOMETRIC: u16 = 262;
const TAG_STRIP_OFFSETS: u16 = 273;
const TAG_ROWS_PER_STRIP: u16 = 278;
const TAG_STRIP_BYTE_COUNTS: u16 = 279;

const PHOTOMETRIC_WHITE_IS_ZERO: u32 = 0;

/// Size of the header produced by [`build_fax_header`]; the strip data
/// starts at this offset.
pub const FAX_HEADER_LEN: usize =
    2 + 2 + 4 + 2 + ENTRY_COUNT as usize * ENTRY_LEN + 4;

/// CCITT fax compression scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaxGroup {
    /// T.4, one-dimensional or mixed (any K other than -1)
    Group3,
    /// T.6, pure two-dimensional (K = -1)
    Group4,
}

impl FaxGroup {
    /// Pick the group from the `/K` decode parameter. K=0 and K>0 both
    /// land on Group 3; the header has no field to tell them apart.
    pub fn from_k(k: i64) -> Self {
        if k == -1 {
            FaxGroup::Group4
        } else {
            FaxGroup::Group3
        }
    }

    /// Value of the TIFF Compression tag
    pub fn compression(self) -> u16 {
        match self {
            FaxGroup::Group3 => 3,
            FaxGroup::Group4 => 4,
        }
    }
}

fn to_u32(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        ExtractError::InvalidDimensions(format!("{} {} does not fit in 32 bits", what, value))
    })
}

fn write_entry(buf: &mut Vec<u8>, tag: u16, field_type: u16, value: u32) -> Result<()> {
    buf.write_u16::<LittleEndian>(tag)?;
    buf.write_u16::<LittleEndian>(field_type)?;
    buf.write_u32::<LittleEndian>(1)?;
    match field_type {
        // SHORT values are left-justified in the 4-byte value field
        TYPE_SHORT => {
            buf.write_u16::<LittleEndian>(value as u16)?;
            buf.write_u16::<LittleEndian>(0)?;
        }
        _ => buf.write_u32::<LittleEndian>(value)?,
    }
    Ok(())
}

/// Build the TIFF header that precedes `byte_count` bytes of fax data.
///
/// The output is always [`FAX_HEADER_LEN`] bytes. Width, height and byte
/// count must each fit in an unsigned 32-bit field.
pub fn build_fax_header(
    width: u64,
    height: u64,
    byte_count: usize,
    group: FaxGroup,
) -> Result<Vec<u8>> {
    let width = to_u32(width, "width")?;
    let height = to_u32(height, "height")?;
    let byte_count = to_u32(byte_count as u64, "strip byte count")?;

    let mut buf = Vec::with_capacity(FAX_HEADER_LEN);
    buf.extend_from_slice(b"II");
    buf.write_u16::<LittleEndian>(TIFF_VERSION)?;
    buf.write_u32::<LittleEndian>(FIRST_IFD_OFFSET)?;
    buf.write_u16::<LittleEndian>(ENTRY_COUNT)?;

    // Entries must stay in ascending tag order
    write_entry(&mut buf, TAG_IMAGE_WIDTH, TYPE_LONG, width)?;
    write_entry(&mut buf, TAG_IMAGE_LENGTH, TYPE_LONG, height)?;
    write_entry(&mut buf, TAG_BITS_PER_SAMPLE, TYPE_SHORT, 1)?;
    write_entry(&mut buf, TAG_COMPRESSION, TYPE_SHORT, group.compression() as u32)?;
    write_entry(&mut buf, TAG_PHOTOMETRIC, TYPE_SHORT, PHOTOMETRIC_WHITE_IS_ZERO)?;
    write_entry(&mut buf, TAG_STRIP_OFFSETS, TYPE_LONG, FAX_HEADER_LEN as u32)?;
    write_entry(&mut buf, TAG_ROWS_PER_STRIP, TYPE_LONG, height)?;
    write_entry(&mut buf, TAG_STRIP_BYTE_COUNTS, TYPE_LONG, byte_count)?;

    // No next IFD
    buf.write_u32::<LittleEndian>(0)?;

    debug_assert_eq!(buf.len(), FAX_HEADER_LEN);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::ReadBytesExt;
    use std::io::Cursor;

    fn u16_at(buf: &[u8], offset: usize) -> u16 {
        Cursor::new(&buf[offset..]).read_u16::<LittleEndian>().unwrap()
    }

    fn u32_at(buf: &[u8], offset: usize) -> u32 {
        Cursor::new(&buf[offset..]).read_u32::<LittleEndian>().unwrap()
    }

    /// (tag, type, count, value) for each IFD entry
    fn entries(buf: &[u8]) -> Vec<(u16, u16, u32, u32)> {
        let mut cursor = Cursor::new(&buf[8..]);
        let count = cursor.read_u16::<LittleEndian>().unwrap();
        (0..count)
            .map(|_| {
                let tag = cursor.read_u16::<LittleEndian>().unwrap();
                let field_type = cursor.read_u16::<LittleEndian>().unwrap();
                let count = cursor.read_u32::<LittleEndian>().unwrap();
                let value = if field_type == TYPE_SHORT {
                    let v = cursor.read_u16::<LittleEndian>().unwrap() as u32;
                    cursor.read_u16::<LittleEndian>().unwrap();
                    v
                } else {
                    cursor.read_u32::<LittleEndian>().unwrap()
                };
                (tag, field_type, count, value)
            })
            .collect()
    }

    #[test]
    fn test_header_preamble() {
        let header = build_fax_header(100, 50, 200, FaxGroup::Group4).unwrap();
        assert_eq!(&header[0..2], b"II");
        assert_eq!(u16_at(&header, 2), 42);
        assert_eq!(u32_at(&header, 4), 8);
        assert_eq!(u16_at(&header, 8), 8);
        assert_eq!(header.len(), FAX_HEADER_LEN);
        assert_eq!(FAX_HEADER_LEN, 110);
    }

    #[test]
    fn test_entries_ascending() {
        let header = build_fax_header(100, 50, 200, FaxGroup::Group4).unwrap();
        let tags: Vec<u16> = entries(&header).iter().map(|e| e.0).collect();
        assert_eq!(tags, vec![256, 257, 258, 259, 262, 273, 278, 279]);
    }

    #[test]
    fn test_entry_values() {
        let header = build_fax_header(100, 50, 200, FaxGroup::Group4).unwrap();
        let entries = entries(&header);
        assert_eq!(entries[0], (256, TYPE_LONG, 1, 100));
        assert_eq!(entries[1], (257, TYPE_LONG, 1, 50));
        assert_eq!(entries[2], (258, TYPE_SHORT, 1, 1));
        assert_eq!(entries[3], (259, TYPE_SHORT, 1, 4));
        assert_eq!(entries[4], (262, TYPE_SHORT, 1, 0));
        assert_eq!(entries[5], (273, TYPE_LONG, 1, FAX_HEADER_LEN as u32));
        assert_eq!(entries[6], (278, TYPE_LONG, 1, 50));
        assert_eq!(entries[7], (279, TYPE_LONG, 1, 200));
    }

    #[test]
    fn test_terminator() {
        let header = build_fax_header(1, 1, 1, FaxGroup::Group3).unwrap();
        assert_eq!(u32_at(&header, FAX_HEADER_LEN - 4), 0);
    }

    #[test]
    fn test_group3_compression() {
        let header = build_fax_header(10, 10, 10, FaxGroup::Group3).unwrap();
        assert_eq!(entries(&header)[3].3, 3);
    }

    #[test]
    fn test_idempotent_and_size_stable() {
        let a = build_fax_header(100, 50, 200, FaxGroup::Group4).unwrap();
        let b = build_fax_header(100, 50, 200, FaxGroup::Group4).unwrap();
        assert_eq!(a, b);

        let big = build_fax_header(60_000, 80_000, 50_000_000, FaxGroup::Group3).unwrap();
        assert_eq!(big.len(), a.len());
    }

    #[test]
    fn test_overflow_rejected() {
        let too_wide = build_fax_header(u32::MAX as u64 + 1, 10, 10, FaxGroup::Group4);
        assert!(matches!(too_wide, Err(ExtractError::InvalidDimensions(_))));

        let too_tall = build_fax_header(10, u64::MAX, 10, FaxGroup::Group4);
        assert!(matches!(too_tall, Err(ExtractError::InvalidDimensions(_))));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_oversized_strip_rejected() {
        let too_long = build_fax_header(10, 10, u32::MAX as usize + 1, FaxGroup::Group4);
        assert!(matches!(too_long, Err(ExtractError::InvalidDimensions(_))));

        let largest = build_fax_header(10, 10, u32::MAX as usize, FaxGroup::Group4).unwrap();
        assert_eq!(u32_at(&largest, FAX_HEADER_LEN - 4 - 4), u32::MAX);
    }

    #[test]
    fn test_group_from_k() {
        assert_eq!(FaxGroup::from_k(-1), FaxGroup::Group4);
        assert_eq!(FaxGroup::from_k(0), FaxGroup::Group3);
        assert_eq!(FaxGroup::from_k(1), FaxGroup::Group3);
        assert_eq!(FaxGroup::from_k(-2), FaxGroup::Group3);
    }
}
