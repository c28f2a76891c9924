//! Conversion of raw image dumps to PNG.
//!
//! A raw image is a 12-byte header followed by uncompressed pixels:
//!
//! | Offset | Size | Field | Description |
//! |--------|------|-------|-------------|
//! | 0x00 | 4 | `version` | Always 1 (u32 LE) |
//! | 0x04 | 4 | `width` | Width in pixels (u32 LE) |
//! | 0x08 | 4 | `height` | Height in pixels (u32 LE) |
//! | 0x0C | w*h*4 | `pixels` | RGBA, 8 bits per channel, row-major |
//!
//! # Example
//!
//! ```
//! use tmod_extract::rawimg::{RawImage, RAWIMG_HEADER_SIZE};
//!
//! let mut data = Vec::new();
//! data.extend_from_slice(&1u32.to_le_bytes());
//! data.extend_from_slice(&1u32.to_le_bytes());
//! data.extend_from_slice(&1u32.to_le_bytes());
//! data.extend_from_slice(&[255, 0, 0, 255]);
//!
//! let image = RawImage::parse(&data).unwrap();
//! assert_eq!((image.width, image.height), (1, 1));
//! let png = image.to_png().unwrap();
//! assert_eq!(&png[1..4], b"PNG");
//! ```

use std::fs;
use std::path::Path;

use log::debug;

use crate::binary::read_u32_le;
use crate::error::{ExtractError, Result};

/// The only raw image version understood.
pub const RAWIMG_SUPPORTED_VERSION: u32 = 1;

/// Size of the raw image header in bytes.
pub const RAWIMG_HEADER_SIZE: usize = 12;

/// Bytes per RGBA pixel.
const BYTES_PER_PIXEL: u128 = 4;

/// A validated raw image borrowing its pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawImage<'a> {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// RGBA pixels, exactly `width * height * 4` bytes.
    pub pixels: &'a [u8],
}

impl<'a> RawImage<'a> {
    /// Parses and validates a raw image.
    ///
    /// # Errors
    ///
    /// - `ExtractError::RawImageTooShort` if the data is shorter than the header
    /// - `ExtractError::UnsupportedRawImageVersion` if the version tag is not 1
    /// - `ExtractError::PixelBufferSizeMismatch` if the pixel buffer is not
    ///   exactly `width * height * 4` bytes
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < RAWIMG_HEADER_SIZE {
            return Err(ExtractError::RawImageTooShort { len: data.len() });
        }

        let version = read_u32_le(data, 0x00, "rawimg version")?;
        if version != RAWIMG_SUPPORTED_VERSION {
            return Err(ExtractError::UnsupportedRawImageVersion {
                version,
                supported: RAWIMG_SUPPORTED_VERSION,
            });
        }

        let width = read_u32_le(data, 0x04, "rawimg width")?;
        let height = read_u32_le(data, 0x08, "rawimg height")?;
        let pixels = &data[RAWIMG_HEADER_SIZE..];

        let expected = u128::from(width) * u128::from(height) * BYTES_PER_PIXEL;
        if pixels.len() as u128 != expected {
            return Err(ExtractError::PixelBufferSizeMismatch {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Encodes the image as an 8-bit RGBA PNG.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::ImageEncodingFailure` if the encoder rejects the
    /// image (for example zero width or height).
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let encoding_failure = |e: png::EncodingError| ExtractError::ImageEncodingFailure {
            reason: e.to_string(),
        };

        let mut buffer = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut buffer, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);

            let mut writer = encoder.write_header().map_err(encoding_failure)?;
            writer
                .write_image_data(self.pixels)
                .map_err(encoding_failure)?;
            writer.finish().map_err(encoding_failure)?;
        }

        Ok(buffer)
    }
}

/// Converts the raw image file at `input` into a PNG file at `output`.
///
/// Errors are wrapped with the input path.
///
/// # Errors
///
/// - `ExtractError::Io` if `input` cannot be read or `output` cannot be written
/// - any error from [`RawImage::parse`] or [`RawImage::to_png`]
pub fn convert_file(input: &Path, output: &Path) -> Result<()> {
    let data = fs::read(input).map_err(|e| ExtractError::io(input, e))?;
    let png = RawImage::parse(&data)
        .and_then(|image| image.to_png())
        .map_err(|e| e.in_entry(input.display().to_string()))?;
    fs::write(output, &png).map_err(|e| ExtractError::io(output, e))?;

    debug!(
        "Converted {} ({} bytes) to {} ({} bytes)",
        input.display(),
        data.len(),
        output.display(),
        png.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Creates raw image bytes with the given header values and pixel buffer length.
    fn create_rawimg(version: u32, width: u32, height: u32, pixel_len: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(RAWIMG_HEADER_SIZE + pixel_len);
        data.extend_from_slice(&version.to_le_bytes());
        data.extend_from_slice(&width.to_le_bytes());
        data.extend_from_slice(&height.to_le_bytes());
        data.extend((0..pixel_len).map(|i| (i % 251) as u8));
        data
    }

    #[test]
    fn test_parse_valid() {
        let data = create_rawimg(1, 3, 2, 24);
        let image = RawImage::parse(&data).unwrap();
        assert_eq!(image.width, 3);
        assert_eq!(image.height, 2);
        assert_eq!(image.pixels.len(), 24);
    }

    #[test]
    fn test_parse_unsupported_version() {
        let data = create_rawimg(2, 2, 2, 16);
        let err = RawImage::parse(&data).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::UnsupportedRawImageVersion {
                version: 2,
                supported: 1
            }
        ));
        assert!(err.to_string().contains("decompress"));
    }

    #[test]
    fn test_parse_too_short() {
        let result = RawImage::parse(&[1, 0, 0, 0, 2]);
        assert!(matches!(
            result,
            Err(ExtractError::RawImageTooShort { len: 5 })
        ));
    }

    #[test]
    fn test_pixel_buffer_must_match_exactly() {
        for (w, h) in [(1u32, 1u32), (2, 2), (3, 7), (16, 1)] {
            let exact = (w * h * 4) as usize;
            assert!(RawImage::parse(&create_rawimg(1, w, h, exact)).is_ok());

            for len in [exact - 1, exact + 1] {
                let data = create_rawimg(1, w, h, len);
                let result = RawImage::parse(&data);
                assert!(
                    matches!(
                        result,
                        Err(ExtractError::PixelBufferSizeMismatch { expected, actual, .. })
                            if expected == exact as u128 && actual == len
                    ),
                    "{w}x{h} with {len} bytes should be rejected"
                );
            }
        }
    }

    #[test]
    fn test_huge_dimensions_do_not_overflow() {
        let data = create_rawimg(1, u32::MAX, u32::MAX, 8);
        let result = RawImage::parse(&data);
        assert!(matches!(
            result,
            Err(ExtractError::PixelBufferSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_zero_sized_image_parses_but_does_not_encode() {
        let data = create_rawimg(1, 0, 5, 0);
        let image = RawImage::parse(&data).unwrap();
        assert!(matches!(
            image.to_png(),
            Err(ExtractError::ImageEncodingFailure { .. })
        ));
    }

    #[test]
    fn test_to_png_decodes_back() {
        let data = create_rawimg(1, 2, 2, 16);
        let png_bytes = RawImage::parse(&data).unwrap().to_png().unwrap();

        let decoder = png::Decoder::new(Cursor::new(png_bytes));
        let reader = decoder.read_info().unwrap();
        let info = reader.info();
        assert_eq!(info.width, 2);
        assert_eq!(info.height, 2);
        assert_eq!(info.color_type, png::ColorType::Rgba);
        assert_eq!(info.bit_depth, png::BitDepth::Eight);
    }

    #[test]
    fn test_convert_file_names_input_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("Still.rawimg");
        fs::write(&input, create_rawimg(0x9C78, 1, 1, 4)).unwrap();

        let err = convert_file(&input, &dir.path().join("Still.png")).unwrap_err();
        assert!(err.to_string().contains("Still.rawimg"));
        assert!(err.to_string().contains("forget to decompress"));
        assert!(!dir.path().join("Still.png").exists());
    }
}
