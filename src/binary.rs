//! Binary reading utilities for decoding tmod archives.
//!
//! This module provides functions for reading little-endian integers,
//! byte slices, 7-bit encoded integers and length-prefixed strings from
//! byte buffers. All functions perform bounds checking and return
//! [`ExtractError::TruncatedArchive`] naming the field and offset when the
//! data ends early.
//!
//! # 7-bit encoded integers
//!
//! Lengths are stored with 7 payload bits per byte, least significant group
//! first. A byte with its high bit set means more bytes follow. After nine
//! continuation bytes a tenth byte may only be `0` or `1`, which supplies
//! bit 63.
//!
//! # Example
//!
//! ```
//! use tmod_extract::binary::{ByteReader, encode_7bit_int};
//!
//! let mut data = encode_7bit_int(5);
//! data.extend_from_slice(b"Hello");
//! data.extend_from_slice(&300u32.to_le_bytes());
//!
//! let mut reader = ByteReader::new(&data);
//! assert_eq!(reader.read_string("greeting").unwrap(), "Hello");
//! assert_eq!(reader.read_u32_le("size").unwrap(), 300);
//! assert!(reader.is_empty());
//! ```

use crate::error::{ExtractError, Result};

/// Number of 7-bit groups that can be read before the final overflow byte.
pub const MAX_BYTES_WITHOUT_OVERFLOW: usize = 9;

/// Reads a little-endian u32 value from the byte buffer at the given offset.
///
/// # Errors
///
/// Returns `ExtractError::TruncatedArchive` if the buffer doesn't contain
/// at least 4 bytes starting from the given offset.
///
/// # Example
///
/// ```
/// use tmod_extract::binary::read_u32_le;
///
/// let data = [0x78, 0x56, 0x34, 0x12];
/// assert_eq!(read_u32_le(&data, 0, "length").unwrap(), 0x12345678);
/// ```
pub fn read_u32_le(bytes: &[u8], offset: usize, field: &'static str) -> Result<u32> {
    let slice = read_bytes(bytes, offset, 4, field)?;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

/// Reads a little-endian i32 value from the byte buffer at the given offset.
///
/// # Errors
///
/// Returns `ExtractError::TruncatedArchive` if the buffer doesn't contain
/// at least 4 bytes starting from the given offset.
pub fn read_i32_le(bytes: &[u8], offset: usize, field: &'static str) -> Result<i32> {
    let slice = read_bytes(bytes, offset, 4, field)?;
    Ok(i32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

/// Reads a slice of bytes from the buffer at the given offset.
///
/// # Errors
///
/// Returns `ExtractError::TruncatedArchive` if the buffer doesn't contain
/// at least `len` bytes starting from the given offset.
///
/// # Example
///
/// ```
/// use tmod_extract::binary::read_bytes;
///
/// let data = b"TMOD\x06v1.0";
/// assert_eq!(read_bytes(data, 0, 4, "magic").unwrap(), b"TMOD");
/// ```
pub fn read_bytes<'a>(
    bytes: &'a [u8],
    offset: usize,
    len: usize,
    field: &'static str,
) -> Result<&'a [u8]> {
    match offset.checked_add(len) {
        Some(end) if end <= bytes.len() => Ok(&bytes[offset..end]),
        _ => Err(ExtractError::truncated(field, offset, len, bytes.len())),
    }
}

/// Reads a 7-bit encoded integer at the given offset.
///
/// Returns the decoded value and the number of bytes it occupied.
///
/// # Errors
///
/// - `ExtractError::TruncatedArchive` if the data ends before the terminal byte
/// - `ExtractError::InvalidVarInt` if the tenth byte is neither 0 nor 1
///
/// # Example
///
/// ```
/// use tmod_extract::binary::read_7bit_int;
///
/// assert_eq!(read_7bit_int(&[0x7F], 0, "length").unwrap(), (127, 1));
/// assert_eq!(read_7bit_int(&[0xAC, 0x02], 0, "length").unwrap(), (300, 2));
/// ```
pub fn read_7bit_int(bytes: &[u8], offset: usize, field: &'static str) -> Result<(u64, usize)> {
    let mut result: u64 = 0;

    for i in 0..MAX_BYTES_WITHOUT_OVERFLOW {
        let byte = read_bytes(bytes, offset + i, 1, field)?[0];
        result |= u64::from(byte & 0x7F) << (i * 7);

        if byte <= 0x7F {
            return Ok((result, i + 1));
        }
    }

    // 9 * 7 = 63 bits consumed, only the lowest bit of the last byte still fits
    let last_offset = offset + MAX_BYTES_WITHOUT_OVERFLOW;
    let byte = read_bytes(bytes, last_offset, 1, field)?[0];
    if byte > 1 {
        return Err(ExtractError::InvalidVarInt {
            offset: last_offset,
            byte,
        });
    }

    result |= u64::from(byte) << (MAX_BYTES_WITHOUT_OVERFLOW * 7);
    Ok((result, MAX_BYTES_WITHOUT_OVERFLOW + 1))
}

/// Encodes a value as a 7-bit encoded integer.
///
/// This is the inverse of [`read_7bit_int`]; values with bit 63 set take the
/// full ten bytes.
#[must_use]
pub fn encode_7bit_int(mut value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_BYTES_WITHOUT_OVERFLOW + 1);
    while value >= 0x80 {
        #[allow(clippy::cast_possible_truncation)]
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    #[allow(clippy::cast_possible_truncation)]
    out.push(value as u8);
    out
}

/// A forward-only cursor over a byte buffer.
///
/// Every read advances the cursor and names the field it reads so that
/// truncation errors point at the exact place the data ran out.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Returns the current offset.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the number of unread bytes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Returns whether all bytes have been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Reads exactly `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::TruncatedArchive` if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize, field: &'static str) -> Result<&'a [u8]> {
        let slice = read_bytes(self.data, self.offset, len, field)?;
        self.offset += len;
        Ok(slice)
    }

    /// Reads a fixed-size byte array.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::TruncatedArchive` if fewer than `N` bytes remain.
    pub fn read_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N, field)?);
        Ok(out)
    }

    /// Reads a little-endian u32.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::TruncatedArchive` if fewer than 4 bytes remain.
    pub fn read_u32_le(&mut self, field: &'static str) -> Result<u32> {
        let value = read_u32_le(self.data, self.offset, field)?;
        self.offset += 4;
        Ok(value)
    }

    /// Reads a little-endian i32.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::TruncatedArchive` if fewer than 4 bytes remain.
    pub fn read_i32_le(&mut self, field: &'static str) -> Result<i32> {
        let value = read_i32_le(self.data, self.offset, field)?;
        self.offset += 4;
        Ok(value)
    }

    /// Reads a 7-bit encoded integer.
    ///
    /// # Errors
    ///
    /// See [`read_7bit_int`].
    pub fn read_7bit_int(&mut self, field: &'static str) -> Result<u64> {
        let (value, len) = read_7bit_int(self.data, self.offset, field)?;
        self.offset += len;
        Ok(value)
    }

    /// Reads a string prefixed by its 7-bit encoded byte length.
    ///
    /// # Errors
    ///
    /// - `ExtractError::TruncatedArchive` if the length or the bytes run past the end
    /// - `ExtractError::InvalidVarInt` if the length prefix is malformed
    /// - `ExtractError::InvalidString` if the bytes are not valid UTF-8
    pub fn read_string(&mut self, field: &'static str) -> Result<String> {
        let len_offset = self.offset;
        let len = self.read_7bit_int(field)?;
        let len = usize::try_from(len)
            .map_err(|_| ExtractError::truncated(field, len_offset, usize::MAX, self.data.len()))?;

        let start = self.offset;
        let bytes = self.read_bytes(len, field)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| ExtractError::InvalidString {
            field,
            offset: start,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================
    // Fixed-width reads
    // ========================

    #[test]
    fn test_read_u32_le_basic() {
        let data = [0x00, 0x00, 0x78, 0x56, 0x34, 0x12];
        assert_eq!(read_u32_le(&data, 2, "x").unwrap(), 0x12345678);
    }

    #[test]
    fn test_read_i32_le_negative() {
        let data = (-2i32).to_le_bytes();
        assert_eq!(read_i32_le(&data, 0, "x").unwrap(), -2);
    }

    #[test]
    fn test_read_u32_le_too_short() {
        let data = [0x78, 0x56, 0x34];
        let result = read_u32_le(&data, 0, "data length");
        assert!(matches!(
            result,
            Err(ExtractError::TruncatedArchive {
                field: "data length",
                offset: 0,
                needed: 4,
                available: 3
            })
        ));
    }

    #[test]
    fn test_read_bytes_offset_beyond_buffer() {
        let data = b"TMOD";
        let result = read_bytes(data, 10, 2, "hash");
        assert!(matches!(
            result,
            Err(ExtractError::TruncatedArchive { available: 0, .. })
        ));
    }

    #[test]
    fn test_read_bytes_huge_length_does_not_overflow() {
        let data = b"TMOD";
        let result = read_bytes(data, 2, usize::MAX, "payload");
        assert!(matches!(result, Err(ExtractError::TruncatedArchive { .. })));
    }

    // ========================
    // 7-bit encoded integers
    // ========================

    #[test]
    fn test_7bit_single_byte() {
        assert_eq!(read_7bit_int(&[0x00], 0, "x").unwrap(), (0, 1));
        assert_eq!(read_7bit_int(&[0x7F], 0, "x").unwrap(), (127, 1));
    }

    #[test]
    fn test_7bit_multi_byte() {
        assert_eq!(read_7bit_int(&[0x80, 0x01], 0, "x").unwrap(), (128, 2));
        assert_eq!(
            read_7bit_int(&[0xFF, 0xFF, 0xFF, 0xFF, 0x0F], 0, "x").unwrap(),
            (u64::from(u32::MAX), 5)
        );
    }

    #[test]
    fn test_7bit_round_trip_boundaries() {
        let mut values = vec![0u64, 1, u64::MAX, 1 << 63, (1 << 63) - 1];
        for shift in 1..64 {
            let v = 1u64 << shift;
            values.extend([v - 1, v, v + 1]);
        }

        for value in values {
            let encoded = encode_7bit_int(value);
            let (decoded, len) = read_7bit_int(&encoded, 0, "x").unwrap();
            assert_eq!(decoded, value, "value {value:#x}");
            assert_eq!(len, encoded.len());
        }
    }

    #[test]
    fn test_7bit_tenth_byte_values() {
        let mut data = vec![0x80; MAX_BYTES_WITHOUT_OVERFLOW];
        data.push(0x00);
        assert_eq!(read_7bit_int(&data, 0, "x").unwrap(), (0, 10));

        data[MAX_BYTES_WITHOUT_OVERFLOW] = 0x01;
        assert_eq!(read_7bit_int(&data, 0, "x").unwrap(), (1 << 63, 10));

        assert_eq!(encode_7bit_int(1 << 63).len(), 10);
    }

    #[test]
    fn test_7bit_tenth_byte_invalid() {
        for byte in [0x02, 0x7F, 0x80, 0xFF] {
            let mut data = vec![0xFF; MAX_BYTES_WITHOUT_OVERFLOW];
            data.push(byte);
            let result = read_7bit_int(&data, 0, "x");
            assert!(
                matches!(result, Err(ExtractError::InvalidVarInt { offset: 9, byte: b }) if b == byte),
                "tenth byte {byte:#x} should be rejected"
            );
        }
    }

    #[test]
    fn test_7bit_truncated() {
        let result = read_7bit_int(&[0x80, 0x80], 0, "version");
        assert!(matches!(
            result,
            Err(ExtractError::TruncatedArchive {
                field: "version",
                offset: 2,
                ..
            })
        ));
    }

    // ========================
    // ByteReader
    // ========================

    #[test]
    fn test_reader_sequence() {
        let mut data = b"TMOD".to_vec();
        data.extend(encode_7bit_int(6));
        data.extend_from_slice(b"v1.4.4");
        data.extend_from_slice(&(-1i32).to_le_bytes());

        let mut reader = ByteReader::new(&data);
        assert_eq!(&reader.read_array::<4>("magic").unwrap(), b"TMOD");
        assert_eq!(reader.read_string("version").unwrap(), "v1.4.4");
        assert_eq!(reader.offset(), 11);
        assert_eq!(reader.read_i32_le("count").unwrap(), -1);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_reader_string_truncated() {
        let mut data = encode_7bit_int(10);
        data.extend_from_slice(b"short");

        let mut reader = ByteReader::new(&data);
        let result = reader.read_string("mod name");
        assert!(matches!(
            result,
            Err(ExtractError::TruncatedArchive {
                field: "mod name",
                offset: 1,
                needed: 10,
                available: 5
            })
        ));
    }

    #[test]
    fn test_reader_string_invalid_utf8() {
        let data = [0x02, 0xFF, 0xFE];
        let mut reader = ByteReader::new(&data);
        let result = reader.read_string("filename");
        assert!(matches!(
            result,
            Err(ExtractError::InvalidString {
                field: "filename",
                offset: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_reader_empty_string() {
        let data = [0x00];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_string("x").unwrap(), "");
        assert!(reader.is_empty());
    }
}
