//! Bit-level field extraction and packing.
//!
//! The downlink packs sub-byte fields back to back, so a byte sequence is
//! treated as one continuous bit stream:
//! - bytes are consumed in stream order
//! - within a byte, bits are consumed least-significant first
//! - the first bit consumed by a read becomes bit 0 of the result
//!
//! Two sequential reads of `w1` and `w2` bits therefore see exactly the bits
//! a single `w1 + w2` read would, split at the boundary.
//!
//! # Example
//! ```
//! use edbsat_core::bitio::{BitReader, BitWriter};
//!
//! let mut writer = BitWriter::new();
//! writer.write(0b1000, 4).unwrap(); // size field
//! writer.write(0b0011, 4).unwrap(); // checksum field
//! let bytes = writer.finish();
//! assert_eq!(bytes, vec![0x38]);
//!
//! let mut reader = BitReader::new(&bytes);
//! assert_eq!(reader.read(4).unwrap(), 0b1000);
//! assert_eq!(reader.read(4).unwrap(), 0b0011);
//! ```

use crate::error::BitIoError;

/// Widest field a single read or write may cover.
pub const MAX_FIELD_BITS: u8 = 8;

fn check_width(width: u8) -> Result<(), BitIoError> {
    if width == 0 || width > MAX_FIELD_BITS {
        return Err(BitIoError::InvalidBitCount(width as usize));
    }
    Ok(())
}

/// Reads LSB-first bit fields from a borrowed byte slice.
///
/// The reader owns nothing but its cursor.
///
/// # Invariants
/// - `bit_position` never exceeds `data.len() * 8`
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    /// Source data, protocol order
    data: &'a [u8],
    /// Current bit position (0 = LSB of first byte)
    bit_position: usize,
}

impl<'a> BitReader<'a> {
    /// Create a new BitReader for the given data.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            bit_position: 0,
        }
    }

    /// Read the next `width` bits (1-8).
    ///
    /// # Errors
    /// - `BitIoError::InvalidBitCount` if width is 0 or greater than 8
    /// - `BitIoError::InsufficientBits` if fewer than `width` bits remain;
    ///   the cursor does not move in that case
    pub fn read(&mut self, width: u8) -> Result<u8, BitIoError> {
        check_width(width)?;

        let available = self.bits_remaining();
        if width as usize > available {
            return Err(BitIoError::InsufficientBits {
                requested: width as usize,
                available,
            });
        }

        let mut result = 0u8;
        for i in 0..width {
            let byte = self.data[self.bit_position / 8];
            let bit = (byte >> (self.bit_position % 8)) & 1;
            result |= bit << i;
            self.bit_position += 1;
        }

        Ok(result)
    }

    /// Read a single bit.
    pub fn read_bit(&mut self) -> Result<bool, BitIoError> {
        Ok(self.read(1)? == 1)
    }

    /// Return the number of bits remaining in the buffer.
    pub fn bits_remaining(&self) -> usize {
        self.data.len() * 8 - self.bit_position
    }

    /// Return the current bit position.
    pub fn position(&self) -> usize {
        self.bit_position
    }

    /// Check if we're at the end of the buffer.
    pub fn is_empty(&self) -> bool {
        self.bit_position >= self.data.len() * 8
    }
}

/// Packs LSB-first bit fields into bytes; the inverse of [`BitReader`].
///
/// # Invariants
/// - `bit_count` is always < 8
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    /// Completed bytes
    bytes: Vec<u8>,
    /// Accumulator for the current partial byte (filled from bit 0 upward)
    bit_buffer: u8,
    /// Number of bits in bit_buffer (0-7)
    bit_count: u8,
}

impl BitWriter {
    /// Create a new BitWriter with empty output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `width` bits of `value` (1-8), bit 0 first.
    ///
    /// Bits of `value` above `width` are ignored.
    pub fn write(&mut self, value: u8, width: u8) -> Result<(), BitIoError> {
        check_width(width)?;

        for i in 0..width {
            let bit = (value >> i) & 1;
            self.bit_buffer |= bit << self.bit_count;
            self.bit_count += 1;

            if self.bit_count == 8 {
                self.bytes.push(self.bit_buffer);
                self.bit_buffer = 0;
                self.bit_count = 0;
            }
        }

        Ok(())
    }

    /// Finish writing and return the output bytes.
    ///
    /// A trailing partial byte is emitted with its unused high bits zeroed.
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            self.bytes.push(self.bit_buffer);
        }
        self.bytes
    }

    /// Return the total number of bits written (including partial byte).
    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8 + self.bit_count as usize
    }
}
