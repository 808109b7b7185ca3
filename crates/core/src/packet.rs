//! Wire-level types: packet types, the transport header byte, and the
//! multi-byte header carried by a payload's first chunk.
//!
//! # Transport Header Byte
//!
//! ```text
//!   7   6   5   4   3   2   1   0
//! +---+---+---+---+---+---+---+---+
//! | chunk chksum | T |  chunk idx  |
//! +---+---+---+---+---+---+---+---+
//! ```
//!
//! T = 0 energy profile, T = 1 application output.
//!
//! # Multi-byte Header
//!
//! Read with the LSB-first field convention of [`crate::bitio`]: a 4-bit
//! payload size followed by the 4-bit payload checksum. In plain byte terms
//! the size sits in the low nibble and the checksum in the high nibble.

use crate::bitio::{BitReader, BitWriter};
use crate::error::BitIoError;

/// Bits 7-5 of a header byte.
pub const CHUNK_CHECKSUM_MASK: u8 = 0xE0;
/// Bit 4 of a header byte.
pub const TYPE_MASK: u8 = 0x10;
/// Bits 3-0 of a header byte.
pub const INDEX_MASK: u8 = 0x0F;

/// Width of the chunk checksum field.
pub const CHUNK_CHECKSUM_BITS: u8 = 3;
/// Width of each multi-byte header field.
pub const SIZE_FIELD_BITS: u8 = 4;
pub const PAYLOAD_CHECKSUM_BITS: u8 = 4;

/// Kind of a decoded unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    EnergyProfile,
    AppOutput,
    /// Synthetic: a lone sync byte, never carried in a header
    Beacon,
}

impl PacketType {
    /// Map the header's type bit to a packet type.
    pub fn from_wire_bit(bit: u8) -> Self {
        if bit & 1 == 0 {
            PacketType::EnergyProfile
        } else {
            PacketType::AppOutput
        }
    }

    /// The header type bit, or `None` for beacons which have no header.
    pub fn wire_bit(self) -> Option<u8> {
        match self {
            PacketType::EnergyProfile => Some(0),
            PacketType::AppOutput => Some(1),
            PacketType::Beacon => None,
        }
    }

    /// One-letter tag used in formatted output.
    pub fn label(self) -> &'static str {
        match self {
            PacketType::EnergyProfile => "P",
            PacketType::AppOutput => "A",
            PacketType::Beacon => "B",
        }
    }

    /// Human-readable name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            PacketType::EnergyProfile => "energy-profile",
            PacketType::AppOutput => "app-output",
            PacketType::Beacon => "beacon",
        }
    }
}

impl std::fmt::Display for PacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Fields of a transport header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportHeader {
    /// The byte as received
    pub raw: u8,
    /// Truncated chunk CRC (3 bits)
    pub checksum: u8,
    pub packet_type: PacketType,
    /// Chunk index (4 bits)
    pub index: u8,
}

impl TransportHeader {
    /// Split a received byte into header fields.
    pub fn parse(raw: u8) -> Self {
        Self {
            raw,
            checksum: (raw & CHUNK_CHECKSUM_MASK) >> 5,
            packet_type: PacketType::from_wire_bit((raw & TYPE_MASK) >> 4),
            index: raw & INDEX_MASK,
        }
    }

    /// Assemble a header byte. Beacons map to the energy-profile bit;
    /// callers reject them before this point.
    pub fn encode(checksum: u8, packet_type: PacketType, index: u8) -> u8 {
        let type_bit = packet_type.wire_bit().unwrap_or(0);
        ((checksum << 5) & CHUNK_CHECKSUM_MASK) | (type_bit << 4) | (index & INDEX_MASK)
    }

    /// The raw byte with the checksum field zeroed, as covered by the
    /// chunk CRC.
    pub fn masked(&self) -> u8 {
        self.raw & !CHUNK_CHECKSUM_MASK
    }
}

/// Size and checksum descriptor carried by chunk 0 of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultibyteHeader {
    /// Declared payload length in bytes
    pub size: u8,
    /// Declared CRC-4 of the payload
    pub checksum: u8,
}

impl MultibyteHeader {
    pub fn parse(byte: u8) -> Result<Self, BitIoError> {
        let bytes = [byte];
        let mut reader = BitReader::new(&bytes);
        let size = reader.read(SIZE_FIELD_BITS)?;
        let checksum = reader.read(PAYLOAD_CHECKSUM_BITS)?;
        Ok(Self { size, checksum })
    }

    pub fn encode(&self) -> Result<u8, BitIoError> {
        let mut writer = BitWriter::new();
        writer.write(self.size, SIZE_FIELD_BITS)?;
        writer.write(self.checksum, PAYLOAD_CHECKSUM_BITS)?;
        Ok(writer.finish().first().copied().unwrap_or(0))
    }
}

/// A decoded unit: both chunk-level and payload-level checks have passed.
///
/// Beacon packets carry an empty payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub packet_type: PacketType,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(packet_type: PacketType, payload: Vec<u8>) -> Self {
        Self {
            packet_type,
            payload,
        }
    }

    pub fn beacon() -> Self {
        Self::new(PacketType::Beacon, Vec::new())
    }

    pub fn is_beacon(&self) -> bool {
        self.packet_type == PacketType::Beacon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_fields() {
        let header = TransportHeader::parse(0b101_1_0110);
        assert_eq!(header.checksum, 0b101);
        assert_eq!(header.packet_type, PacketType::AppOutput);
        assert_eq!(header.index, 6);
        assert_eq!(header.masked(), 0b000_1_0110);
    }

    #[test]
    fn test_header_encode() {
        assert_eq!(TransportHeader::encode(0b111, PacketType::EnergyProfile, 0), 0xE0);
        assert_eq!(TransportHeader::encode(0b110, PacketType::AppOutput, 0), 0xD0);
        // Out-of-range fields are clipped to their widths
        assert_eq!(TransportHeader::encode(0, PacketType::EnergyProfile, 0x1F), 0x0F);
    }

    #[test]
    fn test_multibyte_header_nibbles() {
        let header = MultibyteHeader::parse(0x98).unwrap();
        assert_eq!(header.size, 8);
        assert_eq!(header.checksum, 9);
        assert_eq!(header.encode().unwrap(), 0x98);
    }

    #[test]
    fn test_type_labels() {
        assert_eq!(PacketType::from_wire_bit(0), PacketType::EnergyProfile);
        assert_eq!(PacketType::from_wire_bit(1), PacketType::AppOutput);
        assert_eq!(PacketType::Beacon.wire_bit(), None);
        assert_eq!(PacketType::AppOutput.label(), "A");
        assert_eq!(Packet::beacon().payload.len(), 0);
    }
}
