//! Transmit-side chunk framing.
//!
//! A payload goes over the air as a run of 2-byte chunks:
//!
//! ```text
//! +--------+------------------+--------+-----------+     +--------+-----------+
//! | hdr #0 | multi-byte hdr   | hdr #1 | payload 0 | ... | hdr #N | payload N-1|
//! +--------+------------------+--------+-----------+     +--------+-----------+
//! ```
//!
//! Every header byte carries the packet type, its chunk index, and a 3-bit
//! CRC over `[header with checksum zeroed, data byte]`. The multi-byte header
//! declares the payload size and a 4-bit CRC over the whole payload.
//!
//! The decoder never needs this module; it exists so that reference streams
//! can be produced with exactly the checks the decoder applies.

use crate::config::{DecoderConfig, MAX_PAYLOAD_SIZE};
use crate::error::{FramingError, Result};
use crate::packet::{
    MultibyteHeader, PacketType, TransportHeader, CHUNK_CHECKSUM_BITS, PAYLOAD_CHECKSUM_BITS,
};
use tracing::warn;

/// Build one chunk with a valid chunk checksum.
pub fn encode_chunk(config: &DecoderConfig, packet_type: PacketType, index: u8, data: u8) -> [u8; 2] {
    let unsigned = TransportHeader::encode(0, packet_type, index);
    let checksum = config.crc.truncated(&[unsigned, data], CHUNK_CHECKSUM_BITS);
    [TransportHeader::encode(checksum, packet_type, index), data]
}

/// Frame a complete payload into its chunk sequence.
///
/// # Errors
/// - `FramingError::NotFramable` for beacons
/// - `FramingError::EmptyPayload` for an empty payload
/// - `FramingError::PayloadTooLarge` past 15 bytes
pub fn frame_payload(config: &DecoderConfig, packet_type: PacketType, payload: &[u8]) -> Result<Vec<u8>> {
    if packet_type == PacketType::Beacon {
        return Err(FramingError::NotFramable(packet_type.name()).into());
    }
    if payload.is_empty() {
        return Err(FramingError::EmptyPayload.into());
    }
    if payload.len() > MAX_PAYLOAD_SIZE as usize {
        return Err(FramingError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE as usize,
        }
        .into());
    }

    let descriptor = MultibyteHeader {
        size: payload.len() as u8,
        checksum: config.crc.truncated(payload, PAYLOAD_CHECKSUM_BITS),
    };

    let mut stream = Vec::with_capacity(2 * (payload.len() + 1));
    stream.extend_from_slice(&encode_chunk(config, packet_type, 0, descriptor.encode()?));
    for (i, &byte) in payload.iter().enumerate() {
        stream.extend_from_slice(&encode_chunk(config, packet_type, i as u8 + 1, byte));
    }

    if let Some(pos) = stream.iter().position(|&b| b == config.sync_byte) {
        warn!(
            offset = pos,
            "framed {} contains the sync value; the receiver will read it as a beacon",
            packet_type
        );
    }

    Ok(stream)
}

/// The single-byte beacon.
pub fn beacon(config: &DecoderConfig) -> u8 {
    config.sync_byte
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_energy_profile_stream() {
        let config = DecoderConfig::default();
        let stream = frame_payload(&config, PacketType::EnergyProfile, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

        assert_eq!(
            stream,
            vec![
                0xE0, 0x98, 0xE1, 0x01, 0xE2, 0x02, 0xE3, 0x03, 0x64, 0x04, 0x65, 0x05, 0x66, 0x06,
                0x67, 0x07, 0xA8, 0x08
            ]
        );
    }

    #[test]
    fn test_app_output_stream() {
        let config = DecoderConfig::default();
        let payload = [0x19, 0xF1, 0x2E, 0x7A, 0x20, 0x00, 0xFF, 0x88];
        let stream = frame_payload(&config, PacketType::AppOutput, &payload).unwrap();

        assert_eq!(stream.len(), 18);
        assert_eq!(&stream[..4], &[0xD0, 0x88, 0xF1, 0x19]);
        assert_eq!(&stream[16..], &[0xB8, 0x88]);
    }

    #[test]
    fn test_chunk_checksum_verifies() {
        let config = DecoderConfig::default();
        let [header, data] = encode_chunk(&config, PacketType::AppOutput, 5, 0x42);
        let parsed = TransportHeader::parse(header);

        assert_eq!(parsed.index, 5);
        assert_eq!(parsed.packet_type, PacketType::AppOutput);
        assert_eq!(
            config.crc.truncated(&[parsed.masked(), data], CHUNK_CHECKSUM_BITS),
            parsed.checksum
        );
    }

    #[test]
    fn test_rejects_bad_payloads() {
        let config = DecoderConfig::default();

        assert!(matches!(
            frame_payload(&config, PacketType::EnergyProfile, &[]),
            Err(Error::Framing(FramingError::EmptyPayload))
        ));
        assert!(matches!(
            frame_payload(&config, PacketType::AppOutput, &[0u8; 16]),
            Err(Error::Framing(FramingError::PayloadTooLarge { size: 16, max: 15 }))
        ));
        assert!(matches!(
            frame_payload(&config, PacketType::Beacon, &[1]),
            Err(Error::Framing(FramingError::NotFramable(_)))
        ));
    }

    #[test]
    fn test_beacon_is_sync_byte() {
        assert_eq!(beacon(&DecoderConfig::default()), 0xED);
    }
}
