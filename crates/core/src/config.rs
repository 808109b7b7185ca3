//! Protocol configuration shared by the decoder and the framer.
//!
//! Built once per session and borrowed by every [`FrameDecoder`]; there is
//! no process-wide protocol state.
//!
//! [`FrameDecoder`]: crate::decoder::FrameDecoder

use crate::crc::CrcParams;
use crate::error::{Error, Result};
use crate::packet::PacketType;

/// Sync/beacon marker on the downlink.
pub const SYNC_BYTE: u8 = 0xED;

/// Largest payload the 4-bit size field and 4-bit chunk index can describe.
pub const MAX_PAYLOAD_SIZE: u8 = 15;

/// Payload length of an energy profile: 4 events x 2 bytes.
pub const ENERGY_PROFILE_SIZE: u8 = 8;

/// Payload length of an application-output record: 2 windows x 4 bytes.
pub const APP_OUTPUT_SIZE: u8 = 8;

/// Immutable protocol parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Byte reported as a beacon wherever it appears
    pub sync_byte: u8,

    /// CRC used by both the chunk and payload checks
    pub crc: CrcParams,

    /// Expected payload size of energy profiles; `None` disables the type
    pub energy_profile_size: Option<u8>,

    /// Expected payload size of application output; `None` disables the type
    pub app_output_size: Option<u8>,
}

impl DecoderConfig {
    /// Expected payload size for a type, or `None` when the type is not
    /// accepted from the wire.
    pub fn expected_size(&self, packet_type: PacketType) -> Option<u8> {
        match packet_type {
            PacketType::EnergyProfile => self.energy_profile_size,
            PacketType::AppOutput => self.app_output_size,
            PacketType::Beacon => None,
        }
    }

    /// Whether header bytes of this type are accepted.
    pub fn recognizes(&self, packet_type: PacketType) -> bool {
        self.expected_size(packet_type).is_some()
    }

    /// Check the size table against what the wire format can carry.
    pub fn validate(&self) -> Result<()> {
        for (packet_type, size) in [
            (PacketType::EnergyProfile, self.energy_profile_size),
            (PacketType::AppOutput, self.app_output_size),
        ] {
            if let Some(size) = size {
                if size == 0 || size > MAX_PAYLOAD_SIZE {
                    return Err(Error::Config(format!(
                        "{} size {} outside 1..={}",
                        packet_type, size, MAX_PAYLOAD_SIZE
                    )));
                }
            }
        }

        if self.energy_profile_size.is_none() && self.app_output_size.is_none() {
            return Err(Error::Config("no packet type enabled".to_string()));
        }

        Ok(())
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            sync_byte: SYNC_BYTE,
            crc: CrcParams::TRANSPORT,
            energy_profile_size: Some(ENERGY_PROFILE_SIZE),
            app_output_size: Some(APP_OUTPUT_SIZE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let config = DecoderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.expected_size(PacketType::EnergyProfile), Some(8));
        assert_eq!(config.expected_size(PacketType::AppOutput), Some(8));
        assert_eq!(config.expected_size(PacketType::Beacon), None);
    }

    #[test]
    fn test_oversized_rejected() {
        let config = DecoderConfig {
            app_output_size: Some(16),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_size_rejected() {
        let config = DecoderConfig {
            energy_profile_size: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_all_disabled_rejected() {
        let config = DecoderConfig {
            energy_profile_size: None,
            app_output_size: None,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disabled_type_not_recognized() {
        let config = DecoderConfig {
            app_output_size: None,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert!(config.recognizes(PacketType::EnergyProfile));
        assert!(!config.recognizes(PacketType::AppOutput));
    }
}
