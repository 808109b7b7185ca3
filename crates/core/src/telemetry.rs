//! Telemetry payload layouts and their text rendering.
//!
//! Payloads are bit-packed with the LSB-first convention of
//! [`crate::bitio`].
//!
//! # Energy Profile (8 bytes)
//!
//! Four events, 16 bits each:
//!
//! ```text
//! | bin0: 5 | bin1: 5 | count: 6 |
//! ```
//!
//! # Application Output (8 bytes)
//!
//! Two sampling windows, 32 bits each. Sensor axes are two's complement.
//!
//! ```text
//! | temp: 8 | mag x,y,z: 4+4+4 | accel x,y,z: 4+4+4 |
//! ```

use std::fmt;

use crate::bitio::{BitReader, BitWriter};
use crate::error::BitIoError;
use crate::packet::{Packet, PacketType};

const BIN_BITS: u8 = 5;
const COUNT_BITS: u8 = 6;
const TEMPERATURE_BITS: u8 = 8;
const AXIS_BITS: u8 = 4;

/// Interpret the low `width` bits of `value` as two's complement.
pub fn twocomp(value: u8, width: u8) -> i8 {
    let width = width.min(8);
    if width == 0 {
        return 0;
    }

    let value = (value as i16) & ((1 << width) - 1);
    if value & (1 << (width - 1)) != 0 {
        (value - (1 << width)) as i8
    } else {
        value as i8
    }
}

/// Low `width` bits of a signed value, for packing.
fn to_field(value: i8, width: u8) -> u8 {
    (value as u8) & (((1u16 << width) - 1) as u8)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProfileEvent {
    pub bins: [u8; 2],
    pub count: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnergyProfile {
    pub events: [ProfileEvent; 4],
}

impl EnergyProfile {
    pub fn unpack(payload: &[u8]) -> Result<Self, BitIoError> {
        let mut reader = BitReader::new(payload);
        let mut events = [ProfileEvent::default(); 4];

        for event in events.iter_mut() {
            let bin0 = reader.read(BIN_BITS)?;
            let bin1 = reader.read(BIN_BITS)?;
            let count = reader.read(COUNT_BITS)?;
            *event = ProfileEvent {
                bins: [bin0, bin1],
                count,
            };
        }

        Ok(Self { events })
    }

    /// Pack into the wire layout. Out-of-range fields are clipped.
    pub fn pack(&self) -> Result<Vec<u8>, BitIoError> {
        let mut writer = BitWriter::new();
        for event in &self.events {
            writer.write(event.bins[0], BIN_BITS)?;
            writer.write(event.bins[1], BIN_BITS)?;
            writer.write(event.count, COUNT_BITS)?;
        }
        Ok(writer.finish())
    }
}

impl fmt::Display for EnergyProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", PacketType::EnergyProfile.label())?;
        for event in &self.events {
            write!(f, " | {} [{}:{}]", event.count, event.bins[0], event.bins[1])?;
        }
        Ok(())
    }
}

/// One sampling window of the on-board application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppWindow {
    pub temperature: u8,
    pub magnetometer: [i8; 3],
    pub accelerometer: [i8; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppOutput {
    pub windows: [AppWindow; 2],
}

impl AppOutput {
    pub fn unpack(payload: &[u8]) -> Result<Self, BitIoError> {
        let mut reader = BitReader::new(payload);
        let mut windows = [AppWindow::default(); 2];

        for window in windows.iter_mut() {
            window.temperature = reader.read(TEMPERATURE_BITS)?;
            for axis in window.magnetometer.iter_mut() {
                *axis = twocomp(reader.read(AXIS_BITS)?, AXIS_BITS);
            }
            for axis in window.accelerometer.iter_mut() {
                *axis = twocomp(reader.read(AXIS_BITS)?, AXIS_BITS);
            }
        }

        Ok(Self { windows })
    }

    /// Pack into the wire layout. Axes outside -8..=7 wrap.
    pub fn pack(&self) -> Result<Vec<u8>, BitIoError> {
        let mut writer = BitWriter::new();
        for window in &self.windows {
            writer.write(window.temperature, TEMPERATURE_BITS)?;
            for &axis in window.magnetometer.iter().chain(&window.accelerometer) {
                writer.write(to_field(axis, AXIS_BITS), AXIS_BITS)?;
            }
        }
        Ok(writer.finish())
    }
}

fn write_axes(f: &mut fmt::Formatter<'_>, axes: &[i8; 3]) -> fmt::Result {
    write!(f, "({},{},{})", axes[0], axes[1], axes[2])
}

impl fmt::Display for AppOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", PacketType::AppOutput.label())?;
        for window in &self.windows {
            write!(f, " [temp {} mag ", window.temperature)?;
            write_axes(f, &window.magnetometer)?;
            f.write_str(" accel ")?;
            write_axes(f, &window.accelerometer)?;
            f.write_str("]")?;
        }
        Ok(())
    }
}

/// A packet's payload decoded into its typed layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Telemetry {
    Beacon,
    EnergyProfile(EnergyProfile),
    AppOutput(AppOutput),
}

impl fmt::Display for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Telemetry::Beacon => f.write_str(PacketType::Beacon.label()),
            Telemetry::EnergyProfile(profile) => write!(f, "{}", profile),
            Telemetry::AppOutput(output) => write!(f, "{}", output),
        }
    }
}

/// Decode a payload according to its packet type.
///
/// Bytes past the layout are ignored.
///
/// # Errors
/// `BitIoError::InsufficientBits` if the payload is shorter than the layout.
pub fn unpack(packet_type: PacketType, payload: &[u8]) -> Result<Telemetry, BitIoError> {
    Ok(match packet_type {
        PacketType::Beacon => Telemetry::Beacon,
        PacketType::EnergyProfile => Telemetry::EnergyProfile(EnergyProfile::unpack(payload)?),
        PacketType::AppOutput => Telemetry::AppOutput(AppOutput::unpack(payload)?),
    })
}

/// Render a packet as one line of text.
pub fn format(packet_type: PacketType, payload: &[u8]) -> Result<String, BitIoError> {
    Ok(unpack(packet_type, payload)?.to_string())
}

/// Raw dump: `<label>: <hex bytes>`, or the label alone for an empty payload.
pub fn format_raw(packet: &Packet) -> String {
    let label = packet.packet_type.label();
    if packet.payload.is_empty() {
        return label.to_string();
    }

    let bytes: Vec<String> = packet.payload.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}: {}", label, bytes.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP_PAYLOAD: [u8; 8] = [0x19, 0xF1, 0x2E, 0x7A, 0x20, 0x00, 0xFF, 0x88];

    #[test]
    fn test_twocomp() {
        assert_eq!(twocomp(0b1111, 4), -1);
        assert_eq!(twocomp(0b0111, 4), 7);
        assert_eq!(twocomp(0b1000, 4), -8);
        assert_eq!(twocomp(0, 4), 0);
        assert_eq!(twocomp(0x80, 8), -128);
        // Bits above the width are ignored
        assert_eq!(twocomp(0xF1, 4), 1);
    }

    #[test]
    fn test_format_energy_profile() {
        let line = format(PacketType::EnergyProfile, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(line, "P: | 0 [1:16] | 1 [3:0] | 1 [5:16] | 2 [7:0]");
    }

    #[test]
    fn test_format_saturated_profile() {
        let line = format(PacketType::EnergyProfile, &[0xFF; 8]).unwrap();
        assert_eq!(line, "P:".to_string() + &" | 63 [31:31]".repeat(4));
    }

    #[test]
    fn test_format_app_output() {
        let line = format(PacketType::AppOutput, &APP_PAYLOAD).unwrap();
        assert_eq!(
            line,
            "A: [temp 25 mag (1,-1,-2) accel (2,-6,7)] [temp 32 mag (0,0,-1) accel (-1,-8,-8)]"
        );
    }

    #[test]
    fn test_temperature_is_unsigned() {
        let output = AppOutput::unpack(&[0xF0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(output.windows[0].temperature, 240);
    }

    #[test]
    fn test_format_beacon() {
        assert_eq!(format(PacketType::Beacon, &[]).unwrap(), "B");
    }

    #[test]
    fn test_short_payload_is_error() {
        let err = format(PacketType::AppOutput, &APP_PAYLOAD[..5]).unwrap_err();
        assert!(matches!(err, BitIoError::InsufficientBits { .. }));
    }

    #[test]
    fn test_pack_inverts_unpack() {
        let output = AppOutput::unpack(&APP_PAYLOAD).unwrap();
        assert_eq!(output.pack().unwrap(), APP_PAYLOAD.to_vec());

        let profile = EnergyProfile {
            events: [
                ProfileEvent { bins: [3, 17], count: 42 },
                ProfileEvent { bins: [0, 31], count: 0 },
                ProfileEvent { bins: [9, 9], count: 63 },
                ProfileEvent { bins: [30, 1], count: 5 },
            ],
        };
        let bytes = profile.pack().unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(EnergyProfile::unpack(&bytes).unwrap(), profile);
    }

    #[test]
    fn test_format_raw() {
        let packet = Packet::new(PacketType::AppOutput, vec![0x19, 0xF1, 0x0A]);
        assert_eq!(format_raw(&packet), "A: 19 f1 0a");
        assert_eq!(format_raw(&Packet::beacon()), "B");
    }
}
