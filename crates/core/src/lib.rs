//! edbsat-core: Receive-side decoder for the EDBsat downlink
//!
//! The satellite transmits telemetry over a lossy radio link as 2-byte
//! chunks, each protected by a 3-bit CRC, with a 4-bit CRC over every
//! reassembled payload and a lone sync byte as a periodic beacon. This
//! library recovers verified packets from such a byte stream:
//! - Extracts bit-packed fields LSB-first
//! - Validates chunks and payloads against truncated CRC-16 values
//! - Resynchronizes after corruption via put-back and one-shot tolerance
//! - Renders energy-profile and application-output payloads as text
//!
//! # Architecture
//!
//! - `bitio`: Bit-field reading/writing
//! - `crc`: Parameterized CRC-16 and truncation
//! - `config`: Protocol parameters (sync byte, CRC, size table)
//! - `packet`: Header layouts and the decoded `Packet`
//! - `decoder`: The byte-at-a-time `FrameDecoder` state machine
//! - `telemetry`: Payload layouts and text formatting
//! - `stream`: Byte sources, put-back slot, recorder, `Receiver` loop
//! - `framing`: Transmit-side chunk framing for reference streams
//! - `channel`: Seeded noisy-link simulator
//! - `metrics`: Decoder counters
//!
//! # Design Principles
//!
//! - **No panics**: Stream anomalies are diagnostics, not errors
//! - **Bounded memory**: One payload in flight, one byte of put-back
//! - **Deterministic**: Decoding is a pure function of the byte sequence
//! - **Observable**: Every rejection is logged and counted

pub mod bitio;
pub mod channel;
pub mod config;
pub mod crc;
pub mod decoder;
pub mod error;
pub mod framing;
pub mod metrics;
pub mod packet;
pub mod stream;
pub mod telemetry;

// Re-export commonly used types
pub use config::DecoderConfig;
pub use decoder::{FrameDecoder, Outcome};
pub use error::{Error, Result};
pub use packet::{Packet, PacketType};
