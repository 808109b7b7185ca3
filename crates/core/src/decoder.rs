//! Byte-at-a-time frame decoder.
//!
//! The decoder recovers packets from a noisy downlink. It tracks two
//! independent sub-states:
//!
//! - **Frame**: whether a header byte is waiting for its data byte
//!   (`Idle` / `HeaderSeen`).
//! - **Payload**: progress of the logical unit being reassembled
//!   (`NoPayload`, `AwaitingHeaderChunk[Retry]`, `CollectingData[Retry]`).
//!
//! # Resynchronization
//!
//! - A sync byte is a beacon wherever it appears; it resets the frame state
//!   only, so an in-flight payload can continue after it.
//! - A chunk checksum failure returns the data byte to the caller
//!   ([`Outcome::PutBack`]) and resets the frame state. The payload state is
//!   preserved so the next header can continue the same unit.
//! - A chunk that passes its checksum but is inconsistent with the payload
//!   (declared size, type, index) is tolerated once: the payload state moves
//!   to its retry variant and the data byte is put back. A second consecutive
//!   inconsistency discards the payload.
//! - A completed payload whose 4-bit checksum fails is dropped.
//!
//! # Caller Contract
//!
//! After `PutBack(b)` the caller must submit `b` again before reading any
//! new input. At most one byte is ever pending; see
//! [`crate::stream::Lookahead`].
//!
//! # Thread Safety
//!
//! A decoder mutates only itself and must be driven by a single owner.

use tracing::{debug, error, info, warn};

use crate::config::DecoderConfig;
use crate::metrics::DecoderStats;
use crate::packet::{
    MultibyteHeader, Packet, PacketType, TransportHeader, CHUNK_CHECKSUM_BITS, PAYLOAD_CHECKSUM_BITS,
};

/// Result of feeding one byte to the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// More bytes needed
    NoOutput,
    /// A verified packet (or a beacon)
    Packet(Packet),
    /// The byte could not be consumed here; submit it again next
    PutBack(u8),
}

/// Frame-detection sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Next byte is interpreted as a header byte
    Idle,
    /// A header byte was accepted; next byte is its data byte
    HeaderSeen,
}

/// Payload-reassembly sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadState {
    NoPayload,
    /// A header byte arrived; its chunk should carry the multi-byte header
    AwaitingHeaderChunk,
    /// One inconsistent header chunk has been seen
    AwaitingHeaderChunkRetry,
    CollectingData,
    /// One inconsistent data chunk has been seen
    CollectingDataRetry,
}

/// A payload being reassembled.
#[derive(Debug, Clone)]
struct Unit {
    packet_type: PacketType,
    size: u8,
    checksum: u8,
    bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
enum Payload {
    None,
    AwaitingHeader { retry: bool },
    Collecting { unit: Unit, retry: bool },
}

/// The downlink protocol state machine.
pub struct FrameDecoder<'a> {
    config: &'a DecoderConfig,

    /// Header byte waiting for its data byte (frame state `HeaderSeen`)
    pending_header: Option<TransportHeader>,

    payload: Payload,

    stats: DecoderStats,
}

impl<'a> FrameDecoder<'a> {
    /// Create a decoder in the `Idle` / `NoPayload` state.
    pub fn new(config: &'a DecoderConfig) -> Self {
        Self {
            config,
            pending_header: None,
            payload: Payload::None,
            stats: DecoderStats::new(),
        }
    }

    /// Feed one byte.
    pub fn decode(&mut self, byte: u8) -> Outcome {
        self.stats.bytes_decoded += 1;

        // Checked before any chunk interpretation: a data byte equal to the
        // sync value abandons its chunk without a put-back.
        if byte == self.config.sync_byte {
            if let Some(header) = self.pending_header.take() {
                debug!("sync byte in data position abandons chunk {:#04x}", header.raw);
            }
            self.stats.record_packet(PacketType::Beacon, 0);
            return Outcome::Packet(Packet::beacon());
        }

        match self.pending_header.take() {
            None => self.accept_header(byte),
            Some(header) => self.accept_chunk(header, byte),
        }
    }

    /// Return to the freshly-constructed state. Statistics are kept.
    pub fn reset(&mut self) {
        self.pending_header = None;
        self.payload = Payload::None;
    }

    pub fn frame_state(&self) -> FrameState {
        match self.pending_header {
            Some(_) => FrameState::HeaderSeen,
            None => FrameState::Idle,
        }
    }

    pub fn payload_state(&self) -> PayloadState {
        match &self.payload {
            Payload::None => PayloadState::NoPayload,
            Payload::AwaitingHeader { retry: false } => PayloadState::AwaitingHeaderChunk,
            Payload::AwaitingHeader { retry: true } => PayloadState::AwaitingHeaderChunkRetry,
            Payload::Collecting { retry: false, .. } => PayloadState::CollectingData,
            Payload::Collecting { retry: true, .. } => PayloadState::CollectingDataRetry,
        }
    }

    /// Payload bytes accepted so far for the in-flight unit.
    pub fn collected(&self) -> usize {
        match &self.payload {
            Payload::Collecting { unit, .. } => unit.bytes.len(),
            _ => 0,
        }
    }

    /// Type of the in-flight unit, once its header chunk was accepted.
    pub fn in_flight_type(&self) -> Option<PacketType> {
        match &self.payload {
            Payload::Collecting { unit, .. } => Some(unit.packet_type),
            _ => None,
        }
    }

    pub fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    /// Consume the decoder, returning its completed statistics.
    pub fn into_stats(mut self) -> DecoderStats {
        self.stats.complete();
        self.stats
    }

    fn accept_header(&mut self, byte: u8) -> Outcome {
        let header = TransportHeader::parse(byte);

        if !self.config.recognizes(header.packet_type) {
            warn!("invalid packet type {} in byte {:#04x}", header.packet_type, byte);
            self.stats.unrecognized_types += 1;
            return Outcome::NoOutput;
        }

        if let Payload::None = self.payload {
            self.payload = Payload::AwaitingHeader { retry: false };
        }
        self.pending_header = Some(header);
        Outcome::NoOutput
    }

    fn accept_chunk(&mut self, header: TransportHeader, data: u8) -> Outcome {
        let computed = self
            .config
            .crc
            .truncated(&[header.masked(), data], CHUNK_CHECKSUM_BITS);
        if computed != header.checksum {
            warn!(
                "payload chunk checksum mismatch: {:#x} (expected {:#x})",
                computed, header.checksum
            );
            self.stats.chunk_checksum_failures += 1;
            return self.put_back(data);
        }

        match std::mem::replace(&mut self.payload, Payload::None) {
            Payload::None => self.start_unit(header, data, false),
            Payload::AwaitingHeader { retry } => self.start_unit(header, data, retry),
            Payload::Collecting { unit, retry } => self.extend_unit(header, data, unit, retry),
        }
    }

    /// Interpret an accepted chunk as the multi-byte header of a new unit.
    fn start_unit(&mut self, header: TransportHeader, data: u8, retry: bool) -> Outcome {
        let descriptor = match MultibyteHeader::parse(data) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                error!("multi-byte header {:#04x} unreadable: {}", data, err);
                return self.reject_header(data, retry);
            }
        };

        if header.index != 0 {
            warn!("payload header chunk idx mismatch: {} (expected 0)", header.index);
            return self.reject_header(data, retry);
        }

        let expected = self.config.expected_size(header.packet_type);
        if expected != Some(descriptor.size) {
            warn!(
                "payload size mismatch: {} (expected {})",
                descriptor.size,
                expected.unwrap_or(0)
            );
            return self.reject_header(data, retry);
        }

        debug!(
            "collecting {} payload: size {} chksum {:#x}",
            header.packet_type, descriptor.size, descriptor.checksum
        );
        self.payload = Payload::Collecting {
            unit: Unit {
                packet_type: header.packet_type,
                size: descriptor.size,
                checksum: descriptor.checksum,
                bytes: Vec::with_capacity(descriptor.size as usize),
            },
            retry: false,
        };
        Outcome::NoOutput
    }

    fn reject_header(&mut self, data: u8, retry: bool) -> Outcome {
        self.stats.header_mismatches += 1;
        if retry {
            debug!("second consecutive bad header chunk, waiting for a new unit");
        } else {
            self.payload = Payload::AwaitingHeader { retry: true };
        }
        self.put_back(data)
    }

    /// Append an accepted chunk's data byte to the in-flight unit.
    fn extend_unit(&mut self, header: TransportHeader, data: u8, mut unit: Unit, retry: bool) -> Outcome {
        if header.packet_type != unit.packet_type {
            warn!(
                "payload chunk type mismatch: {} (expected {})",
                header.packet_type, unit.packet_type
            );
            self.stats.type_mismatches += 1;
            return self.tolerate(unit, data, retry);
        }

        // Index 0 was the multi-byte header chunk
        let expected_index = unit.bytes.len() + 1;
        if header.index as usize != expected_index {
            warn!(
                "payload chunk idx mismatch: {} (expected {})",
                header.index, expected_index
            );
            self.stats.index_mismatches += 1;
            return self.tolerate(unit, data, retry);
        }

        unit.bytes.push(data);
        if unit.bytes.len() < unit.size as usize {
            self.payload = Payload::Collecting { unit, retry: false };
            return Outcome::NoOutput;
        }

        // Complete: the payload state is already NoPayload
        let computed = self.config.crc.truncated(&unit.bytes, PAYLOAD_CHECKSUM_BITS);
        if computed != unit.checksum {
            warn!(
                "payload chksum mismatch: {:#x} (expected {:#x})",
                computed, unit.checksum
            );
            self.stats.payload_checksum_failures += 1;
            return Outcome::NoOutput;
        }

        info!("pkt decoded: type {} payload {:02x?}", unit.packet_type, unit.bytes);
        self.stats.record_packet(unit.packet_type, unit.bytes.len());
        Outcome::Packet(Packet::new(unit.packet_type, unit.bytes))
    }

    fn tolerate(&mut self, unit: Unit, data: u8, retry: bool) -> Outcome {
        if retry {
            warn!(
                "discarding {} payload after {} of {} bytes",
                unit.packet_type,
                unit.bytes.len(),
                unit.size
            );
            self.stats.payloads_aborted += 1;
        } else {
            self.payload = Payload::Collecting { unit, retry: true };
        }
        self.put_back(data)
    }

    fn put_back(&mut self, byte: u8) -> Outcome {
        self.stats.put_backs += 1;
        Outcome::PutBack(byte)
    }
}
