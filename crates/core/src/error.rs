//! Error types for the downlink decoder.
//!
//! Byte-stream anomalies (bad chunk checksums, index gaps, unknown packet
//! types) are NOT errors: the decoder reports them as diagnostics and keeps
//! running. The types here cover what genuinely stops an operation:
//! malformed configuration, I/O on the byte source or sinks, misuse of the
//! lookahead buffer, and starved bit-field reads.

use thiserror::Error;

/// Top-level error type for all operations in the workspace.
#[derive(Debug, Error)]
pub enum Error {
    /// Bit-field extraction failed (e.g., payload shorter than its layout)
    #[error("bit I/O error: {0}")]
    BitIo(#[from] BitIoError),

    /// Transmit-side framing rejected a payload
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Put-back requested while a byte is already pending
    #[error("lookahead slot already holds byte {pending:#04x}, cannot put back {rejected:#04x}")]
    LookaheadFull { pending: u8, rejected: u8 },

    /// File or stream I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Bit-level field extraction errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BitIoError {
    /// The stream ran out before `requested` bits were produced
    #[error("insufficient bits: requested {requested}, available {available}")]
    InsufficientBits { requested: usize, available: usize },

    /// Field width outside the supported 1..=8 range
    #[error("invalid bit count: {0}")]
    InvalidBitCount(usize),
}

/// Transmit-side framing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FramingError {
    /// Nothing to send
    #[error("cannot frame an empty payload")]
    EmptyPayload,

    /// The 4-bit size field and 4-bit chunk index cap the payload length
    #[error("payload of {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// Beacons are a single sync byte, not a chunk sequence
    #[error("packet type {0} cannot be framed as chunks")]
    NotFramable(&'static str),
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;
