//! Decoder statistics.
//!
//! Every diagnostic the decoder logs is also counted here, so a run over a
//! noisy recording can be summarized without scraping logs. Counters are
//! plain fields updated by the decoder; nothing here performs I/O except the
//! explicit `print_summary`.
//!
//! # Thread Safety
//!
//! `DecoderStats` is NOT thread-safe, like the decoder that owns it.

use std::time::{Duration, Instant};

use crate::packet::PacketType;

/// Counters for one decoding session.
#[derive(Debug, Clone)]
pub struct DecoderStats {
    // === Timing ===
    /// When the session started
    pub start_time: Instant,

    /// When the session ended (set on completion)
    pub end_time: Option<Instant>,

    // === Input ===
    /// Bytes handed to `decode`, re-submissions included
    pub bytes_decoded: u64,

    /// Bytes returned to the caller for re-submission
    pub put_backs: u64,

    // === Output ===
    /// Sync bytes reported as beacons
    pub beacons: u64,

    /// Energy-profile packets emitted
    pub energy_profiles: u64,

    /// Application-output packets emitted
    pub app_outputs: u64,

    /// Payload bytes carried by emitted data packets
    pub payload_bytes: u64,

    // === Rejections ===
    /// Header bytes of a type the configuration does not accept
    pub unrecognized_types: u64,

    /// Chunks whose 3-bit checksum did not match
    pub chunk_checksum_failures: u64,

    /// Header chunks that declared the wrong size or a non-zero index
    pub header_mismatches: u64,

    /// Data chunks whose type differed from the in-flight payload
    pub type_mismatches: u64,

    /// Data chunks with an unexpected index
    pub index_mismatches: u64,

    /// In-flight payloads discarded after a second consecutive failure
    pub payloads_aborted: u64,

    /// Completed payloads whose 4-bit checksum did not match
    pub payload_checksum_failures: u64,
}

impl DecoderStats {
    /// Create new stats with start time set to now.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            end_time: None,
            bytes_decoded: 0,
            put_backs: 0,
            beacons: 0,
            energy_profiles: 0,
            app_outputs: 0,
            payload_bytes: 0,
            unrecognized_types: 0,
            chunk_checksum_failures: 0,
            header_mismatches: 0,
            type_mismatches: 0,
            index_mismatches: 0,
            payloads_aborted: 0,
            payload_checksum_failures: 0,
        }
    }

    /// Count an emitted packet.
    pub fn record_packet(&mut self, packet_type: PacketType, payload_len: usize) {
        match packet_type {
            PacketType::EnergyProfile => self.energy_profiles += 1,
            PacketType::AppOutput => self.app_outputs += 1,
            PacketType::Beacon => self.beacons += 1,
        }
        self.payload_bytes += payload_len as u64;
    }

    /// Mark the session as complete.
    pub fn complete(&mut self) {
        self.end_time = Some(Instant::now());
    }

    /// Get total duration (or current elapsed if not complete).
    pub fn duration(&self) -> Duration {
        match self.end_time {
            Some(end) => end.duration_since(self.start_time),
            None => self.start_time.elapsed(),
        }
    }

    /// Data packets emitted (beacons excluded).
    pub fn packets(&self) -> u64 {
        self.energy_profiles + self.app_outputs
    }

    /// All consistency failures, chunk checksums included.
    pub fn rejections(&self) -> u64 {
        self.unrecognized_types
            + self.chunk_checksum_failures
            + self.header_mismatches
            + self.type_mismatches
            + self.index_mismatches
            + self.payload_checksum_failures
    }

    /// Fraction of fresh input bytes that ended up inside an emitted packet.
    ///
    /// A data packet of `n` payload bytes occupied `2 * (n + 1)` bytes on
    /// the wire; a beacon occupied one.
    pub fn packet_yield(&self) -> f64 {
        let fresh = self.bytes_decoded.saturating_sub(self.put_backs);
        if fresh == 0 {
            0.0
        } else {
            let useful = 2 * (self.payload_bytes + self.packets()) + self.beacons;
            (useful as f64 / fresh as f64).min(1.0)
        }
    }

    /// Print a human-readable summary to stderr.
    pub fn print_summary(&self) {
        eprintln!("\n=== Decoder Summary ===");
        eprintln!("Duration: {} ms", self.duration().as_millis());
        eprintln!("Bytes decoded: {} ({} put back)", self.bytes_decoded, self.put_backs);
        eprintln!();

        eprintln!("=== Packets ===");
        eprintln!("Energy profiles: {}", self.energy_profiles);
        eprintln!("App outputs: {}", self.app_outputs);
        eprintln!("Beacons: {}", self.beacons);
        eprintln!("Yield: {:.1}%", self.packet_yield() * 100.0);
        eprintln!();

        eprintln!("=== Rejections ===");
        eprintln!("Unrecognized types: {}", self.unrecognized_types);
        eprintln!("Chunk checksum failures: {}", self.chunk_checksum_failures);
        eprintln!("Header mismatches: {}", self.header_mismatches);
        eprintln!("Type mismatches: {}", self.type_mismatches);
        eprintln!("Index mismatches: {}", self.index_mismatches);
        eprintln!("Payloads aborted: {}", self.payloads_aborted);
        eprintln!("Payload checksum failures: {}", self.payload_checksum_failures);
        eprintln!();
    }

    /// Export stats as a simple text format (for parsing/testing).
    pub fn export_text(&self) -> String {
        format!(
            "duration_ms={}\n\
             bytes_decoded={}\n\
             put_backs={}\n\
             beacons={}\n\
             energy_profiles={}\n\
             app_outputs={}\n\
             payload_bytes={}\n\
             unrecognized_types={}\n\
             chunk_checksum_failures={}\n\
             header_mismatches={}\n\
             type_mismatches={}\n\
             index_mismatches={}\n\
             payloads_aborted={}\n\
             payload_checksum_failures={}\n",
            self.duration().as_millis(),
            self.bytes_decoded,
            self.put_backs,
            self.beacons,
            self.energy_profiles,
            self.app_outputs,
            self.payload_bytes,
            self.unrecognized_types,
            self.chunk_checksum_failures,
            self.header_mismatches,
            self.type_mismatches,
            self.index_mismatches,
            self.payloads_aborted,
            self.payload_checksum_failures,
        )
    }
}

impl Default for DecoderStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_creation() {
        let stats = DecoderStats::new();
        assert!(stats.end_time.is_none());
        assert_eq!(stats.packets(), 0);
        assert_eq!(stats.packet_yield(), 0.0);
    }

    #[test]
    fn test_record_packet() {
        let mut stats = DecoderStats::new();
        stats.record_packet(PacketType::EnergyProfile, 8);
        stats.record_packet(PacketType::AppOutput, 8);
        stats.record_packet(PacketType::Beacon, 0);

        assert_eq!(stats.packets(), 2);
        assert_eq!(stats.beacons, 1);
        assert_eq!(stats.payload_bytes, 16);
    }

    #[test]
    fn test_yield_clean_stream() {
        let mut stats = DecoderStats::new();
        stats.bytes_decoded = 19;
        stats.record_packet(PacketType::EnergyProfile, 8);
        stats.record_packet(PacketType::Beacon, 0);

        assert_eq!(stats.packet_yield(), 1.0);
    }

    #[test]
    fn test_rejections_sum() {
        let mut stats = DecoderStats::new();
        stats.chunk_checksum_failures = 2;
        stats.index_mismatches = 1;
        stats.payload_checksum_failures = 1;

        assert_eq!(stats.rejections(), 4);
    }

    #[test]
    fn test_export_text() {
        let mut stats = DecoderStats::new();
        stats.bytes_decoded = 36;
        stats.app_outputs = 2;
        stats.complete();

        let text = stats.export_text();
        assert!(text.contains("bytes_decoded=36"));
        assert!(text.contains("app_outputs=2"));
        assert!(text.contains("payloads_aborted=0"));
    }
}
