//! Noisy downlink simulator with bit errors and byte drops.
//!
//! The radio link corrupts data at a natural error rate. This module
//! reproduces that in a deterministic way using seeded randomness, so a
//! decoder run over a simulated pass can be replayed exactly.
//!
//! # Simulated Effects
//!
//! - **Bit errors**: each bit is flipped independently (Bernoulli)
//! - **Drops**: whole bytes vanish from the stream (Bernoulli)
//!
//! # Determinism
//!
//! All randomness comes from a seeded ChaCha8 RNG. Given the same seed
//! and inputs, outputs are bit-identical.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Configuration for channel simulation.
#[derive(Debug, Clone, Copy)]
pub struct ChannelConfig {
    /// Per-bit flip probability [0.0, 1.0]
    pub bit_error_rate: f64,

    /// Per-byte drop probability [0.0, 1.0]
    pub drop_rate: f64,

    /// Random seed for determinism
    pub seed: u64,
}

impl ChannelConfig {
    /// A channel that delivers every byte untouched.
    pub fn perfect(seed: u64) -> Self {
        Self {
            bit_error_rate: 0.0,
            drop_rate: 0.0,
            seed,
        }
    }

    /// A channel with a realistic low error rate.
    pub fn default_with_seed(seed: u64) -> Self {
        Self {
            bit_error_rate: 0.001,
            drop_rate: 0.001,
            seed,
        }
    }
}

/// Byte channel applying bit errors and drops.
///
/// # Thread Safety
/// Not thread-safe; use one instance per thread or synchronize externally.
pub struct NoisyChannel {
    config: ChannelConfig,
    rng: ChaCha8Rng,

    // Statistics
    bytes_sent: u64,
    bytes_dropped: u64,
    bytes_corrupted: u64,
    bits_flipped: u64,
}

impl NoisyChannel {
    pub fn new(config: ChannelConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);

        Self {
            config,
            rng,
            bytes_sent: 0,
            bytes_dropped: 0,
            bytes_corrupted: 0,
            bits_flipped: 0,
        }
    }

    /// Pass a byte sequence through the channel.
    ///
    /// Returns the bytes as received: possibly shorter than the input and
    /// with some bits flipped.
    pub fn transmit(&mut self, bytes: &[u8]) -> Vec<u8> {
        let mut received = Vec::with_capacity(bytes.len());

        for &byte in bytes {
            self.bytes_sent += 1;

            if self.config.drop_rate > 0.0 && self.rng.gen_bool(self.config.drop_rate) {
                self.bytes_dropped += 1;
                continue;
            }

            let noise = self.noise();
            if noise != 0 {
                self.bytes_corrupted += 1;
                self.bits_flipped += noise.count_ones() as u64;
            }
            received.push(byte ^ noise);
        }

        received
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            bytes_sent: self.bytes_sent,
            bytes_dropped: self.bytes_dropped,
            bytes_corrupted: self.bytes_corrupted,
            bits_flipped: self.bits_flipped,
        }
    }

    /// XOR mask of the bits flipped in one byte.
    fn noise(&mut self) -> u8 {
        if self.config.bit_error_rate <= 0.0 {
            return 0;
        }

        let mut mask = 0u8;
        for bit in 0..8 {
            if self.rng.gen_bool(self.config.bit_error_rate) {
                mask |= 1 << bit;
            }
        }
        mask
    }
}

/// Statistics about channel behavior.
#[derive(Debug, Clone, Copy)]
pub struct ChannelStats {
    /// Bytes handed to the channel
    pub bytes_sent: u64,

    /// Bytes removed from the stream
    pub bytes_dropped: u64,

    /// Delivered bytes with at least one flipped bit
    pub bytes_corrupted: u64,

    pub bits_flipped: u64,
}

impl ChannelStats {
    /// Fraction of sent bytes that were dropped.
    pub fn drop_rate(&self) -> f64 {
        if self.bytes_sent == 0 {
            0.0
        } else {
            self.bytes_dropped as f64 / self.bytes_sent as f64
        }
    }

    /// Fraction of sent bytes delivered without damage.
    pub fn clean_rate(&self) -> f64 {
        if self.bytes_sent == 0 {
            0.0
        } else {
            let clean = self.bytes_sent - self.bytes_dropped - self.bytes_corrupted;
            clean as f64 / self.bytes_sent as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<u8> {
        (0..len).map(|i| i as u8).collect()
    }

    #[test]
    fn test_perfect_channel() {
        let mut channel = NoisyChannel::new(ChannelConfig::perfect(42));
        let input = ramp(256);

        assert_eq!(channel.transmit(&input), input);

        let stats = channel.stats();
        assert_eq!(stats.bytes_sent, 256);
        assert_eq!(stats.bytes_dropped, 0);
        assert_eq!(stats.bits_flipped, 0);
        assert_eq!(stats.clean_rate(), 1.0);
    }

    #[test]
    fn test_byte_drops() {
        let config = ChannelConfig {
            bit_error_rate: 0.0,
            drop_rate: 0.5,
            seed: 42,
        };
        let mut channel = NoisyChannel::new(config);

        let received = channel.transmit(&ramp(200));
        let stats = channel.stats();

        assert_eq!(received.len() as u64, 200 - stats.bytes_dropped);
        // Allow 30-70% range due to randomness
        assert!(stats.bytes_dropped >= 60 && stats.bytes_dropped <= 140);
        assert_eq!(stats.drop_rate(), stats.bytes_dropped as f64 / 200.0);
        // Survivors keep their order
        assert!(received.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_bit_errors() {
        let config = ChannelConfig {
            bit_error_rate: 0.1,
            drop_rate: 0.0,
            seed: 7,
        };
        let mut channel = NoisyChannel::new(config);
        let input = vec![0u8; 500];

        let received = channel.transmit(&input);
        let flipped: u64 = received.iter().map(|b| b.count_ones() as u64).sum();

        assert_eq!(received.len(), 500);
        assert_eq!(flipped, channel.stats().bits_flipped);
        // 4000 bits at 10%: expect ~400
        assert!(flipped > 250 && flipped < 550);
    }

    #[test]
    fn test_determinism() {
        let config = ChannelConfig::default_with_seed(12345);
        let mut first = NoisyChannel::new(config);
        let mut second = NoisyChannel::new(config);
        let input = ramp(255).repeat(8);

        assert_eq!(first.transmit(&input), second.transmit(&input));
        assert_eq!(first.stats().bits_flipped, second.stats().bits_flipped);
    }
}
