//! CRC-16 engine shared by the chunk and payload checks.
//!
//! Both checks run the same 16-bit CRC and keep only the low bits of the
//! register: 3 bits for a chunk, 4 bits for a whole payload. The engine is
//! computed bit by bit so that any parameter combination can be expressed,
//! including the transport's unusual reflected-input, non-reflected-output
//! variant.

/// Parameters of a 16-bit CRC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrcParams {
    /// Generator polynomial, implicit x^16 term omitted
    pub poly: u16,
    /// Initial register value
    pub init: u16,
    /// Value XORed into the final register
    pub xor_out: u16,
    /// Process each input byte least-significant bit first
    pub reflect_in: bool,
    /// Bit-reverse the final register before the output XOR
    pub reflect_out: bool,
}

impl CrcParams {
    /// The downlink transport CRC.
    pub const TRANSPORT: CrcParams = CrcParams {
        poly: 0x1021,
        init: 0xFFFF,
        xor_out: 0x0000,
        reflect_in: true,
        reflect_out: false,
    };

    /// Compute the CRC over `data`.
    pub fn checksum(&self, data: &[u8]) -> u16 {
        let mut register = self.init;

        for &byte in data {
            let octet = if self.reflect_in {
                byte.reverse_bits()
            } else {
                byte
            };

            for i in 0..8 {
                let mut top = register & 0x8000 != 0;
                if octet & (0x80 >> i) != 0 {
                    top = !top;
                }
                register <<= 1;
                if top {
                    register ^= self.poly;
                }
            }
        }

        if self.reflect_out {
            register = register.reverse_bits();
        }

        register ^ self.xor_out
    }

    /// Compute the CRC over `data` and keep its low `bits` bits.
    pub fn truncated(&self, data: &[u8], bits: u8) -> u8 {
        truncate(self.checksum(data), bits)
    }
}

impl Default for CrcParams {
    fn default() -> Self {
        Self::TRANSPORT
    }
}

/// Keep the low `bits` bits (at most 8) of a CRC register.
pub fn truncate(value: u16, bits: u8) -> u8 {
    debug_assert!(bits <= 8);
    (value & ((1u16 << bits) - 1)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_answer() {
        assert_eq!(CrcParams::TRANSPORT.checksum(b"123456789"), 0x89F6);
    }

    #[test]
    fn test_empty_input_is_init() {
        assert_eq!(CrcParams::TRANSPORT.checksum(&[]), 0xFFFF);
    }

    #[test]
    fn test_reflected_output_variant() {
        // Same register reflected: CRC-16/MCRF4XX
        let params = CrcParams {
            reflect_out: true,
            ..CrcParams::TRANSPORT
        };
        assert_eq!(params.checksum(b"123456789"), 0x6F91);
    }

    #[test]
    fn test_non_reflected_variant() {
        // CRC-16/IBM-3740 (a.k.a. CCITT-FALSE)
        let params = CrcParams {
            reflect_in: false,
            ..CrcParams::TRANSPORT
        };
        assert_eq!(params.checksum(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_truncation() {
        assert_eq!(truncate(0x89F6, 3), 0x6);
        assert_eq!(truncate(0x89F6, 4), 0x6);
        assert_eq!(truncate(0xFFFF, 8), 0xFF);
        assert_eq!(CrcParams::TRANSPORT.truncated(b"123456789", 4), 0x6);
    }

    #[test]
    fn test_chunk_checksum_vector() {
        // Header 0x?0 (type 0, index 0, checksum masked) with multi-byte
        // header 0x98; the transmitted header byte is 0xE0.
        assert_eq!(CrcParams::TRANSPORT.truncated(&[0x00, 0x98], 3), 0b111);
    }
}
