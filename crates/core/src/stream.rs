//! Receive-side byte plumbing: sources, the put-back slot, the byte
//! recorder, and the [`Receiver`] loop that drives a [`FrameDecoder`].
//!
//! # Pipeline
//!
//! ```text
//! ByteSource -> Lookahead -> FrameDecoder -> Packet
//!                  |   ^          |
//!                  |   +-PutBack--+
//!                  v
//!               Recorder (fresh bytes only)
//! ```
//!
//! Sources are pull-based and may be polled again after reporting end of
//! stream; a file still being appended to will yield more bytes later.

use std::collections::VecDeque;
use std::io::{self, BufRead, Read, Write};

use tracing::{trace, warn};

use crate::config::DecoderConfig;
use crate::decoder::{FrameDecoder, Outcome};
use crate::error::{Error, Result};
use crate::metrics::DecoderStats;
use crate::packet::Packet;

/// Pull interface over a byte stream.
pub trait ByteSource {
    /// Next byte, or `None` at the current end of the stream.
    fn next_byte(&mut self) -> Result<Option<u8>>;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn next_byte(&mut self) -> Result<Option<u8>> {
        (**self).next_byte()
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn next_byte(&mut self) -> Result<Option<u8>> {
        (**self).next_byte()
    }
}

/// Binary input, one byte per received symbol.
pub struct RawSource<R> {
    reader: R,
}

impl<R: Read> RawSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: Read> ByteSource for RawSource<R> {
    fn next_byte(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Text input of whitespace-separated hex tokens.
///
/// - case-insensitive, optional `0x` prefix
/// - a one-digit token is one byte (`7` is `0x07`)
/// - longer tokens yield their bytes in order; odd lengths are padded on
///   the left (`abc` is `0x0a 0xbc`)
/// - invalid tokens, including ones that are not UTF-8, are logged and
///   skipped
///
/// End of input completes an unterminated last line unless the source
/// follows a growing input, in which case the partial line waits for the
/// rest of its text.
pub struct HexSource<R> {
    reader: R,
    /// Text read but not yet terminated by a newline
    line: Vec<u8>,
    /// Decoded bytes not yet handed out
    pending: VecDeque<u8>,
    follow: bool,
}

impl<R: BufRead> HexSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            pending: VecDeque::new(),
            follow: false,
        }
    }

    /// Source over input that may still be appended to. Only
    /// newline-terminated lines are decoded.
    pub fn following(reader: R) -> Self {
        Self {
            follow: true,
            ..Self::new(reader)
        }
    }

    /// Read until at least one byte is pending. Returns false at the
    /// current end of input with nothing decoded.
    fn fill(&mut self) -> Result<bool> {
        loop {
            let n = read_until_retrying(&mut self.reader, &mut self.line)?;
            if n == 0 {
                if self.line.is_empty() || self.follow {
                    return Ok(false);
                }
            } else if self.line.last() != Some(&b'\n') {
                continue;
            }

            let line = std::mem::take(&mut self.line);
            for token in line
                .split(|b| b.is_ascii_whitespace())
                .filter(|t| !t.is_empty())
            {
                match decode_token(token) {
                    Some(bytes) => self.pending.extend(bytes),
                    None => warn!(
                        "skipping invalid hex token {:?}",
                        String::from_utf8_lossy(token)
                    ),
                }
            }

            if !self.pending.is_empty() {
                return Ok(true);
            }
        }
    }
}

fn read_until_retrying<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<usize> {
    loop {
        match reader.read_until(b'\n', buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

fn decode_token(token: &[u8]) -> Option<Vec<u8>> {
    let token = std::str::from_utf8(token).ok()?;
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    if digits.is_empty() {
        return None;
    }

    if digits.len() % 2 == 1 {
        hex::decode(format!("0{}", digits)).ok()
    } else {
        hex::decode(digits).ok()
    }
}

impl<R: BufRead> ByteSource for HexSource<R> {
    fn next_byte(&mut self) -> Result<Option<u8>> {
        if self.pending.is_empty() && !self.fill()? {
            return Ok(None);
        }
        Ok(self.pending.pop_front())
    }
}

/// Adapter for any byte iterator.
pub struct IterSource<I> {
    iter: I,
}

impl<I: Iterator<Item = u8>> IterSource<I> {
    pub fn new<T: IntoIterator<IntoIter = I>>(iter: T) -> Self {
        Self {
            iter: iter.into_iter(),
        }
    }
}

impl<I: Iterator<Item = u8>> ByteSource for IterSource<I> {
    fn next_byte(&mut self) -> Result<Option<u8>> {
        Ok(self.iter.next())
    }
}

/// A byte pulled through a [`Lookahead`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    /// First time this byte is seen
    Fresh(u8),
    /// A byte previously put back
    Replayed(u8),
}

/// One-slot put-back buffer in front of a source.
///
/// At most one byte is ever pending: the decoder asks for a put-back only
/// in response to a byte it was just given.
pub struct Lookahead<S> {
    source: S,
    pending: Option<u8>,
}

impl<S: ByteSource> Lookahead<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            pending: None,
        }
    }

    /// Next byte: the pending one if any, otherwise a fresh one.
    pub fn pull(&mut self) -> Result<Option<Pull>> {
        if let Some(byte) = self.pending.take() {
            return Ok(Some(Pull::Replayed(byte)));
        }
        Ok(self.source.next_byte()?.map(Pull::Fresh))
    }

    /// Return a byte to be pulled again next.
    ///
    /// # Errors
    /// `Error::LookaheadFull` if a byte is already pending.
    pub fn put_back(&mut self, byte: u8) -> Result<()> {
        if let Some(pending) = self.pending {
            return Err(Error::LookaheadFull {
                pending,
                rejected: byte,
            });
        }
        self.pending = Some(byte);
        Ok(())
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Mirrors received bytes to a sink, flushed after every byte.
pub struct Recorder<W> {
    sink: W,
    bytes_written: u64,
}

impl<W: Write> Recorder<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            bytes_written: 0,
        }
    }

    pub fn record(&mut self, byte: u8) -> Result<()> {
        self.sink.write_all(&[byte])?;
        self.sink.flush()?;
        self.bytes_written += 1;
        Ok(())
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

/// Drives a [`FrameDecoder`] from a byte source, honoring put-backs.
pub struct Receiver<'a, S> {
    decoder: FrameDecoder<'a>,
    input: Lookahead<S>,
    recorder: Option<Recorder<Box<dyn Write + 'a>>>,
}

impl<'a, S: ByteSource> Receiver<'a, S> {
    pub fn new(config: &'a DecoderConfig, source: S) -> Self {
        Self {
            decoder: FrameDecoder::new(config),
            input: Lookahead::new(source),
            recorder: None,
        }
    }

    /// Mirror every fresh byte to `sink`, whether or not it decodes.
    pub fn with_recorder<W: Write + 'a>(mut self, sink: W) -> Self {
        self.recorder = Some(Recorder::new(Box::new(sink)));
        self
    }

    /// Decode until a packet is produced or the source runs dry.
    ///
    /// `Ok(None)` means end of input for now; with a growing source the
    /// call may be repeated later. Decoder state carries over.
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            let byte = match self.input.pull()? {
                None => return Ok(None),
                Some(Pull::Fresh(byte)) => {
                    if let Some(recorder) = self.recorder.as_mut() {
                        recorder.record(byte)?;
                    }
                    byte
                }
                Some(Pull::Replayed(byte)) => {
                    trace!("resubmitting {:#04x}", byte);
                    byte
                }
            };

            match self.decoder.decode(byte) {
                Outcome::NoOutput => {}
                Outcome::PutBack(byte) => self.input.put_back(byte)?,
                Outcome::Packet(packet) => return Ok(Some(packet)),
            }
        }
    }

    pub fn decoder(&self) -> &FrameDecoder<'a> {
        &self.decoder
    }

    pub fn stats(&self) -> &DecoderStats {
        self.decoder.stats()
    }

    /// Consume the receiver, returning the completed decoder statistics.
    pub fn into_stats(self) -> DecoderStats {
        self.decoder.into_stats()
    }
}

impl<'a, S: ByteSource> Iterator for Receiver<'a, S> {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_packet().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::frame_payload;
    use crate::packet::PacketType;
    use std::io::Cursor;

    fn drain<S: ByteSource>(mut source: S) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(b) = source.next_byte().unwrap() {
            out.push(b);
        }
        out
    }

    #[test]
    fn test_raw_source() {
        let source = RawSource::new(Cursor::new(vec![0xED, 0x00, 0xFF]));
        assert_eq!(drain(source), vec![0xED, 0x00, 0xFF]);
    }

    #[test]
    fn test_hex_tokens() {
        let text = "ed E0 98\n\t7  0x1f\n\nabc zz 1234\n";
        let source = HexSource::new(Cursor::new(text));

        assert_eq!(
            drain(source),
            vec![0xED, 0xE0, 0x98, 0x07, 0x1F, 0x0A, 0xBC, 0x12, 0x34]
        );
    }

    #[test]
    fn test_hex_last_token_without_newline() {
        let source = HexSource::new(Cursor::new("e1 01 e2"));
        assert_eq!(drain(source), vec![0xE1, 0x01, 0xE2]);
    }

    #[test]
    fn test_hex_only_invalid_tokens() {
        let source = HexSource::new(Cursor::new("xyz\n0x\n"));
        assert!(drain(source).is_empty());
    }

    #[test]
    fn test_hex_skips_non_utf8_token() {
        let source = HexSource::new(Cursor::new(&b"ed \xff\xfe e0\n01\n"[..]));
        assert_eq!(drain(source), vec![0xED, 0xE0, 0x01]);
    }

    /// Hands out one chunk of text per read; an empty chunk reads as end of
    /// input.
    struct Appended(VecDeque<&'static [u8]>);

    impl Read for Appended {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(chunk);
                    Ok(chunk.len())
                }
                None => Ok(0),
            }
        }
    }

    #[test]
    fn test_hex_following_keeps_split_token() {
        let writes: VecDeque<&'static [u8]> = VecDeque::from(vec![&b"e"[..], b"", b"", b"d", b"\n"]);
        let mut source = HexSource::following(io::BufReader::with_capacity(1, Appended(writes)));

        assert_eq!(source.next_byte().unwrap(), None);
        assert_eq!(source.next_byte().unwrap(), None);
        assert_eq!(source.next_byte().unwrap(), Some(0xED));
        assert_eq!(source.next_byte().unwrap(), None);
    }

    #[test]
    fn test_hex_one_shot_completes_partial_line() {
        let writes: VecDeque<&'static [u8]> = VecDeque::from(vec![&b"e"[..], b""]);
        let source = HexSource::new(io::BufReader::with_capacity(1, Appended(writes)));
        assert_eq!(drain(source), vec![0x0E]);
    }

    #[test]
    fn test_lookahead_single_slot() {
        let mut input = Lookahead::new(IterSource::new(vec![1u8, 2]));

        assert_eq!(input.pull().unwrap(), Some(Pull::Fresh(1)));
        input.put_back(1).unwrap();
        assert!(input.has_pending());
        assert!(matches!(
            input.put_back(9),
            Err(Error::LookaheadFull { pending: 1, rejected: 9 })
        ));

        assert_eq!(input.pull().unwrap(), Some(Pull::Replayed(1)));
        assert_eq!(input.pull().unwrap(), Some(Pull::Fresh(2)));
        assert_eq!(input.pull().unwrap(), None);
    }

    #[test]
    fn test_receiver_yields_packets() {
        let config = DecoderConfig::default();
        let mut stream = vec![0xED];
        stream.extend(frame_payload(&config, PacketType::EnergyProfile, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap());

        let receiver = Receiver::new(&config, IterSource::new(stream));
        let packets: Vec<Packet> = receiver.map(|p| p.unwrap()).collect();

        assert_eq!(packets.len(), 2);
        assert!(packets[0].is_beacon());
        assert_eq!(packets[1].payload, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_recorder_sees_fresh_bytes_once() {
        let config = DecoderConfig::default();
        let mut stream = frame_payload(&config, PacketType::EnergyProfile, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        // Breaks a chunk checksum, forcing put-backs
        stream[5] ^= 0x04;
        let mut recorded = Vec::new();

        {
            let mut receiver =
                Receiver::new(&config, IterSource::new(stream.clone())).with_recorder(&mut recorded);
            while receiver.next_packet().unwrap().is_some() {}
            assert!(receiver.stats().put_backs > 0);
        }

        assert_eq!(recorded, stream);
    }

    /// Reports end of input at each `None`, then carries on.
    struct Growing(VecDeque<Option<u8>>);

    impl ByteSource for Growing {
        fn next_byte(&mut self) -> Result<Option<u8>> {
            Ok(self.0.pop_front().flatten())
        }
    }

    #[test]
    fn test_receiver_resumes_after_end_of_input() {
        let config = DecoderConfig::default();
        let stream = frame_payload(&config, PacketType::EnergyProfile, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let mut arrivals: VecDeque<Option<u8>> = stream[..7].iter().map(|&b| Some(b)).collect();
        arrivals.push_back(None);
        arrivals.extend(stream[7..].iter().map(|&b| Some(b)));

        let mut receiver = Receiver::new(&config, Growing(arrivals));

        assert!(receiver.next_packet().unwrap().is_none());
        assert_eq!(receiver.decoder().collected(), 2);

        let packet = receiver.next_packet().unwrap().unwrap();
        assert_eq!(packet.packet_type, PacketType::EnergyProfile);
        assert!(receiver.next_packet().unwrap().is_none());
    }
}
