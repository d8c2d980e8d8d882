//! Transport de-framer
//!
//! Consumes the raw wire stream, strips the escape layer, and keeps a
//! running CRC over the framed bytes. Start and end of message are explicit
//! output variants rather than errors; only source failures and framing
//! violations are errors.

use crate::crc::Crc16X25;
use sml_core::{FrameTrailer, SmlError, SmlResult};
use sml_transport::ByteSource;

/// Escape byte; four in a row introduce a control sequence.
const ESCAPE: u8 = 0x1b;

/// Chunk size for reads from the underlying source.
const READ_CHUNK: usize = 32;

/// Upper bound on the bytes a single frame may span on the wire.
pub const MAX_FRAME_SIZE: usize = 256 * 1024;

/// Output of a de-framer read.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Unescaped payload bytes, exactly as many as requested.
    Bytes(Vec<u8>),
    /// A start marker; payload buffer and CRC state have been reset.
    StartOfMessage,
    /// The end marker with the frame's trailer data.
    EndOfMessage(FrameTrailer),
}

/// De-framer over a byte source.
///
/// `ready` holds unescaped payload available for consumption; `pending`
/// holds raw wire bytes not yet proven safe to pass through because a
/// partial escape sequence may still be in progress.
pub struct Deframer<S> {
    source: S,
    ready: Vec<u8>,
    pending: Vec<u8>,
    crc: Crc16X25,
    crc_active: bool,
    crc_len: usize,
}

impl<S: ByteSource> Deframer<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            ready: Vec::new(),
            pending: Vec::new(),
            crc: Crc16X25::new(),
            crc_active: false,
            crc_len: 0,
        }
    }

    /// Drop CRC state from any previous frame. Called before scanning for a
    /// new start marker; buffered wire bytes are kept.
    pub(crate) fn reset_frame_state(&mut self) {
        self.crc.reset();
        self.crc_active = false;
        self.crc_len = 0;
    }

    /// Pull `wanted` unescaped payload bytes, or surface a frame signal.
    ///
    /// Blocks in the source until the request can be satisfied, an escape
    /// signal turns up, or the source fails. EOF surfaces as an
    /// `UnexpectedEof` source error.
    pub async fn read(&mut self, wanted: usize) -> SmlResult<Payload> {
        if self.ready.len() >= wanted {
            return Ok(Payload::Bytes(self.take_ready(wanted)));
        }

        let mut force_read = false;

        loop {
            // Classify what the source already delivered before reading
            // more: an end-of-message marker may still sit in `pending`
            // after the source hit EOF.
            if force_read || self.pending.is_empty() {
                let mut chunk = [0u8; READ_CHUNK];
                let n = self.source.read(&mut chunk).await?;
                if n == 0 {
                    return Err(SmlError::Source(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "end of stream",
                    )));
                }
                self.pending.extend_from_slice(&chunk[..n]);
            }
            force_read = true;

            loop {
                // Serve the request as soon as enough payload is ready, so
                // everything before a frame signal can be consumed first.
                if self.ready.len() >= wanted {
                    return Ok(Payload::Bytes(self.take_ready(wanted)));
                }

                match self.pending.iter().position(|&b| b == ESCAPE) {
                    None => {
                        let run: Vec<u8> = self.pending.drain(..).collect();
                        self.push_payload(&run)?;
                        break;
                    }
                    Some(offset) if offset > 0 => {
                        let run: Vec<u8> = self.pending.drain(..offset).collect();
                        self.push_payload(&run)?;
                    }
                    Some(_) => {
                        // Escape classification needs 8 bytes of lookahead.
                        if self.pending.len() < 8 {
                            break;
                        }

                        if self.pending[1..4] == [ESCAPE, ESCAPE, ESCAPE] {
                            let tail = [
                                self.pending[4],
                                self.pending[5],
                                self.pending[6],
                                self.pending[7],
                            ];
                            self.pending.drain(..8);

                            if let Some(signal) = self.classify_escape(tail)? {
                                return Ok(signal);
                            }
                        } else {
                            // A lone escape byte is ordinary payload.
                            let byte = self.pending.remove(0);
                            self.push_payload(&[byte])?;
                        }
                    }
                }
            }
        }
    }

    /// Handle the four control bytes following an escape marker. Returns a
    /// signal for start/end markers, `None` for the escaped literal.
    fn classify_escape(&mut self, tail: [u8; 4]) -> SmlResult<Option<Payload>> {
        if tail == [ESCAPE; 4] {
            // Escaped literal: four logical escape bytes; the CRC runs over
            // all eight wire bytes.
            self.append_crc(&[ESCAPE; 8])?;
            self.ready.extend_from_slice(&tail);
            return Ok(None);
        }

        if tail == [0x01; 4] {
            self.ready.clear();
            self.crc.reset();
            self.crc_len = 0;
            self.crc_active = true;
            self.append_crc(&[
                ESCAPE, ESCAPE, ESCAPE, ESCAPE, 0x01, 0x01, 0x01, 0x01,
            ])?;
            return Ok(Some(Payload::StartOfMessage));
        }

        if tail[0] == 0x1a {
            let padding_count = tail[1];
            if padding_count > 3 {
                return Err(SmlError::Framing(format!(
                    "invalid padding count {} in end of message marker",
                    padding_count
                )));
            }

            // The two CRC bytes themselves are excluded from the CRC.
            self.append_crc(&[ESCAPE, ESCAPE, ESCAPE, ESCAPE, 0x1a, padding_count])?;

            let trailer = FrameTrailer {
                padding_count,
                expected_crc: u16::from_be_bytes([tail[2], tail[3]]),
                computed_crc: self.crc.value().swap_bytes(),
                payload_length: self.crc_len,
            };
            self.crc_active = false;
            return Ok(Some(Payload::EndOfMessage(trailer)));
        }

        Err(SmlError::Framing(format!(
            "unknown escape sequence {:02x} {:02x} {:02x} {:02x}",
            tail[0], tail[1], tail[2], tail[3]
        )))
    }

    fn push_payload(&mut self, bytes: &[u8]) -> SmlResult<()> {
        self.append_crc(bytes)?;
        self.ready.extend_from_slice(bytes);
        Ok(())
    }

    fn append_crc(&mut self, bytes: &[u8]) -> SmlResult<()> {
        if !self.crc_active {
            return Ok(());
        }

        self.crc.update(bytes);
        self.crc_len += bytes.len();

        if self.crc_len > MAX_FRAME_SIZE {
            self.crc_active = false;
            return Err(SmlError::Framing(format!(
                "frame exceeds {} bytes",
                MAX_FRAME_SIZE
            )));
        }

        Ok(())
    }

    fn take_ready(&mut self, wanted: usize) -> Vec<u8> {
        self.ready.drain(..wanted).collect()
    }
}
