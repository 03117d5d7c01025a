//! Byte-stream decoder for PTY transport chunks.
//!
//! Classifies every input byte as a control character, printable ASCII,
//! or part of a UTF-8 multi-byte sequence, and carries incomplete
//! sequences across chunk boundaries so that arbitrary chunking of the
//! stream never corrupts decoded text.

use base64::Engine;

/// A control byte (`< 0x20` or `0x7F`) observed in the stream.
///
/// Control bytes are preserved verbatim in [`DecodeResult::text`] for
/// the downstream ANSI parser and also reported here for callers that
/// inspect them directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlByte {
    pub position: usize,
    pub byte: u8,
}

/// Bytes that could not be interpreted as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryRun {
    pub position: usize,
    pub bytes: Vec<u8>,
}

/// A malformed UTF-8 sequence. The bytes are never dropped: they are
/// also recorded in [`DecodeResult::binary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub position: usize,
    pub bytes: Vec<u8>,
}

/// Result of decoding one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeResult {
    pub text: String,
    pub binary: Vec<BinaryRun>,
    pub control: Vec<ControlByte>,
    pub errors: Vec<DecodeError>,
}

/// Streaming decoder with cross-chunk UTF-8 state.
#[derive(Debug, Default)]
pub struct BinaryDecoder {
    incomplete: Vec<u8>,
}

impl BinaryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a raw byte chunk.
    ///
    /// Any incomplete multi-byte tail retained from the previous chunk
    /// is prepended before processing.
    pub fn decode(&mut self, chunk: &[u8]) -> DecodeResult {
        let buf: Vec<u8> = if self.incomplete.is_empty() {
            chunk.to_vec()
        } else {
            let mut joined = std::mem::take(&mut self.incomplete);
            joined.extend_from_slice(chunk);
            joined
        };

        let mut result = DecodeResult::default();
        let mut i = 0;
        while i < buf.len() {
            let byte = buf[i];

            // Control characters pass through to the text stream and are
            // reported separately.
            if byte < 0x20 || byte == 0x7F {
                result.control.push(ControlByte { position: i, byte });
                result.text.push(byte as char);
                i += 1;
                continue;
            }

            if byte < 0x80 {
                result.text.push(byte as char);
                i += 1;
                continue;
            }

            match utf8_sequence_len(byte) {
                Some(len) => {
                    if i + len > buf.len() {
                        // Truncated at the chunk boundary: retain for the
                        // next chunk.
                        self.incomplete = buf[i..].to_vec();
                        break;
                    }
                    let sequence = &buf[i..i + len];
                    match std::str::from_utf8(sequence) {
                        Ok(decoded) => {
                            result.text.push_str(decoded);
                            i += len;
                        }
                        Err(_) => {
                            result.binary.push(BinaryRun {
                                position: i,
                                bytes: sequence.to_vec(),
                            });
                            result.errors.push(DecodeError {
                                position: i,
                                bytes: sequence.to_vec(),
                            });
                            i += 1;
                        }
                    }
                }
                None => {
                    // Continuation byte in lead position, or 0xF8+.
                    result.binary.push(BinaryRun {
                        position: i,
                        bytes: vec![byte],
                    });
                    i += 1;
                }
            }
        }

        result
    }

    /// Decode a string chunk, applying the base64 heuristic first: a
    /// non-empty string whose length is a multiple of 4 and that matches
    /// the base64 alphabet (with up to two `=` padding chars) is decoded
    /// as base64; anything else is decoded as its UTF-8 bytes.
    pub fn decode_auto(&mut self, chunk: &str) -> DecodeResult {
        if looks_like_base64(chunk) {
            self.decode_base64(chunk)
        } else {
            self.decode(chunk.as_bytes())
        }
    }

    /// Decode a base64-encoded chunk. Invalid input is reported as a
    /// decode error rather than panicking; the stream continues.
    pub fn decode_base64(&mut self, chunk: &str) -> DecodeResult {
        match base64::engine::general_purpose::STANDARD.decode(chunk) {
            Ok(bytes) => self.decode(&bytes),
            Err(err) => {
                tracing::debug!(error = %err, "base64 decode failed");
                DecodeResult {
                    errors: vec![DecodeError {
                        position: 0,
                        bytes: chunk.as_bytes().to_vec(),
                    }],
                    ..DecodeResult::default()
                }
            }
        }
    }

    /// Drop retained cross-chunk state (used on stream restart).
    pub fn reset(&mut self) {
        self.incomplete.clear();
    }
}

/// Expected sequence length for a UTF-8 lead byte, per the standard
/// bit patterns. `None` for continuation bytes and invalid leads.
fn utf8_sequence_len(lead: u8) -> Option<usize> {
    if lead & 0x80 == 0x00 {
        Some(1)
    } else if lead & 0xE0 == 0xC0 {
        Some(2)
    } else if lead & 0xF0 == 0xE0 {
        Some(3)
    } else if lead & 0xF8 == 0xF0 {
        Some(4)
    } else {
        None
    }
}

fn looks_like_base64(s: &str) -> bool {
    if s.is_empty() || s.len() % 4 != 0 {
        return false;
    }
    let trimmed = s.trim_end_matches('=');
    if s.len() - trimmed.len() > 2 {
        return false;
    }
    trimmed
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
}
