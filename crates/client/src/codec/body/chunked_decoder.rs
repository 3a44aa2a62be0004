//! Response payloads in the chunked transfer coding (RFC 9112, section 7.1).
//!
//! ```text
//! 5;ext=1\r\n      size line, extensions are skipped
//! hello\r\n        chunk data
//! 0\r\n            last chunk
//! Expires: 0\r\n   trailer fields, skipped
//! \r\n
//! ```

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::error::DecodeError;
use crate::protocol::PayloadItem;

/// Yields the data of each chunk as it arrives, then a single [`PayloadItem::Eof`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: State,
    /// Size of the current chunk while in [`State::Size`], then the bytes still to read.
    remaining: u64,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: State::Size { digits: 0 }, remaining: 0 }
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Size { digits: u8 },
    /// Whitespace or extensions between the size and the CR
    SizeTail { extension: bool },
    SizeLf,
    Data,
    DataCr,
    DataLf,
    /// Start of a trailer field or of the final empty line
    LineStart,
    Trailer,
    TrailerLf,
    FinalLf,
    Done,
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                State::Done => {
                    trace!("chunked payload complete");
                    return Ok(Some(PayloadItem::Eof));
                }
                _ if src.is_empty() => return Ok(None),
                State::Data => {
                    let len = usize::try_from(self.remaining).unwrap_or(usize::MAX).min(src.len());
                    self.remaining -= len as u64;
                    if self.remaining == 0 {
                        self.state = State::DataCr;
                    }
                    trace!(len, remaining = self.remaining, "chunk data");
                    return Ok(Some(PayloadItem::Chunk(src.split_to(len).freeze())));
                }
                _ => {
                    let byte = src.get_u8();
                    self.state = self.advance(byte)?;
                }
            }
        }
    }
}

impl ChunkedDecoder {
    /// Consumes one framing byte.
    fn advance(&mut self, byte: u8) -> Result<State, DecodeError> {
        let next = match (self.state, byte) {
            (State::Size { digits }, b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F') => {
                let digit = u64::from(hex_value(byte));
                self.remaining = self
                    .remaining
                    .checked_mul(16)
                    .and_then(|size| size.checked_add(digit))
                    .ok_or_else(|| DecodeError::invalid_body("chunk size overflows"))?;
                State::Size { digits: digits.saturating_add(1) }
            }
            (State::Size { digits: 0 }, _) => return Err(DecodeError::invalid_body("chunk size line without a size")),
            (State::Size { .. } | State::SizeTail { extension: false }, b' ' | b'\t') => {
                State::SizeTail { extension: false }
            }
            (State::Size { .. } | State::SizeTail { .. }, b';') => State::SizeTail { extension: true },
            (State::Size { .. } | State::SizeTail { .. }, b'\r') => State::SizeLf,
            (State::SizeTail { extension: true }, b'\n') => {
                return Err(DecodeError::invalid_body("bare LF in chunk extension"));
            }
            (State::SizeTail { extension: true }, _) => self.state,

            (State::SizeLf, b'\n') if self.remaining == 0 => State::LineStart,
            (State::SizeLf, b'\n') => State::Data,

            (State::DataCr, b'\r') => State::DataLf,
            (State::DataLf, b'\n') => State::Size { digits: 0 },

            (State::LineStart, b'\r') => State::FinalLf,
            (State::Trailer, b'\r') => State::TrailerLf,
            (State::LineStart | State::Trailer, _) => State::Trailer,
            (State::TrailerLf, b'\n') => State::LineStart,
            (State::FinalLf, b'\n') => State::Done,

            (state, byte) => {
                return Err(DecodeError::invalid_body(format!("unexpected byte {byte:#04x} in {state:?}")));
            }
        };
        Ok(next)
    }
}

fn hex_value(byte: u8) -> u8 {
    match byte {
        b'0'..=b'9' => byte - b'0',
        b'a'..=b'f' => byte - b'a' + 10,
        _ => byte - b'A' + 10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn chunk(decoder: &mut ChunkedDecoder, buffer: &mut BytesMut) -> Bytes {
        decoder.decode(buffer).unwrap().unwrap().as_bytes().cloned().unwrap()
    }

    #[test]
    fn single_chunk() {
        let mut buffer = BytesMut::from(&b"10\r\n1234567890abcdef\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        assert_eq!(chunk(&mut decoder, &mut buffer), "1234567890abcdef");
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
        assert!(buffer.is_empty());
    }

    #[test]
    fn multiple_chunks() {
        let mut buffer = BytesMut::from(&b"5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        assert_eq!(chunk(&mut decoder, &mut buffer), "hello");
        assert_eq!(chunk(&mut decoder, &mut buffer), ", world");
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn extensions_whitespace_and_trailers_are_skipped() {
        let mut buffer = BytesMut::from(&b"5 ;chunk-ext=value\r\nhello\r\n0\r\nTrailer: value\r\nOther: x\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        assert_eq!(chunk(&mut decoder, &mut buffer), "hello");
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn data_split_across_reads() {
        let mut buffer = BytesMut::from(&b"5\r\nhel"[..]);
        let mut decoder = ChunkedDecoder::new();

        assert_eq!(chunk(&mut decoder, &mut buffer), "hel");
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"lo\r");
        assert_eq!(chunk(&mut decoder, &mut buffer), "lo");
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"\n0\r\n\r\n");
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn malformed_framing() {
        let mut decoder = ChunkedDecoder::new();
        assert!(matches!(decoder.decode(&mut BytesMut::from(&b"xyz\r\n"[..])), Err(DecodeError::InvalidBody { .. })));

        let mut decoder = ChunkedDecoder::new();
        assert!(decoder.decode(&mut BytesMut::from(&b"\r\n"[..])).is_err());

        let mut buffer = BytesMut::from(&b"5\r\nhelloBad"[..]);
        let mut decoder = ChunkedDecoder::new();
        assert_eq!(chunk(&mut decoder, &mut buffer), "hello");
        assert!(decoder.decode(&mut buffer).is_err());

        let mut decoder = ChunkedDecoder::new();
        assert!(decoder.decode(&mut BytesMut::from(&b"5;ext\nhello"[..])).is_err());

        let mut decoder = ChunkedDecoder::new();
        assert!(decoder.decode(&mut BytesMut::from(&b"fffffffffffffffff\r\n"[..])).is_err());
    }

    #[test]
    fn zero_size_chunk() {
        let mut buffer = BytesMut::from(&b"0\r\n\r\n"[..]);
        assert!(ChunkedDecoder::new().decode(&mut buffer).unwrap().unwrap().is_eof());
    }
}
