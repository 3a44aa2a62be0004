//! Decoder for response payloads delimited by a `Content-Length` header, see
//! [RFC 9112 Section 6.2](https://www.rfc-editor.org/rfc/rfc9112.html#name-content-length).

use std::cmp;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::error::DecodeError;
use crate::protocol::PayloadItem;

/// Tracks the remaining bytes of a payload with a known length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    length: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { length }
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.length == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let len = usize::try_from(cmp::min(self.length, src.len() as u64)).unwrap_or(src.len());
        let bytes = src.split_to(len).freeze();

        self.length -= bytes.len() as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }
}
