//! A single decoder over the ways a response payload can be delimited.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::codec::body::length_decoder::LengthDecoder;
use crate::error::DecodeError;
use crate::protocol::{PayloadItem, PayloadSize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDecoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Length(LengthDecoder),
    Chunked(ChunkedDecoder),
    /// Read until the peer closes the connection
    UntilClose,
    NoBody,
}

impl PayloadDecoder {
    pub fn empty() -> Self {
        Self { kind: Kind::NoBody }
    }

    pub fn chunked() -> Self {
        Self { kind: Kind::Chunked(ChunkedDecoder::new()) }
    }

    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthDecoder::new(size)) }
    }

    pub fn until_close() -> Self {
        Self { kind: Kind::UntilClose }
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self.kind, Kind::Chunked(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, Kind::NoBody)
    }
}

impl From<PayloadSize> for PayloadDecoder {
    fn from(size: PayloadSize) -> Self {
        match size {
            PayloadSize::Length(n) => Self::fix_length(n),
            PayloadSize::Chunked => Self::chunked(),
            PayloadSize::UntilClose => Self::until_close(),
            PayloadSize::Empty => Self::empty(),
        }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(length_decoder) => length_decoder.decode(src),
            Kind::Chunked(chunked_decoder) => chunked_decoder.decode(src),
            Kind::UntilClose if src.is_empty() => Ok(None),
            Kind::UntilClose => Ok(Some(PayloadItem::Chunk(src.split().freeze()))),
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }

    /// Called once the connection is closed. Only a read-until-close payload may end here,
    /// every other kind has to be complete already.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Kind::UntilClose = self.kind {
            return if src.is_empty() {
                Ok(Some(PayloadItem::Eof))
            } else {
                Ok(Some(PayloadItem::Chunk(src.split().freeze())))
            };
        }

        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => Err(DecodeError::UnexpectedEof),
        }
    }
}
