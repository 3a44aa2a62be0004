//! Streaming response decoder.
//!
//! Yields one [`ResponseItem::Head`] followed by payload items up to and including
//! [`PayloadItem::Eof`]. Interim `1xx` responses other than `101 Switching Protocols` are
//! consumed silently, the caller only ever sees the final response.

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeadDecoder;
use crate::error::DecodeError;
use crate::protocol::{PayloadItem, PayloadSize, ResponseHead};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseItem {
    Head((ResponseHead, PayloadSize)),
    Payload(PayloadItem),
}

#[derive(Debug)]
pub struct ResponseDecoder {
    head_decoder: HeadDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl ResponseDecoder {
    /// A decoder for the response to a request made with `method`.
    pub fn new(method: &str) -> Self {
        Self { head_decoder: HeadDecoder::new(method), payload_decoder: None }
    }

    fn payload(&mut self, item: Option<PayloadItem>) -> Option<ResponseItem> {
        if item.as_ref().is_some_and(PayloadItem::is_eof) {
            self.payload_decoder.take();
        }
        item.map(ResponseItem::Payload)
    }
}

impl Decoder for ResponseDecoder {
    type Item = ResponseItem;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let item = payload_decoder.decode(src)?;
            return Ok(self.payload(item));
        }

        loop {
            let Some((head, payload_size)) = self.head_decoder.decode(src)? else {
                return Ok(None);
            };

            if (100..200).contains(&head.status) && head.status != 101 {
                trace!(status = head.status, "skip interim response");
                continue;
            }

            self.payload_decoder = Some(payload_size.into());
            return Ok(Some(ResponseItem::Head((head, payload_size))));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let item = payload_decoder.decode_eof(src)?;
            return Ok(self.payload(item));
        }

        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None if src.is_empty() => Ok(None),
            None => Err(DecodeError::UnexpectedEof),
        }
    }
}
