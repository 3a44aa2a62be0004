//! Serializes a whole [`Request`], head and body, into one buffer.
//!
//! The body stream is rewound when it is seekable and read to its end, so the payload is
//! always sent with a `Content-Length`.

use bytes::BytesMut;
use micro_message::{Message, Request, RequestMessage};
use tokio_util::codec::Encoder;
use tracing::trace;

use crate::codec::header::HeadEncoder;
use crate::error::ClientError;
use crate::protocol::PayloadSize;

#[derive(Debug, Default)]
pub struct RequestEncoder {
    head_encoder: HeadEncoder,
}

impl RequestEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<'a> Encoder<&'a Request> for RequestEncoder {
    type Error = ClientError;

    fn encode(&mut self, request: &'a Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = {
            let body = request.body();
            let mut stream = body.lock();
            if stream.is_seekable() {
                stream.rewind()?;
            }
            stream.contents()?
        };

        let payload_size = if !payload.is_empty() || expects_body(request.method()) {
            PayloadSize::Length(payload.len() as u64)
        } else {
            PayloadSize::Empty
        };

        trace!(method = request.method(), payload_size = ?payload_size, "encoding request");
        self.head_encoder.encode((request, payload_size), dst)?;
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

/// Methods whose requests always announce a length, even an empty one.
fn expects_body(method: &str) -> bool {
    matches!(method, "POST" | "PUT" | "PATCH")
}
