//! Request line and header encoder.
//!
//! Header fields are written in the order the [`Request`] holds them, one wire line per
//! value. Framing fields are owned by the encoder: any `Content-Length` or
//! `Transfer-Encoding` on the request is dropped and replaced by the one matching the
//! [`PayloadSize`].

use std::io;
use std::io::{ErrorKind, Write};

use bytes::{BufMut, BytesMut};
use micro_message::{Message, Request, RequestMessage};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::protocol::PayloadSize;

/// Initial buffer size allocated for head serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeadEncoder;

impl<'a> Encoder<(&'a Request, PayloadSize)> for HeadEncoder {
    type Error = io::Error;

    fn encode(&mut self, item: (&'a Request, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (request, payload_size) = item;

        dst.reserve(INIT_HEADER_SIZE);
        match request.protocol_version() {
            version @ ("1.0" | "1.1") => {
                write!(FastWrite(dst), "{} {} HTTP/{version}\r\n", request.method(), request.request_target())?;
            }
            v => {
                error!(http_version = v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported));
            }
        }

        for (name, values) in request.headers().iter() {
            if is_framing(name) {
                continue;
            }
            for value in values {
                dst.put_slice(name.as_bytes());
                dst.put_slice(b": ");
                dst.put_slice(value.as_bytes());
                dst.put_slice(b"\r\n");
            }
        }

        match payload_size {
            PayloadSize::Length(n) => write!(FastWrite(dst), "Content-Length: {n}\r\n")?,
            PayloadSize::Chunked => dst.put_slice(b"Transfer-Encoding: chunked\r\n"),
            PayloadSize::UntilClose | PayloadSize::Empty => {}
        }

        dst.put_slice(b"\r\n");
        Ok(())
    }
}

fn is_framing(name: &str) -> bool {
    name.eq_ignore_ascii_case("Content-Length") || name.eq_ignore_ascii_case("Transfer-Encoding")
}

/// [`Write`] adapter over a [`BytesMut`] that has already been reserved.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
