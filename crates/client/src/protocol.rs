//! Wire-level message parts shared by the codecs and the transport.

use bytes::Bytes;
use http::Version;
use micro_message::{Body, Response, ValidationError};

/// Represents an item in the response payload stream.
///
/// The payload decoders produce data chunks followed by exactly one [`PayloadItem::Eof`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem {
    Chunk(Bytes),
    Eof,
}

impl PayloadItem {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}

/// How the payload of a message is delimited on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// Delimited by `Content-Length`
    Length(u64),
    /// `Transfer-Encoding: chunked`
    Chunked,
    /// Everything up to the end of the connection, responses only
    UntilClose,
    /// No payload at all
    Empty,
}

impl PayloadSize {
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }
}

/// Status line and header fields of a response, in wire order and original casing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub version: Version,
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// The first value of `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
    }

    /// Builds the [`Response`] value, repeated fields become multiple values of one header.
    pub fn into_response(self, body: impl Into<Body>) -> Result<Response, ValidationError> {
        let version = if self.version == Version::HTTP_10 { "1.0" } else { "1.1" };
        let mut builder = Response::builder().status(self.status).reason(&self.reason).version(version);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        builder.body(body).build()
    }
}
