//! Status line and header decoder for HTTP/1.x responses.
//!
//! Parsing is done by `httparse` with a fixed header budget. Once the head is complete,
//! the payload framing is chosen from the request method, the status code and the
//! `Transfer-Encoding` / `Content-Length` fields.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum head size: 8KB
//! - HTTP/1.0 and HTTP/1.1 only

use bytes::{Buf, BytesMut};
use http::Version;
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::error::DecodeError;
use crate::protocol::{PayloadSize, ResponseHead};
use crate::utils::ensure;

const MAX_HEADER_NUM: usize = 64;

const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decodes one [`ResponseHead`] and the [`PayloadSize`] of the payload that follows it.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadDecoder {
    /// Responses to `HEAD` never carry a payload, whatever their headers say.
    head_request: bool,
}

impl HeadDecoder {
    pub fn new(method: &str) -> Self {
        Self { head_request: method.eq_ignore_ascii_case("HEAD") }
    }
}

impl Decoder for HeadDecoder {
    type Item = (ResponseHead, PayloadSize);
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // shortest status line is "HTTP/1.1 200\r\n\r\n"
        if src.len() < 16 {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut res = httparse::Response::new(&mut headers);

        let status = res.parse(src).map_err(|e| match e {
            Error::TooManyHeaders => DecodeError::too_many_headers(MAX_HEADER_NUM),
            e => DecodeError::invalid_header(e.to_string()),
        })?;

        let body_offset = match status {
            Status::Complete(body_offset) => body_offset,
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, DecodeError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };

        trace!(head_size = body_offset, "parsed response head");
        ensure!(body_offset <= MAX_HEADER_BYTES, DecodeError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let version = match res.version {
            Some(0) => Version::HTTP_10,
            Some(1) => Version::HTTP_11,
            v => return Err(DecodeError::InvalidVersion(v)),
        };

        let head = ResponseHead {
            version,
            status: res.code.ok_or_else(|| DecodeError::invalid_header("missing status code"))?,
            reason: res.reason.unwrap_or_default().to_string(),
            headers: res
                .headers
                .iter()
                .map(|header| (header.name.to_string(), String::from_utf8_lossy(header.value).into_owned()))
                .collect(),
        };

        let payload_size = self.payload_size(&head)?;
        src.advance(body_offset);

        Ok(Some((head, payload_size)))
    }
}

impl HeadDecoder {
    /// Picks the payload framing, see
    /// [RFC 9112 Section 6.3](https://www.rfc-editor.org/rfc/rfc9112.html#name-message-body-length).
    fn payload_size(self, head: &ResponseHead) -> Result<PayloadSize, DecodeError> {
        if self.head_request || (100..200).contains(&head.status) || head.status == 204 || head.status == 304 {
            return Ok(PayloadSize::Empty);
        }

        // transfer-encoding overrides content-length on responses
        if let Some(te) = head.header("Transfer-Encoding") {
            return Ok(if is_chunked(te) { PayloadSize::Chunked } else { PayloadSize::UntilClose });
        }

        match head.header("Content-Length") {
            Some(cl) => {
                let length = cl
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| DecodeError::invalid_content_length(format!("value {cl} is not u64: {e}")))?;
                Ok(PayloadSize::Length(length))
            }
            None => Ok(PayloadSize::UntilClose),
        }
    }
}

/// Chunked has to be the final coding when present.
fn is_chunked(value: &str) -> bool {
    value.rsplit(',').next().is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn decode(method: &str, raw: &str) -> Result<Option<(ResponseHead, PayloadSize)>, DecodeError> {
        HeadDecoder::new(method).decode(&mut BytesMut::from(raw))
    }

    #[test]
    fn check_is_chunked() {
        assert!(is_chunked("chunked"));
        assert!(is_chunked("gzip, Chunked"));
        assert!(!is_chunked("chunked, gzip"));
        assert!(!is_chunked("gzip"));
    }

    #[test]
    fn content_length_response() {
        let raw = indoc! {r"
            HTTP/1.1 201 Created
            Content-Type: application/json
            Content-Length: 2
            X-Multi: a
            x-multi: b

            {}
        "}
        .replace('\n', "\r\n");

        let mut buffer = BytesMut::from(raw.as_str());
        let (head, size) = HeadDecoder::new("POST").decode(&mut buffer).unwrap().unwrap();

        assert_eq!(head.version, Version::HTTP_11);
        assert_eq!(head.status, 201);
        assert_eq!(head.reason, "Created");
        assert_eq!(head.header("content-type"), Some("application/json"));
        assert_eq!(head.headers.len(), 4);
        assert_eq!(size, PayloadSize::Length(2));
        // only the payload is left
        assert_eq!(&buffer[..], b"{}\r\n");
    }

    #[test]
    fn payload_framing() {
        let chunked = "HTTP/1.1 200 OK\r\nTransfer-Encoding: gzip, chunked\r\nContent-Length: 3\r\n\r\n";
        assert_eq!(decode("GET", chunked).unwrap().unwrap().1, PayloadSize::Chunked);

        let close = "HTTP/1.0 200 OK\r\nServer: test\r\n\r\n";
        let (head, size) = decode("GET", close).unwrap().unwrap();
        assert_eq!(head.version, Version::HTTP_10);
        assert_eq!(size, PayloadSize::UntilClose);

        let sized = "HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n";
        assert_eq!(decode("HEAD", sized).unwrap().unwrap().1, PayloadSize::Empty);

        let no_content = "HTTP/1.1 204 No Content\r\nContent-Length: 10\r\n\r\n";
        assert_eq!(decode("DELETE", no_content).unwrap().unwrap().1, PayloadSize::Empty);

        let not_modified = "HTTP/1.1 304 Not Modified\r\n\r\n";
        assert_eq!(decode("GET", not_modified).unwrap().unwrap().1, PayloadSize::Empty);
    }

    #[test]
    fn partial_head() {
        assert!(decode("GET", "HTTP/1.1 200 OK\r\nContent-").unwrap().is_none());
        assert!(decode("GET", "HTTP/1.1").unwrap().is_none());
    }

    #[test]
    fn invalid_heads() {
        assert!(matches!(decode("GET", "HTTP/1.1 200 OK\r\nContent-Length: ten\r\n\r\n"), Err(DecodeError::InvalidContentLength { .. })));
        assert!(matches!(decode("GET", "HTTP/2.0 200 OK\r\n\r\n\r\n"), Err(DecodeError::InvalidHeader { .. })));
        assert!(matches!(decode("GET", "NOT HTTP AT ALL\r\n\r\n"), Err(DecodeError::InvalidHeader { .. })));

        let huge = format!("HTTP/1.1 200 OK\r\nX-Big: {}", "a".repeat(MAX_HEADER_BYTES));
        assert!(matches!(decode("GET", &huge), Err(DecodeError::TooLargeHeader { .. })));
    }
}
