//! One request/response exchange over some connection.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::BytesMut;
use micro_message::{Message, Request, RequestMessage, Response};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};

use crate::codec::{RequestEncoder, ResponseDecoder, ResponseItem};
use crate::config::ClientConfig;
use crate::error::{ClientError, DecodeError};
use crate::protocol::PayloadItem;
use crate::utils::ensure;

const READ_BUF_SIZE: usize = 8 * 1024;

/// Sends one request and returns its response, redirects are the caller's business.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    fn round_trip(&self, request: &Request, config: &ClientConfig) -> Result<Response, ClientError>;
}

/// Plain `http` over a fresh [`TcpStream`] per request, closed after the response.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl Transport for TcpTransport {
    fn round_trip(&self, request: &Request, config: &ClientConfig) -> Result<Response, ClientError> {
        let uri = request.uri();
        ensure!(uri.scheme().eq_ignore_ascii_case("http"), ClientError::unsupported_scheme(uri.scheme()));

        let host = uri.host().trim_start_matches('[').trim_end_matches(']');
        let port = uri.port().unwrap_or(80);
        let mut stream = connect(host, port, config.timeout())?;
        stream.set_read_timeout(config.timeout())?;
        stream.set_write_timeout(config.timeout())?;

        let request =
            if request.has_header("Connection") { request.clone() } else { request.with_header("Connection", "close")? };

        write_request(&mut stream, &request)?;
        read_response(&mut stream, request.method())
    }
}

fn connect(host: &str, port: u16, timeout: Option<Duration>) -> Result<TcpStream, ClientError> {
    let authority = format!("{host}:{port}");
    let addrs: Vec<SocketAddr> =
        (host, port).to_socket_addrs().map_err(|e| ClientError::connect(&authority, e))?.collect();

    let mut last_error = None;
    for addr in addrs {
        let result = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match result {
            Ok(stream) => {
                debug!(%addr, "connected");
                return Ok(stream);
            }
            Err(e) => last_error = Some(e),
        }
    }

    let source = last_error.unwrap_or_else(|| std::io::Error::new(ErrorKind::NotFound, "no address resolved"));
    Err(ClientError::connect(authority, source))
}

/// Encodes `request` and writes it out in full.
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<(), ClientError> {
    let mut buf = BytesMut::new();
    RequestEncoder::new().encode(request, &mut buf)?;
    writer.write_all(&buf)?;
    writer.flush()?;
    Ok(())
}

/// Reads one response to a `method` request, the whole payload is buffered into the body.
pub fn read_response<R: Read>(reader: &mut R, method: &str) -> Result<Response, ClientError> {
    let mut decoder = ResponseDecoder::new(method);
    let mut buf = BytesMut::with_capacity(READ_BUF_SIZE);
    let mut head = None;
    let mut payload = BytesMut::new();
    let mut eof = false;

    loop {
        let item = if eof { decoder.decode_eof(&mut buf)? } else { decoder.decode(&mut buf)? };
        match item {
            Some(ResponseItem::Head((response_head, payload_size))) => {
                trace!(status = response_head.status, payload_size = ?payload_size, "received response head");
                head = Some(response_head);
            }
            Some(ResponseItem::Payload(PayloadItem::Chunk(bytes))) => payload.extend_from_slice(&bytes),
            Some(ResponseItem::Payload(PayloadItem::Eof)) => break,
            None if eof => return Err(DecodeError::UnexpectedEof.into()),
            None => eof = fill(reader, &mut buf)? == 0,
        }
    }

    let head = head.ok_or(DecodeError::UnexpectedEof)?;
    debug!(status = head.status, payload_len = payload.len(), "received response");
    Ok(head.into_response(payload.freeze())?)
}

fn fill<R: Read>(reader: &mut R, buf: &mut BytesMut) -> Result<usize, ClientError> {
    let mut chunk = [0u8; READ_BUF_SIZE];
    loop {
        match reader.read(&mut chunk) {
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                return Ok(n);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
}
