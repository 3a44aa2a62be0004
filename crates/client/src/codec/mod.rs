//! HTTP/1.1 client codec built on [`tokio_util::codec`].
//!
//! - [`RequestEncoder`]: request line, headers and the full body of a [`micro_message::Request`]
//! - [`ResponseDecoder`]: response head, then payload items using the framing the head selects
//!
//! The codecs only work on buffers and never touch a socket, so they are driven by the
//! blocking [`crate::TcpTransport`] as well as by any other transport.

mod body;
mod header;
mod request_encoder;
mod response_decoder;

pub use body::{ChunkedDecoder, LengthDecoder, PayloadDecoder};
pub use header::{HeadDecoder, HeadEncoder};
pub use request_encoder::RequestEncoder;
pub use response_decoder::{ResponseDecoder, ResponseItem};
