//! Blocking HTTP/1.1 client for the micro-message model
//!
//! [`Client`] sends a [`Request`](micro_message::Request) and hands back a
//! [`Response`](micro_message::Response), whatever its status. Redirects are followed
//! according to [`ClientConfig`], and the verb helpers build form or JSON bodies from
//! [`RequestOptions`].
//!
//! # Features
//!
//! - Plain `http` over [`TcpTransport`], with connect, read and write timeouts
//! - Pluggable [`Transport`] for anything else, `https` included
//! - Content-Length, chunked and read-until-close response payloads
//! - Configuration from JSON via `serde`
//!
//! # Example
//!
//! ```no_run
//! use micro_client::{Client, ClientConfig, RequestOptions};
//! use micro_message::Message;
//!
//! let client = Client::new(ClientConfig::default().with_user_agent("micro-client"));
//! let response = client.post("http://localhost:8080/items", RequestOptions::new().field("name", "ferris")).unwrap();
//!
//! println!("{} {}", response.status_code(), response.body());
//! ```
//!
//! # Architecture
//!
//! - [`client`]: [`Client`] and [`RequestOptions`]
//! - [`transport`]: [`Transport`] and [`TcpTransport`]
//! - [`codec`]: request encoder and response decoders
//! - [`config`]: [`ClientConfig`]

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;

mod utils;

pub use client::{Client, RequestOptions};
pub use config::ClientConfig;
pub use error::{ClientError, DecodeError};
pub use protocol::{PayloadItem, PayloadSize, ResponseHead};
pub use transport::{TcpTransport, Transport};
