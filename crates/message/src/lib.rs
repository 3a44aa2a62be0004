//! Immutable HTTP message model
//!
//! This crate provides value types for HTTP requests, responses and URIs, a positioned
//! byte stream for message bodies, and the helpers a server needs to turn its environment
//! into a request: uploaded files, cookies and a factory for all of the above.
//!
//! # Features
//!
//! - Copy-on-write messages: every `with_*` returns a new value
//! - Case-insensitive, case-preserving multi-valued headers
//! - RFC 3986 URI parsing with default port and default host normalization
//! - Memory, file and reader backed streams with explicit capabilities
//! - Uploaded file trees, cookies and a CGI style environment request builder
//!
//! # Example
//!
//! ```
//! use micro_message::{Message, Request, RequestMessage, Response};
//!
//! let request = Request::new("get", "http://example.com:8080/items?page=2").unwrap();
//! assert_eq!(request.method(), "GET");
//! assert_eq!(request.request_target(), "/items?page=2");
//! assert_eq!(request.header_line("Host"), "example.com:8080");
//!
//! let response = Response::from_code(201)
//!     .unwrap()
//!     .with_header("Content-Type", "application/json")
//!     .unwrap()
//!     .with_body(r#"{"id":1}"#);
//! assert_eq!(response.reason_phrase(), "Created");
//! assert_eq!(response.body().to_string(), r#"{"id":1}"#);
//! ```
//!
//! # Architecture
//!
//! - [`uri`]: the [`Uri`] value type
//! - [`stream`]: [`Stream`] and the shared [`Body`] handle
//! - [`message`]: the [`Message`] trait family and its implementations
//! - [`upload`]: [`UploadedFile`]
//! - [`cookie`]: [`Cookie`] and [`CookieJar`]
//! - [`factory`]: [`Factory`] and [`ServerEnvironment`]
//! - [`error`]: error types

pub mod cookie;
pub mod error;
pub mod factory;
pub mod message;
pub mod stream;
pub mod upload;
pub mod uri;

mod utils;

pub use cookie::{Cookie, CookieJar, SameSite};
pub use error::{CookieError, HttpError, StreamError, UploadError, ValidationError};
pub use factory::{Factory, ServerEnvironment};
pub use message::{
    Attribute, Headers, IntoHeaderValues, Message, Params, Request, RequestBuilder, RequestMessage, Response,
    ResponseBuilder, ServerRequest, ServerRequestBuilder, UploadedFileNode, UploadedFiles,
};
pub use stream::{Body, OpenMode, Resource, Stream, StreamMetadata};
pub use upload::{UploadErrorCode, UploadSource, UploadedFile};
pub use uri::{IntoUri, Uri};
