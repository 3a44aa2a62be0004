use std::io;

use micro_message::{StreamError, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("the \"{scheme}\" scheme is not supported by this transport")]
    UnsupportedScheme { scheme: String },

    #[error("failed to connect to {authority}: {source}")]
    Connect {
        authority: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode request body: {reason}")]
    Encode { reason: String },

    #[error("too many redirects, the limit is {max}")]
    TooManyRedirects { max: usize },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("response error: {source}")]
    Decode {
        #[from]
        source: DecodeError,
    },

    #[error("invalid message: {source}")]
    Validation {
        #[from]
        source: ValidationError,
    },

    #[error("body error: {source}")]
    Stream {
        #[from]
        source: StreamError,
    },
}

impl ClientError {
    pub fn configuration<S: ToString>(reason: S) -> Self {
        Self::Configuration { reason: reason.to_string() }
    }

    pub fn unsupported_scheme<S: ToString>(scheme: S) -> Self {
        Self::UnsupportedScheme { scheme: scheme.to_string() }
    }

    pub fn connect<S: ToString>(authority: S, source: io::Error) -> Self {
        Self::Connect { authority: authority.to_string(), source }
    }

    pub fn encode<S: ToString>(reason: S) -> Self {
        Self::Encode { reason: reason.to_string() }
    }
}

/// Failures while reading a response off the wire.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("connection closed before the response was complete")]
    UnexpectedEof,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl DecodeError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }
}
