use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("validation error: {source}")]
    Validation {
        #[from]
        source: ValidationError,
    },

    #[error("stream error: {source}")]
    Stream {
        #[from]
        source: StreamError,
    },

    #[error("upload error: {source}")]
    Upload {
        #[from]
        source: UploadError,
    },

    #[error("cookie error: {source}")]
    Cookie {
        #[from]
        source: CookieError,
    },
}

/// Raised synchronously by constructors and `with_*` mutators; the receiver stays valid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("\"{name}\" is not valid header name")]
    InvalidHeaderName { name: String },

    #[error("\"{value}\" is not valid header value")]
    InvalidHeaderValue { value: String },

    #[error("header value for \"{name}\" can not be an empty list")]
    EmptyHeaderValues { name: String },

    #[error("invalid http method: {method:?}")]
    InvalidMethod { method: String },

    #[error("invalid status code: {code}")]
    InvalidStatus { code: u16 },

    #[error("invalid request target: {target:?}")]
    InvalidRequestTarget { target: String },

    #[error("invalid uri: {reason}")]
    InvalidUri { reason: String },

    #[error("parsed body must be an array, an object or absent, but {kind} provided")]
    InvalidParsedBody { kind: &'static str },

    #[error("the mode \"{mode}\" is invalid")]
    InvalidMode { mode: String },

    #[error("upload error status must be one of the known codes, but {code} provided")]
    InvalidUploadStatus { code: i64 },

    #[error("invalid value in files specification: {reason}")]
    InvalidFileSpec { reason: String },

    #[error("invalid path provided for move operation; must be a non-empty path")]
    InvalidTargetPath,
}

impl ValidationError {
    pub fn invalid_header_name<S: ToString>(name: S) -> Self {
        Self::InvalidHeaderName { name: name.to_string() }
    }

    pub fn invalid_header_value<S: ToString>(value: S) -> Self {
        Self::InvalidHeaderValue { value: value.to_string() }
    }

    pub fn invalid_uri<S: ToString>(reason: S) -> Self {
        Self::InvalidUri { reason: reason.to_string() }
    }

    pub fn invalid_file_spec<S: ToString>(reason: S) -> Self {
        Self::InvalidFileSpec { reason: reason.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("cannot read from non-readable stream")]
    NotReadable,

    #[error("cannot write to a non-writable stream")]
    NotWritable,

    #[error("stream is not seekable")]
    NotSeekable,

    #[error("stream is detached")]
    Detached,

    #[error("unable to seek to stream position {position}: {reason}")]
    SeekFailed { position: String, reason: String },

    #[error("unable to determine stream position")]
    TellFailed,

    #[error("the file \"{path}\" cannot be opened: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl StreamError {
    pub fn seek_failed<P: std::fmt::Debug, S: ToString>(position: P, reason: S) -> Self {
        Self::SeekFailed { position: format!("{position:?}"), reason: reason.to_string() }
    }

    pub fn open<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        Self::Open { path: path.into(), source }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("cannot retrieve stream due to upload error {code}")]
    Failed { code: u8 },

    #[error("cannot retrieve stream after it has already been moved")]
    AlreadyMoved,

    #[error("uploaded file could not be moved to \"{path}\": {source}")]
    Move {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid argument: {source}")]
    Validation {
        #[from]
        source: ValidationError,
    },

    #[error("stream error: {source}")]
    Stream {
        #[from]
        source: StreamError,
    },
}

impl UploadError {
    pub fn move_failed<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        Self::Move { path: path.into(), source }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CookieError {
    #[error("when the 'SameSite' attribute is set to 'None', the 'Secure' attribute should be set as well")]
    InsecureSameSiteNone,

    #[error("invalid cookie name: {name:?}")]
    InvalidName { name: String },
}
