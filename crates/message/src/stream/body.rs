use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use super::Stream;
use crate::error::StreamError;

/// A shared handle to a message body.
///
/// Deriving a message with `with_*` keeps the same body, so cloned messages observe
/// the same stream position. Compare handles with [`Body::ptr_eq`].
#[derive(Clone)]
pub struct Body {
    inner: Arc<Mutex<Stream>>,
}

impl Body {
    pub fn new(stream: Stream) -> Self {
        Self { inner: Arc::new(Mutex::new(stream)) }
    }

    /// A fresh empty in-memory body.
    pub fn empty() -> Self {
        Self::new(Stream::new())
    }

    /// Locks the underlying stream. A poisoned lock is recovered, the stream keeps
    /// whatever state the panicking holder left it in.
    pub fn lock(&self) -> MutexGuard<'_, Stream> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ptr_eq(&self, other: &Body) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn size(&self) -> Option<u64> {
        self.lock().size()
    }

    pub fn read(&self, len: usize) -> Result<Bytes, StreamError> {
        self.lock().read(len)
    }

    pub fn write(&self, data: &[u8]) -> Result<usize, StreamError> {
        self.lock().write(data)
    }

    pub fn rewind(&self) -> Result<(), StreamError> {
        self.lock().rewind()
    }

    /// Remaining contents from the current position.
    pub fn contents(&self) -> Result<Bytes, StreamError> {
        self.lock().contents()
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lock().to_string_lossy())
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_lock() {
            Ok(stream) => f.debug_tuple("Body").field(&*stream).finish(),
            Err(_) => f.write_str("Body(<locked>)"),
        }
    }
}

impl From<Stream> for Body {
    fn from(stream: Stream) -> Self {
        Self::new(stream)
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Self::new(Stream::from(value))
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Self::new(Stream::from(value))
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Self::new(Stream::from(value))
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Self::new(Stream::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_stream() {
        let body = Body::from("shared");
        let other = body.clone();

        assert_eq!(body.read(3).unwrap(), "sha");
        assert_eq!(other.read(3).unwrap(), "red");
        assert!(body.ptr_eq(&other));
        assert!(!body.ptr_eq(&Body::from("shared")));
    }

    #[test]
    fn display_rewinds() {
        let body = Body::from("content");
        body.read(4).unwrap();

        assert_eq!(body.to_string(), "content");
        assert_eq!(body.size(), Some(7));
    }
}
