//! Byte stream abstraction over memory buffers, files and plain readers.
//!
//! A [`Stream`] is a single positioned cursor over one resource. Its capabilities
//! (readable, writable, seekable) are fixed when it is created and all of them are
//! reset once the stream is closed or detached:
//!
//! ```text
//!   open ──close()/detach()──> closed
//! ```
//!
//! Every operation on a closed stream fails with [`StreamError`] or returns `None`,
//! except `close`/`detach` themselves which are idempotent.
//!
//! Streams are not synchronized. Messages share their body through [`Body`], which
//! serializes access behind a mutex.

mod body;
mod mode;

pub use body::Body;
pub use mode::OpenMode;

use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::StreamError;
use crate::utils::ensure;

/// The raw resource wrapped by a [`Stream`], handed back by [`Stream::detach`].
pub enum Resource {
    /// A growable in-memory buffer.
    Memory(Cursor<Vec<u8>>),
    /// An open file, with the path it was opened from if known.
    File { file: File, path: Option<PathBuf> },
    /// A forward-only reader such as a socket.
    Reader(Box<dyn Read + Send>),
}

impl Resource {
    fn is_seekable(&mut self) -> bool {
        match self {
            Resource::Memory(_) => true,
            Resource::File { file, .. } => file.stream_position().is_ok(),
            Resource::Reader(_) => false,
        }
    }

    fn seek_to(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Resource::Memory(cursor) => {
                let len = cursor.get_ref().len() as u64;
                let target = match pos {
                    SeekFrom::Start(offset) => Some(offset),
                    SeekFrom::Current(delta) => cursor.position().checked_add_signed(delta),
                    SeekFrom::End(delta) => len.checked_add_signed(delta),
                };
                match target {
                    Some(target) if target <= len => {
                        cursor.set_position(target);
                        Ok(target)
                    }
                    _ => Err(io::Error::new(io::ErrorKind::InvalidInput, "position is outside of the memory buffer")),
                }
            }
            Resource::File { file, .. } => file.seek(pos),
            Resource::Reader(_) => Err(io::Error::from(io::ErrorKind::Unsupported)),
        }
    }
}

impl Read for Resource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Resource::Memory(cursor) => cursor.read(buf),
            Resource::File { file, .. } => file.read(buf),
            Resource::Reader(reader) => reader.read(buf),
        }
    }
}

impl Write for Resource {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Resource::Memory(cursor) => cursor.write(buf),
            Resource::File { file, .. } => file.write(buf),
            Resource::Reader(_) => Err(io::Error::from(io::ErrorKind::Unsupported)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Resource::File { file, .. } => file.flush(),
            Resource::Memory(_) | Resource::Reader(_) => Ok(()),
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Memory(cursor) => {
                f.debug_struct("Memory").field("len", &cursor.get_ref().len()).field("position", &cursor.position()).finish()
            }
            Resource::File { path, .. } => f.debug_struct("File").field("path", path).finish(),
            Resource::Reader(_) => f.write_str("Reader"),
        }
    }
}

/// Stream metadata, the equivalent of a `stream_get_meta_data` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMetadata {
    pub stream_type: &'static str,
    pub wrapper_type: &'static str,
    pub mode: String,
    pub seekable: bool,
    pub uri: String,
}

#[derive(Debug)]
pub struct Stream {
    resource: Option<Resource>,
    mode: OpenMode,
    readable: bool,
    writable: bool,
    seekable: bool,
    size: Option<u64>,
    // bytes consumed so far, used for forward-only readers
    position: u64,
    eof: bool,
}

impl Stream {
    /// An empty, readable, writable and seekable in-memory stream.
    pub fn new() -> Self {
        Self::from_bytes(Vec::new())
    }

    /// Copies `contents` into a fresh memory buffer positioned at offset 0.
    pub fn from_bytes(contents: impl Into<Vec<u8>>) -> Self {
        Self::from_resource(Resource::Memory(Cursor::new(contents.into())), OpenMode::memory())
    }

    /// Wraps an already open file, `mode` must describe how it was opened.
    pub fn from_file(file: File, mode: OpenMode) -> Self {
        Self::from_resource(Resource::File { file, path: None }, mode)
    }

    /// Opens `path` with an fopen-style mode.
    pub fn open(path: impl AsRef<Path>, mode: &OpenMode) -> Result<Self, StreamError> {
        let path = path.as_ref();
        let file = mode.open_options().open(path).map_err(|e| StreamError::open(path, e))?;
        Ok(Self::from_resource(Resource::File { file, path: Some(path.to_path_buf()) }, mode.clone()))
    }

    /// Wraps a forward-only reader: readable, not writable, not seekable.
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self::from_resource(Resource::Reader(Box::new(reader)), OpenMode::read_only())
    }

    /// Wraps a raw resource, deriving the capabilities from `mode`.
    pub fn from_resource(mut resource: Resource, mode: OpenMode) -> Self {
        let seekable = resource.is_seekable();
        Self {
            readable: mode.is_readable(),
            writable: mode.is_writable(),
            seekable,
            resource: Some(resource),
            mode,
            size: None,
            position: 0,
            eof: false,
        }
    }

    pub fn is_readable(&self) -> bool {
        self.readable
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_seekable(&self) -> bool {
        self.seekable
    }

    pub fn is_detached(&self) -> bool {
        self.resource.is_none()
    }

    /// Reads up to `len` bytes, an empty result means end of stream.
    pub fn read(&mut self, len: usize) -> Result<Bytes, StreamError> {
        ensure!(self.readable, StreamError::NotReadable);
        let resource = self.resource.as_mut().ok_or(StreamError::Detached)?;

        let mut buf = Vec::with_capacity(len.min(64 * 1024));
        let read = Read::by_ref(resource).take(len as u64).read_to_end(&mut buf)?;
        if read < len {
            self.eof = true;
        }
        self.position += read as u64;
        Ok(Bytes::from(buf))
    }

    /// Writes all of `data`, returning the number of bytes written.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, StreamError> {
        ensure!(self.writable, StreamError::NotWritable);
        self.size = None;
        let resource = self.resource.as_mut().ok_or(StreamError::Detached)?;

        resource.write_all(data)?;
        self.position += data.len() as u64;
        Ok(data.len())
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<(), StreamError> {
        ensure!(self.seekable, StreamError::NotSeekable);
        let resource = self.resource.as_mut().ok_or(StreamError::Detached)?;

        let offset = resource.seek_to(pos).map_err(|e| StreamError::seek_failed(pos, e))?;
        self.position = offset;
        self.eof = false;
        Ok(())
    }

    pub fn rewind(&mut self) -> Result<(), StreamError> {
        self.seek(SeekFrom::Start(0))
    }

    pub fn tell(&mut self) -> Result<u64, StreamError> {
        match self.resource.as_mut() {
            None => Err(StreamError::Detached),
            Some(Resource::Memory(cursor)) => Ok(cursor.position()),
            Some(Resource::File { file, .. }) => file.stream_position().map_err(|_e| StreamError::TellFailed),
            Some(Resource::Reader(_)) => Ok(self.position),
        }
    }

    pub fn eof(&self) -> bool {
        match &self.resource {
            None => true,
            Some(Resource::Memory(cursor)) => cursor.position() >= cursor.get_ref().len() as u64,
            Some(_) => self.eof,
        }
    }

    /// The size in bytes if known, `None` once detached or when the resource cannot report it.
    pub fn size(&mut self) -> Option<u64> {
        let resource = self.resource.as_ref()?;
        if let Some(size) = self.size {
            return Some(size);
        }

        let size = match resource {
            Resource::Memory(cursor) => Some(cursor.get_ref().len() as u64),
            Resource::File { file, .. } => file.metadata().ok().map(|metadata| metadata.len()),
            Resource::Reader(_) => None,
        };
        self.size = size;
        size
    }

    /// Reads everything from the current position to the end.
    pub fn contents(&mut self) -> Result<Bytes, StreamError> {
        let resource = self.resource.as_mut().ok_or(StreamError::Detached)?;
        ensure!(self.readable, StreamError::NotReadable);

        let mut buf = Vec::new();
        let read = resource.read_to_end(&mut buf)?;
        self.position += read as u64;
        self.eof = true;
        Ok(Bytes::from(buf))
    }

    pub fn metadata(&self) -> Option<StreamMetadata> {
        let (stream_type, wrapper_type, uri) = match self.resource.as_ref()? {
            Resource::Memory(_) => ("MEMORY", "memory", "memory://temp".to_string()),
            Resource::File { path, .. } => {
                ("STDIO", "plainfile", path.as_ref().map(|p| p.display().to_string()).unwrap_or_default())
            }
            Resource::Reader(_) => ("READER", "reader", String::new()),
        };
        Some(StreamMetadata { stream_type, wrapper_type, mode: self.mode.as_str().to_string(), seekable: self.seekable, uri })
    }

    /// A single metadata entry by key, `None` for unknown keys or closed streams.
    pub fn metadata_value(&self, key: &str) -> Option<String> {
        let metadata = self.metadata()?;
        match key {
            "stream_type" => Some(metadata.stream_type.to_string()),
            "wrapper_type" => Some(metadata.wrapper_type.to_string()),
            "mode" => Some(metadata.mode),
            "seekable" => Some(metadata.seekable.to_string()),
            "uri" => Some(metadata.uri),
            _ => None,
        }
    }

    /// Releases the resource. Calling it again is a no-op.
    pub fn close(&mut self) {
        if let Some(resource) = self.detach() {
            debug!(resource = ?resource, "closing stream");
            drop(resource);
        }
    }

    /// Separates the resource from the stream without releasing it.
    pub fn detach(&mut self) -> Option<Resource> {
        let resource = self.resource.take()?;
        self.size = None;
        self.readable = false;
        self.writable = false;
        self.seekable = false;
        self.eof = true;
        Some(resource)
    }

    /// Rewinds and reads the whole stream. Never fails: any error yields an empty string.
    pub fn to_string_lossy(&mut self) -> String {
        let result = self.rewind().and_then(|()| self.contents());
        match result {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!(cause = %e, "failed to convert stream to string");
                String::new()
            }
        }
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for Stream {
    fn from(value: &str) -> Self {
        Self::from_bytes(value.as_bytes())
    }
}

impl From<String> for Stream {
    fn from(value: String) -> Self {
        Self::from_bytes(value.into_bytes())
    }
}

impl From<&[u8]> for Stream {
    fn from(value: &[u8]) -> Self {
        Self::from_bytes(value)
    }
}

impl From<Vec<u8>> for Stream {
    fn from(value: Vec<u8>) -> Self {
        Self::from_bytes(value)
    }
}

impl From<Bytes> for Stream {
    fn from(value: Bytes) -> Self {
        Self::from_bytes(Vec::from(value))
    }
}
