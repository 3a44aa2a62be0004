//! Files received through a multipart upload.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use crate::error::{UploadError, ValidationError};
use crate::stream::{Body, OpenMode, Stream};
use crate::utils::ensure;

const MOVE_CHUNK_SIZE: usize = 1024 * 1024;

/// Status of an upload, with the numeric values used by CGI style environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum UploadErrorCode {
    Ok = 0,
    IniSize = 1,
    FormSize = 2,
    Partial = 3,
    NoFile = 4,
    NoTmpDir = 6,
    CantWrite = 7,
    Extension = 8,
}

impl UploadErrorCode {
    pub fn from_code(code: i64) -> Result<Self, ValidationError> {
        let status = match code {
            0 => Self::Ok,
            1 => Self::IniSize,
            2 => Self::FormSize,
            3 => Self::Partial,
            4 => Self::NoFile,
            6 => Self::NoTmpDir,
            7 => Self::CantWrite,
            8 => Self::Extension,
            _ => return Err(ValidationError::InvalidUploadStatus { code }),
        };
        Ok(status)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

/// Where the uploaded content lives until it is moved.
#[derive(Debug, Clone)]
pub enum UploadSource {
    Path(PathBuf),
    Stream(Body),
}

impl From<PathBuf> for UploadSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for UploadSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<Body> for UploadSource {
    fn from(body: Body) -> Self {
        Self::Stream(body)
    }
}

impl From<Stream> for UploadSource {
    fn from(stream: Stream) -> Self {
        Self::Stream(Body::new(stream))
    }
}

/// A pending upload. It can be read through [`UploadedFile::stream`] or moved once
/// with [`UploadedFile::move_to`], after which both fail.
#[derive(Debug)]
pub struct UploadedFile {
    source: UploadSource,
    size: Option<u64>,
    error: UploadErrorCode,
    client_filename: Option<String>,
    client_media_type: Option<String>,
    moved: AtomicBool,
}

impl UploadedFile {
    pub fn new(source: impl Into<UploadSource>, size: Option<u64>, error: UploadErrorCode) -> Self {
        Self {
            source: source.into(),
            size,
            error,
            client_filename: None,
            client_media_type: None,
            moved: AtomicBool::new(false),
        }
    }

    /// Sets the file name and media type sent by the client.
    #[must_use]
    pub fn with_client_info(mut self, filename: Option<String>, media_type: Option<String>) -> Self {
        self.client_filename = filename;
        self.client_media_type = media_type;
        self
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn error(&self) -> UploadErrorCode {
        self.error
    }

    pub fn client_filename(&self) -> Option<&str> {
        self.client_filename.as_deref()
    }

    pub fn client_media_type(&self) -> Option<&str> {
        self.client_media_type.as_deref()
    }

    pub fn is_moved(&self) -> bool {
        self.moved.load(Ordering::Acquire)
    }

    fn check(&self) -> Result<(), UploadError> {
        ensure!(self.error.is_ok(), UploadError::Failed { code: self.error.code() });
        ensure!(!self.is_moved(), UploadError::AlreadyMoved);
        Ok(())
    }

    /// The uploaded content. A path source is opened read-only on every call.
    pub fn stream(&self) -> Result<Body, UploadError> {
        self.check()?;
        match &self.source {
            UploadSource::Stream(body) => Ok(body.clone()),
            UploadSource::Path(path) => Ok(Body::new(Stream::open(path, &OpenMode::read_only())?)),
        }
    }

    /// Moves the upload to `target`. A failed move leaves the file movable.
    ///
    /// The latch is claimed before the move starts, so of two concurrent calls only one
    /// moves the file and the other fails with [`UploadError::AlreadyMoved`].
    pub fn move_to(&self, target: impl AsRef<Path>) -> Result<(), UploadError> {
        self.check()?;
        let target = target.as_ref();
        ensure!(!target.as_os_str().is_empty(), ValidationError::InvalidTargetPath.into());
        ensure!(
            self.moved.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok(),
            UploadError::AlreadyMoved
        );

        let moved = match &self.source {
            UploadSource::Path(path) => move_file(path, target),
            UploadSource::Stream(body) => copy_stream(body, target),
        };
        if let Err(e) = moved {
            self.moved.store(false, Ordering::Release);
            return Err(e);
        }

        info!(target = %target.display(), "uploaded file moved");
        Ok(())
    }
}

fn move_file(from: &Path, to: &Path) -> Result<(), UploadError> {
    if let Err(e) = fs::rename(from, to) {
        // rename does not work across file systems
        debug!(cause = %e, "rename failed, falling back to copy");
        fs::copy(from, to).map_err(|e| UploadError::move_failed(to, e))?;
        fs::remove_file(from).map_err(|e| UploadError::move_failed(to, e))?;
    }
    Ok(())
}

fn copy_stream(body: &Body, to: &Path) -> Result<(), UploadError> {
    let mut source = body.lock();
    if source.is_seekable() {
        source.rewind()?;
    }

    let mut dest = Stream::open(to, &OpenMode::new("w")?)?;
    let copied = copy_chunks(&mut source, &mut dest);
    dest.close();

    // no partial file is left behind
    if copied.is_err()
        && let Err(e) = fs::remove_file(to)
    {
        debug!(target = %to.display(), cause = %e, "could not remove partially moved upload");
    }
    copied
}

fn copy_chunks(source: &mut Stream, dest: &mut Stream) -> Result<(), UploadError> {
    while !source.eof() {
        let chunk = source.read(MOVE_CHUNK_SIZE)?;
        if chunk.is_empty() {
            break;
        }
        dest.write(&chunk)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor, Read};
    use std::sync::Arc;
    use std::thread;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("micro-upload-{name}-{}-{nanos}", std::process::id()))
    }

    #[test]
    fn error_codes() {
        assert_eq!(UploadErrorCode::from_code(0).unwrap(), UploadErrorCode::Ok);
        assert_eq!(UploadErrorCode::from_code(8).unwrap().code(), 8);
        assert_eq!(UploadErrorCode::from_code(5), Err(ValidationError::InvalidUploadStatus { code: 5 }));
        assert!(UploadErrorCode::from_code(-1).is_err());
    }

    #[test]
    fn metadata() {
        let file = UploadedFile::new(Stream::from("abc"), Some(3), UploadErrorCode::Ok)
            .with_client_info(Some("a.txt".into()), Some("text/plain".into()));

        assert_eq!(file.size(), Some(3));
        assert_eq!(file.error(), UploadErrorCode::Ok);
        assert_eq!(file.client_filename(), Some("a.txt"));
        assert_eq!(file.client_media_type(), Some("text/plain"));
        assert!(!file.is_moved());
    }

    #[test]
    fn failed_upload_has_no_stream() {
        let file = UploadedFile::new(Stream::new(), None, UploadErrorCode::Partial);

        assert!(matches!(file.stream(), Err(UploadError::Failed { code: 3 })));
        assert!(matches!(file.move_to(temp_path("never")), Err(UploadError::Failed { .. })));
    }

    #[test]
    fn move_stream_source() {
        let file = UploadedFile::new(Stream::from("uploaded content"), Some(16), UploadErrorCode::Ok);
        assert_eq!(file.stream().unwrap().to_string(), "uploaded content");

        let target = temp_path("stream-target");
        file.move_to(&target).unwrap();

        assert!(file.is_moved());
        assert_eq!(fs::read_to_string(&target).unwrap(), "uploaded content");
        assert!(matches!(file.stream(), Err(UploadError::AlreadyMoved)));
        assert!(matches!(file.move_to(&target), Err(UploadError::AlreadyMoved)));

        fs::remove_file(&target).unwrap();
    }

    #[test]
    fn move_path_source() {
        let source = temp_path("path-source");
        fs::write(&source, "from disk").unwrap();

        let file = UploadedFile::new(source.clone(), Some(9), UploadErrorCode::Ok);
        assert_eq!(file.stream().unwrap().to_string(), "from disk");

        let target = temp_path("path-target");
        file.move_to(&target).unwrap();

        assert!(!source.exists());
        assert_eq!(fs::read_to_string(&target).unwrap(), "from disk");
        fs::remove_file(&target).unwrap();
    }

    #[test]
    fn empty_target_is_rejected() {
        let file = UploadedFile::new(Stream::from("x"), Some(1), UploadErrorCode::Ok);

        let err = file.move_to("").unwrap_err();
        assert!(matches!(err, UploadError::Validation { source: ValidationError::InvalidTargetPath }));
        assert!(!file.is_moved());
    }

    struct Unreadable;

    impl Read for Unreadable {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("device gone"))
        }
    }

    #[test]
    fn failed_copy_removes_the_partial_target() {
        let reader = Cursor::new(b"first bytes".to_vec()).chain(Unreadable);
        let file = UploadedFile::new(Stream::from_reader(reader), None, UploadErrorCode::Ok);

        let target = temp_path("partial-target");
        assert!(matches!(file.move_to(&target), Err(UploadError::Stream { .. })));
        assert!(!target.exists());
        assert!(!file.is_moved());
    }

    #[test]
    fn concurrent_moves_move_once() {
        let file = Arc::new(UploadedFile::new(Stream::from("shared upload"), Some(13), UploadErrorCode::Ok));
        let targets = [temp_path("race-a"), temp_path("race-b")];

        let results: Vec<Result<(), UploadError>> = thread::scope(|scope| {
            let handles: Vec<_> = targets
                .iter()
                .map(|target| {
                    let file = Arc::clone(&file);
                    scope.spawn(move || file.move_to(target))
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
        assert!(results.iter().any(|result| matches!(result, Err(UploadError::AlreadyMoved))));
        assert!(file.is_moved());

        let written: Vec<_> = targets.iter().filter(|target| target.exists()).collect();
        assert_eq!(written.len(), 1);
        assert_eq!(fs::read_to_string(written[0]).unwrap(), "shared upload");
        fs::remove_file(written[0]).unwrap();
    }

    #[test]
    fn failed_move_keeps_file_movable() {
        let file = UploadedFile::new(temp_path("does-not-exist"), None, UploadErrorCode::Ok);

        assert!(matches!(file.move_to(temp_path("target")), Err(UploadError::Move { .. })));
        assert!(!file.is_moved());
    }
}
