//! fopen-style open modes and the capability tables derived from them.

use std::fs::OpenOptions;

use crate::error::ValidationError;

/// Modes that allow reading from the underlying resource.
const READ_MODES: [&str; 16] = [
    "r", "w+", "r+", "x+", "c+", "rb", "w+b", "r+b", "x+b", "c+b", "rt", "w+t", "r+t", "x+t", "c+t", "a+",
];

/// Modes that allow writing to the underlying resource.
const WRITE_MODES: [&str; 17] = [
    "w", "w+", "rw", "r+", "x+", "c+", "wb", "w+b", "r+b", "x+b", "c+b", "w+t", "r+t", "x+t", "c+t", "a", "a+",
];

/// An open mode string such as `r`, `w+b` or `a+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OpenMode(String);

impl OpenMode {
    /// Accepts any mode whose first character is one of `r w a x c`.
    pub fn new(mode: &str) -> Result<Self, ValidationError> {
        match mode.as_bytes().first() {
            Some(b'r' | b'w' | b'a' | b'x' | b'c') => Ok(Self(mode.to_string())),
            _ => Err(ValidationError::InvalidMode { mode: mode.to_string() }),
        }
    }

    /// The mode of in-memory streams.
    pub(crate) fn memory() -> Self {
        Self("w+b".to_string())
    }

    pub(crate) fn read_only() -> Self {
        Self("r".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_readable(&self) -> bool {
        READ_MODES.contains(&self.0.as_str())
    }

    pub fn is_writable(&self) -> bool {
        WRITE_MODES.contains(&self.0.as_str())
    }

    /// Translates the mode into the equivalent [`OpenOptions`].
    pub(crate) fn open_options(&self) -> OpenOptions {
        let plus = self.0.contains('+');
        let mut options = OpenOptions::new();
        match self.0.as_bytes().first() {
            Some(b'w') => {
                options.write(true).create(true).truncate(true).read(plus);
            }
            Some(b'a') => {
                options.append(true).create(true).read(plus);
            }
            Some(b'x') => {
                options.write(true).create_new(true).read(plus);
            }
            Some(b'c') => {
                options.write(true).create(true).read(plus);
            }
            // `r`, and `rw` which reads and writes an existing file
            _ => {
                options.read(true).write(plus || self.0.starts_with("rw"));
            }
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_tables() {
        let read = OpenMode::new("r").unwrap();
        assert!(read.is_readable());
        assert!(!read.is_writable());

        let append = OpenMode::new("a").unwrap();
        assert!(!append.is_readable());
        assert!(append.is_writable());

        let both = OpenMode::new("r+b").unwrap();
        assert!(both.is_readable());
        assert!(both.is_writable());

        assert!(OpenMode::memory().is_readable());
        assert!(OpenMode::memory().is_writable());
    }

    #[test]
    fn rejects_unknown_modes() {
        assert_eq!(OpenMode::new("z"), Err(ValidationError::InvalidMode { mode: "z".into() }));
        assert!(OpenMode::new("").is_err());
    }
}
