use std::error::Error;

use thiserror::Error;

/// The error type returned by handlers and middleware.
pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no middleware registered for \"{name}\"")]
    NotFound { name: String },
}

impl ResolveError {
    pub fn not_found<S: ToString>(name: S) -> Self {
        Self::NotFound { name: name.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("middleware resolution error: {source}")]
    Resolve {
        #[from]
        source: ResolveError,
    },

    #[error("handler error: {source}")]
    Handler { source: BoxError },
}
