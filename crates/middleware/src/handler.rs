use std::fmt;
use std::sync::Arc;

use micro_message::{Response, ServerRequest};

use crate::error::BoxError;

/// Produces a response for a request, the terminal link of a middleware chain.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: ServerRequest) -> Result<Response, BoxError>;
}

impl<H: RequestHandler + ?Sized> RequestHandler for &H {
    fn handle(&self, request: ServerRequest) -> Result<Response, BoxError> {
        (**self).handle(request)
    }
}

impl<H: RequestHandler + ?Sized> RequestHandler for Box<H> {
    fn handle(&self, request: ServerRequest) -> Result<Response, BoxError> {
        (**self).handle(request)
    }
}

impl<H: RequestHandler + ?Sized> RequestHandler for Arc<H> {
    fn handle(&self, request: ServerRequest) -> Result<Response, BoxError> {
        (**self).handle(request)
    }
}

/// A [`RequestHandler`] backed by a function, see [`handler_fn`].
pub struct CallableRequestHandler<F> {
    f: F,
}

impl<F, E> RequestHandler for CallableRequestHandler<F>
where
    F: Fn(ServerRequest) -> Result<Response, E> + Send + Sync,
    E: Into<BoxError>,
{
    fn handle(&self, request: ServerRequest) -> Result<Response, BoxError> {
        (self.f)(request).map_err(Into::into)
    }
}

impl<F> fmt::Debug for CallableRequestHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallableRequestHandler").finish_non_exhaustive()
    }
}

pub fn handler_fn<F, E>(f: F) -> CallableRequestHandler<F>
where
    F: Fn(ServerRequest) -> Result<Response, E> + Send + Sync,
    E: Into<BoxError>,
{
    CallableRequestHandler { f }
}
