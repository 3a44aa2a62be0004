use std::fmt;
use std::sync::Arc;

use micro_message::{Response, ServerRequest};

use crate::error::BoxError;
use crate::handler::RequestHandler;

/// A link in the chain: it may forward the request to `next`, transform the request or
/// the response around that call, or answer on its own without calling `next` at all.
pub trait Middleware: Send + Sync {
    fn process(&self, request: ServerRequest, next: &dyn RequestHandler) -> Result<Response, BoxError>;

    /// The type identifier used to compare stack entries, see [`crate::MiddlewareEntry`].
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn process(&self, request: ServerRequest, next: &dyn RequestHandler) -> Result<Response, BoxError> {
        (**self).process(request, next)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// The [`Middleware::name`] of every [`CallableMiddleware`], whatever function it wraps.
pub const CALLABLE_MIDDLEWARE: &str = "CallableMiddleware";

/// A [`Middleware`] backed by a function, see [`middleware_fn`].
///
/// All callable middleware share one type identifier, [`CALLABLE_MIDDLEWARE`], so
/// excluding it from a stack removes every closure added with `with_fn`.
pub struct CallableMiddleware<F> {
    f: F,
}

impl<F, E> Middleware for CallableMiddleware<F>
where
    F: Fn(ServerRequest, &dyn RequestHandler) -> Result<Response, E> + Send + Sync,
    E: Into<BoxError>,
{
    fn process(&self, request: ServerRequest, next: &dyn RequestHandler) -> Result<Response, BoxError> {
        (self.f)(request, next).map_err(Into::into)
    }

    fn name(&self) -> &str {
        CALLABLE_MIDDLEWARE
    }
}

impl<F> fmt::Debug for CallableMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallableMiddleware").finish_non_exhaustive()
    }
}

pub fn middleware_fn<F, E>(f: F) -> CallableMiddleware<F>
where
    F: Fn(ServerRequest, &dyn RequestHandler) -> Result<Response, E> + Send + Sync,
    E: Into<BoxError>,
{
    CallableMiddleware { f }
}

/// Pairs one middleware with the handler it wraps.
pub struct MiddlewareHandler {
    middleware: Arc<dyn Middleware>,
    next: Box<dyn RequestHandler>,
}

impl MiddlewareHandler {
    pub fn new(middleware: Arc<dyn Middleware>, next: Box<dyn RequestHandler>) -> Self {
        Self { middleware, next }
    }
}

impl RequestHandler for MiddlewareHandler {
    fn handle(&self, request: ServerRequest) -> Result<Response, BoxError> {
        self.middleware.process(request, self.next.as_ref())
    }
}

impl fmt::Debug for MiddlewareHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareHandler").field("middleware", &self.middleware.name()).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use micro_message::{Message, RequestMessage};

    struct Tag;

    impl Middleware for Tag {
        fn process(&self, request: ServerRequest, next: &dyn RequestHandler) -> Result<Response, BoxError> {
            let response = next.handle(request)?;
            Ok(response.with_added_header("X-Tag", "outer")?)
        }
    }

    #[test]
    fn wraps_next_handler() {
        let next = handler_fn(|_request| Ok::<_, BoxError>(Response::default()));
        let handler = MiddlewareHandler::new(Arc::new(Tag), Box::new(next));

        let response = handler.handle(ServerRequest::new("GET", "/").unwrap()).unwrap();
        assert_eq!(response.header_line("X-Tag"), "outer");
    }

    #[test]
    fn callable_middleware_can_rewrite_the_request() {
        let rewrite = middleware_fn(|request: ServerRequest, next: &dyn RequestHandler| {
            next.handle(request.with_attribute("seen", true))
        });
        let next = handler_fn(|request: ServerRequest| {
            let seen = request.attribute_as::<bool>("seen").copied().unwrap_or_default();
            Response::from_code(if seen { 204 } else { 500 })
        });

        let handler = MiddlewareHandler::new(Arc::new(rewrite), Box::new(next));
        let response = handler.handle(ServerRequest::new("GET", "/").unwrap()).unwrap();
        assert_eq!(response.status_code(), 204);
    }

    #[test]
    fn names_default_to_the_type() {
        assert!(Tag.name().ends_with("Tag"));
        let shared: Arc<dyn Middleware> = Arc::new(Tag);
        assert_eq!(shared.name(), Tag.name());

        let next = handler_fn(|_request| Ok::<_, BoxError>(Response::default()));
        let handler = MiddlewareHandler::new(shared, Box::new(next));
        assert!(format!("{handler:?}").contains("Tag"));
    }

    #[test]
    fn callables_share_one_name() {
        let pass = middleware_fn(|request: ServerRequest, next: &dyn RequestHandler| next.handle(request));
        let deny = middleware_fn(|_request: ServerRequest, _next: &dyn RequestHandler| Response::from_code(403));

        assert_eq!(pass.name(), CALLABLE_MIDDLEWARE);
        assert_eq!(deny.name(), CALLABLE_MIDDLEWARE);
    }

    #[test]
    fn uri_is_visible_to_middleware() {
        let guard = middleware_fn(|request: ServerRequest, next: &dyn RequestHandler| -> Result<Response, BoxError> {
            if request.uri().path().starts_with("/admin") {
                return Ok(Response::from_code(403)?);
            }
            next.handle(request)
        });
        let next = handler_fn(|_request| Ok::<_, BoxError>(Response::default()));
        let handler = MiddlewareHandler::new(Arc::new(guard), Box::new(next));

        assert_eq!(handler.handle(ServerRequest::new("GET", "/admin/x").unwrap()).unwrap().status_code(), 403);
        assert_eq!(handler.handle(ServerRequest::new("GET", "/public").unwrap()).unwrap().status_code(), 200);
    }
}
