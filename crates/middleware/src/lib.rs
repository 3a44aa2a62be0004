//! Synchronous request handlers and middleware chains
//!
//! A [`RequestHandler`] turns a [`ServerRequest`](micro_message::ServerRequest) into a
//! [`Response`](micro_message::Response). A [`Middleware`] sits in front of a handler and
//! decides whether to call it, what request it sees and what response comes back.
//!
//! Types that own a [`MiddlewareStack`] get the [`HasMiddleware`] operations: include and
//! exclude entries, compute the effective stack, and [`HasMiddleware::dispatch`] a request
//! through it.
//!
//! # Example
//!
//! ```
//! use micro_message::{Message, Response, ServerRequest};
//! use micro_middleware::{BoxError, HasMiddleware, MiddlewareStack, Registry, RequestHandler, handler_fn};
//!
//! let mut stack = MiddlewareStack::new();
//! stack.with_fn(|request: ServerRequest, next: &dyn RequestHandler| -> Result<Response, BoxError> {
//!     Ok(next.handle(request)?.with_header("X-Powered-By", "micro")?)
//! });
//!
//! let default = handler_fn(|_request| Ok::<_, BoxError>(Response::default()));
//! let request = ServerRequest::new("GET", "/").unwrap();
//! let response = stack.dispatch(request, &Registry::new(), default).unwrap();
//!
//! assert_eq!(response.header_line("X-Powered-By"), "micro");
//! ```
//!
//! # Architecture
//!
//! - [`handler`]: [`RequestHandler`] and [`CallableRequestHandler`]
//! - [`middleware`]: [`Middleware`], [`CallableMiddleware`] and [`MiddlewareHandler`]
//! - [`stack`]: [`MiddlewareEntry`], [`MiddlewareStack`] and [`HasMiddleware`]
//! - [`resolver`]: [`Resolver`] and the [`Registry`] implementation

pub mod error;
pub mod handler;
pub mod middleware;
pub mod resolver;
pub mod stack;

pub use error::{BoxError, DispatchError, ResolveError};
pub use handler::{CallableRequestHandler, RequestHandler, handler_fn};
pub use middleware::{CALLABLE_MIDDLEWARE, CallableMiddleware, Middleware, MiddlewareHandler, middleware_fn};
pub use resolver::{Registry, Resolver};
pub use stack::{HasMiddleware, MiddlewareEntry, MiddlewareStack};
