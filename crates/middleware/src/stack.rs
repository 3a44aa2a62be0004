//! Include/exclude bookkeeping and chain construction.
//!
//! Entries are compared by type identifier, case-insensitively: a named entry matches an
//! instance whose [`Middleware::name`] is equal, and two instances of the same type match
//! each other even when they are different values.

use std::fmt;
use std::sync::Arc;

use micro_message::{Response, ServerRequest};
use tracing::debug;

use crate::error::{BoxError, DispatchError};
use crate::handler::RequestHandler;
use crate::middleware::{CallableMiddleware, Middleware, MiddlewareHandler};
use crate::resolver::Resolver;

/// One entry of an include or exclude list.
#[derive(Clone)]
pub enum MiddlewareEntry {
    Instance(Arc<dyn Middleware>),
    /// A type identifier, turned into an instance by a [`Resolver`] during dispatch.
    Named(String),
}

impl MiddlewareEntry {
    pub fn instance<M: Middleware + 'static>(middleware: M) -> Self {
        Self::Instance(Arc::new(middleware))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// A named entry for `M`, matching instances that keep the default [`Middleware::name`].
    pub fn of<M: Middleware + 'static>() -> Self {
        Self::Named(std::any::type_name::<M>().to_string())
    }

    pub fn type_name(&self) -> &str {
        match self {
            MiddlewareEntry::Instance(middleware) => middleware.name(),
            MiddlewareEntry::Named(name) => name,
        }
    }

    pub fn matches(&self, other: &MiddlewareEntry) -> bool {
        self.type_name().eq_ignore_ascii_case(other.type_name())
    }
}

impl fmt::Debug for MiddlewareEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiddlewareEntry::Instance(middleware) => f.debug_tuple("Instance").field(&middleware.name()).finish(),
            MiddlewareEntry::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

impl From<&str> for MiddlewareEntry {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for MiddlewareEntry {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<Arc<dyn Middleware>> for MiddlewareEntry {
    fn from(middleware: Arc<dyn Middleware>) -> Self {
        Self::Instance(middleware)
    }
}

impl<F, E> From<CallableMiddleware<F>> for MiddlewareEntry
where
    F: Fn(ServerRequest, &dyn RequestHandler) -> Result<Response, E> + Send + Sync + 'static,
    E: Into<BoxError> + 'static,
{
    fn from(middleware: CallableMiddleware<F>) -> Self {
        Self::Instance(Arc::new(middleware))
    }
}

/// The include and exclude lists, in insertion order. Duplicates are kept.
#[derive(Clone, Default)]
pub struct MiddlewareStack {
    include: Vec<MiddlewareEntry>,
    exclude: Vec<MiddlewareEntry>,
}

impl MiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Debug for MiddlewareStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareStack").field("include", &self.include).field("exclude", &self.exclude).finish()
    }
}

impl HasMiddleware for MiddlewareStack {
    fn middleware_stack(&self) -> &MiddlewareStack {
        self
    }

    fn middleware_stack_mut(&mut self) -> &mut MiddlewareStack {
        self
    }
}

/// Middleware bookkeeping for anything that owns a [`MiddlewareStack`], such as a route or
/// a controller.
pub trait HasMiddleware {
    fn middleware_stack(&self) -> &MiddlewareStack;

    fn middleware_stack_mut(&mut self) -> &mut MiddlewareStack;

    fn with(&mut self, entry: impl Into<MiddlewareEntry>) -> &mut Self {
        self.middleware_stack_mut().include.push(entry.into());
        self
    }

    fn with_all<I>(&mut self, entries: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<MiddlewareEntry>,
    {
        self.middleware_stack_mut().include.extend(entries.into_iter().map(Into::into));
        self
    }

    /// Adds a closure as a [`CallableMiddleware`]. Every such entry has the identifier
    /// [`crate::CALLABLE_MIDDLEWARE`], excluding it drops all of them.
    fn with_fn<F, E>(&mut self, f: F) -> &mut Self
    where
        F: Fn(ServerRequest, &dyn RequestHandler) -> Result<Response, E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        self.with(crate::middleware::middleware_fn(f))
    }

    fn without(&mut self, entry: impl Into<MiddlewareEntry>) -> &mut Self {
        self.middleware_stack_mut().exclude.push(entry.into());
        self
    }

    fn without_all<I>(&mut self, entries: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<MiddlewareEntry>,
    {
        self.middleware_stack_mut().exclude.extend(entries.into_iter().map(Into::into));
        self
    }

    fn include_list(&self) -> &[MiddlewareEntry] {
        &self.middleware_stack().include
    }

    fn exclude_list(&self) -> &[MiddlewareEntry] {
        &self.middleware_stack().exclude
    }

    /// The include list minus every entry matched by the exclude list, in include order.
    fn stack(&self) -> Vec<MiddlewareEntry> {
        let stack = self.middleware_stack();
        stack
            .include
            .iter()
            .filter(|entry| !stack.exclude.iter().any(|excluded| excluded.matches(entry)))
            .cloned()
            .collect()
    }

    /// Runs `request` through the resolved stack and into `default`.
    ///
    /// The chain is built from the last entry to the first, so a stack `[A, B]` runs
    /// `A -> B -> default`. Named entries are resolved before anything is called.
    fn dispatch<H>(&self, request: ServerRequest, resolver: &dyn Resolver, default: H) -> Result<Response, DispatchError>
    where
        H: RequestHandler + 'static,
    {
        let stack = self.stack();
        debug!(depth = stack.len(), "building middleware chain");

        let mut chain: Box<dyn RequestHandler> = Box::new(default);
        for entry in stack.into_iter().rev() {
            let middleware = match entry {
                MiddlewareEntry::Instance(middleware) => middleware,
                MiddlewareEntry::Named(name) => resolver.resolve(&name)?,
            };
            chain = Box::new(MiddlewareHandler::new(middleware, chain));
        }

        chain.handle(request).map_err(|source| DispatchError::Handler { source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use crate::handler::handler_fn;
    use crate::middleware::{CALLABLE_MIDDLEWARE, middleware_fn};
    use crate::resolver::MockResolver;
    use micro_message::{Message, RequestMessage};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    type Trace = Arc<Mutex<Vec<String>>>;

    /// Records its label on the way in, and appends it to `X-Trace` on the way out.
    struct Tracer {
        label: &'static str,
        trace: Trace,
    }

    impl Middleware for Tracer {
        fn process(&self, request: ServerRequest, next: &dyn RequestHandler) -> Result<Response, BoxError> {
            self.trace.lock().unwrap().push(self.label.to_string());
            let response = next.handle(request)?;
            Ok(response.with_added_header("X-Trace", self.label)?)
        }
    }

    struct ShortCircuit;

    impl Middleware for ShortCircuit {
        fn process(&self, _request: ServerRequest, _next: &dyn RequestHandler) -> Result<Response, BoxError> {
            Ok(Response::from_code(418)?)
        }
    }

    struct Auth;

    impl Middleware for Auth {
        fn process(&self, request: ServerRequest, next: &dyn RequestHandler) -> Result<Response, BoxError> {
            next.handle(request.with_attribute("user", "ferris".to_string()))
        }

        fn name(&self) -> &str {
            "App\\Middleware\\Auth"
        }
    }

    fn tracer(label: &'static str, trace: &Trace) -> Arc<dyn Middleware> {
        Arc::new(Tracer { label, trace: Arc::clone(trace) })
    }

    fn ok_handler() -> impl RequestHandler + 'static {
        handler_fn(|_request| Ok::<_, BoxError>(Response::default()))
    }

    fn request() -> ServerRequest {
        ServerRequest::new("GET", "/").unwrap()
    }

    fn names(entries: &[MiddlewareEntry]) -> Vec<&str> {
        entries.iter().map(MiddlewareEntry::type_name).collect()
    }

    #[test]
    fn stack_is_include_minus_exclude() {
        let mut stack = MiddlewareStack::new();
        stack.with_all(["A", "B"]).without("B");

        assert_eq!(names(&stack.stack()), vec!["A"]);
        assert_eq!(names(stack.include_list()), vec!["A", "B"]);
        assert_eq!(names(stack.exclude_list()), vec!["B"]);
    }

    #[test]
    fn stack_keeps_order_and_duplicates() {
        let mut stack = MiddlewareStack::new();
        stack.with("C").with("A").with("B").with("A").without_all(vec!["b".to_string()]);

        assert_eq!(names(&stack.stack()), vec!["C", "A", "A"]);
    }

    #[test]
    fn instances_and_names_compare_by_type() {
        let trace = Trace::default();
        let mut stack = MiddlewareStack::new();
        stack.with(tracer("one", &trace)).with(MiddlewareEntry::instance(Auth)).with("Other");

        // a second, distinct instance of the same type excludes the first
        stack.without(tracer("two", &trace));
        // case-insensitive name of a custom identifier
        stack.without("app\\middleware\\AUTH");

        assert_eq!(names(&stack.stack()), vec!["Other"]);
    }

    #[test]
    fn excluding_callables_drops_every_closure() {
        let trace = Trace::default();
        let mut stack = MiddlewareStack::new();
        stack
            .with_fn(|request: ServerRequest, next: &dyn RequestHandler| next.handle(request))
            .with(tracer("kept", &trace))
            .with_fn(|_request: ServerRequest, _next: &dyn RequestHandler| Response::from_code(401));
        assert_eq!(names(&stack.stack()), vec![CALLABLE_MIDDLEWARE, std::any::type_name::<Tracer>(), CALLABLE_MIDDLEWARE]);

        stack.without(middleware_fn(|request: ServerRequest, next: &dyn RequestHandler| next.handle(request)));
        assert_eq!(names(&stack.stack()), vec![std::any::type_name::<Tracer>()]);

        stack.without_all(["callablemiddleware"]);
        assert_eq!(stack.stack().len(), 1);
    }

    #[test]
    fn named_entry_of_type() {
        let trace = Trace::default();
        let mut stack = MiddlewareStack::new();
        stack.with(tracer("one", &trace)).without(MiddlewareEntry::of::<Tracer>());

        assert!(stack.stack().is_empty());
    }

    #[test]
    fn dispatch_runs_outer_to_inner() {
        let trace = Trace::default();
        let mut stack = MiddlewareStack::new();
        stack.with(tracer("A", &trace)).with(tracer("B", &trace)).with(tracer("C", &trace));

        let response = stack.dispatch(request(), &MockResolver::new(), ok_handler()).unwrap();

        assert_eq!(*trace.lock().unwrap(), vec!["A", "B", "C"]);
        // responses unwind inner to outer
        assert_eq!(response.header_line("X-Trace"), "C, B, A");
    }

    #[test]
    fn short_circuit_skips_default_handler() {
        let trace = Trace::default();
        let called = Arc::new(AtomicBool::new(false));
        let default = {
            let called = Arc::clone(&called);
            handler_fn(move |_request| {
                called.store(true, Ordering::SeqCst);
                Ok::<_, BoxError>(Response::default())
            })
        };

        let mut stack = MiddlewareStack::new();
        stack.with(tracer("A", &trace)).with(MiddlewareEntry::instance(ShortCircuit));

        let response = stack.dispatch(request(), &MockResolver::new(), default).unwrap();

        assert_eq!(response.status_code(), 418);
        assert_eq!(response.header_line("X-Trace"), "A");
        assert!(!called.load(Ordering::SeqCst));
    }

    #[test]
    fn empty_stack_calls_default() {
        let response = MiddlewareStack::new().dispatch(request(), &MockResolver::new(), ok_handler()).unwrap();
        assert_eq!(response.status_code(), 200);
    }

    #[test]
    fn named_entries_are_resolved() {
        let mut resolver = MockResolver::new();
        resolver
            .expect_resolve()
            .withf(|name| name == "auth")
            .times(1)
            .returning(|_| Ok(Arc::new(Auth) as Arc<dyn Middleware>));

        let mut stack = MiddlewareStack::new();
        stack.with("auth");

        let default = handler_fn(|request: ServerRequest| {
            let user = request.attribute_as::<String>("user").cloned().unwrap_or_default();
            Response::default().with_header("X-User", user)
        });
        let response = stack.dispatch(request(), &resolver, default).unwrap();

        assert_eq!(response.header_line("X-User"), "ferris");
    }

    #[test]
    fn resolve_failure_aborts_dispatch() {
        let mut resolver = MockResolver::new();
        resolver.expect_resolve().returning(|name| Err(ResolveError::not_found(name)));

        let trace = Trace::default();
        let mut stack = MiddlewareStack::new();
        stack.with(tracer("A", &trace)).with("missing");

        let err = stack.dispatch(request(), &resolver, ok_handler()).unwrap_err();

        assert!(matches!(err, DispatchError::Resolve { source: ResolveError::NotFound { .. } }));
        assert!(trace.lock().unwrap().is_empty());
    }

    #[test]
    fn handler_errors_propagate() {
        let mut stack = MiddlewareStack::new();
        stack.with_fn(|request: ServerRequest, next: &dyn RequestHandler| next.handle(request));

        let failing = handler_fn(|_request| Err::<Response, _>("backend down"));
        let err = stack.dispatch(request(), &MockResolver::new(), failing).unwrap_err();

        assert!(matches!(&err, DispatchError::Handler { source } if source.to_string() == "backend down"));
    }

    #[test]
    fn middleware_sees_request_line() {
        let mut stack = MiddlewareStack::new();
        stack.with_fn(|request: ServerRequest, next: &dyn RequestHandler| -> Result<Response, BoxError> {
            let method = request.method().to_string();
            Ok(next.handle(request)?.with_header("X-Method", method)?)
        });

        let response = stack.dispatch(ServerRequest::new("delete", "/x").unwrap(), &MockResolver::new(), ok_handler());
        assert_eq!(response.unwrap().header_line("x-method"), "DELETE");
    }
}
