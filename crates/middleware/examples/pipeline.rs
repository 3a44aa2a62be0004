use std::time::Instant;

use micro_message::{Message, RequestMessage, Response, ServerRequest};
use micro_middleware::{
    BoxError, HasMiddleware, Middleware, MiddlewareEntry, MiddlewareStack, Registry, RequestHandler, handler_fn,
};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Default)]
struct Timing;

impl Middleware for Timing {
    fn process(&self, request: ServerRequest, next: &dyn RequestHandler) -> Result<Response, BoxError> {
        let start = Instant::now();
        let target = request.request_target();
        let response = next.handle(request)?;
        info!(target = %target, status = response.status_code(), elapsed = ?start.elapsed(), "request handled");
        Ok(response)
    }

    fn name(&self) -> &str {
        "timing"
    }
}

#[derive(Default)]
struct RequireToken;

impl Middleware for RequireToken {
    fn process(&self, request: ServerRequest, next: &dyn RequestHandler) -> Result<Response, BoxError> {
        if request.header_line("Authorization").is_empty() {
            return Ok(Response::from_code(401)?);
        }
        next.handle(request)
    }

    fn name(&self) -> &str {
        "auth"
    }
}

/// A route owning its own middleware stack.
struct Route {
    middleware: MiddlewareStack,
}

impl HasMiddleware for Route {
    fn middleware_stack(&self) -> &MiddlewareStack {
        &self.middleware
    }

    fn middleware_stack_mut(&mut self) -> &mut MiddlewareStack {
        &mut self.middleware
    }
}

fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut registry = Registry::new();
    registry.register::<Timing>().register::<RequireToken>();

    let mut route = Route { middleware: MiddlewareStack::new() };
    route.with_all(["timing", "auth"]).with_fn(|request: ServerRequest, next: &dyn RequestHandler| {
        next.handle(request.with_attribute("greeting", "hello"))
    });

    let mut public = Route { middleware: route.middleware_stack().clone() };
    public.without(MiddlewareEntry::named("AUTH"));

    for (name, route, request) in [
        ("protected", &route, ServerRequest::new("GET", "http://localhost/hello").expect("valid request")),
        ("public", &public, ServerRequest::new("GET", "http://localhost/hello").expect("valid request")),
    ] {
        let default = handler_fn(|request: ServerRequest| {
            let greeting = request.attribute_as::<&str>("greeting").copied().unwrap_or("hi");
            Response::default().with_body(format!("{greeting} from {}", request.uri().path())).with_header("Content-Type", "text/plain")
        });

        match route.dispatch(request, &registry, default) {
            Ok(response) => info!(route = name, status = response.status_code(), body = %response.body(), "dispatched"),
            Err(e) => error!(route = name, cause = %e, "dispatch failed"),
        }
    }
}
