use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::ResolveError;
use crate::middleware::Middleware;

/// Turns a middleware identifier into an instance during dispatch.
#[cfg_attr(test, mockall::automock)]
pub trait Resolver {
    fn resolve(&self, name: &str) -> Result<Arc<dyn Middleware>, ResolveError>;
}

type MiddlewareFactory = Box<dyn Fn() -> Arc<dyn Middleware> + Send + Sync>;

/// A [`Resolver`] over registered factories. Identifiers are matched case-insensitively.
#[derive(Default)]
pub struct Registry {
    factories: HashMap<String, MiddlewareFactory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `M` under its [`Middleware::name`], a fresh default instance is built per resolution.
    pub fn register<M: Middleware + Default + 'static>(&mut self) -> &mut Self {
        let name = M::default().name().to_string();
        self.register_fn(&name, || Arc::new(M::default()))
    }

    pub fn register_fn<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn Middleware> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_ascii_lowercase(), Box::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }
}

impl Resolver for Registry {
    fn resolve(&self, name: &str) -> Result<Arc<dyn Middleware>, ResolveError> {
        let factory = self.factories.get(&name.to_ascii_lowercase()).ok_or_else(|| ResolveError::not_found(name))?;
        debug!(name, "resolved middleware");
        Ok(factory())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Registry").field("names", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::handler::RequestHandler;
    use micro_message::{Response, ServerRequest};

    #[derive(Default)]
    struct Noop;

    impl Middleware for Noop {
        fn process(&self, request: ServerRequest, next: &dyn RequestHandler) -> Result<Response, BoxError> {
            next.handle(request)
        }

        fn name(&self) -> &str {
            "Noop"
        }
    }

    #[test]
    fn register_by_type_name() {
        let mut registry = Registry::new();
        registry.register::<Noop>();

        assert!(registry.contains("noop"));
        assert_eq!(registry.resolve("NOOP").unwrap().name(), "Noop");
    }

    #[test]
    fn register_with_factory() {
        let mut registry = Registry::new();
        registry.register_fn("custom", || Arc::new(Noop));

        assert!(registry.resolve("Custom").is_ok());
        assert!(format!("{registry:?}").contains("custom"));
    }

    #[test]
    fn unknown_name() {
        let err = Registry::new().resolve("missing").err().unwrap();
        assert!(matches!(err, ResolveError::NotFound { name } if name == "missing"));
    }
}
