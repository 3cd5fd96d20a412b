//! Route and middleware registration.
//!
//! Registration happens on a [`RouterBuilder`]. Once every route and middleware is in place,
//! [`RouterBuilder::build`] freezes them into a [`Router`], which is immutable and can be
//! shared across any number of concurrently served requests.
//!
//! # Example
//! ```
//! use micro_router::{handler_fn, Router, RouterError};
//!
//! fn router() -> Result<Router, RouterError> {
//!     let mut builder = Router::builder();
//!     builder
//!         .get("/", handler_fn(|ctx| Box::pin(async move {
//!             ctx.response_mut().text("home");
//!             Ok(())
//!         })))?
//!         .get("/users/:id", handler_fn(|ctx| Box::pin(async move {
//!             let id = ctx.path_params().get("id").unwrap_or_default().to_owned();
//!             ctx.response_mut().text(id);
//!             Ok(())
//!         })))?;
//!
//!     builder.use_global(handler_fn(|ctx| Box::pin(async move {
//!         tracing::info!(path = ctx.path(), "incoming request");
//!         Ok(())
//!     })));
//!
//!     Ok(builder.build())
//! }
//!
//! assert_eq!(router().unwrap().routes().len(), 2);
//! ```

use crate::cache::ResolutionCache;
use crate::handler::RequestHandler;
use crate::middleware::{MiddlewareErrorPolicy, MiddlewareRegistry};
use crate::route::{Route, RouteTable, RouterError};
use crate::static_files::StaticDir;
use http::Method;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// The immutable result of registration, ready to dispatch requests.
#[derive(Debug)]
pub struct Router {
    pub(crate) table: RouteTable,
    pub(crate) middleware: MiddlewareRegistry,
    pub(crate) cache: Option<ResolutionCache>,
    pub(crate) error_policy: MiddlewareErrorPolicy,
    pub(crate) default_headers: bool,
}

impl Router {
    /// Creates a new router builder with the default options
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.table
    }

    pub fn middleware(&self) -> &MiddlewareRegistry {
        &self.middleware
    }

    pub fn resolution_cache(&self) -> Option<&ResolutionCache> {
        self.cache.as_ref()
    }

    pub fn middleware_error_policy(&self) -> MiddlewareErrorPolicy {
        self.error_policy
    }
}

/// Collects routes, middleware and options for a [`Router`].
#[derive(Debug)]
pub struct RouterBuilder {
    table: RouteTable,
    middleware: MiddlewareRegistry,
    cache_capacity: Option<usize>,
    error_policy: MiddlewareErrorPolicy,
    default_headers: bool,
}

macro_rules! method_route {
    ($method:ident, $upper_case_method:ident) => {
        #[doc = concat!("Registers a handler for `", stringify!($upper_case_method), "` requests on `path`.")]
        pub fn $method<H: RequestHandler + 'static>(&mut self, path: &str, handler: H) -> Result<&mut Self, RouterError> {
            self.route(Method::$upper_case_method, path, handler)
        }
    };
}

impl RouterBuilder {
    fn new() -> Self {
        Self {
            table: RouteTable::new(),
            middleware: MiddlewareRegistry::new(),
            cache_capacity: None,
            error_policy: MiddlewareErrorPolicy::default(),
            default_headers: true,
        }
    }

    /// Registers a handler for `method` requests on `path`.
    ///
    /// Fails with [`RouterError::DuplicateRoute`] when the method already has a route for
    /// the same normalized path, and with [`RouterError::InvalidPattern`] when the path
    /// does not compile. Either way nothing is registered.
    pub fn route<H: RequestHandler + 'static>(
        &mut self,
        method: Method,
        path: &str,
        handler: H,
    ) -> Result<&mut Self, RouterError> {
        let route = Route::new(method, path, Box::new(handler))?;
        let route = self.table.insert(route)?;
        debug!(method = %route.method(), path = route.path(), kind = ?route.kind(), "registered route");
        Ok(self)
    }

    method_route!(get, GET);
    method_route!(post, POST);
    method_route!(put, PUT);
    method_route!(patch, PATCH);
    method_route!(delete, DELETE);
    method_route!(head, HEAD);
    method_route!(options, OPTIONS);

    /// Adds a middleware that runs for every resolved request, before any path middleware.
    pub fn use_global<M: RequestHandler + 'static>(&mut self, middleware: M) -> &mut Self {
        self.middleware.add_global(Box::new(middleware));
        self
    }

    /// Adds a middleware that runs only for requests resolved to `path`.
    ///
    /// `path` may be a route pattern such as `/users/:id`, which covers every request
    /// resolved to that route, or a concrete path such as `/users/42`. Calls chain, and
    /// `use_path("/a", m1).use_path("/a", m2)` runs `m1` then `m2`; see
    /// [`RouterBuilder::use_path_many`] to pass several at once.
    pub fn use_path<M: RequestHandler + 'static>(&mut self, path: &str, middleware: M) -> &mut Self {
        self.middleware.add_scoped(path, Box::new(middleware));
        self
    }

    /// Serves every file below `dir` with a `GET` route under `prefix`.
    ///
    /// `static_dir("/assets", "./public")` serves `./public/css/site.css` at
    /// `/assets/css/site.css`. The directory is walked once, now.
    ///
    /// Every file route is checked before any is inserted, so when one of them collides
    /// with an existing route nothing from the directory is registered.
    pub fn static_dir(&mut self, prefix: &str, dir: impl AsRef<Path>) -> Result<&mut Self, RouterError> {
        let static_dir = StaticDir::scan(dir)?;

        let mut routes = Vec::with_capacity(static_dir.len());
        let mut seen = HashSet::with_capacity(static_dir.len());
        for (url_path, file) in static_dir.routes(prefix) {
            let route = Route::new(Method::GET, &url_path, Box::new(file))?;
            if self.table.get(route.method(), route.path()).is_some() || !seen.insert(route.path().to_owned()) {
                return Err(RouterError::DuplicateRoute { method: Method::GET, path: route.path().to_owned() });
            }
            routes.push(route);
        }

        for route in routes {
            let route = self.table.insert(route)?;
            debug!(method = %route.method(), path = route.path(), dir = %static_dir.root().display(), "registered static file");
        }
        Ok(self)
    }

    /// Appends several middleware to the global chain, in iteration order.
    pub fn use_global_many<I>(&mut self, middleware: I) -> &mut Self
    where
        I: IntoIterator<Item = Box<dyn RequestHandler>>,
    {
        for middleware in middleware {
            self.middleware.add_global(middleware);
        }
        self
    }

    /// Appends several middleware to the chain of `path`, in iteration order.
    ///
    /// Same as calling [`RouterBuilder::use_path`] once per middleware.
    pub fn use_path_many<I>(&mut self, path: &str, middleware: I) -> &mut Self
    where
        I: IntoIterator<Item = Box<dyn RequestHandler>>,
    {
        for middleware in middleware {
            self.middleware.add_scoped(path, middleware);
        }
        self
    }

    /// Remembers up to `capacity` dynamic route resolutions.
    pub fn resolution_cache(&mut self, capacity: usize) -> &mut Self {
        self.cache_capacity = Some(capacity);
        self
    }

    pub fn middleware_error_policy(&mut self, policy: MiddlewareErrorPolicy) -> &mut Self {
        self.error_policy = policy;
        self
    }

    /// Whether responses start with the CORS and keep-alive headers, on by default.
    pub fn default_headers(&mut self, enabled: bool) -> &mut Self {
        self.default_headers = enabled;
        self
    }

    /// Number of routes registered so far.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn build(self) -> Router {
        Router {
            table: self.table,
            middleware: self.middleware,
            cache: self.cache_capacity.filter(|capacity| *capacity > 0).map(ResolutionCache::with_capacity),
            error_policy: self.error_policy,
            default_headers: self.default_headers,
        }
    }

    /// Builds the router and wraps it for sharing between tasks.
    pub fn build_shared(self) -> Arc<Router> {
        Arc::new(self.build())
    }
}
