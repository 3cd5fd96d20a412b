//! Registered routes and the table they live in.

use crate::handler::RequestHandler;
use crate::pattern::{PatternError, RoutePattern};
use crate::{PathParams, path};
use http::Method;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned while registering routes. A failed registration leaves the router
/// untouched.
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("[{method}] -> [{path}] route already exists")]
    DuplicateRoute { method: Method, path: String },
    #[error("invalid route path `{path}`: {source}")]
    InvalidPattern {
        path: String,
        #[source]
        source: PatternError,
    },
    #[error("cannot read static directory `{}`: {source}", dir.display())]
    StaticDir {
        dir: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Coarse classification of a route, used to skip pattern matching for static routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    /// only static segments
    Static,
    /// at least one `:name` segment, no wildcard
    Dynamic,
    /// at least one `*` segment
    Wildcard,
}

impl From<&RoutePattern> for RouteKind {
    fn from(pattern: &RoutePattern) -> Self {
        if pattern.has_wildcard() {
            RouteKind::Wildcard
        } else if pattern.is_static() {
            RouteKind::Static
        } else {
            RouteKind::Dynamic
        }
    }
}

/// A handler bound to a method and a path pattern.
pub struct Route {
    method: Method,
    path: String,
    pattern: RoutePattern,
    kind: RouteKind,
    handler: Box<dyn RequestHandler>,
}

impl Route {
    /// Compiles `raw_path` and binds it to `handler`.
    pub fn new(method: Method, raw_path: &str, handler: Box<dyn RequestHandler>) -> Result<Self, RouterError> {
        let path = path::normalize(raw_path);
        let pattern =
            RoutePattern::parse(&path).map_err(|source| RouterError::InvalidPattern { path: path.clone(), source })?;
        let kind = RouteKind::from(&pattern);
        Ok(Self { method, path, pattern, kind, handler })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The normalized registration path, e.g. `/users/:id`
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn kind(&self) -> RouteKind {
        self.kind
    }

    pub fn handler(&self) -> &dyn RequestHandler {
        self.handler.as_ref()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// The routes registered under one method.
#[derive(Debug, Default)]
struct MethodRoutes {
    by_path: HashMap<String, Arc<Route>>,
    // dynamic and wildcard routes, in registration order
    patterns: Vec<Arc<Route>>,
}

/// method → normalized path → route.
///
/// Within one method a normalized path maps to at most one route. The table is only
/// written while routes are being registered; dispatch only reads it.
#[derive(Debug, Default)]
pub struct RouteTable {
    methods: HashMap<Method, MethodRoutes>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route, refusing to replace one registered for the same method and path.
    pub fn insert(&mut self, route: Route) -> Result<Arc<Route>, RouterError> {
        let routes = self.methods.entry(route.method.clone()).or_default();
        if routes.by_path.contains_key(&route.path) {
            return Err(RouterError::DuplicateRoute { method: route.method, path: route.path });
        }

        let route = Arc::new(route);
        if route.kind != RouteKind::Static {
            routes.patterns.push(Arc::clone(&route));
        }
        routes.by_path.insert(route.path.clone(), Arc::clone(&route));
        Ok(route)
    }

    /// Looks up the route registered for exactly this method and normalized path.
    pub fn get(&self, method: &Method, path: &str) -> Option<&Arc<Route>> {
        self.methods.get(method)?.by_path.get(path)
    }

    /// Looks up a static route by exact path.
    pub fn find_static(&self, method: &Method, path: &str) -> Option<&Arc<Route>> {
        self.get(method, path).filter(|route| route.kind == RouteKind::Static)
    }

    /// Returns the first dynamic or wildcard route, in registration order, whose pattern
    /// matches the normalized `path`.
    pub fn find_pattern(&self, method: &Method, path: &str) -> Option<(&Arc<Route>, PathParams)> {
        self.methods
            .get(method)?
            .patterns
            .iter()
            .find_map(|route| route.pattern.matches_normalized(path).map(|params| (route, params)))
    }

    /// Static lookup first, then the pattern scan.
    pub fn find(&self, method: &Method, path: &str) -> Option<(&Arc<Route>, PathParams)> {
        match self.find_static(method, path) {
            Some(route) => Some((route, PathParams::empty())),
            None => self.find_pattern(method, path),
        }
    }

    /// The methods, other than `except`, under which some route accepts `path`.
    pub fn allowed_methods(&self, path: &str, except: &Method) -> Vec<Method> {
        let mut allowed = self
            .methods
            .keys()
            .filter(|method| *method != except)
            .filter(|method| self.find(method, path).is_some())
            .cloned()
            .collect::<Vec<_>>();
        allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        allowed
    }

    /// Number of routes registered under `method`.
    pub fn len_of(&self, method: &Method) -> usize {
        self.methods.get(method).map_or(0, |routes| routes.by_path.len())
    }

    pub fn len(&self) -> usize {
        self.methods.values().map(|routes| routes.by_path.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over every route, grouped by method.
    pub fn routes(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.methods.values().flat_map(|routes| routes.by_path.values())
    }
}
