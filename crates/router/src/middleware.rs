//! Global and path-scoped middleware chains.
//!
//! Middleware are ordinary [`RequestHandler`]s. Global middleware run for every request
//! that resolves to a route; path-scoped middleware only for requests resolved to the
//! path they were registered for. Within a chain, registration order is execution order.

use crate::handler::RequestHandler;
use crate::path;
use std::collections::HashMap;
use std::fmt;

/// What the dispatcher does when a middleware returns an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MiddlewareErrorPolicy {
    /// log the error and keep going: every middleware and the handler still run
    #[default]
    Continue,
    /// log the error and stop: later middleware and the handler are skipped
    Abort,
}

#[derive(Default)]
pub struct MiddlewareRegistry {
    global: Vec<Box<dyn RequestHandler>>,
    scoped: HashMap<String, Vec<Box<dyn RequestHandler>>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware to the global chain.
    pub fn add_global(&mut self, middleware: Box<dyn RequestHandler>) {
        self.global.push(middleware);
    }

    /// Appends a middleware to the chain of `raw_path`.
    ///
    /// The path is normalized, so `/users/` and `/users` share one chain.
    pub fn add_scoped(&mut self, raw_path: &str, middleware: Box<dyn RequestHandler>) {
        self.scoped.entry(path::normalize(raw_path)).or_default().push(middleware);
    }

    pub fn global(&self) -> &[Box<dyn RequestHandler>] {
        &self.global
    }

    /// The chain registered for a normalized path, empty when there is none.
    pub fn scoped(&self, path: &str) -> &[Box<dyn RequestHandler>] {
        self.scoped.get(path).map(Vec::as_slice).unwrap_or_default()
    }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut scoped = self.scoped.iter().map(|(path, chain)| (path.as_str(), chain.len())).collect::<Vec<_>>();
        scoped.sort_unstable();
        f.debug_struct("MiddlewareRegistry").field("global", &self.global.len()).field("scoped", &scoped).finish()
    }
}
