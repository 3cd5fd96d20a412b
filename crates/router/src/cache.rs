//! A memo of dynamic route resolutions.
//!
//! Resolving a dynamic or wildcard route means matching the request path against every
//! pattern registered for the method. The cache remembers the outcome per concrete path so
//! repeated requests skip the scan. It is a side structure: the route table itself is never
//! written after the router is built.

use crate::PathParams;
use crate::route::Route;
use dashmap::DashMap;
use http::Method;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A route resolved for one concrete request path.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub route: Arc<Route>,
    pub params: PathParams,
}

/// Concurrent, bounded map from method and normalized path to its resolution.
///
/// Entries are keyed by method first, then by path, so a lookup borrows both and allocates
/// nothing. Once `capacity` entries are stored, new resolutions are no longer remembered.
/// Concurrent inserts racing past the check may overshoot by a few entries. Existing entries
/// stay valid for the router's lifetime because routes never change after build.
#[derive(Debug)]
pub struct ResolutionCache {
    entries: DashMap<Method, DashMap<String, Resolved>>,
    len: AtomicUsize,
    capacity: usize,
}

impl ResolutionCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: DashMap::new(), len: AtomicUsize::new(0), capacity }
    }

    pub fn get(&self, method: &Method, path: &str) -> Option<Resolved> {
        self.entries.get(method)?.get(path).map(|entry| entry.value().clone())
    }

    /// Remembers a resolution, unless the cache is full.
    pub fn insert(&self, method: &Method, path: &str, resolved: Resolved) {
        if self.len() >= self.capacity {
            return;
        }

        let previous = match self.entries.get(method) {
            Some(paths) => paths.insert(path.to_owned(), resolved),
            None => self.entries.entry(method.clone()).or_default().insert(path.to_owned(), resolved),
        };
        if previous.is_none() {
            self.len.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler_fn;

    fn resolved(path: &str) -> Resolved {
        let handler = Box::new(handler_fn(|_ctx| Box::pin(async { Ok(()) })));
        let route = Route::new(Method::GET, path, handler).unwrap();
        Resolved { route: Arc::new(route), params: PathParams::empty() }
    }

    #[test]
    fn test_get_and_insert() {
        let cache = ResolutionCache::with_capacity(4);
        assert!(cache.get(&Method::GET, "/users/1").is_none());

        cache.insert(&Method::GET, "/users/1", resolved("/users/:id"));
        assert_eq!(cache.get(&Method::GET, "/users/1").unwrap().route.path(), "/users/:id");
        assert!(cache.get(&Method::POST, "/users/1").is_none());
    }

    #[test]
    fn test_capacity_bounds_entries() {
        let cache = ResolutionCache::with_capacity(2);
        cache.insert(&Method::GET, "/a/1", resolved("/a/:id"));
        cache.insert(&Method::GET, "/a/2", resolved("/a/:id"));
        cache.insert(&Method::GET, "/a/3", resolved("/a/:id"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&Method::GET, "/a/3").is_none());
        assert!(cache.get(&Method::GET, "/a/1").is_some());
    }

    #[test]
    fn test_reinsert_does_not_grow() {
        let cache = ResolutionCache::with_capacity(2);
        cache.insert(&Method::GET, "/a/1", resolved("/a/:id"));
        cache.insert(&Method::GET, "/a/1", resolved("/a/:id"));
        assert_eq!(cache.len(), 1);

        cache.insert(&Method::POST, "/a/1", resolved("/a/:id"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&Method::POST, "/a/1").is_some());
        assert!(cache.get(&Method::PUT, "/a/1").is_none());
    }
}
