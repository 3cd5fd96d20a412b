//! Turning a request into a response.
//!
//! For every request the dispatcher:
//! 1. normalizes the path and parses the query string
//! 2. resolves the route: exact static lookup, then the resolution cache, then the
//!    dynamic and wildcard patterns in registration order
//! 3. answers `405` with an `Allow` header if another method owns the path, `404` otherwise
//! 4. runs the global middleware, then the middleware scoped to the route's path, then the
//!    middleware scoped to the concrete request path
//! 5. runs the route handler
//!
//! Middleware and handler errors are logged. They never become a response on their own: the
//! handler decides what the client sees.

use crate::cache::Resolved;
use crate::context::{PathParams, RequestContext};
use crate::handler::RequestHandler;
use crate::middleware::MiddlewareErrorPolicy;
use crate::router::Router;
use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// The outcome of resolving a method and a normalized path.
#[derive(Debug)]
pub enum Resolution {
    Matched(Resolved),
    /// the path exists, but only under other methods
    MethodNotAllowed { allowed: Vec<Method> },
    NotFound,
}

/// How far a request made it through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// the handler ran, whether it succeeded or not
    Handled,
    NotFound,
    MethodNotAllowed,
    /// a middleware failed under [`MiddlewareErrorPolicy::Abort`]
    Aborted,
    /// the request was cancelled before the handler ran
    Cancelled,
}

impl Router {
    /// Resolves the route for `method` and an already normalized `path`.
    ///
    /// Only the resolution cache is written, and only when one is configured.
    pub fn resolve(&self, method: &Method, path: &str) -> Resolution {
        if let Some(route) = self.table.find_static(method, path) {
            return Resolution::Matched(Resolved { route: Arc::clone(route), params: PathParams::empty() });
        }

        if let Some(resolved) = self.cache.as_ref().and_then(|cache| cache.get(method, path)) {
            debug!(method = %method, path, route = resolved.route.path(), "resolution cache hit");
            return Resolution::Matched(resolved);
        }

        if let Some((route, params)) = self.table.find_pattern(method, path) {
            let resolved = Resolved { route: Arc::clone(route), params };
            if let Some(cache) = &self.cache {
                cache.insert(method, path, resolved.clone());
            }
            return Resolution::Matched(resolved);
        }

        let allowed = self.table.allowed_methods(path, method);
        if allowed.is_empty() { Resolution::NotFound } else { Resolution::MethodNotAllowed { allowed } }
    }

    /// Dispatches a request whose body has already been read.
    pub async fn dispatch(&self, request: Request<Bytes>) -> Response<Bytes> {
        self.dispatch_with_cancel(request, CancellationToken::new()).await
    }

    /// Dispatches a request, giving up between stages once `cancellation` fires.
    ///
    /// A cancelled request still produces a response; the host is free to drop it.
    pub async fn dispatch_with_cancel(&self, request: Request<Bytes>, cancellation: CancellationToken) -> Response<Bytes> {
        let mut ctx = RequestContext::from_request(request).with_cancellation(cancellation);
        self.dispatch_context(&mut ctx).await;
        ctx.into_response_writer().into_response()
    }

    /// Runs the pipeline on a prepared context and reports how far it got.
    ///
    /// The response is left in the context; nothing is sent.
    pub async fn dispatch_context(&self, ctx: &mut RequestContext) -> DispatchOutcome {
        info!(method = %ctx.method(), path = ctx.path(), "dispatching request");

        if self.default_headers {
            ctx.response_mut().apply_default_headers();
        }

        let Resolved { route, params } = match self.resolve(ctx.method(), ctx.path()) {
            Resolution::Matched(resolved) => resolved,
            Resolution::NotFound => {
                warn!(method = %ctx.method(), path = ctx.path(), "no route found");
                ctx.response_mut().set_status(StatusCode::NOT_FOUND);
                return DispatchOutcome::NotFound;
            }
            Resolution::MethodNotAllowed { allowed } => {
                warn!(method = %ctx.method(), path = ctx.path(), ?allowed, "method not allowed");
                let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
                let response = ctx.response_mut();
                response.set_status(StatusCode::METHOD_NOT_ALLOWED);
                if let Ok(allow) = HeaderValue::from_str(&allow) {
                    response.set_header(header::ALLOW, allow);
                }
                return DispatchOutcome::MethodNotAllowed;
            }
        };

        ctx.set_path_params(params);

        if let Err(outcome) = self.run_middleware("global", self.middleware.global(), ctx).await {
            return outcome;
        }

        if let Err(outcome) = self.run_middleware(route.path(), self.middleware.scoped(route.path()), ctx).await {
            return outcome;
        }

        if ctx.path() != route.path() {
            let concrete = ctx.path().to_owned();
            if let Err(outcome) = self.run_middleware(&concrete, self.middleware.scoped(&concrete), ctx).await {
                return outcome;
            }
        }

        if ctx.is_cancelled() {
            debug!(method = %ctx.method(), path = ctx.path(), "request cancelled before handler");
            return DispatchOutcome::Cancelled;
        }

        if let Err(e) = route.handler().invoke(ctx).await {
            error!(cause = %e, method = %ctx.method(), path = ctx.path(), route = route.path(), "handler failed");
        }

        DispatchOutcome::Handled
    }

    async fn run_middleware(
        &self,
        scope: &str,
        chain: &[Box<dyn RequestHandler>],
        ctx: &mut RequestContext,
    ) -> Result<(), DispatchOutcome> {
        for middleware in chain {
            if ctx.is_cancelled() {
                debug!(scope, path = ctx.path(), "request cancelled during middleware");
                return Err(DispatchOutcome::Cancelled);
            }

            if let Err(e) = middleware.invoke(ctx).await {
                error!(cause = %e, scope, method = %ctx.method(), path = ctx.path(), "middleware failed");
                if self.error_policy == MiddlewareErrorPolicy::Abort {
                    return Err(DispatchOutcome::Aborted);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerError, handler_fn};
    use http::{HeaderMap, Uri};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request(method: Method, uri: &str) -> Request<Bytes> {
        Request::builder().method(method).uri(uri).body(Bytes::new()).unwrap()
    }

    fn context(method: Method, uri: &'static str) -> RequestContext {
        RequestContext::new(method, Uri::from_static(uri), HeaderMap::new(), Bytes::new())
    }

    fn text(body: &'static str) -> impl RequestHandler {
        handler_fn(move |ctx| {
            Box::pin(async move {
                ctx.response_mut().text(body);
                Ok(())
            })
        })
    }

    fn counter(count: Arc<AtomicUsize>) -> impl RequestHandler {
        handler_fn(move |_ctx| {
            let count = Arc::clone(&count);
            Box::pin(async move {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
    }

    fn recorder(log: Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> impl RequestHandler {
        handler_fn(move |_ctx| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().unwrap().push(name);
                Ok(())
            })
        })
    }

    fn failing(message: &'static str) -> impl RequestHandler {
        handler_fn(move |_ctx| Box::pin(async move { Err(HandlerError::from(message)) }))
    }

    fn greet() -> impl RequestHandler {
        handler_fn(|ctx| {
            Box::pin(async move {
                let name = ctx.path_params().get("name").unwrap_or_default().to_owned();
                let x = ctx.query().get("x").unwrap_or_default().to_owned();
                ctx.response_mut().text(format!("{name}:{x}"));
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn test_static_route() {
        let mut builder = Router::builder();
        builder.get("/home", text("home")).unwrap();
        let router = builder.build();

        for uri in ["/home", "/home/", "/home//", "/home?x=1"] {
            let response = router.dispatch(request(Method::GET, uri)).await;
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
            assert_eq!(response.body(), "home", "{uri}");
        }
    }

    #[tokio::test]
    async fn test_root_route() {
        let mut builder = Router::builder();
        builder.get("/", text("root")).unwrap();
        let router = builder.build();

        let response = router.dispatch(request(Method::GET, "/")).await;
        assert_eq!(response.body(), "root");
    }

    #[tokio::test]
    async fn test_dynamic_route_with_query() {
        let mut builder = Router::builder();
        builder.get("/greet/:name", greet()).unwrap();
        let router = builder.build();

        let mut ctx = context(Method::GET, "/greet/Ada?x=1");
        let outcome = router.dispatch_context(&mut ctx).await;

        assert_eq!(outcome, DispatchOutcome::Handled);
        assert_eq!(ctx.path_params().get("name"), Some("Ada"));
        assert_eq!(ctx.query().get("x"), Some("1"));
        assert_eq!(ctx.response().body(), b"Ada:1");
        assert_eq!(ctx.response().status(), None);
    }

    #[tokio::test]
    async fn test_wildcard_route() {
        let mut builder = Router::builder();
        builder
            .get(
                "/files/*path",
                handler_fn(|ctx| {
                    Box::pin(async move {
                        let path = ctx.path_params().get("path").unwrap_or_default().to_owned();
                        ctx.response_mut().text(path);
                        Ok(())
                    })
                }),
            )
            .unwrap();
        let router = builder.build();

        let response = router.dispatch(request(Method::GET, "/files/docs/a.txt")).await;
        assert_eq!(response.body(), "/docs/a.txt");
    }

    #[tokio::test]
    async fn test_not_found() {
        let mut builder = Router::builder();
        builder.get("/home", text("home")).unwrap();
        let router = builder.build();

        let response = router.dispatch(request(Method::GET, "/nowhere")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(header::ALLOW).is_none());
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let mut builder = Router::builder();
        builder.post("/users/:id", text("post")).unwrap().delete("/users/:id", text("delete")).unwrap();
        builder.put("/home", text("put")).unwrap();
        let router = builder.build();

        let response = router.dispatch(request(Method::GET, "/users/1")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "DELETE, POST");

        let response = router.dispatch(request(Method::GET, "/home")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "PUT");
    }

    #[tokio::test]
    async fn test_no_middleware_runs_without_a_route() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut builder = Router::builder();
        builder.post("/home", text("post")).unwrap();
        builder.use_global(counter(Arc::clone(&count))).use_path("/home", counter(Arc::clone(&count)));
        let router = builder.build();

        router.dispatch(request(Method::GET, "/home")).await;
        router.dispatch(request(Method::GET, "/missing")).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_global_middleware_runs_once_per_request() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut builder = Router::builder();
        builder.get("/a", text("a")).unwrap().get("/b/:id", text("b")).unwrap();
        builder.use_global(counter(Arc::clone(&count)));
        let router = builder.build();

        for uri in ["/a", "/b/1", "/b/2", "/a", "/b/1"] {
            router.dispatch(request(Method::GET, uri)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_middleware_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut builder = Router::builder();
        builder.get("/users/:id", recorder(Arc::clone(&log), "handler")).unwrap();
        builder
            .use_path("/users/42", recorder(Arc::clone(&log), "concrete"))
            .use_path("/users/:id", recorder(Arc::clone(&log), "route-1"))
            .use_global(recorder(Arc::clone(&log), "global-1"))
            .use_path("/users/:id", recorder(Arc::clone(&log), "route-2"))
            .use_global(recorder(Arc::clone(&log), "global-2"));
        let router = builder.build();

        router.dispatch(request(Method::GET, "/users/42")).await;
        assert_eq!(*log.lock().unwrap(), vec!["global-1", "global-2", "route-1", "route-2", "concrete", "handler"]);

        log.lock().unwrap().clear();
        router.dispatch(request(Method::GET, "/users/7")).await;
        assert_eq!(*log.lock().unwrap(), vec!["global-1", "global-2", "route-1", "route-2", "handler"]);
    }

    #[tokio::test]
    async fn test_repeated_middleware_runs_once_per_registration() {
        let count = Arc::new(AtomicUsize::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));
        let counting = Arc::new(counter(Arc::clone(&count)));

        let mut builder = Router::builder();
        builder.get("/jobs/:id", failing("handler failed")).unwrap();
        builder
            .use_global(recorder(Arc::clone(&log), "first"))
            .use_global(Arc::clone(&counting))
            .use_global(Arc::clone(&counting))
            .use_global(recorder(Arc::clone(&log), "middle"))
            .use_global(Arc::clone(&counting))
            .use_path("/jobs/:id", recorder(Arc::clone(&log), "last"));
        let router = builder.build();

        let mut ctx = context(Method::GET, "/jobs/1");
        assert_eq!(router.dispatch_context(&mut ctx).await, DispatchOutcome::Handled);
        assert_eq!(count.load(Ordering::SeqCst), 3);

        let mut ctx = context(Method::GET, "/jobs/2");
        assert_eq!(router.dispatch_context(&mut ctx).await, DispatchOutcome::Handled);
        assert_eq!(count.load(Ordering::SeqCst), 6);
        assert_eq!(*log.lock().unwrap(), vec!["first", "middle", "last", "first", "middle", "last"]);
    }

    #[tokio::test]
    async fn test_path_middleware_is_scoped() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut builder = Router::builder();
        builder.get("/admin", text("admin")).unwrap().get("/public", text("public")).unwrap();
        builder.use_path("/admin/", counter(Arc::clone(&count)));
        let router = builder.build();

        router.dispatch(request(Method::GET, "/public")).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        router.dispatch(request(Method::GET, "/admin")).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_middleware_error_continues_by_default() {
        let mut builder = Router::builder();
        builder.get("/home", text("home")).unwrap();
        builder.use_global(failing("global failed")).use_path("/home", failing("path failed"));
        let router = builder.build();

        let mut ctx = context(Method::GET, "/home");
        assert_eq!(router.dispatch_context(&mut ctx).await, DispatchOutcome::Handled);
        assert_eq!(ctx.response().body(), b"home");
    }

    #[tokio::test]
    async fn test_middleware_error_aborts_when_configured() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut builder = Router::builder();
        builder.get("/home", counter(Arc::clone(&count))).unwrap();
        builder
            .use_global(failing("global failed"))
            .use_global(counter(Arc::clone(&count)))
            .middleware_error_policy(MiddlewareErrorPolicy::Abort);
        let router = builder.build();

        let mut ctx = context(Method::GET, "/home");
        assert_eq!(router.dispatch_context(&mut ctx).await, DispatchOutcome::Aborted);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_error_keeps_written_response() {
        let mut builder = Router::builder();
        builder
            .get(
                "/fail",
                handler_fn(|ctx| {
                    Box::pin(async move {
                        ctx.response_mut().set_status(StatusCode::BAD_GATEWAY).text("upstream down");
                        Err(HandlerError::from("upstream down"))
                    })
                }),
            )
            .unwrap();
        let router = builder.build();

        let response = router.dispatch(request(Method::GET, "/fail")).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.body(), "upstream down");
    }

    #[tokio::test]
    async fn test_cache_does_not_change_results() {
        fn router(cache: bool) -> Router {
            let mut builder = Router::builder();
            builder
                .get("/greet/:name", greet())
                .unwrap()
                .get("/greet/me", text("me"))
                .unwrap()
                .get("/files/*path", text("file"))
                .unwrap()
                .post("/greet/:name", text("post"))
                .unwrap();
            if cache {
                builder.resolution_cache(2);
            }
            builder.build()
        }

        let plain = router(false);
        let cached = router(true);
        let requests = [
            (Method::GET, "/greet/Ada?x=1"),
            (Method::GET, "/greet/Bob?x=2"),
            (Method::GET, "/greet/Ada?x=3"),
            (Method::GET, "/greet/me"),
            (Method::GET, "/files/a/b"),
            (Method::POST, "/greet/Ada"),
            (Method::DELETE, "/greet/Ada"),
            (Method::GET, "/nowhere"),
            (Method::GET, "/greet/Ada?x=1"),
        ];

        // twice, so the second round is served from the cache
        for _ in 0..2 {
            for (method, uri) in &requests {
                let expected = plain.dispatch(request(method.clone(), uri)).await;
                let actual = cached.dispatch(request(method.clone(), uri)).await;
                assert_eq!(actual.status(), expected.status(), "{method} {uri}");
                assert_eq!(actual.headers(), expected.headers(), "{method} {uri}");
                assert_eq!(actual.body(), expected.body(), "{method} {uri}");
            }
        }

        let cache = cached.resolution_cache().unwrap();
        assert_eq!(cache.len(), 2);
        assert!(plain.resolution_cache().is_none());
    }

    #[tokio::test]
    async fn test_resolve_never_writes_routes() {
        let mut builder = Router::builder();
        builder.get("/users/:id", text("user")).unwrap();
        builder.resolution_cache(8);
        let router = builder.build();

        for id in 0..5 {
            router.dispatch(request(Method::GET, &format!("/users/{id}"))).await;
        }
        assert_eq!(router.routes().len(), 1);
        assert!(router.routes().get(&Method::GET, "/users/0").is_none());
        assert_eq!(router.resolution_cache().map(|cache| cache.len()), Some(5));
    }

    #[tokio::test]
    async fn test_default_headers() {
        let mut builder = Router::builder();
        builder
            .get(
                "/custom",
                handler_fn(|ctx| {
                    Box::pin(async move {
                        ctx.response_mut().set_header(header::CONNECTION, HeaderValue::from_static("close"));
                        Ok(())
                    })
                }),
            )
            .unwrap();
        let router = builder.build();

        let response = router.dispatch(request(Method::GET, "/custom")).await;
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(response.headers()["keep-alive"], "timeout=5, max=997");
        assert_eq!(response.headers()[header::CONNECTION], "close");

        let mut builder = Router::builder();
        builder.get("/plain", text("plain")).unwrap();
        builder.default_headers(false);
        let router = builder.build();

        let response = router.dispatch(request(Method::GET, "/plain")).await;
        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_cancelled_request_skips_handler() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut builder = Router::builder();
        builder.get("/slow", counter(Arc::clone(&count))).unwrap();
        builder.use_global(handler_fn(|ctx| {
            Box::pin(async move {
                ctx.cancellation_token().cancel();
                Ok(())
            })
        }));
        let router = builder.build();

        let mut ctx = context(Method::GET, "/slow");
        assert_eq!(router.dispatch_context(&mut ctx).await, DispatchOutcome::Cancelled);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let token = CancellationToken::new();
        token.cancel();
        let response = router.dispatch_with_cancel(request(Method::GET, "/slow"), token).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_dispatch() {
        let mut builder = Router::builder();
        builder.get("/greet/:name", greet()).unwrap();
        builder.resolution_cache(64);
        let router = builder.build_shared();

        let tasks = (0..32)
            .map(|i| {
                let router = Arc::clone(&router);
                tokio::spawn(async move {
                    let uri = format!("/greet/user{}?x={i}", i % 4);
                    let response = router.dispatch(request(Method::GET, &uri)).await;
                    (i, response)
                })
            })
            .collect::<Vec<_>>();

        for task in tasks {
            let (i, response) = task.await.unwrap();
            assert_eq!(response.body(), format!("user{}:{i}", i % 4).as_str());
        }
    }
}
