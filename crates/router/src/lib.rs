//! An embeddable HTTP router.
//!
//! Routes are registered per method against path patterns made of three kinds of segments:
//! - static segments, matched literally: `/users`
//! - dynamic segments, capturing one non-empty segment: `/users/:id`
//! - wildcard segments, capturing a run of segments: `/files/*path`
//!
//! Requests are resolved with an exact lookup for static routes first, then a scan of the
//! dynamic and wildcard routes in registration order. Two tiers of middleware wrap every
//! resolved request: global middleware, then middleware scoped to a path.
//!
//! # Example
//! ```no_run
//! use micro_router::{handler_fn, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut builder = Router::builder();
//!     builder.get(
//!         "/greet/:name",
//!         handler_fn(|ctx| {
//!             Box::pin(async move {
//!                 let name = ctx.path_params().get("name").unwrap_or("stranger").to_owned();
//!                 ctx.response_mut().text(format!("hello {name}"));
//!                 Ok(())
//!             })
//!         }),
//!     )?;
//!
//!     let server = Server::builder().router(builder.build()).address("127.0.0.1:8080").build()?;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```
//!
//! The router does not need the bundled [`Server`]: any host that reads a request body can call
//! [`Router::dispatch`] and write the returned response.

mod cache;
mod context;
mod dispatcher;
mod handler;
mod middleware;
mod response;
mod route;
mod router;
mod server;
mod static_files;

pub mod path;
pub mod pattern;

pub use cache::{Resolved, ResolutionCache};
pub use context::{ExtractError, Params, PathParams, QueryParams, RequestContext};
pub use dispatcher::{DispatchOutcome, Resolution};
pub use handler::{FnHandler, HandlerError, RequestHandler, handler_fn};
pub use middleware::{MiddlewareErrorPolicy, MiddlewareRegistry};
pub use response::{ResponseWriter, default_headers};
pub use route::{Route, RouteKind, RouteTable, RouterError};
pub use router::{Router, RouterBuilder};
pub use server::{DEFAULT_MAX_BODY_SIZE, Server, ServerBuildError, ServerBuilder, ServerError};
pub use static_files::{StaticDir, StaticFile, content_type};

// re-export
pub use async_trait::async_trait;
pub use bytes::Bytes;
pub use http;
