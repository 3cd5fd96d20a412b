use crate::RequestContext;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::error::Error;
use std::fmt;

/// The error a handler or middleware may return.
///
/// The dispatcher only logs it: the handler is expected to have written whatever status
/// and body the client should see before returning an error.
pub type HandlerError = Box<dyn Error + Send + Sync>;

/// Something that can serve a request: a route handler or a middleware.
///
/// Middleware and handlers share this trait; what differs is where they are registered.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, ctx: &mut RequestContext) -> Result<(), HandlerError>;
}

#[async_trait]
impl<H: RequestHandler + ?Sized> RequestHandler for Box<H> {
    async fn invoke(&self, ctx: &mut RequestContext) -> Result<(), HandlerError> {
        (**self).invoke(ctx).await
    }
}

#[async_trait]
impl<H: RequestHandler + ?Sized> RequestHandler for std::sync::Arc<H> {
    async fn invoke(&self, ctx: &mut RequestContext) -> Result<(), HandlerError> {
        (**self).invoke(ctx).await
    }
}

/// a closure holder which represents any `Fn(&mut RequestContext) -> BoxFuture`
pub struct FnHandler<F> {
    f: F,
}

/// Turns a closure into a [`RequestHandler`].
///
/// The closure borrows the context for the duration of the returned future, which is
/// why it returns a boxed future rather than an `async` block directly.
///
/// # Example
/// ```
/// use micro_router::{handler_fn, Router};
///
/// let mut builder = Router::builder();
/// builder
///     .get(
///         "/greet/:name",
///         handler_fn(|ctx| {
///             Box::pin(async move {
///                 let name = ctx.path_params().get("name").unwrap_or("stranger").to_owned();
///                 ctx.response_mut().text(format!("hello {name}"));
///                 Ok(())
///             })
///         }),
///     )
///     .unwrap();
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'ctx> Fn(&'ctx mut RequestContext) -> BoxFuture<'ctx, Result<(), HandlerError>> + Send + Sync,
{
    FnHandler { f }
}

#[async_trait]
impl<F> RequestHandler for FnHandler<F>
where
    F: for<'ctx> Fn(&'ctx mut RequestContext) -> BoxFuture<'ctx, Result<(), HandlerError>> + Send + Sync,
{
    async fn invoke(&self, ctx: &mut RequestContext) -> Result<(), HandlerError> {
        (self.f)(ctx).await
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}
