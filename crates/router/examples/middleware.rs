use micro_router::http::StatusCode;
use micro_router::{HandlerError, RequestContext, RequestHandler, Router, Server, async_trait, handler_fn};
use tracing::info;

/// Logs every request that resolved to a route.
struct AccessLog;

#[async_trait]
impl RequestHandler for AccessLog {
    async fn invoke(&self, ctx: &mut RequestContext) -> Result<(), HandlerError> {
        info!(method = %ctx.method(), path = ctx.path(), "received request");
        Ok(())
    }
}

/// Marks admin responses as uncacheable and fails when no token was sent.
struct RequireToken;

#[async_trait]
impl RequestHandler for RequireToken {
    async fn invoke(&self, ctx: &mut RequestContext) -> Result<(), HandlerError> {
        ctx.response_mut().headers_mut().insert("cache-control", "no-store".parse()?);
        if ctx.headers().contains_key("x-token") {
            Ok(())
        } else {
            ctx.response_mut().set_status(StatusCode::UNAUTHORIZED);
            Err(HandlerError::from("missing x-token header"))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut builder = Router::builder();
    builder
        .get(
            "/",
            handler_fn(|ctx| {
                Box::pin(async move {
                    ctx.response_mut().text("middleware example");
                    Ok(())
                })
            }),
        )?
        .get(
            "/admin",
            handler_fn(|ctx| {
                Box::pin(async move {
                    if ctx.response().status() != Some(StatusCode::UNAUTHORIZED) {
                        ctx.response_mut().text("welcome");
                    }
                    Ok(())
                })
            }),
        )?;

    builder.use_global(AccessLog).use_path("/admin", RequireToken);

    Server::builder().router(builder.build()).address("127.0.0.1:3000").build()?.start().await?;
    Ok(())
}
