//! Sends every path to the same path on another host.

use micro_router::http::StatusCode;
use micro_router::{HandlerError, Router, Server, handler_fn};

const HOST: &str = "https://example.com";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut builder = Router::builder();
    builder.get(
        "/*path",
        handler_fn(|ctx| {
            Box::pin(async move {
                let path = ctx.path_params().get("path").unwrap_or_default().to_owned();
                let status =
                    if path.len() > 1 { StatusCode::TEMPORARY_REDIRECT } else { StatusCode::MOVED_PERMANENTLY };
                match ctx.response_mut().redirect(&format!("{HOST}{path}"), status) {
                    Ok(_) => Ok(()),
                    Err(e) => Err(HandlerError::from(e)),
                }
            })
        }),
    )?;

    Server::builder().router(builder.build()).address("127.0.0.1:3001").build()?.start().await?;
    Ok(())
}
