use micro_router::{HandlerError, Router, Server, handler_fn};
use serde::Serialize;

#[derive(Serialize)]
struct Message {
    message: &'static str,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut builder = Router::builder();
    builder.get(
        "/json",
        handler_fn(|ctx| {
            Box::pin(async move {
                match ctx.response_mut().json(&Message { message: "Hello, JSON!" }) {
                    Ok(_) => Ok(()),
                    Err(e) => Err(HandlerError::from(e)),
                }
            })
        }),
    )?;

    Server::builder().router(builder.build()).address("127.0.0.1:3000").build()?.start().await?;
    Ok(())
}
