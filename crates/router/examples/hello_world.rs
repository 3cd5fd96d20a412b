use micro_router::{Router, Server, handler_fn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut builder = Router::builder();
    builder.get(
        "/",
        handler_fn(|ctx| {
            Box::pin(async move {
                ctx.response_mut().text("hello world");
                Ok(())
            })
        }),
    )?;

    Server::builder().router(builder.build()).address("127.0.0.1:3000").build()?.start().await?;
    Ok(())
}
