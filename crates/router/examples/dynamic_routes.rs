//! `curl localhost:3000/users/42` answers `user 42`,
//! `curl localhost:3000/files/docs/a.txt` answers `file /docs/a.txt`.

use micro_router::{Router, Server, handler_fn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut builder = Router::builder();
    builder
        .get(
            "/users/:id",
            handler_fn(|ctx| {
                Box::pin(async move {
                    let id = ctx.path_params().get("id").unwrap_or_default().to_owned();
                    ctx.response_mut().text(format!("user {id}"));
                    Ok(())
                })
            }),
        )?
        .get(
            "/files/*path",
            handler_fn(|ctx| {
                Box::pin(async move {
                    let path = ctx.path_params().get("path").unwrap_or_default().to_owned();
                    ctx.response_mut().text(format!("file {path}"));
                    Ok(())
                })
            }),
        )?;

    // static routes win over patterns
    builder.get(
        "/users/me",
        handler_fn(|ctx| {
            Box::pin(async move {
                ctx.response_mut().text("the current user");
                Ok(())
            })
        }),
    )?;

    builder.resolution_cache(1024);

    Server::builder().router(builder.build()).address("127.0.0.1:3000").build()?.start().await?;
    Ok(())
}
