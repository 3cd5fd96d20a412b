//! `curl 'localhost:3000/search?q=rust&page=2'`

use micro_router::{Router, Server, handler_fn};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
struct Search {
    q: String,
    page: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut builder = Router::builder();
    builder
        .get(
            "/search",
            handler_fn(|ctx| {
                Box::pin(async move {
                    let q = ctx.query().get("q").unwrap_or_default().to_owned();
                    let flags = ctx.query().iter().filter(|(_, value)| value.is_empty()).count();
                    ctx.response_mut().text(format!("searching for {q} with {flags} flags"));
                    Ok(())
                })
            }),
        )?
        .get(
            "/typed",
            handler_fn(|ctx| {
                Box::pin(async move {
                    let body = match ctx.query_as::<Search>() {
                        Ok(search) => format!("{search:?}"),
                        Err(e) => e.to_string(),
                    };
                    ctx.response_mut().text(body);
                    Ok(())
                })
            }),
        )?;

    Server::builder().router(builder.build()).address("127.0.0.1:3000").build()?.start().await?;
    Ok(())
}
