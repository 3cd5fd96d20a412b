//! A minimal HTTP/1.1 host for a [`Router`].
//!
//! The server reads each request body fully, then hands the request to
//! [`Router::dispatch_with_cancel`]. Every connection runs on its own task; when a client
//! goes away mid-request, the request's cancellation token fires.

use crate::router::Router;
use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, Limited, LengthLimitError};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Request bodies larger than this are answered with `413`.
pub const DEFAULT_MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

pub struct ServerBuilder {
    router: Option<Router>,
    address: Option<io::Result<Vec<SocketAddr>>>,
    max_body_size: usize,
    log_level: Option<Level>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { router: None, address: None, max_body_size: DEFAULT_MAX_BODY_SIZE, log_level: Some(Level::INFO) }
    }

    /// Sets the address to listen on; resolution errors surface from [`ServerBuilder::build`].
    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(Iterator::collect));
        self
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    pub fn max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Maximum level of the log subscriber installed by [`Server::start`].
    ///
    /// `None` leaves logging to the application.
    pub fn log_level(mut self, log_level: Option<Level>) -> Self {
        self.log_level = log_level;
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let router = self.router.ok_or(ServerBuildError::MissingRouter)?;
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?.map_err(ServerBuildError::InvalidAddress)?;
        if address.is_empty() {
            return Err(ServerBuildError::MissingAddress);
        }
        Ok(Server { router: Arc::new(router), address, max_body_size: self.max_body_size, log_level: self.log_level })
    }
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("router", &self.router.is_some())
            .field("address", &self.address)
            .field("max_body_size", &self.max_body_size)
            .field("log_level", &self.log_level)
            .finish()
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("router must be set")]
    MissingRouter,
    #[error("address must be set")]
    MissingAddress,
    #[error("invalid address: {0}")]
    InvalidAddress(#[source] io::Error),
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("bind server error: {0}")]
    Bind(#[source] io::Error),
}

#[derive(Debug)]
pub struct Server {
    router: Arc<Router>,
    address: Vec<SocketAddr>,
    max_body_size: usize,
    log_level: Option<Level>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn address(&self) -> &[SocketAddr] {
        &self.address
    }

    /// Installs the log subscriber, binds the address and serves until the process ends.
    pub async fn start(self) -> Result<(), ServerError> {
        if let Some(level) = self.log_level {
            let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
            if tracing::subscriber::set_global_default(subscriber).is_err() {
                debug!("a global subscriber is already set, keeping it");
            }
        }

        info!("start listening at {:?}", self.address);
        let tcp_listener = TcpListener::bind(self.address.as_slice()).await.map_err(|e| {
            error!(cause = %e, "bind server error");
            ServerError::Bind(e)
        })?;

        self.serve(tcp_listener).await;
        Ok(())
    }

    /// Serves connections accepted from an already bound listener.
    pub async fn serve(self, tcp_listener: TcpListener) {
        let max_body_size = self.max_body_size;
        loop {
            let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let router = Arc::clone(&self.router);

            tokio::spawn(async move {
                let service = service_fn(move |request: Request<Incoming>| {
                    let router = Arc::clone(&router);
                    async move { Ok::<_, Infallible>(handle(&router, request, max_body_size).await) }
                });

                match http1::Builder::new().keep_alive(true).serve_connection(TokioIo::new(tcp_stream), service).await {
                    Ok(()) => {
                        debug!(%remote_addr, "finished process, connection shutdown");
                    }
                    Err(e) => {
                        error!(%remote_addr, "service has error, cause {}, connection shutdown", e);
                    }
                }
            });
        }
    }
}

async fn handle(router: &Router, request: Request<Incoming>, max_body_size: usize) -> Response<Full<Bytes>> {
    // cancels the request when hyper drops this future, e.g. because the client left
    let cancellation = CancellationToken::new();
    let _guard = cancellation.clone().drop_guard();

    let (parts, body) = request.into_parts();
    let body = match Limited::new(body, max_body_size).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let status =
                if e.is::<LengthLimitError>() { StatusCode::PAYLOAD_TOO_LARGE } else { StatusCode::BAD_REQUEST };
            warn!(cause = %e, method = %parts.method, uri = %parts.uri, "failed to read request body");
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = status;
            return response;
        }
    };

    router.dispatch_with_cancel(Request::from_parts(parts, body), cancellation).await.map(Full::new)
}
