//! The HTTP/1 accept loop.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use portcullis_config::ServerConfig;
use portcullis_middleware::{Response, ResponseExt};
use tokio::net::{TcpListener, TcpStream};

use crate::app::App;
use crate::error::ServerError;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Serves an [`App`] over HTTP/1.1.
///
/// # Example
///
/// ```rust,ignore
/// use portcullis_config::PortcullisConfig;
/// use portcullis_server::{App, Server};
///
/// let config = PortcullisConfig::default();
/// let app = App::from_config(&config)?;
/// Server::new(app, &config.server).run().await?;
/// ```
#[derive(Debug)]
pub struct Server {
    app: Arc<App>,
    http_addr: String,
    shutdown_timeout: Duration,
    request_timeout: Duration,
    keep_alive: bool,
}

impl Server {
    /// Creates a server for `app`.
    #[must_use]
    pub fn new(app: App, config: &ServerConfig) -> Self {
        Self {
            app: Arc::new(app),
            http_addr: config.http_addr.clone(),
            shutdown_timeout: config.shutdown_timeout(),
            request_timeout: config.request_timeout(),
            keep_alive: config.keep_alive_secs.is_some(),
        }
    }

    /// Runs until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if the listen address is invalid or taken.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Binds the configured address and runs until `shutdown` triggers.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if the listen address is invalid or taken.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr: SocketAddr = self
            .http_addr
            .parse()
            .map_err(|e| ServerError::Bind(format!("invalid address '{}': {e}", self.http_addr)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("failed to bind to {addr}: {e}")))?;

        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Io` if the listener's address cannot be read.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        tracing::info!(addr = %listener.local_addr()?, "portcullis listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        let server = Arc::clone(&server);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();

                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream, shutdown).await {
                                tracing::debug!(%remote_addr, error = %e, "connection error");
                            }
                            drop(token);
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "failed to accept connection"),
                },

                () = shutdown.recv() => {
                    tracing::info!("shutdown signal received, no longer accepting");
                    break;
                }
            }
        }

        server.app.readiness().set_ready(false);

        tracing::info!(
            timeout = ?server.shutdown_timeout,
            connections = tracker.active_connections(),
            "draining connections"
        );
        tokio::select! {
            () = tracker.wait_for_shutdown() => tracing::info!("all connections closed"),
            () = tokio::time::sleep(server.shutdown_timeout) => tracing::warn!(
                connections = tracker.active_connections(),
                "shutdown timeout reached, dropping connections"
            ),
        }

        tracing::info!("server stopped");
        Ok(())
    }

    async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(&self);
        let service = service_fn(move |req: http::Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.handle_request(req).await) }
        });

        let conn = http1::Builder::new()
            .keep_alive(self.keep_alive)
            .serve_connection(io, service);
        tokio::pin!(conn);

        tokio::select! {
            result = conn.as_mut() => result,
            () = shutdown.recv() => {
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        }
    }

    async fn handle_request(&self, req: http::Request<Incoming>) -> Response {
        let (parts, body) = req.into_parts();

        let body = match tokio::time::timeout(self.request_timeout, body.collect()).await {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "failed to read request body");
                return Response::json_error(
                    StatusCode::BAD_REQUEST,
                    "BODY_READ_ERROR",
                    "failed to read request body",
                );
            }
            Err(_) => {
                return Response::json_error(
                    StatusCode::REQUEST_TIMEOUT,
                    "REQUEST_TIMEOUT",
                    "request body not received in time",
                );
            }
        };

        Arc::clone(&self.app)
            .handle(http::Request::from_parts(parts, Full::new(body)))
            .await
    }
}
