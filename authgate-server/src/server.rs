//! HTTP/1.1 server for the auth endpoints

use crate::handlers::{handle_request, AppState};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

/// Pause after a failed accept (EMFILE, ECONNABORTED, ...) before retrying
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Source of incoming connections
pub trait Acceptor: Send {
    type Io: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Io, SocketAddr)>> + Send;
}

impl Acceptor for TcpListener {
    type Io = TcpStream;

    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

pub struct AuthServer {
    state: AppState,
}

impl AuthServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Accept connections until ctrl-c
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!("authgate listening on {}", listener.local_addr()?);
        self.serve_listener(listener).await
    }

    pub async fn serve_listener(self, listener: TcpListener) -> anyhow::Result<()> {
        self.serve_incoming(listener).await
    }

    /// Accept loop. A failed accept is logged and retried; only ctrl-c ends it.
    pub async fn serve_incoming<A: Acceptor>(self, mut acceptor: A) -> anyhow::Result<()> {
        loop {
            let accepted = tokio::select! {
                accepted = acceptor.accept() => accepted,
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    return Ok(());
                }
            };

            let (stream, remote_addr) = match accepted {
                Ok(conn) => conn,
                Err(err) => {
                    error!("Failed to accept connection: {}", err);
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    continue;
                }
            };
            debug!("New connection from {}", remote_addr);

            let state = self.state.clone();
            tokio::spawn(async move {
                if let Err(err) = Self::handle_connection(stream, state).await {
                    error!("Connection error from {}: {}", remote_addr, err);
                }
            });
        }
    }

    async fn handle_connection<S>(stream: S, state: AppState) -> Result<(), hyper::Error>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let io = TokioIo::new(stream);

        let service = service_fn(move |req| {
            let state = state.clone();
            async move { handle_request(req, state).await }
        });

        http1::Builder::new().serve_connection(io, service).await
    }
}
