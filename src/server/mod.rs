//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and feeds every HTTP/1.1 request to a
//! [`HandlerChain`]. Supports HTTP/1.1 persistent connections (keep-alive)
//! and pipelined requests.

mod bootstrap;

use std::future::Future;
use std::net::SocketAddr;
use std::num::IntErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::chain::HandlerChain;
use crate::http::{
    Method, StatusCode,
    request::{Request, RequestError},
    response::Response,
};

pub use bootstrap::{base_url, start_server};

/// Errors produced while starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to resolve host {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no address found for host {host}")]
    NoAddress { host: String },

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Maximum size of a complete HTTP request we will buffer before rejecting it (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// A bound HTTP server.
///
/// Usually obtained from [`start_server`], which validates the configuration
/// first; [`Server::bind`] is the bare transport.
///
/// # Examples
///
/// ```rust,no_run
/// use servedir::Server;
/// use servedir::chain::HandlerChain;
/// use servedir::files::StaticFiles;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let chain = HandlerChain::new().with(StaticFiles::new("./public"));
///     let server = Server::bind("127.0.0.1:8080".parse()?, chain).await?;
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    chain: Arc<HandlerChain>,
}

impl Server {
    /// Binds the server to `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: SocketAddr, chain: HandlerChain) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            chain: Arc::new(chain),
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the URL clients can use to reach the server.
    pub fn url(&self) -> String {
        base_url(self.local_addr)
    }

    /// Accepts connections until Ctrl+C is pressed.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Accepts connections until `shutdown` completes.
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                () = &mut shutdown => {
                    info!(address = %self.local_addr, "shutting down");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                        continue;
                    }
                },
            };

            debug!(peer = %peer_addr, "connection accepted");
            let chain = Arc::clone(&self.chain);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, chain).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }

        Ok(())
    }
}

/// Handles a single connection over its lifetime.
///
/// HTTP/1.1 connections are persistent by default: we loop, serving one
/// request per iteration, until the peer closes the connection or signals
/// `Connection: close`.
async fn handle_connection<S>(
    mut stream: S,
    peer_addr: SocketAddr,
    chain: Arc<HandlerChain>,
) -> Result<(), std::io::Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    while let Some((request, consumed)) = next_request(&mut stream, &mut buf, peer_addr).await? {
        let keep_alive = request.is_keep_alive();
        let is_head = *request.method() == Method::Head;

        let mut response = Response::new();
        chain.handle(&request, &mut response).await;
        response.set_keep_alive(keep_alive);

        let bytes = if is_head {
            response.into_head_bytes()
        } else {
            response.into_bytes()
        };
        stream.write_all(&bytes).await?;
        stream.flush().await?;

        // Drop the consumed request bytes from the buffer.
        let _ = buf.split_to(consumed);

        if !keep_alive {
            debug!(peer = %peer_addr, "Connection: close, shutting down");
            break;
        }
    }

    Ok(())
}

// Reads until `buf` holds one complete request, returning it with the number
// of bytes it occupies. `None` means the connection is done: closed by the
// peer, or rejected with a 4xx that has already been written.
async fn next_request<S>(
    stream: &mut S,
    buf: &mut BytesMut,
    peer_addr: SocketAddr,
) -> Result<Option<(Request, usize)>, std::io::Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        if !buf.is_empty() {
            match Request::parse(buf) {
                Ok((request, body_offset)) => match request_end(&request, body_offset) {
                    Ok(end) if buf.len() >= end => return Ok(Some((request, end))),
                    Ok(_) => {}
                    Err(status) => {
                        warn!(peer = %peer_addr, status = status.as_u16(), "rejecting request");
                        reject(stream, status).await?;
                        return Ok(None);
                    }
                },
                Err(RequestError::Incomplete) => {}
                Err(e) => {
                    warn!(peer = %peer_addr, error = %e, "bad request, sending 400");
                    reject(stream, StatusCode::BadRequest).await?;
                    return Ok(None);
                }
            }
        }

        // Guard against excessively large request heads.
        if buf.len() > MAX_REQUEST_SIZE {
            warn!(peer = %peer_addr, "request too large, sending 413");
            reject(stream, StatusCode::PayloadTooLarge).await?;
            return Ok(None);
        }

        if stream.read_buf(buf).await? == 0 {
            debug!(peer = %peer_addr, "connection closed by peer");
            return Ok(None);
        }
    }
}

// Offset just past the request body, or the status to refuse the request
// with. Only `Content-Length` framing is supported.
fn request_end(request: &Request, body_offset: usize) -> Result<usize, StatusCode> {
    if request.headers().contains("transfer-encoding") {
        return Err(StatusCode::NotImplemented);
    }

    let body_len = match request.headers().get("content-length") {
        None => 0,
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(len) => len,
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => {
                return Err(StatusCode::PayloadTooLarge);
            }
            Err(_) => return Err(StatusCode::BadRequest),
        },
    };

    body_offset
        .checked_add(body_len)
        .filter(|end| *end <= MAX_REQUEST_SIZE)
        .ok_or(StatusCode::PayloadTooLarge)
}

async fn reject<S>(stream: &mut S, status: StatusCode) -> Result<(), std::io::Error>
where
    S: AsyncWrite + Unpin,
{
    let mut response = Response::new();
    response.set_keep_alive(false);
    // A fresh response is never finished, so these writes cannot fail.
    let _ = response.set_header("Content-Type", "text/plain");
    let _ = response.send(status.as_u16(), status.canonical_reason());
    stream.write_all(&response.into_bytes()).await?;
    stream.flush().await
}
