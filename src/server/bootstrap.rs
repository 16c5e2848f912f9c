//! Turning a [`ServerConfig`] into a listening [`Server`].

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::net::lookup_host;
use tracing::info;

use super::{Server, ServerError};
use crate::config::{BindOptions, ServerConfig};
use crate::files::StaticFiles;

/// Validates `config`, binds a listener and returns the ready server.
///
/// When a directory is configured, a [`StaticFiles`] handler for it is
/// appended after all custom handlers.
///
/// # Errors
///
/// - [`ServerError::DirectoryNotFound`]: the directory does not exist.
/// - [`ServerError::PermissionDenied`]: the directory cannot be inspected.
/// - [`ServerError::NotADirectory`]: the path exists but is not a directory.
/// - [`ServerError::Resolve`] / [`ServerError::NoAddress`]: the host name
///   does not resolve.
/// - [`ServerError::Bind`]: the address cannot be bound.
/// - [`ServerError::Io`]: any other filesystem failure.
///
/// # Examples
///
/// ```rust,no_run
/// use servedir::{ServerConfig, start_server};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = start_server(ServerConfig::new().directory("./public").port(8080)).await?;
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub async fn start_server(config: ServerConfig) -> Result<Server, ServerError> {
    let (directory, bind, mut chain) = config.into_parts();

    if let Some(directory) = directory {
        let root = validate_directory(&directory).await?;
        info!(directory = %root.display(), "serving files");
        chain.push(StaticFiles::new(root));
    }

    let addr = bind_address(&bind).await?;
    let server = Server::bind(addr, chain).await?;

    info!(address = %server.local_addr(), "listening on {}", server.url());
    info!("Press Ctrl+C to stop");
    Ok(server)
}

/// The URL a browser should use for a server bound to `addr`.
///
/// Unspecified addresses are shown as `localhost`, IPv6 literals are
/// bracketed and port 80 is left implicit.
///
/// ```
/// use servedir::server::base_url;
///
/// assert_eq!(base_url("0.0.0.0:8080".parse().unwrap()), "http://localhost:8080");
/// assert_eq!(base_url("[::1]:80".parse().unwrap()), "http://[::1]");
/// ```
pub fn base_url(addr: SocketAddr) -> String {
    let host = match addr.ip() {
        ip if ip.is_unspecified() => "localhost".to_owned(),
        IpAddr::V6(ip) => format!("[{ip}]"),
        IpAddr::V4(ip) => ip.to_string(),
    };
    match addr.port() {
        80 => format!("http://{host}"),
        port => format!("http://{host}:{port}"),
    }
}

async fn validate_directory(directory: &Path) -> Result<PathBuf, ServerError> {
    let absolute = std::path::absolute(directory)?;
    match fs::metadata(&absolute).await {
        Ok(meta) if meta.is_dir() => Ok(absolute),
        Ok(_) => Err(ServerError::NotADirectory(absolute)),
        Err(e) => Err(match e.kind() {
            ErrorKind::NotFound => ServerError::DirectoryNotFound(absolute),
            ErrorKind::PermissionDenied => ServerError::PermissionDenied(absolute),
            _ => ServerError::Io(e),
        }),
    }
}

// Resolves the configured host, preferring the requested address family and
// falling back to whatever the resolver returned first.
async fn bind_address(bind: &BindOptions) -> Result<SocketAddr, ServerError> {
    let port = bind.port.unwrap_or(0);
    let host = match bind.host.as_deref() {
        Some(host) => host.trim_start_matches('[').trim_end_matches(']'),
        None if bind.ipv6 => "::",
        None => "0.0.0.0",
    };

    let candidates: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|source| ServerError::Resolve {
            host: host.to_owned(),
            source,
        })?
        .collect();

    candidates
        .iter()
        .find(|addr| addr.is_ipv6() == bind.ipv6)
        .or_else(|| candidates.first())
        .copied()
        .ok_or_else(|| ServerError::NoAddress {
            host: host.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_formats() {
        assert_eq!(base_url("0.0.0.0:8080".parse().unwrap()), "http://localhost:8080");
        assert_eq!(base_url("[::]:3000".parse().unwrap()), "http://localhost:3000");
        assert_eq!(base_url("127.0.0.1:80".parse().unwrap()), "http://127.0.0.1");
        assert_eq!(base_url("[::1]:8080".parse().unwrap()), "http://[::1]:8080");
    }

    #[tokio::test]
    async fn default_bind_address() {
        let v4 = bind_address(&BindOptions::default()).await.unwrap();
        assert_eq!(v4, "0.0.0.0:0".parse().unwrap());

        let v6 = bind_address(&BindOptions {
            ipv6: true,
            ..BindOptions::default()
        })
        .await
        .unwrap();
        assert_eq!(v6, "[::]:0".parse().unwrap());
    }

    #[tokio::test]
    async fn bracketed_ipv6_host() {
        let addr = bind_address(&BindOptions {
            host: Some("[::1]".into()),
            port: Some(8080),
            ipv6: false,
        })
        .await
        .unwrap();
        assert_eq!(addr, "[::1]:8080".parse().unwrap());
    }

    #[tokio::test]
    async fn missing_directory_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        let err = start_server(ServerConfig::new().directory(&missing).host("127.0.0.1"))
            .await
            .err()
            .unwrap();
        assert!(matches!(&err, ServerError::DirectoryNotFound(p) if p == &missing));
        assert!(err.to_string().starts_with("directory not found"));
    }

    #[tokio::test]
    async fn file_is_not_a_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();
        let err = start_server(ServerConfig::new().directory(&file).host("127.0.0.1"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ServerError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn starts_on_an_ephemeral_port() {
        let tmp = tempfile::tempdir().unwrap();
        let server = start_server(ServerConfig::new().directory(tmp.path()).host("127.0.0.1"))
            .await
            .unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert!(server.url().starts_with("http://127.0.0.1:"));
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let err = start_server(ServerConfig::new().host("127.0.0.1").port(port))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ServerError::Bind { .. }));
    }
}
