//! Startup configuration.
//!
//! A [`ServerConfig`] is assembled once, handed to
//! [`start_server`](crate::server::start_server), and never touched again.

use std::path::{Path, PathBuf};

use crate::chain::{Handler, HandlerChain};

/// Where and how to listen.
///
/// Unset fields fall back to OS-assigned defaults: any local address of the
/// preferred family, and a free port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindOptions {
    /// Host name or IP literal. IPv6 literals may be bracketed.
    pub host: Option<String>,
    /// TCP port; `None` or `0` lets the OS pick one.
    pub port: Option<u16>,
    /// Prefer IPv6 addresses when the host resolves to both families.
    pub ipv6: bool,
}

/// Everything the server needs to start.
///
/// # Examples
///
/// ```rust
/// use servedir::ServerConfig;
/// use servedir::chain::{Flow, handler_fn};
///
/// let config = ServerConfig::new()
///     .directory("./public")
///     .host("127.0.0.1")
///     .port(8080)
///     .handler(handler_fn(|_req, res| {
///         Box::pin(async move {
///             res.set_header("X-Powered-By", "servedir")?;
///             Ok(Flow::Next)
///         })
///     }));
///
/// assert_eq!(config.bind().port, Some(8080));
/// assert_eq!(config.handlers().len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct ServerConfig {
    directory: Option<PathBuf>,
    bind: BindOptions,
    handlers: HandlerChain,
}

impl ServerConfig {
    /// An empty configuration: no directory, default bind options, no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves files from `directory` after all custom handlers.
    #[must_use]
    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Host name or address to bind.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.bind.host = Some(host.into());
        self
    }

    /// Port to bind.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.bind.port = Some(port);
        self
    }

    /// Prefers IPv6 when binding.
    #[must_use]
    pub fn ipv6(mut self, ipv6: bool) -> Self {
        self.bind.ipv6 = ipv6;
        self
    }

    /// Replaces all bind options at once.
    #[must_use]
    pub fn bind_options(mut self, bind: BindOptions) -> Self {
        self.bind = bind;
        self
    }

    /// Appends a custom handler. Handlers run in the order they are added,
    /// always before the static file handler.
    #[must_use]
    pub fn handler(mut self, handler: impl Handler + 'static) -> Self {
        self.handlers.push(handler);
        self
    }

    /// The directory to serve, if any.
    pub fn served_directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// The bind options.
    pub fn bind(&self) -> &BindOptions {
        &self.bind
    }

    /// The custom handlers, in order.
    pub fn handlers(&self) -> &HandlerChain {
        &self.handlers
    }

    pub(crate) fn into_parts(self) -> (Option<PathBuf>, BindOptions, HandlerChain) {
        (self.directory, self.bind, self.handlers)
    }
}
