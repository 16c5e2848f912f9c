//! # servedir
//!
//! A small async static file server built on an ordered handler chain.
//!
//! Each request runs through the custom handlers first, in registration
//! order, and then through the static file handler for the configured
//! directory. Any handler can answer the request or pass it on; failures
//! become plain-text error responses.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use servedir::{ServerConfig, start_server};
//! use servedir::chain::{Flow, handler_fn};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::new()
//!         .directory("./public")
//!         .port(8080)
//!         .handler(handler_fn(|req, res| {
//!             Box::pin(async move {
//!                 if req.path() == "/health" {
//!                     res.send(200, "ok")?;
//!                 }
//!                 Ok(Flow::Next)
//!             })
//!         }));
//!
//!     let server = start_server(config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod chain;
pub mod config;
pub mod files;
pub mod http;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use chain::{Flow, Handler, HandlerChain, HandlerError};
pub use config::{BindOptions, ServerConfig};
pub use files::StaticFiles;
pub use http::{Headers, HttpError, Method, Request, Response, StatusCode};
pub use server::{Server, ServerError, start_server};
