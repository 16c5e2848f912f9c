//! Handler chain: ordered request processing with continuation control.
//!
//! A [`HandlerChain`] runs its [`Handler`]s one after another for each
//! request. Every handler gets the request and the shared, write-once
//! [`Response`] and tells the chain what to do next by returning a [`Flow`]:
//!
//! - finish the response: the chain stops, whatever `Flow` is returned;
//! - return [`Flow::Next`] without finishing: the next handler runs;
//! - return [`Flow::Stop`] without finishing: the chain stops and the
//!   request is answered with `404 Not Found`.
//!
//! Failures are reported as [`HandlerError`]. An [`HttpError`] is rendered to
//! the client as-is; anything else is logged and replaced by a bare `500`.
//! [`HandlerChain::handle`] never fails: every request ends with exactly one
//! finished response.
//!
//! ## Core types
//!
//! - [`Handler`]: trait implemented by every stage of the chain.
//! - [`handler_fn`]: adapts a closure into a [`Handler`].
//! - [`HandlerChain`]: the ordered list plus the executor.

use std::{future::Future, pin::Pin, sync::Arc};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::http::{HttpError, Request, Response, ResponseError};

/// Boxed error type for failures that do not fit the other variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What a handler asks the chain to do after it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Hand the request to the next handler.
    Next,
    /// Stop here.
    Stop,
}

/// Errors a handler can fail with.
///
/// Only [`HandlerError::Http`] is shown to the client. Every other variant is
/// an internal fault: it is logged with full detail and the client receives
/// `500 Internal Server Error`.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("response error: {0}")]
    Response(#[from] ResponseError),

    #[error(transparent)]
    Other(BoxError),
}

impl HandlerError {
    /// Wraps an arbitrary error as an internal fault.
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }
}

/// The future returned by [`Handler::handle`].
pub type HandlerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Flow, HandlerError>> + Send + 'a>>;

/// A single stage of the request pipeline.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync`: one chain is shared by every
///   connection task.
/// - A handler must not assume it runs at all: an earlier handler may have
///   finished the response or stopped the chain.
/// - A handler that runs after the response is finished must not try to
///   write to it; check [`Response::is_finished`] first.
///
/// # Examples
///
/// ```rust
/// use servedir::chain::{Flow, Handler, HandlerFuture};
/// use servedir::http::{Request, Response};
///
/// struct Health;
///
/// impl Handler for Health {
///     fn handle<'a>(&'a self, req: &'a Request, res: &'a mut Response) -> HandlerFuture<'a> {
///         Box::pin(async move {
///             if req.path() == "/healthz" {
///                 res.send(200, "ok")?;
///             }
///             Ok(Flow::Next)
///         })
///     }
/// }
/// ```
pub trait Handler: Send + Sync {
    /// Process `req`, optionally writing to `res`.
    fn handle<'a>(&'a self, req: &'a Request, res: &'a mut Response) -> HandlerFuture<'a>;
}

/// A [`Handler`] backed by a closure. Built with [`handler_fn`].
pub struct HandlerFn<F> {
    f: F,
}

impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a Request, &'a mut Response) -> HandlerFuture<'a> + Send + Sync,
{
    fn handle<'a>(&'a self, req: &'a Request, res: &'a mut Response) -> HandlerFuture<'a> {
        (self.f)(req, res)
    }
}

/// Adapts a closure into a [`Handler`].
///
/// # Examples
///
/// ```rust
/// use servedir::chain::{Flow, handler_fn};
///
/// let deny_admin = handler_fn(|req, _res| {
///     Box::pin(async move {
///         if req.path().starts_with("/admin") {
///             return Err(servedir::http::HttpError::forbidden().into());
///         }
///         Ok(Flow::Next)
///     })
/// });
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: for<'a> Fn(&'a Request, &'a mut Response) -> HandlerFuture<'a> + Send + Sync + 'static,
{
    HandlerFn { f }
}

/// An ordered list of handlers and the executor that runs them.
///
/// Order is exactly the order of insertion and is never changed.
#[derive(Clone, Default)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn Handler>>,
}

impl HandlerChain {
    /// Creates an empty chain. An empty chain answers every request with `404`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler to the end of the chain.
    #[must_use]
    pub fn with(mut self, handler: impl Handler + 'static) -> Self {
        self.push(handler);
        self
    }

    /// Appends a handler to the end of the chain in place.
    pub fn push(&mut self, handler: impl Handler + 'static) {
        self.handlers.push(Arc::new(handler));
    }

    /// Appends an already shared handler.
    pub fn push_shared(&mut self, handler: Arc<dyn Handler>) {
        self.handlers.push(handler);
    }

    /// Returns the number of handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if the chain has no handlers.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs the chain for one request.
    ///
    /// On return `res` is finished: either by a handler, or with a
    /// `text/plain` error body rendered from the failure.
    pub async fn handle(&self, req: &Request, res: &mut Response) {
        match self.execute(req, res).await {
            Ok(()) => info!(
                method = %req.method(),
                "{} {}",
                res.status(),
                req.path()
            ),
            Err(err) => render_error(&err, req, res),
        }
    }

    async fn execute(&self, req: &Request, res: &mut Response) -> Result<(), HttpError> {
        match self.dispatch(req, res).await {
            Ok(()) if res.is_finished() => Ok(()),
            Ok(()) => Err(HttpError::not_found()),
            Err(HandlerError::Http(err)) => Err(err),
            Err(err) => {
                error!(
                    method = %req.method(),
                    path = %req.path(),
                    error = ?err,
                    "handler failed: {err}"
                );
                Err(HttpError::internal())
            }
        }
    }

    async fn dispatch(&self, req: &Request, res: &mut Response) -> Result<(), HandlerError> {
        for handler in &self.handlers {
            let flow = handler.handle(req, res).await?;
            if flow != Flow::Next || res.is_finished() {
                break;
            }
        }
        Ok(())
    }
}

// Best-effort: a response that a handler already finished cannot be replaced.
fn render_error(err: &HttpError, req: &Request, res: &mut Response) {
    let code = err.status_code();
    if code >= 500 {
        warn!(method = %req.method(), "{} {}", code, req.path());
    } else {
        info!(method = %req.method(), "{} {}", code, req.path());
    }

    if let Err(e) = write_error(err, res) {
        debug!(status = code, error = %e, "could not render error response");
    }
}

fn write_error(err: &HttpError, res: &mut Response) -> Result<(), ResponseError> {
    res.reset()?;
    res.set_status(err.status_code())?;
    res.set_header("Content-Type", "text/plain")?;
    res.write(err.status_message())?;
    res.end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn make_request(method: &str, path: &str) -> Request {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req
    }

    // Counts its invocations and returns a fixed flow without responding.
    struct Counting {
        calls: Arc<AtomicUsize>,
        flow: Flow,
    }

    impl Handler for Counting {
        fn handle<'a>(&'a self, _req: &'a Request, _res: &'a mut Response) -> HandlerFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let flow = self.flow;
            Box::pin(async move { Ok(flow) })
        }
    }

    fn counting(flow: Flow) -> (Counting, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Counting {
                calls: Arc::clone(&calls),
                flow,
            },
            calls,
        )
    }

    fn responder(body: &'static str) -> impl Handler {
        handler_fn(move |_req, res| {
            Box::pin(async move {
                res.set_header("Content-Type", "text/html")?;
                res.send(200, body)?;
                Ok(Flow::Next)
            })
        })
    }

    async fn run(chain: &HandlerChain, path: &str) -> Response {
        let req = make_request("GET", path);
        let mut res = Response::new();
        chain.handle(&req, &mut res).await;
        res
    }

    #[tokio::test]
    async fn continuing_handler_defers_to_responder() {
        let (a, a_calls) = counting(Flow::Next);
        let (c, c_calls) = counting(Flow::Next);
        let chain = HandlerChain::new().with(a).with(responder("from B")).with(c);

        let res = run(&chain, "/").await;

        assert!(res.is_finished());
        assert_eq!(res.status(), 200);
        assert_eq!(res.body(), b"from B");
        assert_eq!(res.headers().get("content-type"), Some("text/html"));
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn silent_stop_yields_404() {
        let (a, _) = counting(Flow::Stop);
        let (b, b_calls) = counting(Flow::Next);
        let chain = HandlerChain::new().with(a).with(b);

        let res = run(&chain, "/anything").await;

        assert_eq!(res.status(), 404);
        assert_eq!(res.body(), b"Not Found");
        assert_eq!(res.headers().get("content-type"), Some("text/plain"));
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exhausted_chain_yields_404() {
        let (a, _) = counting(Flow::Next);
        let (b, _) = counting(Flow::Next);
        let chain = HandlerChain::new().with(a).with(b);

        let res = run(&chain, "/").await;
        assert_eq!(res.status(), 404);
    }

    #[tokio::test]
    async fn empty_chain_yields_404() {
        let chain = HandlerChain::new();
        assert!(chain.is_empty());
        let res = run(&chain, "/").await;
        assert_eq!(res.status(), 404);
        assert!(res.is_finished());
    }

    #[tokio::test]
    async fn internal_error_is_masked() {
        let chain = HandlerChain::new().with(handler_fn(|_req, _res| {
            Box::pin(async move {
                Err(HandlerError::other("database password is hunter2"))
            })
        }));

        let res = run(&chain, "/").await;

        assert_eq!(res.status(), 500);
        assert_eq!(res.body(), b"Internal Server Error");
        let body = String::from_utf8_lossy(res.body());
        assert!(!body.contains("hunter2"));
    }

    #[tokio::test]
    async fn io_error_is_masked() {
        let chain = HandlerChain::new().with(handler_fn(|_req, _res| {
            Box::pin(async move {
                let err = std::io::Error::other("disk on fire at /var/secret");
                Err(err.into())
            })
        }));

        let res = run(&chain, "/").await;
        assert_eq!(res.status(), 500);
        assert_eq!(res.body(), b"Internal Server Error");
    }

    #[tokio::test]
    async fn http_error_is_rendered_verbatim() {
        let chain = HandlerChain::new().with(handler_fn(|_req, _res| {
            Box::pin(async move { Err(HttpError::with_message(429, "Slow Down").into()) })
        }));

        let res = run(&chain, "/").await;
        assert_eq!(res.status(), 429);
        assert_eq!(res.body(), b"Slow Down");
        assert_eq!(res.headers().get("content-type"), Some("text/plain"));
    }

    #[tokio::test]
    async fn partial_output_is_discarded_on_error() {
        let chain = HandlerChain::new().with(handler_fn(|_req, res| {
            Box::pin(async move {
                res.set_header("X-Partial", "yes")?;
                res.write("half a page")?;
                Err(HttpError::forbidden().into())
            })
        }));

        let res = run(&chain, "/").await;
        assert_eq!(res.status(), 403);
        assert_eq!(res.body(), b"Forbidden");
        assert!(!res.headers().contains("x-partial"));
    }

    #[tokio::test]
    async fn error_after_finish_keeps_the_response() {
        let chain = HandlerChain::new().with(handler_fn(|_req, res| {
            Box::pin(async move {
                res.send(200, "done")?;
                Err(HandlerError::other("late failure"))
            })
        }));

        let res = run(&chain, "/").await;
        assert_eq!(res.status(), 200);
        assert_eq!(res.body(), b"done");
    }

    #[tokio::test]
    async fn finishing_handler_stops_chain_even_when_continuing() {
        let (b, b_calls) = counting(Flow::Next);
        let chain = HandlerChain::new().with(responder("first")).with(b);

        let res = run(&chain, "/").await;
        assert_eq!(res.body(), b"first");
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn writing_to_finished_response_is_an_internal_fault() {
        // A misbehaving handler writes again after the response was sent.
        let chain = HandlerChain::new().with(handler_fn(|_req, res| {
            Box::pin(async move {
                res.send(201, "created")?;
                res.write("again")?;
                Ok(Flow::Next)
            })
        }));

        let res = run(&chain, "/").await;
        assert_eq!(res.status(), 201);
        assert_eq!(res.body(), b"created");
    }

    #[test]
    fn chain_preserves_insertion_order_count() {
        let (a, _) = counting(Flow::Next);
        let mut chain = HandlerChain::new();
        chain.push(a);
        chain.push_shared(Arc::new(responder("x")));
        assert_eq!(chain.len(), 2);
    }
}
