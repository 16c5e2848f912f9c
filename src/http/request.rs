//! HTTP/1.1 request parsing using the [`httparse`] crate.

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method};

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

/// A fully parsed HTTP/1.1 request.
///
/// Created by [`Request::parse`] from a raw byte buffer. The handler chain
/// only ever sees it by shared reference.
///
/// # Examples
///
/// ```
/// use servedir::http::Request;
///
/// let raw = b"GET /docs/?page=2 HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.path(), "/docs/");
/// assert_eq!(request.query_string(), Some("page=2"));
/// assert_eq!(request.headers().get("host"), Some("localhost"));
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    query: Option<String>,
    body: Bytes,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Parse a raw HTTP/1.1 request from a byte slice.
    ///
    /// Returns the parsed `Request` and the byte offset at which the body begins
    /// in `buf` (i.e. immediately after the `\r\n\r\n` header terminator). The
    /// body is whatever follows the headers in `buf`, truncated to
    /// `Content-Length` when that header is present.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`]: more data is needed to complete the request headers.
    /// - [`RequestError::Parse`]: the data is malformed and cannot be parsed.
    /// - [`RequestError::MissingField`]: a required field (method, path, version) is absent.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method: Method = match raw_req.method {
            Some(m) => match m.parse() {
                Ok(method) => method,
                Err(never) => match never {},
            },
            None => return Err(RequestError::MissingField { field: "method" }),
        };

        let raw_path = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;

        let (path, query) = match raw_path.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (raw_path.to_owned(), None),
        };

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        // Fields whose value is not UTF-8 are dropped.
        let header_map: Headers = raw_req
            .headers
            .iter()
            .filter_map(|h| Some((h.name, std::str::from_utf8(h.value).ok()?)))
            .collect();

        let rest = &buf[body_offset..];
        let body_len = header_map
            .get("content-length")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .map_or(rest.len(), |n| n.min(rest.len()));
        let body = Bytes::copy_from_slice(&rest[..body_len]);

        Ok((
            Self {
                method,
                path,
                version,
                headers: header_map,
                query,
                body,
            },
            body_offset,
        ))
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path (without the query string), still percent-encoded.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns the request body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns `true` if the connection should be kept alive after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive. HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive` is explicitly set.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }

    /// Returns the value of the `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.trim().parse().ok()
    }
}
