//! Write-once HTTP/1.1 response.
//!
//! Handlers fill in a [`Response`] in place: status, headers, body, then
//! [`end`](Response::end). Once ended the response is frozen and every
//! further mutation fails with [`ResponseError::Finished`]; the transport
//! serializes it to HTTP/1.1 wire format afterwards.

use bytes::{BufMut, BytesMut};
use thiserror::Error;

use super::{Headers, StatusCode, reason_phrase};

/// Returned when a finished response is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResponseError {
    #[error("response already finished")]
    Finished,
}

/// An outbound HTTP/1.1 response.
///
/// # Examples
///
/// ```
/// use servedir::http::{Response, ResponseError};
///
/// let mut res = Response::new();
/// res.set_status(201).unwrap();
/// res.set_header("Content-Type", "application/json").unwrap();
/// res.write(r#"{"status":"ok"}"#).unwrap();
/// res.end().unwrap();
///
/// assert!(res.is_finished());
/// assert_eq!(res.write("more"), Err(ResponseError::Finished));
///
/// let bytes = res.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
/// assert!(text.contains("Content-Length: 15\r\n"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: u16,
    headers: Headers,
    body: Vec<u8>,
    finished: bool,
    keep_alive: bool,
}

impl Response {
    /// Creates an unfinished `200 OK` response with no headers and an empty body.
    pub fn new() -> Self {
        Self {
            status: StatusCode::Ok.as_u16(),
            headers: Headers::new(),
            body: Vec::new(),
            finished: false,
            keep_alive: true,
        }
    }

    /// Sets the status code.
    pub fn set_status(&mut self, status: u16) -> Result<(), ResponseError> {
        self.ensure_open()?;
        self.status = status;
        Ok(())
    }

    /// Sets a header, replacing any existing values of the same name.
    pub fn set_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ResponseError> {
        self.ensure_open()?;
        self.headers.set(name, value);
        Ok(())
    }

    /// Appends a header without touching existing values of the same name.
    pub fn append_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ResponseError> {
        self.ensure_open()?;
        self.headers.append(name, value);
        Ok(())
    }

    /// Appends `chunk` to the body.
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) -> Result<(), ResponseError> {
        self.ensure_open()?;
        self.body.extend_from_slice(chunk.as_ref());
        Ok(())
    }

    /// Finalizes the response. Nothing can be changed afterwards.
    pub fn end(&mut self) -> Result<(), ResponseError> {
        self.ensure_open()?;
        self.finished = true;
        Ok(())
    }

    /// Sets the status, writes `body`, and finalizes in one step.
    pub fn send(
        &mut self,
        status: u16,
        body: impl AsRef<[u8]>,
    ) -> Result<(), ResponseError> {
        self.set_status(status)?;
        self.write(body)?;
        self.end()
    }

    /// Discards the status, headers and body written so far.
    ///
    /// Only an unfinished response can be reset.
    pub fn reset(&mut self) -> Result<(), ResponseError> {
        self.ensure_open()?;
        self.status = StatusCode::Ok.as_u16();
        self.headers.clear();
        self.body.clear();
        Ok(())
    }

    /// Returns `true` once [`end`](Self::end) has been called.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns the headers written so far.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the body written so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Controls whether `Connection: keep-alive` or `Connection: close` is written.
    ///
    /// This is a property of the connection, not of the message, so it is
    /// still allowed after the response is finished.
    pub fn set_keep_alive(&mut self, keep_alive: bool) {
        self.keep_alive = keep_alive;
    }

    /// Serializes the response into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// Automatically adds `Content-Length: <n>` and `Connection: keep-alive`
    /// or `Connection: close`.
    pub fn into_bytes(self) -> BytesMut {
        self.serialize(true)
    }

    /// Like [`into_bytes`](Self::into_bytes) but without the body, for `HEAD`
    /// requests. `Content-Length` still reports the full body length.
    pub fn into_head_bytes(self) -> BytesMut {
        self.serialize(false)
    }

    fn serialize(mut self, with_body: bool) -> BytesMut {
        let content_length = self.body.len();

        let connection = if self.keep_alive {
            "keep-alive"
        } else {
            "close"
        };
        self.headers.set("Connection", connection);

        let estimated_size = 128 + self.headers.len() * 64 + content_length;
        let mut buf = BytesMut::with_capacity(estimated_size);

        // Status line
        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status,
                reason_phrase(self.status).unwrap_or_default()
            )
            .as_bytes(),
        );

        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        // Content-Length is always the last header before the blank line
        buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());
        buf.put(&b"\r\n"[..]);

        if with_body && !self.body.is_empty() {
            buf.put(self.body.as_slice());
        }

        buf
    }

    fn ensure_open(&self) -> Result<(), ResponseError> {
        if self.finished {
            Err(ResponseError::Finished)
        } else {
            Ok(())
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}
