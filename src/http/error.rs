//! Client and server error responses as values.
//!
//! [`HttpError`] is the single failure shape the handler chain renders. It is
//! restricted to the 4xx and 5xx ranges; anything else is not an error
//! response and is rejected at construction.

use thiserror::Error;

use super::{StatusCode, reason_phrase};

/// Returned by [`HttpError::try_new`] when the code is not in `400..=599`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid error status code {0}: expected a value between 400 and 599")]
pub struct InvalidStatusCode(pub u16);

/// An HTTP error status paired with its message.
///
/// The message defaults to the standard reason phrase for the code and is
/// what the client sees as the `text/plain` body.
///
/// # Examples
///
/// ```
/// use servedir::http::HttpError;
///
/// let err = HttpError::new(404);
/// assert_eq!(err.status_code(), 404);
/// assert_eq!(err.status_message(), "Not Found");
///
/// assert!(HttpError::try_new(302).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code} {message}")]
pub struct HttpError {
    code: u16,
    message: String,
}

impl HttpError {
    /// Creates an error for `code` with the standard reason phrase.
    ///
    /// # Panics
    ///
    /// Panics if `code` is outside `400..=599`. Use [`try_new`](Self::try_new)
    /// when the code is not a compile-time constant.
    pub fn new(code: u16) -> Self {
        match Self::try_new(code) {
            Ok(err) => err,
            Err(e) => panic!("{e}"),
        }
    }

    /// Creates an error for `code`, rejecting codes outside `400..=599`.
    pub fn try_new(code: u16) -> Result<Self, InvalidStatusCode> {
        if !(400..=599).contains(&code) {
            return Err(InvalidStatusCode(code));
        }
        Ok(Self {
            code,
            message: reason_phrase(code).unwrap_or_default().to_owned(),
        })
    }

    /// Creates an error for `code` with an explicit message.
    ///
    /// # Panics
    ///
    /// Panics if `code` is outside `400..=599`.
    pub fn with_message(code: u16, message: impl Into<String>) -> Self {
        let mut err = Self::new(code);
        err.message = message.into();
        err
    }

    /// `400 Bad Request`.
    pub fn bad_request() -> Self {
        Self::new(StatusCode::BadRequest.as_u16())
    }

    /// `403 Forbidden`.
    pub fn forbidden() -> Self {
        Self::new(StatusCode::Forbidden.as_u16())
    }

    /// `404 Not Found`.
    pub fn not_found() -> Self {
        Self::new(StatusCode::NotFound.as_u16())
    }

    /// `500 Internal Server Error`.
    pub fn internal() -> Self {
        Self::new(StatusCode::InternalServerError.as_u16())
    }

    /// The numeric status code.
    pub fn status_code(&self) -> u16 {
        self.code
    }

    /// The message sent to the client.
    pub fn status_message(&self) -> &str {
        &self.message
    }
}
