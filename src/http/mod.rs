//! HTTP/1.1 protocol types and parsing.
//!
//! This module provides the core HTTP primitives:
//! [`Method`], [`StatusCode`], [`Headers`], [`Request`], [`Response`], and the
//! [`HttpError`] value every handler reports failures through.

use std::fmt;

pub mod error;
pub mod headers;
pub mod request;
pub mod response;

pub use error::{HttpError, InvalidStatusCode};
pub use headers::Headers;
pub use request::Request;
pub use response::{Response, ResponseError};

/// Named HTTP status codes used by the server itself.
///
/// Responses store their status as a plain `u16` so that handlers can emit
/// any code; this enum only names the ones the crate produces directly.
///
/// # Examples
///
/// ```
/// use servedir::http::StatusCode;
///
/// let status = StatusCode::Found;
/// assert_eq!(status.as_u16(), 302);
/// assert_eq!(status.canonical_reason(), "Found");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusCode {
    // 2xx Success
    Ok = 200,

    // 3xx Redirection
    Found = 302,

    // 4xx Client Error
    BadRequest = 400,
    Forbidden = 403,
    NotFound = 404,
    PayloadTooLarge = 413,

    // 5xx Server Error
    InternalServerError = 500,
    NotImplemented = 501,
}

impl StatusCode {
    /// Returns the numeric status code as a `u16`.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the canonical reason phrase for this status code.
    pub fn canonical_reason(self) -> &'static str {
        reason_phrase(self.as_u16()).unwrap_or_default()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> u16 {
        code.as_u16()
    }
}

/// Looks up the standard reason phrase for a numeric status code.
///
/// Covers the IANA HTTP status code registry. Returns `None` for codes with
/// no registered phrase.
///
/// ```
/// use servedir::http::reason_phrase;
///
/// assert_eq!(reason_phrase(404), Some("Not Found"));
/// assert_eq!(reason_phrase(418), Some("I'm a Teapot"));
/// assert_eq!(reason_phrase(499), None);
/// ```
pub fn reason_phrase(code: u16) -> Option<&'static str> {
    let phrase = match code {
        100 => "Continue",
        101 => "Switching Protocols",
        102 => "Processing",
        103 => "Early Hints",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        207 => "Multi-Status",
        208 => "Already Reported",
        226 => "IM Used",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        418 => "I'm a Teapot",
        421 => "Misdirected Request",
        422 => "Unprocessable Entity",
        423 => "Locked",
        424 => "Failed Dependency",
        425 => "Too Early",
        426 => "Upgrade Required",
        428 => "Precondition Required",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        451 => "Unavailable For Legal Reasons",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        506 => "Variant Also Negotiates",
        507 => "Insufficient Storage",
        508 => "Loop Detected",
        509 => "Bandwidth Limit Exceeded",
        510 => "Not Extended",
        511 => "Network Authentication Required",
        _ => return None,
    };
    Some(phrase)
}

/// An HTTP request method.
///
/// Standard methods are represented as unit variants for zero-cost comparison.
/// Non-standard methods are captured in the `Custom` variant.
///
/// # Examples
///
/// ```
/// use servedir::http::Method;
///
/// let method: Method = "GET".parse().unwrap();
/// assert_eq!(method, Method::Get);
/// assert_eq!(method.as_str(), "GET");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    Connect,
    Trace,
    /// A non-standard extension method.
    Custom(String),
}

impl Method {
    /// Returns the method as a string slice.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch => "PATCH",
            Self::Connect => "CONNECT",
            Self::Trace => "TRACE",
            Self::Custom(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            "PATCH" => Self::Patch,
            "CONNECT" => Self::Connect,
            "TRACE" => Self::Trace,
            other => Self::Custom(other.to_owned()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_codes_use_the_table() {
        assert_eq!(StatusCode::Ok.canonical_reason(), "OK");
        assert_eq!(StatusCode::NotFound.canonical_reason(), "Not Found");
        assert_eq!(
            StatusCode::InternalServerError.to_string(),
            "500 Internal Server Error"
        );
    }

    #[test]
    fn every_named_code_has_a_phrase() {
        use StatusCode::*;
        for code in [
            Ok,
            Found,
            BadRequest,
            Forbidden,
            NotFound,
            PayloadTooLarge,
            InternalServerError,
            NotImplemented,
        ] {
            assert!(!code.canonical_reason().is_empty(), "{code:?}");
        }
        assert_eq!(NotImplemented.to_string(), "501 Not Implemented");
    }

    #[test]
    fn unregistered_codes_have_no_phrase() {
        assert_eq!(reason_phrase(299), None);
        assert_eq!(reason_phrase(599), None);
        assert_eq!(reason_phrase(0), None);
    }

    #[test]
    fn custom_method_round_trips() {
        let m: Method = "PROPFIND".parse().unwrap();
        assert_eq!(m, Method::Custom("PROPFIND".into()));
        assert_eq!(m.to_string(), "PROPFIND");
    }
}
