//! Static file resolution: map request paths onto a directory tree.
//!
//! [`resolve`] turns a URL path into file contents, a redirect, or an
//! [`HttpError`]; [`StaticFiles`] is the [`Handler`] that writes that outcome
//! to the response. Every call goes to the filesystem: nothing is cached.
//!
//! ## Mapping rules
//!
//! | Request path        | Outcome                                              |
//! |---------------------|------------------------------------------------------|
//! | `/docs/`            | contents of `<root>/docs/index.html`                 |
//! | `/docs` (directory) | `302 Found`, `Location: /docs/`                      |
//! | `/.env`             | `403 Forbidden`, whether or not the file exists      |
//! | `/../etc/passwd`    | `403 Forbidden`                                      |
//! | `/missing.txt`      | `404 Not Found`                                      |
//!
//! Paths are percent-decoded and `.`/`..` segments are resolved before the
//! root is joined, so a request can never name a path outside the root. A
//! symlink inside the root that points outside of it is refused as well.

pub mod mime;

use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{error, warn};

use crate::chain::{Flow, Handler, HandlerFuture};
use crate::http::{HttpError, Request, Response, StatusCode};

/// File served for request paths that end in `/`.
pub const INDEX_FILE: &str = "index.html";

/// A successful resolution: either file contents or a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedFile {
    /// Served with `200 OK`.
    File {
        body: Vec<u8>,
        /// `None` when the extension is unknown; no header is sent then.
        content_type: Option<&'static str>,
    },
    /// Served with `302 Found`.
    Redirect { location: String },
}

impl ResolvedFile {
    /// The status code this outcome is served with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::File { .. } => StatusCode::Ok.as_u16(),
            Self::Redirect { .. } => StatusCode::Found.as_u16(),
        }
    }
}

/// Resolves `request_path` against `root`.
///
/// `request_path` is the still-encoded path component of the request target
/// (no query string). The redirect for a directory requested without a
/// trailing slash is `request_path` followed by `/`.
///
/// # Errors
///
/// - `400`: the path does not decode to UTF-8 or contains a NUL byte.
/// - `403`: dotfile, path escaping `root`, or permission denied.
/// - `404`: nothing at that path.
/// - `500`: any other I/O failure; the cause is logged, not returned.
pub async fn resolve(request_path: &str, root: &Path) -> Result<ResolvedFile, HttpError> {
    let decoded = decode_path(request_path)?;
    let candidate = join_within(root, &decoded)?;

    // Only names below the root count; the root's own name is never checked.
    let is_dotfile = candidate
        .strip_prefix(root)
        .ok()
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'));
    if is_dotfile {
        return Err(HttpError::forbidden());
    }

    let path = match contained_path(root, &candidate).await {
        Ok(path) => path,
        Err(e) => return map_io_error(e, request_path, &candidate),
    };

    match fs::metadata(&path).await {
        Ok(meta) if meta.is_dir() => return Ok(redirect_to_directory(request_path)),
        Ok(_) => {}
        Err(e) => return map_io_error(e, request_path, &path),
    }

    match fs::read(&path).await {
        Ok(body) => {
            let extension = path.extension().and_then(|ext| ext.to_str());
            Ok(ResolvedFile::File {
                body,
                content_type: mime::content_type_for(extension),
            })
        }
        Err(e) => map_io_error(e, request_path, &path),
    }
}

/// Serves files below a root directory.
///
/// Runs [`resolve`] for every request that reaches it and writes the result.
/// Resolution failures propagate as [`HttpError`]s for the chain to render.
/// If an earlier handler already finished the response, the request is left
/// alone.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    /// Serves files from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory files are served from.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Handler for StaticFiles {
    fn handle<'a>(&'a self, req: &'a Request, res: &'a mut Response) -> HandlerFuture<'a> {
        Box::pin(async move {
            if res.is_finished() {
                return Ok(Flow::Next);
            }

            let resolved = resolve(req.path(), &self.root).await?;
            res.set_status(resolved.status_code())?;
            match resolved {
                ResolvedFile::File { body, content_type } => {
                    if let Some(content_type) = content_type {
                        res.set_header("Content-Type", content_type)?;
                    }
                    res.write(body)?;
                }
                ResolvedFile::Redirect { location } => {
                    let location = match req.query_string() {
                        Some(query) => format!("{location}?{query}"),
                        None => location,
                    };
                    res.set_header("Location", location)?;
                }
            }
            res.end()?;
            Ok(Flow::Next)
        })
    }
}

fn decode_path(request_path: &str) -> Result<String, HttpError> {
    let decoded = percent_encoding::percent_decode_str(request_path)
        .decode_utf8()
        .map_err(|_| HttpError::bad_request())?;
    if decoded.contains('\0') {
        return Err(HttpError::bad_request());
    }
    Ok(decoded.into_owned())
}

// Lexically joins `decoded` onto `root`, appending the index file for
// directory paths. A `..` that would climb above `root` is refused.
fn join_within(root: &Path, decoded: &str) -> Result<PathBuf, HttpError> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split(std::path::is_separator) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    warn!(path = decoded, "path escapes the served directory");
                    return Err(HttpError::forbidden());
                }
            }
            other => segments.push(other),
        }
    }

    if decoded.ends_with(std::path::is_separator) {
        segments.push(INDEX_FILE);
    }

    let mut path = root.to_path_buf();
    path.extend(segments);
    Ok(path)
}

// Resolves symlinks in `candidate` and checks the result is still below `root`.
async fn contained_path(root: &Path, candidate: &Path) -> io::Result<PathBuf> {
    let root = fs::canonicalize(root).await?;
    let resolved = fs::canonicalize(candidate).await?;
    if resolved.starts_with(&root) {
        Ok(resolved)
    } else {
        warn!(
            path = %candidate.display(),
            target = %resolved.display(),
            "symlink points outside the served directory"
        );
        Err(io::Error::from(ErrorKind::PermissionDenied))
    }
}

fn redirect_to_directory(request_path: &str) -> ResolvedFile {
    ResolvedFile::Redirect {
        location: format!("{request_path}/"),
    }
}

fn map_io_error(err: io::Error, request_path: &str, path: &Path) -> Result<ResolvedFile, HttpError> {
    match err.kind() {
        ErrorKind::PermissionDenied => Err(HttpError::forbidden()),
        ErrorKind::IsADirectory => Ok(redirect_to_directory(request_path)),
        ErrorKind::NotFound | ErrorKind::NotADirectory => Err(HttpError::not_found()),
        _ => {
            error!(path = %path.display(), error = %err, "failed to read file");
            Err(HttpError::internal())
        }
    }
}
