//! File extension → `Content-Type` lookup.

/// Returns the MIME type for a file extension, or `None` when it is unknown.
///
/// Matching is ASCII case-insensitive. Callers omit the `Content-Type`
/// header for unknown extensions rather than guessing.
///
/// # Examples
/// ```
/// use servedir::files::mime::content_type_for;
/// assert_eq!(content_type_for(Some("html")), Some("text/html"));
/// assert_eq!(content_type_for(Some("PNG")), Some("image/png"));
/// assert_eq!(content_type_for(Some("xyz")), None);
/// assert_eq!(content_type_for(None), None);
/// ```
pub fn content_type_for(extension: Option<&str>) -> Option<&'static str> {
    let ext = extension?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        // Text
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "txt" | "text" | "conf" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "xml" => "application/xml",

        // JavaScript/WASM
        "js" | "mjs" | "cjs" => "application/javascript",
        "json" | "map" => "application/json",
        "wasm" => "application/wasm",

        // Images
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "bmp" => "image/bmp",

        // Video
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "ogv" => "video/ogg",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",

        // Audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",

        // Fonts
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",

        // Documents and archives
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "bin" => "application/octet-stream",

        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_types() {
        assert_eq!(content_type_for(Some("html")), Some("text/html"));
        assert_eq!(content_type_for(Some("css")), Some("text/css"));
        assert_eq!(content_type_for(Some("js")), Some("application/javascript"));
        assert_eq!(content_type_for(Some("json")), Some("application/json"));
        assert_eq!(content_type_for(Some("svg")), Some("image/svg+xml"));
    }

    #[test]
    fn extension_case_is_ignored() {
        assert_eq!(content_type_for(Some("HTML")), Some("text/html"));
        assert_eq!(content_type_for(Some("Jpg")), Some("image/jpeg"));
    }

    #[test]
    fn unknown_extension() {
        assert_eq!(content_type_for(Some("xyz")), None);
        assert_eq!(content_type_for(Some("")), None);
        assert_eq!(content_type_for(None), None);
    }
}
