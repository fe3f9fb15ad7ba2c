//! MIME type lookup and cache-control heuristics.
//!
//! Pulled from `original_source/core/httpd.c`'s `httpdGetMimetype`/
//! cache-header helpers — any real static-file handler needs these, and
//! the original ships them as part of the same translation unit as the
//! engine core.

const MIME_TYPES: &[(&str, &str)] = &[
    ("htm", "text/html"),
    ("html", "text/html"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("txt", "text/plain"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("svg", "image/svg+xml"),
    ("xml", "text/xml"),
    ("json", "application/json"),
];

/// Looks up the MIME type for `url` by its trailing extension,
/// case-insensitively. Falls back to `text/html`, matching the
/// original's default.
pub fn mime_type(url: &str) -> &'static str {
    let ext = url.rsplit('.').next().unwrap_or("");
    let ext_lower = ext.to_ascii_lowercase();
    for &(e, m) in MIME_TYPES {
        if e == ext_lower {
            return m;
        }
    }
    "text/html"
}

/// Whether a response of this MIME type should carry a long-lived
/// `Cache-Control` header. Dynamic/text content is excluded; everything
/// else (images, fonts, compiled assets) is assumed immutable-by-name.
pub fn needs_cache_header(mime: &str) -> bool {
    !matches!(
        mime,
        "text/html" | "text/plain" | "text/csv" | "application/json"
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn looks_up_known_extensions() {
        assert_eq!(mime_type("/style.css"), "text/css");
        assert_eq!(mime_type("/app.JS"), "text/javascript");
    }

    #[test]
    fn falls_back_to_html() {
        assert_eq!(mime_type("/no-extension"), "text/html");
        assert_eq!(mime_type("/weird.zzz"), "text/html");
    }

    #[test]
    fn cache_header_excludes_dynamic_types() {
        assert!(!needs_cache_header("text/html"));
        assert!(needs_cache_header("image/png"));
    }
}
