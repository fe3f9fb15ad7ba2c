//! Fixed capacity knobs.
//!
//! The original engine expresses these as preprocessor constants
//! (`HTTPD_MAX_CONNECTIONS`, `HTTPD_MAX_HEAD_LEN`, ...). Here they are
//! fields on a plain struct so a caller can size an `Instance` for its
//! target device without recompiling the crate.

/// Connection slots a single `Instance` will hold open at once.
pub const DEFAULT_MAX_CONNECTIONS: usize = 8;
/// Bytes retained for the accumulated request line + headers.
pub const DEFAULT_MAX_HEAD_LEN: usize = 1024;
/// Bytes a connection's output framing buffer may hold before `send`
/// starts refusing writes.
pub const DEFAULT_MAX_SENDBUF_LEN: usize = 2048;
/// Bytes buffered per request body chunk before a handler is invoked.
pub const DEFAULT_MAX_POST_LEN: usize = 2048;
/// Total bytes a connection's backlog may hold across all queued
/// flushes before further backlog growth is refused.
pub const DEFAULT_MAX_BACKLOG_SIZE: usize = 4096;
/// Bytes retained from `Access-Control-Request-Headers` for preflight echo.
pub const DEFAULT_MAX_CORS_TOKEN_LEN: usize = 128;

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_connections: usize,
    pub max_head_len: usize,
    pub max_sendbuf_len: usize,
    pub max_post_len: usize,
    pub max_backlog_size: usize,
    pub max_cors_token_len: usize,
    /// Mirrors the original's `CONFIG_ESPHTTPD_CORS_SUPPORT` build-time
    /// switch: off by default. When set, every response carries the
    /// `Access-Control-Allow-*` headers and `OPTIONS` requests are
    /// answered as CORS preflights ahead of route dispatch.
    pub cors_enabled: bool,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_head_len: DEFAULT_MAX_HEAD_LEN,
            max_sendbuf_len: DEFAULT_MAX_SENDBUF_LEN,
            max_post_len: DEFAULT_MAX_POST_LEN,
            max_backlog_size: DEFAULT_MAX_BACKLOG_SIZE,
            max_cors_token_len: DEFAULT_MAX_CORS_TOKEN_LEN,
            cors_enabled: false,
        }
    }
}
