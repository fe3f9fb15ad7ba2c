//! A fixed-memory, single-threaded HTTP/1.x server engine, designed for
//! embedding behind a non-blocking transport (a raw TCP stack, TLS
//! wrapper, or test double) that drives it through four events:
//! connect, receive, sent, disconnect.
//!
//! The engine owns request parsing, response framing (including chunked
//! transfer encoding and per-connection backpressure backlog), a static
//! ordered route table, and a small set of output helpers (URL
//! decoding, HTML/JS escaping, MIME lookup). It does not open sockets,
//! run an event loop, or ship a logger; the host process wires an
//! [`Instance`] to its own transport via the [`Transport`] trait and to
//! its own `log` sink.

mod conn;
mod error;
mod escape;
mod flags;
mod formdecode;
mod handler;
mod head;
mod instance;
mod limits;
mod method;
mod mime;
mod route;
mod transport;

pub use conn::{ConnContext, PostState, SERVER_TOKEN};
pub use error::{HttpError, HttpdError};
pub use escape::{send_html_escaped, send_js_escaped};
pub use flags::ConnFlags;
pub use formdecode::{find_arg, url_decode};
pub use handler::{make_redirect_handler, Handler, HandlerStatus, TransferMode};
pub use instance::Instance;
pub use limits::{
    Limits, DEFAULT_MAX_BACKLOG_SIZE, DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_CORS_TOKEN_LEN,
    DEFAULT_MAX_HEAD_LEN, DEFAULT_MAX_POST_LEN, DEFAULT_MAX_SENDBUF_LEN,
};
pub use method::Method;
pub use mime::{mime_type, needs_cache_header};
pub use route::{Route, RouteArg};
pub use transport::Transport;
