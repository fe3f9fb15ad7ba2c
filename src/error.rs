use quick_error::quick_error;

quick_error! {
    /// Diagnostics surfaced by the engine. None of these cross an HTTP
    /// response by themselves — they describe engine-internal conditions
    /// (a full pool, a misbehaving handler, a stale event) that the
    /// caller's logging sink should see, mirroring the `httpd_printf`
    /// call sites of the original.
    #[derive(Debug)]
    pub enum HttpdError {
        /// `Instance::on_connect` found every slot occupied.
        PoolExhausted {
            description("connection pool is full; rejecting accept")
        }
        /// A connection's backlog is already at `Limits::max_backlog_size`.
        BacklogExhausted {
            description("per-connection backlog exceeded its size quota")
        }
        /// A handler returned `NotFound`/`Authenticated` from a call site
        /// where only `Done`/`More` are contractually valid (i.e. any
        /// call after the first dispatch).
        HandlerMisuse(detail: &'static str) {
            description("handler returned an invalid status for its call site")
            display("handler misuse: {}", detail)
        }
        /// `on_recv`/`on_sent`/`on_disconnect` named an `(ip, port)` pair
        /// with no matching slot.
        UnknownConnection {
            description("event for an (ip, port) pair with no tracked connection")
        }
    }
}

/// Implemented by handler-level errors that want to map onto an HTTP
/// status line without hand-writing one each time.
pub trait HttpError {
    fn http_status(&self) -> (u16, &'static str);
}

impl HttpError for HttpdError {
    fn http_status(&self) -> (u16, &'static str) {
        match self {
            HttpdError::PoolExhausted => (503, "Service Unavailable"),
            HttpdError::BacklogExhausted => (503, "Service Unavailable"),
            HttpdError::HandlerMisuse(_) => (500, "Internal Server Error"),
            HttpdError::UnknownConnection => (500, "Internal Server Error"),
        }
    }
}
