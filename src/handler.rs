use crate::conn::ConnContext;
use crate::route::RouteArg;

/// Return code of a handler invocation.
///
/// `NotFound`/`Authenticated` are only meaningful from a handler's first
/// call (route dispatch): they tell the route-table walk to try the next
/// entry instead of treating the route as matched. Returning either of
/// them from any later call (a resume, or a subsequent body chunk) is a
/// handler bug; the engine logs it and coerces the connection to `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerStatus {
    Done,
    More,
    NotFound,
    Authenticated,
}

/// Controls how a connection frames its response body once a handler
/// starts writing to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// `Connection: close`, no chunked framing; body length is whatever
    /// gets buffered before the handler returns `Done`.
    Close,
    /// `Transfer-Encoding: chunked`; `send` backpatches a chunk header
    /// per flush and the connection is kept alive for reuse.
    Chunked,
    /// Neither header is emitted at all (caller is managing framing
    /// itself, e.g. a raw protocol upgrade).
    None,
}

/// A route's server-side logic.
///
/// `call` is the single entry point, invoked uniformly at route
/// dispatch, for each subsequent request body chunk, on every transport
/// "sent" resume while a prior call returned `More`, and once more at
/// teardown with `ConnContext::is_gone` true. A handler's own struct
/// fields are its per-request state — there is no separate opaque
/// `cgi_data` pointer the way the original needed one, since here the
/// handler instance itself owns whatever it needs to remember between
/// calls.
pub trait Handler {
    fn call(&mut self, ctx: &mut ConnContext) -> HandlerStatus;
}

/// Built-in handler for routes with no match: writes a fixed 404 body
/// and finishes. Grounded on `cgiNotFound` in the original.
pub(crate) struct NotFoundHandler;

impl Handler for NotFoundHandler {
    fn call(&mut self, ctx: &mut ConnContext) -> HandlerStatus {
        if ctx.is_gone() {
            return HandlerStatus::Done;
        }
        ctx.start_response(404);
        ctx.end_headers();
        ctx.send(b"404 File not found.");
        HandlerStatus::Done
    }
}

pub(crate) fn builtin_not_found_handler() -> Box<dyn Handler> {
    Box::new(NotFoundHandler)
}

/// Built-in handler issuing a 302 redirect to a fixed, route-supplied
/// target. Grounded on `cgiRedirect` in the original; the target, which
/// the original reads back out of `conn->cgiArg`, arrives here as the
/// route's `RouteArg::Str`.
pub(crate) struct RedirectHandler {
    target: &'static str,
}

impl Handler for RedirectHandler {
    fn call(&mut self, ctx: &mut ConnContext) -> HandlerStatus {
        if ctx.is_gone() {
            return HandlerStatus::Done;
        }
        ctx.redirect(self.target);
        HandlerStatus::Done
    }
}

/// `Route::make_handler` for a fixed redirect. Route `arg1` must be
/// `RouteArg::Str(target)`.
pub fn make_redirect_handler(arg1: RouteArg, _arg2: RouteArg) -> Box<dyn Handler> {
    let target = match arg1 {
        RouteArg::Str(s) => s,
        _ => "/",
    };
    Box::new(RedirectHandler { target })
}
