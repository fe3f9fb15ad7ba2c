use crate::handler::Handler;

/// Static per-route parameter, generalising the original's two opaque
/// `void *cgiArg`/`cgiArg2` slots into a small closed set a handler
/// factory can match on without casting.
#[derive(Debug, Clone, Copy)]
pub enum RouteArg {
    None,
    Str(&'static str),
    Int(i64),
}

/// One entry in the static, ordered route table.
///
/// `pattern` is either a literal path or a prefix ending in `*`.
/// `make_handler` builds a fresh handler instance for a request that
/// matched this entry, given the entry's own `arg1`/`arg2`.
pub struct Route {
    pub pattern: &'static str,
    pub make_handler: fn(RouteArg, RouteArg) -> Box<dyn Handler>,
    pub arg1: RouteArg,
    pub arg2: RouteArg,
}

/// First-match-wins matcher: exact literal match, or a trailing `*`
/// treated as a prefix wildcard.
pub(crate) fn route_matches(pattern: &str, url: &[u8]) -> bool {
    let pbytes = pattern.as_bytes();
    if pbytes == url {
        return true;
    }
    if let Some((&b'*', prefix)) = pbytes.split_last() {
        return url.starts_with(prefix);
    }
    false
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn literal_match() {
        assert!(route_matches("/index.html", b"/index.html"));
        assert!(!route_matches("/index.html", b"/index.htm"));
    }

    #[test]
    fn wildcard_prefix_match() {
        assert!(route_matches("/static/*", b"/static/js/app.js"));
        assert!(route_matches("/static/*", b"/static/"));
        assert!(!route_matches("/static/*", b"/statics/x"));
    }

    #[test]
    fn bare_star_matches_everything() {
        assert!(route_matches("*", b"/anything"));
    }
}
