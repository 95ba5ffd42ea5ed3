//! Client IP resolution.
//!
//! The redeem path keys one of its rate limits on the caller's address and
//! every audit row carries a source IP, so behind a proxy the resolved
//! address must be the end client's, not the balancer's. Proxy headers are
//! consulted before the socket peer.

use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};

/// Resolved client address, carried in request extensions.
#[derive(Clone, Copy, Debug)]
pub struct ClientIp(pub IpAddr);

/// Middleware inserting [`ClientIp`] into every request.
///
/// Falls back to the socket peer when no proxy header parses, so handlers
/// always see an address on direct connections.
pub async fn extract_client_ip(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request,
    next: Next,
) -> Response {
    let ip = resolve_client_ip(request.headers()).unwrap_or_else(|| addr.ip());
    request.extensions_mut().insert(ClientIp(ip));

    next.run(request).await
}

/// X-Forwarded-For carries the whole proxy chain; the first entry is the
/// original client. X-Real-IP is the single-value form some proxies set.
fn resolve_client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        return forwarded
            .to_str()
            .ok()?
            .split(',')
            .next()?
            .trim()
            .parse()
            .ok();
    }

    headers
        .get("x-real-ip")?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(name: &'static str, value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(name, value.parse().unwrap());
        map
    }

    #[test]
    fn forwarded_for_takes_the_first_hop() {
        let map = headers("x-forwarded-for", "203.0.113.9, 10.0.0.2, 10.0.0.1");
        assert_eq!(
            resolve_client_ip(&map),
            Some("203.0.113.9".parse().unwrap())
        );
    }

    #[test]
    fn real_ip_is_the_fallback_header() {
        let map = headers("x-real-ip", "2001:db8::17");
        assert_eq!(resolve_client_ip(&map), Some("2001:db8::17".parse().unwrap()));
    }

    #[test]
    fn forwarded_for_outranks_real_ip() {
        let mut map = headers("x-forwarded-for", "203.0.113.9");
        map.insert("x-real-ip", "198.51.100.4".parse().unwrap());
        assert_eq!(
            resolve_client_ip(&map),
            Some("203.0.113.9".parse().unwrap())
        );
    }

    #[test]
    fn unparsable_headers_resolve_to_none() {
        assert_eq!(resolve_client_ip(&HeaderMap::new()), None);
        assert_eq!(
            resolve_client_ip(&headers("x-forwarded-for", "not-an-address")),
            None
        );
    }
}
