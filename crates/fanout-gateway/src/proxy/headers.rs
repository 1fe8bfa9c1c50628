//! Header rewriting between the inbound request, upstreams and the reply.

use axum::http::header::{HeaderName, CONNECTION, CONTENT_LENGTH, HOST};
use axum::http::{HeaderMap, HeaderValue};

use crate::domain::Upstream;

/// Connection-scoped headers that never cross a proxy
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Headers sent to one upstream: a copy of the inbound set with `Host`
/// pointing at the upstream. The client recomputes `Content-Length`.
pub fn upstream_request_headers(inbound: &HeaderMap, upstream: &Upstream) -> HeaderMap {
    let mut headers = inbound.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(CONTENT_LENGTH);

    match HeaderValue::from_str(&upstream.host_port()) {
        Ok(host) => {
            headers.insert(HOST, host);
        }
        Err(_) => {
            headers.remove(HOST);
        }
    }
    headers
}

/// Headers of an upstream reply as relayed to the caller.
pub fn relay_headers(reply: &HeaderMap) -> HeaderMap {
    let mut headers = reply.clone();
    strip_hop_by_hop(&mut headers);
    headers
}
