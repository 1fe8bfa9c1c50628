//! Reconciliation of upstream replies into one response.
//!
//! One reply is relayed as-is. Several replies collapse into a JSON object
//! keyed by upstream name, carrying the most optimistic (lowest) status.

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;
use serde_json::{Map, Value};

use super::headers::relay_headers;
use crate::domain::UpstreamReply;

/// Build the client response from the replies of a route, in route order.
pub fn reconcile(mut replies: Vec<UpstreamReply>) -> Response {
    match replies.len() {
        0 => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::BAD_GATEWAY;
            response
        }
        1 => {
            let reply = replies.remove(0);
            relay(reply)
        }
        _ => merge(&replies),
    }
}

fn relay(reply: UpstreamReply) -> Response {
    let mut response = Response::new(Body::from(reply.body));
    *response.status_mut() = reply.status;
    *response.headers_mut() = relay_headers(&reply.headers);
    response
}

fn merge(replies: &[UpstreamReply]) -> Response {
    let status = merged_status(replies);

    let mut headers = relay_headers(&replies[0].headers);
    headers.remove(CONTENT_LENGTH);
    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    let body = merged_body(replies);
    let bytes = serde_json::to_vec(&body).unwrap_or_default();

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Lowest status code among the replies; the first one wins ties.
pub fn merged_status(replies: &[UpstreamReply]) -> StatusCode {
    replies
        .iter()
        .min_by_key(|r| r.status.as_u16())
        .map(|r| r.status)
        .unwrap_or(StatusCode::BAD_GATEWAY)
}

/// `{name: transformed body}` in route order. A name appearing twice keeps
/// its position and the later body.
pub fn merged_body(replies: &[UpstreamReply]) -> Value {
    let mut map = Map::new();
    for reply in replies {
        map.insert(reply.name.clone(), reply.transform());
    }
    Value::Object(map)
}
