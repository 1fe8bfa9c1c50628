//! Request forwarding and reply reconciliation.

pub mod forward;
pub mod headers;
pub mod merge;

pub use forward::Forwarder;
pub use headers::{relay_headers, strip_hop_by_hop, upstream_request_headers};
pub use merge::{merged_body, merged_status, reconcile};
