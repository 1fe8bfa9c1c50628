//! Concurrent forwarding of one inbound request to the upstreams of a route.

use std::sync::Arc;

use axum::http::{HeaderMap, Method};
use bytes::Bytes;
use futures::future::join_all;
use tracing::{error, info};

use super::headers::upstream_request_headers;
use crate::domain::{
    ForwardError, GatewayError, TransactionId, Upstream, UpstreamOptions, UpstreamReply,
};
use crate::middleware::GatewayMetrics;

/// Outbound side of the gateway: one pooled client shared by all requests
#[derive(Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    metrics: Arc<GatewayMetrics>,
}

impl Forwarder {
    pub fn new(
        options: &UpstreamOptions,
        metrics: Arc<GatewayMetrics>,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .timeout(options.request_timeout)
            .pool_idle_timeout(options.pool_idle_timeout)
            .no_proxy()
            .build()
            .map_err(|e| GatewayError::Client(e.to_string()))?;

        Ok(Self { client, metrics })
    }

    /// Forward to every upstream concurrently. Replies come back in the
    /// same order as `upstreams`; failed calls become 502 replies.
    pub async fn fan_out(
        &self,
        upstreams: &[Arc<Upstream>],
        method: &Method,
        headers: &HeaderMap,
        body: Option<Bytes>,
        tx: TransactionId,
    ) -> Vec<UpstreamReply> {
        if upstreams.len() > 1 {
            self.metrics.record_fan_out();
        }

        join_all(
            upstreams
                .iter()
                .map(|upstream| self.send(upstream, method, headers, body.clone(), tx)),
        )
        .await
    }

    /// Forward to a single upstream
    pub async fn send(
        &self,
        upstream: &Upstream,
        method: &Method,
        headers: &HeaderMap,
        body: Option<Bytes>,
        tx: TransactionId,
    ) -> UpstreamReply {
        let url = upstream.url();
        info!(url = %url, method = %method, tx = %tx, "requesting");

        match self.try_send(upstream, &url, method, headers, body).await {
            Ok(reply) => {
                info!(
                    url = %url,
                    method = %method,
                    bytes = reply.body.len(),
                    srv_name = %upstream.name,
                    code = reply.status.as_u16(),
                    tx = %tx,
                    "done"
                );
                self.metrics.record_upstream(true, reply.body.len() as u64);
                reply
            }
            Err(e) => {
                error!(
                    url = %url,
                    method = %method,
                    srv_name = %upstream.name,
                    kind = e.kind(),
                    error = %e,
                    tx = %tx,
                    "connection error"
                );
                self.metrics.record_upstream(false, 0);
                UpstreamReply::bad_gateway(upstream.name.clone(), tx)
            }
        }
    }

    async fn try_send(
        &self,
        upstream: &Upstream,
        url: &str,
        method: &Method,
        headers: &HeaderMap,
        body: Option<Bytes>,
    ) -> Result<UpstreamReply, ForwardError> {
        let mut request = self
            .client
            .request(method.clone(), url)
            .headers(upstream_request_headers(headers, upstream));
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(ForwardError::from_send)?;
        let status = response.status();
        let reply_headers = response.headers().clone();
        let reply_body = response.bytes().await.map_err(ForwardError::Body)?;

        Ok(UpstreamReply {
            name: upstream.name.clone(),
            status,
            headers: reply_headers,
            body: reply_body,
        })
    }
}
