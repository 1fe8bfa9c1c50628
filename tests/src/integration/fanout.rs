//! # Gateway Fan-out Flows
//!
//! End-to-end requests through a gateway bound to a real socket, against
//! scripted upstreams:
//!
//! 1. **Relay**: a single-upstream route passes status, headers and body through
//! 2. **Merge**: a multi-upstream route answers with the lowest status and a
//!    JSON object keyed by upstream name, in route order
//! 3. **Partial failure**: an unreachable upstream becomes a 502 entry while
//!    its siblings still answer
//! 4. **Forwarding**: upstreams see the inbound method, body and their own
//!    `Host`
//! 5. **Concurrency**: upstreams of a route are called at the same time, a
//!    slow one times out on its own, and shutdown waits for in-flight work

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use super::super::harness::{client, config, dead_service, MockUpstream, Script, TestGateway};

    async fn json_body(response: reqwest::Response) -> Value {
        serde_json::from_str(&response.text().await.unwrap()).unwrap()
    }

    // =============================================================================
    // RELAY
    // =============================================================================

    #[tokio::test]
    async fn test_single_upstream_reply_is_relayed_verbatim() {
        let upstream =
            MockUpstream::spawn(Script::text(StatusCode::IM_A_TEAPOT, "short and stout")).await;
        let gateway = TestGateway::spawn(config(
            vec![upstream.service("teapot")],
            &[("teapot", &["teapot"])],
        ))
        .await;

        let response = client()
            .get(gateway.url("/api/teapot"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 418);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/plain"
        );
        assert_eq!(response.text().await.unwrap(), "short and stout");
    }

    #[tokio::test]
    async fn test_unknown_route_names_the_transaction() {
        let upstream = MockUpstream::spawn(Script::json(StatusCode::OK, "{}")).await;
        let gateway =
            TestGateway::spawn(config(vec![upstream.service("a")], &[("a", &["a"])])).await;

        let response = client()
            .post(gateway.url("/api/elsewhere"))
            .body("{}")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 502);
        let text = response.text().await.unwrap();
        let trace = text.strip_prefix("Bad gateway #trace=").unwrap();
        assert_eq!(trace.len(), 32);
        assert!(trace.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(upstream.seen().is_empty());
    }

    // =============================================================================
    // MERGE
    // =============================================================================

    #[tokio::test]
    async fn test_grouped_route_merges_in_route_order() {
        let ok = MockUpstream::spawn(Script::json(StatusCode::OK, r#"{"n": 1}"#)).await;
        let missing =
            MockUpstream::spawn(Script::json(StatusCode::NOT_FOUND, r#"{"n": 2}"#)).await;
        let created =
            MockUpstream::spawn(Script::json(StatusCode::CREATED, r#"[3]"#)).await;

        let gateway = TestGateway::spawn(config(
            vec![
                missing.service("zeta"),
                ok.service("alpha"),
                created.service("mid"),
            ],
            &[("grouped", &["zeta", "alpha", "mid"])],
        ))
        .await;

        let response = client()
            .get(gateway.url("/api/grouped"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "application/json"
        );

        let text = response.text().await.unwrap();
        let body: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            body,
            json!({
                "zeta": {"n": 2},
                "alpha": {"n": 1},
                "mid": [3],
            })
        );

        let zeta = text.find("\"zeta\"").unwrap();
        let alpha = text.find("\"alpha\"").unwrap();
        let mid = text.find("\"mid\"").unwrap();
        assert!(zeta < alpha && alpha < mid);
    }

    #[tokio::test]
    async fn test_non_json_body_becomes_error_entry() {
        let json_up = MockUpstream::spawn(Script::json(StatusCode::OK, r#"{"ok": true}"#)).await;
        let text_up =
            MockUpstream::spawn(Script::text(StatusCode::INTERNAL_SERVER_ERROR, "boom")).await;

        let gateway = TestGateway::spawn(config(
            vec![json_up.service("one"), text_up.service("two")],
            &[("both", &["one", "two"])],
        ))
        .await;

        let response = client()
            .get(gateway.url("/api/both"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
        let body = json_body(response).await;
        assert_eq!(body["one"], json!({"ok": true}));
        assert_eq!(body["two"], json!({"error": "boom"}));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_does_not_fail_siblings() {
        let alive = MockUpstream::spawn(Script::json(StatusCode::ACCEPTED, r#""up""#)).await;
        let gateway = TestGateway::spawn(config(
            vec![alive.service("alive"), dead_service("dead").await],
            &[("mixed", &["alive", "dead"])],
        ))
        .await;

        let response = client()
            .get(gateway.url("/api/mixed"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 202);
        let body = json_body(response).await;
        assert_eq!(body["alive"], json!("up"));

        let error = body["dead"]["error"].as_str().unwrap();
        assert!(error.starts_with("Bad gateway #trace="));
    }

    #[tokio::test]
    async fn test_single_unreachable_upstream_is_bad_gateway() {
        let gateway = TestGateway::spawn(config(
            vec![dead_service("dead").await],
            &[("dead", &["dead"])],
        ))
        .await;

        let response = client()
            .get(gateway.url("/api/dead"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 502);
        assert!(response
            .text()
            .await
            .unwrap()
            .starts_with("Bad gateway #trace="));
    }

    // =============================================================================
    // FORWARDING
    // =============================================================================

    #[tokio::test]
    async fn test_method_body_and_host_are_forwarded() {
        let first = MockUpstream::spawn(Script::json(StatusCode::OK, "{}")).await;
        let second = MockUpstream::spawn(Script::json(StatusCode::OK, "{}")).await;

        let gateway = TestGateway::spawn(config(
            vec![first.service("first"), second.service("second")],
            &[("pair", &["first", "second"])],
        ))
        .await;

        let response = client()
            .put(gateway.url("/api/pair"))
            .header("content-type", "application/json")
            .body(r#"{"hello":"world"}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);

        for upstream in [&first, &second] {
            let seen = upstream.seen();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].method, axum::http::Method::PUT);
            assert_eq!(seen[0].body.as_ref(), br#"{"hello":"world"}"#);
            assert_eq!(
                seen[0].host.as_deref(),
                Some(format!("127.0.0.1:{}", upstream.addr.port()).as_str())
            );
        }
    }

    #[tokio::test]
    async fn test_route_name_is_trimmed() {
        let upstream = MockUpstream::spawn(Script::text(StatusCode::OK, "hi")).await;
        let gateway =
            TestGateway::spawn(config(vec![upstream.service("svc")], &[("svc", &["svc"])])).await;

        let response = client()
            .get(gateway.url("/api/%20svc%20"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(response.text().await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_metrics_count_requests() {
        let upstream = MockUpstream::spawn(Script::text(StatusCode::OK, "hi")).await;
        let gateway =
            TestGateway::spawn(config(vec![upstream.service("svc")], &[("svc", &["svc"])])).await;
        let client = client();

        client.get(gateway.url("/api/svc")).send().await.unwrap();
        client.get(gateway.url("/api/nope")).send().await.unwrap();

        let metrics = json_body(client.get(gateway.url("/metrics")).send().await.unwrap()).await;
        assert_eq!(metrics["requests_total"], 2);
        assert_eq!(metrics["requests_unrouted"], 1);
        assert_eq!(metrics["upstream_calls"], 1);
    }

    // =============================================================================
    // CONCURRENCY AND TIMEOUTS
    // =============================================================================

    #[tokio::test]
    async fn test_upstreams_are_called_concurrently() {
        let delay = Duration::from_millis(300);
        let left = MockUpstream::spawn(Script::json(StatusCode::OK, "1").after(delay)).await;
        let right = MockUpstream::spawn(Script::json(StatusCode::OK, "2").after(delay)).await;

        let gateway = TestGateway::spawn(config(
            vec![left.service("left"), right.service("right")],
            &[("both", &["left", "right"])],
        ))
        .await;

        let started = Instant::now();
        let response = client()
            .get(gateway.url("/api/both"))
            .send()
            .await
            .unwrap();
        let body = json_body(response).await;
        let elapsed = started.elapsed();

        assert_eq!(body, json!({"left": 1, "right": 2}));
        assert!(elapsed >= delay);
        assert!(
            elapsed < Duration::from_millis(550),
            "upstreams ran one after another: {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn test_request_timeout_becomes_bad_gateway_entry() {
        let fast = MockUpstream::spawn(Script::json(StatusCode::OK, r#""fast""#)).await;
        let slow = MockUpstream::spawn(
            Script::json(StatusCode::OK, r#""slow""#).after(Duration::from_secs(3)),
        )
        .await;

        let mut gateway_config = config(
            vec![fast.service("fast"), slow.service("slow")],
            &[("race", &["fast", "slow"])],
        );
        gateway_config.upstream.request_timeout = Duration::from_millis(200);
        let gateway = TestGateway::spawn(gateway_config).await;

        let started = Instant::now();
        let response = client()
            .get(gateway.url("/api/race"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
        let body = json_body(response).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(body["fast"], json!("fast"));
        assert!(body["slow"]["error"]
            .as_str()
            .unwrap()
            .starts_with("Bad gateway #trace="));
    }

    #[tokio::test]
    async fn test_shutdown_drains_in_flight_request() {
        let slow = MockUpstream::spawn(
            Script::text(StatusCode::OK, "finished").after(Duration::from_millis(400)),
        )
        .await;
        let mut gateway =
            TestGateway::spawn(config(vec![slow.service("slow")], &[("slow", &["slow"])])).await;

        let request = tokio::spawn(client().get(gateway.url("/api/slow")).send());
        while slow.seen().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        gateway.begin_shutdown();
        let response = request.await.unwrap().unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(response.text().await.unwrap(), "finished");

        tokio::time::timeout(Duration::from_secs(5), gateway.stopped())
            .await
            .unwrap();
    }
}
