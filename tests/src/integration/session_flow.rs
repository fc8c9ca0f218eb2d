//! Session lifecycle flows: init, verify, poll, proximity.

#[cfg(test)]
mod tests {
    use crate::support::*;
    use axum::body::Body;
    use axum::http::Request;

    #[tokio::test]
    async fn test_init_returns_nonce_and_qr_payload() {
        let broker = default_broker();
        let response = init_request(&broker.router, "https://gov.pl", BROWSER_IP).await;
        assert_eq!(response.status(), 201);

        let body = body_json(response).await;
        let nonce = body["nonce"].as_str().unwrap();
        assert_eq!(nonce.len(), 36);
        assert_eq!(body["expires_in"], 30);
        assert_eq!(
            body["qr_payload"],
            format!("myapp://verify?token={}", nonce)
        );
    }

    #[tokio::test]
    async fn test_init_requires_client_url_header() {
        let broker = default_broker();
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/session/init")
            .header("X-Forwarded-For", BROWSER_IP)
            .body(Body::empty())
            .unwrap();
        let response = send(&broker.router, request).await;
        assert_eq!(response.status(), 422);
    }

    #[tokio::test]
    async fn test_init_rejects_invalid_urls() {
        let broker = default_broker();
        for url in ["ftp://gov.pl", "not a url", "https://"] {
            let response = init_request(&broker.router, url, BROWSER_IP).await;
            assert_eq!(response.status(), 422, "url {:?} should be rejected", url);
        }
        let long = format!("https://gov.pl/{}", "a".repeat(2048));
        let response = init_request(&broker.router, &long, BROWSER_IP).await;
        assert_eq!(response.status(), 422);
    }

    #[tokio::test]
    async fn test_trusted_url_verifies_trusted() {
        let broker = default_broker();
        let nonce = init_session(&broker.router, "https://gov.pl").await;

        let response = verify_request(&broker.router, &nonce, "10.1.1.1").await;
        assert_eq!(response.status(), 200);
        let body = body_json(response).await;
        assert_eq!(body["verdict"], "TRUSTED");
        assert!(body["trust_score"].as_i64().unwrap() >= 90);
        assert_eq!(body["checked_url"], "https://gov.pl");
        assert_eq!(body["client_ip"], BROWSER_IP);
        assert_eq!(body["device_os"], "iOS");
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
        assert!(body["logs"]
            .as_array()
            .unwrap()
            .iter()
            .any(|l| l == "Domain is in official whitelist."));
    }

    #[tokio::test]
    async fn test_untrusted_url_verifies_unsafe() {
        let broker = default_broker();
        let nonce = init_session(&broker.router, "https://evil.com/login").await;

        let response = verify_request(&broker.router, &nonce, "10.1.1.1").await;
        assert_eq!(response.status(), 200);
        let body = body_json(response).await;
        assert_eq!(body["verdict"], "UNSAFE");
        assert_eq!(body["trust_score"], 0);
        assert!(body["logs"]
            .as_array()
            .unwrap()
            .iter()
            .any(|l| l == "Domain NOT in official whitelist."));
    }

    #[tokio::test]
    async fn test_verify_consumes_exactly_once() {
        let broker = default_broker();
        let nonce = init_session(&broker.router, "https://gov.pl").await;

        let first = verify_request(&broker.router, &nonce, "10.1.1.1").await;
        assert_eq!(first.status(), 200);

        let second = verify_request(&broker.router, &nonce, "10.1.1.1").await;
        assert_eq!(second.status(), 409);
    }

    #[tokio::test]
    async fn test_unknown_token_is_404() {
        let broker = default_broker();
        let response =
            verify_request(&broker.router, "deadbeef-0000-4000-8000-000000000000", "10.1.1.1")
                .await;
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_verify_after_ttl_is_gone() {
        let broker = default_broker();
        let nonce = init_session(&broker.router, "https://gov.pl").await;

        broker.clock.advance(31.0);
        let response = verify_request(&broker.router, &nonce, "10.1.1.1").await;
        // The store has dropped the record by now.
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_consumed_session_expires_to_410() {
        let broker = default_broker();
        let nonce = init_session(&broker.router, "https://gov.pl").await;

        broker.clock.advance(29.0);
        let first = verify_request(&broker.router, &nonce, "10.1.1.1").await;
        assert_eq!(first.status(), 200);

        // The consumed record outlives the verifiable window in the store;
        // its verifiable lifetime is still anchored to created_at.
        broker.clock.advance(10.0);
        let second = verify_request(&broker.router, &nonce, "10.1.1.1").await;
        assert_eq!(second.status(), 410);
    }

    #[tokio::test]
    async fn test_poll_returns_persisted_verdict() {
        let broker = default_broker();
        let nonce = init_session(&broker.router, "https://gov.pl").await;

        let response = poll_request(&broker.router, &nonce).await;
        let body = body_json(response).await;
        assert_eq!(body["status"], "PENDING");
        assert!(body.get("result").is_none());

        verify_request(&broker.router, &nonce, "10.1.1.1").await;

        let response = poll_request(&broker.router, &nonce).await;
        let body = body_json(response).await;
        assert_eq!(body["status"], "CONSUMED");
        assert_eq!(body["result"]["verdict"], "TRUSTED");
    }

    #[tokio::test]
    async fn test_poll_unknown_is_404() {
        let broker = default_broker();
        let response = poll_request(&broker.router, "deadbeef").await;
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_poll_reports_expired_before_store_drop() {
        let broker = default_broker();
        let nonce = init_session(&broker.router, "https://gov.pl").await;

        // Proximity rewrites the record, extending its store lifetime past
        // the verifiable window.
        broker.clock.advance(10.0);
        proximity_request(&broker.router, &nonce, None, true, true).await;
        broker.clock.advance(25.0);

        let response = poll_request(&broker.router, &nonce).await;
        let body = body_json(response).await;
        assert_eq!(body["status"], "EXPIRED");
    }

    #[tokio::test]
    async fn test_proximity_confirmed_flow() {
        let broker = default_broker();
        let nonce = init_session(&broker.router, "https://gov.pl").await;

        let response =
            proximity_request(&broker.router, &nonce, Some("uuid-1"), true, true).await;
        assert_eq!(response.status(), 200);
        let body = body_json(response).await;
        assert_eq!(body["status"], "proximity_confirmed");

        let response = verify_request(&broker.router, &nonce, "10.1.1.1").await;
        let body = body_json(response).await;
        assert_eq!(body["details"]["bt_proximity"], "CONFIRMED");
    }

    #[tokio::test]
    async fn test_proximity_not_confirmed_when_not_found() {
        let broker = default_broker();
        let nonce = init_session(&broker.router, "https://gov.pl").await;

        proximity_request(&broker.router, &nonce, Some("uuid-1"), false, true).await;

        let response = verify_request(&broker.router, &nonce, "10.1.1.1").await;
        let body = body_json(response).await;
        assert_eq!(body["details"]["bt_proximity"], "NOT_CONFIRMED");
        // Proximity never blocks verification itself.
        assert_eq!(body["verdict"], "TRUSTED");
    }

    #[tokio::test]
    async fn test_proximity_malformed_nonce_is_422() {
        let broker = default_broker();
        let response = proximity_request(&broker.router, "zzz", None, true, true).await;
        assert_eq!(response.status(), 422);
    }

    #[tokio::test]
    async fn test_proximity_unknown_session_is_404() {
        let broker = default_broker();
        let response =
            proximity_request(&broker.router, "deadbeef", Some("uuid-1"), true, true).await;
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let broker = default_broker();
        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = send(&broker.router, request).await;
        assert_eq!(response.status(), 200);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
    }
}
