//! WebSocket delivery flows: verdict push, proximity gating, accept guards.
//!
//! HTTP calls go through the shared router; sockets connect to a real
//! listener serving the same state.

#[cfg(test)]
mod tests {
    use crate::support::*;
    use futures::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::protocol::Message;

    async fn ws_connect(
        addr: std::net::SocketAddr,
        nonce: &str,
    ) -> tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    > {
        let url = format!("ws://{}/ws/verification/{}", addr, nonce);
        let (stream, _) = connect_async(url).await.expect("ws connect");
        stream
    }

    #[tokio::test]
    async fn test_confirmed_proximity_receives_verdict_push() {
        let broker = default_broker();
        let addr = spawn_server(&broker).await;

        let nonce = init_session(&broker.router, "https://gov.pl").await;
        proximity_request(&broker.router, &nonce, Some("uuid-success"), true, true).await;

        let mut ws = ws_connect(addr, &nonce).await;

        let verify = verify_request(&broker.router, &nonce, "10.1.1.1").await;
        assert_eq!(verify.status(), 200);

        let frame = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("verdict push within the bounded wait")
            .expect("socket open")
            .expect("frame");
        let text = match frame {
            Message::Text(text) => text.to_string(),
            other => panic!("expected text frame, got {:?}", other),
        };
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["type"], "verification_success");
        assert_eq!(parsed["channel"], "uuid-success");
        assert_eq!(parsed["result"]["verdict"], "TRUSTED");
    }

    #[tokio::test]
    async fn test_no_proximity_no_push() {
        let broker = default_broker();
        let addr = spawn_server(&broker).await;

        let nonce = init_session(&broker.router, "https://gov.pl").await;
        let mut ws = ws_connect(addr, &nonce).await;

        let verify = verify_request(&broker.router, &nonce, "10.1.1.1").await;
        assert_eq!(verify.status(), 200);

        // Nothing may arrive, even past the hub's 3s subscriber wait.
        let result = timeout(Duration::from_millis(3500), ws.next()).await;
        assert!(result.is_err(), "no frame expected without proximity");
    }

    #[tokio::test]
    async fn test_unsafe_verdict_not_pushed() {
        let broker = default_broker();
        let addr = spawn_server(&broker).await;

        let nonce = init_session(&broker.router, "https://evil.com/login").await;
        proximity_request(&broker.router, &nonce, Some("uuid-evil"), true, true).await;
        let mut ws = ws_connect(addr, &nonce).await;

        let verify = verify_request(&broker.router, &nonce, "10.1.1.1").await;
        assert_eq!(verify.status(), 200);

        let result = timeout(Duration::from_millis(3500), ws.next()).await;
        assert!(result.is_err(), "no frame expected for UNSAFE verdict");
    }

    #[tokio::test]
    async fn test_late_subscriber_still_receives_within_wait() {
        let broker = default_broker();
        let addr = spawn_server(&broker).await;

        let nonce = init_session(&broker.router, "https://gov.pl").await;
        proximity_request(&broker.router, &nonce, Some("uuid-late"), true, true).await;

        // Verify first; connect the socket half a second into the wait.
        let verify = verify_request(&broker.router, &nonce, "10.1.1.1").await;
        assert_eq!(verify.status(), 200);
        tokio::time::sleep(Duration::from_millis(500)).await;

        let mut ws = ws_connect(addr, &nonce).await;
        let frame = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("late subscriber should still be served")
            .unwrap()
            .unwrap();
        assert!(frame
            .into_text()
            .unwrap()
            .as_str()
            .contains("verification_success"));
    }

    #[tokio::test]
    async fn test_ping_answered_with_pong() {
        let broker = default_broker();
        let addr = spawn_server(&broker).await;

        let nonce = init_session(&broker.router, "https://gov.pl").await;
        let mut ws = ws_connect(addr, &nonce).await;

        ws.send(Message::Text("ping".into())).await.unwrap();
        let frame = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("pong")
            .unwrap()
            .unwrap();
        assert_eq!(frame.into_text().unwrap().as_str(), "pong");
    }

    #[tokio::test]
    async fn test_unknown_session_closed_with_policy_code() {
        let broker = default_broker();
        let addr = spawn_server(&broker).await;

        let mut ws = ws_connect(addr, "deadbeef-0000-4000-8000-000000000000").await;
        let frame = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("close frame")
            .unwrap()
            .unwrap();
        match frame {
            Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 1008),
            other => panic!("expected close frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_nonce_closed_with_policy_code() {
        let broker = default_broker();
        let addr = spawn_server(&broker).await;

        let mut ws = ws_connect(addr, "zzz").await;
        let frame = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("close frame")
            .unwrap()
            .unwrap();
        match frame {
            Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 1008),
            other => panic!("expected close frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_same_ip_peer_is_refused() {
        let broker = default_broker();
        let addr = spawn_server(&broker).await;

        // The browser initialized the session from 127.0.0.1, the same
        // address the test socket will connect from.
        let response = init_request(&broker.router, "https://gov.pl", "127.0.0.1").await;
        let body = body_json(response).await;
        let nonce = body["nonce"].as_str().unwrap().to_string();

        let mut ws = ws_connect(addr, &nonce).await;
        let frame = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("close frame")
            .unwrap()
            .unwrap();
        match frame {
            Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 1008),
            other => panic!("expected close frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_same_ip_guard_relaxed_by_test_flag() {
        let mut config = broker_gateway::BrokerConfig::default();
        config.relax_ws_ip_guard = true;
        let broker = test_broker(config);
        let addr = spawn_server(&broker).await;

        let response = init_request(&broker.router, "https://gov.pl", "127.0.0.1").await;
        let body = body_json(response).await;
        let nonce = body["nonce"].as_str().unwrap().to_string();

        let mut ws = ws_connect(addr, &nonce).await;
        ws.send(Message::Text("ping".into())).await.unwrap();
        let frame = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("pong expected, socket should be accepted")
            .unwrap()
            .unwrap();
        assert_eq!(frame.into_text().unwrap().as_str(), "pong");
    }

    #[tokio::test]
    async fn test_sixth_socket_on_channel_refused() {
        let broker = default_broker();
        let addr = spawn_server(&broker).await;

        let nonce = init_session(&broker.router, "https://gov.pl").await;
        let mut sockets = Vec::new();
        for _ in 0..5 {
            sockets.push(ws_connect(addr, &nonce).await);
        }
        // Registration happens in the per-connection task after the upgrade.
        for _ in 0..50 {
            if broker.hub.subscriber_count(&nonce) == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(broker.hub.subscriber_count(&nonce), 5);

        let mut sixth = ws_connect(addr, &nonce).await;
        let frame = timeout(Duration::from_secs(2), sixth.next())
            .await
            .expect("close frame")
            .unwrap()
            .unwrap();
        match frame {
            Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 1008),
            other => panic!("expected close frame, got {:?}", other),
        }
    }
}
