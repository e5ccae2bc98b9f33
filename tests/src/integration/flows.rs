//! # Integration Test Flows
//!
//! End-to-end flows through the public protocol API:
//!
//! 1. Bind: idempotent binding and generated port ids
//! 2. Listen: last-wins listener replacement
//! 3. Inbound: most specific prefix, consummated exactly once
//! 4. Connect: loopback fast path and remote negotiation
//! 5. Send: acks, close while a send is pending
//! 6. Revoke: teardown of everything a port owns

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use vnet_protocol::{
        AcceptOptions, ConnectionHandler, IncapableHandler, InboundResolution, NetworkError,
        RevokeState, SendOptions, CLOSE_REASON_FINALIZER,
    };

    use crate::integration::support::{
        loopback_protocol, protocol_with, CountingProtocol, FixedListener, GatedHandler,
        RecordingHandler, RecordingListener,
    };

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn incapable() -> Arc<dyn ConnectionHandler> {
        Arc::new(IncapableHandler)
    }

    // =========================================================================
    // INTEGRATION TESTS: BIND
    // =========================================================================

    #[tokio::test]
    async fn test_bind_same_address_returns_same_port() {
        let protocol = loopback_protocol().await;

        let first = protocol.bind("/x").await.unwrap();
        let second = protocol.bind("/x").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.id(), second.id());
    }

    #[tokio::test]
    async fn test_concurrent_binds_share_one_port() {
        let protocol = loopback_protocol().await;

        let binds = (0..8).map(|_| protocol.bind("/shared"));
        let ports = futures::future::join_all(binds).await;

        let first = ports[0].as_ref().unwrap().clone();
        for port in ports {
            assert_eq!(port.unwrap(), first);
        }
    }

    #[tokio::test]
    async fn test_underspecified_binds_get_distinct_ids() {
        let protocol = loopback_protocol().await;

        let a = protocol.bind("/svc/").await.unwrap();
        let b = protocol.bind("/svc/").await.unwrap();

        assert_ne!(a, b);
        assert!(a.local_address().starts_with("/svc/"));
        assert!(b.local_address().starts_with("/svc/"));
        assert_ne!(a.local_address(), b.local_address());
    }

    // =========================================================================
    // INTEGRATION TESTS: LISTEN
    // =========================================================================

    #[tokio::test]
    async fn test_replacement_listener_wins() {
        let protocol = loopback_protocol().await;
        let server = protocol.bind("/server").await.unwrap();
        let old = RecordingListener::acking(b"old");
        let new = RecordingListener::acking(b"new");

        server.add_listener(old.clone()).await.unwrap();
        server.add_listener(new.clone()).await.unwrap();
        assert_eq!(old.remove_count(), 1);

        let client = protocol.bind("/client").await.unwrap();
        let conn = client.connect("/server", incapable()).await.unwrap();
        let ack = conn.send("hello", SendOptions::default()).await.unwrap();

        assert_eq!(&ack[..], b"new");
        assert!(old.accepted().is_empty());
        assert_eq!(new.accepted().len(), 1);
    }

    #[tokio::test]
    async fn test_removed_listener_stops_accepting() {
        let protocol = loopback_protocol().await;
        let server = protocol.bind("/server").await.unwrap();
        let listener = RecordingListener::acking(b"ack");
        server.add_listener(listener.clone()).await.unwrap();

        server.remove_listener(listener.clone()).await.unwrap();
        assert_eq!(listener.remove_count(), 1);

        let client = protocol.bind("/client").await.unwrap();
        let result = client.connect("/server", incapable()).await;
        assert!(matches!(result, Err(NetworkError::UnknownListener(_))));
    }

    // =========================================================================
    // INTEGRATION TESTS: INBOUND
    // =========================================================================

    #[tokio::test]
    async fn test_inbound_goes_to_most_specific_listener() {
        let protocol = loopback_protocol().await;
        let broad = RecordingListener::acking(b"a");
        let narrow = RecordingListener::acking(b"ab");
        protocol
            .bind("/a")
            .await
            .unwrap()
            .add_listener(broad.clone())
            .await
            .unwrap();
        protocol
            .bind("/a/b")
            .await
            .unwrap()
            .add_listener(narrow.clone())
            .await
            .unwrap();

        let attempt = protocol
            .protocol_impl()
            .inbound("/a/b/c", "/peer")
            .await
            .unwrap();
        assert!(attempt.local_address().starts_with("/a/b/"));

        attempt.accept(AcceptOptions::new(incapable())).await.unwrap();
        assert_eq!(narrow.accepted().len(), 1);
        assert!(broad.accepted().is_empty());
    }

    #[tokio::test]
    async fn test_inbound_without_listener_is_not_found() {
        let protocol = loopback_protocol().await;

        let resolution = protocol
            .protocol_impl()
            .resolve_inbound("/nobody/home", "/peer")
            .await
            .unwrap();

        assert!(matches!(
            resolution,
            InboundResolution::NotFound(NetworkError::NoListener(_))
        ));
    }

    #[tokio::test]
    async fn test_attempt_consummated_exactly_once() {
        let protocol = loopback_protocol().await;
        let listener = RecordingListener::acking(b"ack");
        protocol
            .bind("/server")
            .await
            .unwrap()
            .add_listener(listener.clone())
            .await
            .unwrap();

        let attempt = protocol
            .protocol_impl()
            .inbound("/server", "/peer")
            .await
            .unwrap();
        attempt.accept(AcceptOptions::new(incapable())).await.unwrap();

        assert!(attempt.is_consummated());
        assert!(matches!(
            attempt.accept(AcceptOptions::new(incapable())).await,
            Err(NetworkError::AlreadyConsummated(_))
        ));
        assert!(matches!(
            attempt.close().await,
            Err(NetworkError::AlreadyConsummated(_))
        ));
        assert_eq!(listener.accepted().len(), 1);
        assert_eq!(listener.reject_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_attempt_is_rejected_once() {
        let protocol = loopback_protocol().await;
        let listener = RecordingListener::acking(b"ack");
        protocol
            .bind("/server")
            .await
            .unwrap()
            .add_listener(listener.clone())
            .await
            .unwrap();

        let attempt = protocol
            .protocol_impl()
            .inbound("/server", "/peer")
            .await
            .unwrap();
        attempt.close().await.unwrap();

        assert_eq!(listener.reject_count(), 1);
        assert!(attempt.accept(AcceptOptions::new(incapable())).await.is_err());
        assert!(listener.accepted().is_empty());
    }

    // =========================================================================
    // INTEGRATION TESTS: CONNECT
    // =========================================================================

    #[tokio::test]
    async fn test_loopback_fast_path_skips_negotiation() {
        let handler = CountingProtocol::loopback();
        let protocol = protocol_with("loopback", handler.clone()).await;

        let x = protocol.bind("/x").await.unwrap();
        let listener = RecordingListener::acking(b"pong");
        x.add_listener(listener.clone()).await.unwrap();

        let y = protocol.bind("/y").await.unwrap();
        let mine = RecordingHandler::acking(b"");
        let conn = y.connect("/x", mine.clone()).await.unwrap();

        let ack = conn.send("ping", SendOptions::default()).await.unwrap();

        assert_eq!(&ack[..], b"pong");
        assert_eq!(handler.connect_count(), 0);
        assert_eq!(listener.handler().received(), vec!["ping"]);
        assert_eq!(listener.handler().open_count(), 1);
        assert_eq!(mine.open_count(), 1);
        assert!(conn.local_address().starts_with("/y/"));
        assert!(conn.remote_address().starts_with("/x/"));
    }

    #[tokio::test]
    async fn test_both_sides_can_send() {
        let protocol = loopback_protocol().await;
        let server = protocol.bind("/server").await.unwrap();
        let listener = RecordingListener::acking(b"from-server");
        server.add_listener(listener.clone()).await.unwrap();

        let client = protocol.bind("/client").await.unwrap();
        let mine = RecordingHandler::acking(b"from-client");
        let conn = client.connect("/server", mine.clone()).await.unwrap();

        let peer = conn.peer();
        let ack = peer.send("reply", SendOptions::default()).await.unwrap();

        assert_eq!(&ack[..], b"from-client");
        assert_eq!(mine.received(), vec!["reply"]);
        assert_eq!(peer.remote_address(), conn.local_address());
    }

    #[tokio::test]
    async fn test_negotiated_connection_uses_remote_handler() {
        let remote = RecordingHandler::acking(b"remote-ack");
        let handler = CountingProtocol::negotiating(remote.clone());
        let protocol = protocol_with("negotiating", handler.clone()).await;

        let port = protocol.bind("/local").await.unwrap();
        let conn = port.connect("/far", incapable()).await.unwrap();
        let ack = tokio::time::timeout(TIMEOUT, conn.send("data", SendOptions::default()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(handler.connect_count(), 1);
        assert_eq!(conn.local_address(), "/local/remote/1");
        assert_eq!(conn.remote_address(), "/far");
        assert_eq!(&ack[..], b"remote-ack");
        assert_eq!(remote.received(), vec!["data"]);
        assert_eq!(port.open_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_negotiation_surfaces_handler_error() {
        let handler = CountingProtocol::loopback();
        let protocol = protocol_with("loopback", handler.clone()).await;
        let port = protocol.bind("/local").await.unwrap();

        let result = port.connect("/nowhere", incapable()).await;

        assert_eq!(handler.connect_count(), 1);
        assert!(matches!(result, Err(NetworkError::UnknownListener(_))));
        assert_eq!(port.open_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_address_fails_without_negotiation() {
        let handler = CountingProtocol::loopback();
        let protocol = protocol_with("loopback", handler.clone()).await;
        let port = protocol.bind("/local").await.unwrap();

        let result = port.connect("", incapable()).await;

        assert!(matches!(result, Err(NetworkError::InvalidAddress(_))));
        assert_eq!(handler.connect_count(), 0);
    }

    // =========================================================================
    // INTEGRATION TESTS: SEND AND CLOSE
    // =========================================================================

    #[tokio::test]
    async fn test_close_rejects_pending_send() {
        let gate = Arc::new(GatedHandler::default());
        let protocol = protocol_with("gated", CountingProtocol::negotiating(gate.clone())).await;
        let port = protocol.bind("/local").await.unwrap();
        let conn = port.connect("/far", incapable()).await.unwrap();

        let sender = conn.clone();
        let pending =
            tokio::spawn(async move { sender.send("held", SendOptions::default()).await });
        tokio::time::timeout(TIMEOUT, gate.entered.notified())
            .await
            .unwrap();

        conn.close().await.unwrap();

        let result = tokio::time::timeout(TIMEOUT, pending)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(NetworkError::ConnectionClosed)));
        assert!(conn.is_closed());
        gate.release.notify_one();
    }

    #[tokio::test]
    async fn test_close_rejects_pending_loopback_send() {
        let protocol = loopback_protocol().await;
        let gate = Arc::new(GatedHandler::default());
        let x = protocol.bind("/x").await.unwrap();
        x.add_listener(FixedListener::new(gate.clone())).await.unwrap();
        let y = protocol.bind("/y").await.unwrap();
        let conn = y.connect("/x", incapable()).await.unwrap();

        let sender = conn.clone();
        let pending =
            tokio::spawn(async move { sender.send("ping", SendOptions::default()).await });
        tokio::time::timeout(TIMEOUT, gate.entered.notified())
            .await
            .unwrap();

        conn.close().await.unwrap();
        gate.release.notify_one();

        let result = tokio::time::timeout(TIMEOUT, pending)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(NetworkError::ConnectionClosed)));
        assert!(matches!(
            conn.send("again", SendOptions::default()).await,
            Err(NetworkError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_close_notifies_each_side_once() {
        let protocol = loopback_protocol().await;
        let server = protocol.bind("/server").await.unwrap();
        let listener = RecordingListener::acking(b"ack");
        server.add_listener(listener.clone()).await.unwrap();
        let client = protocol.bind("/client").await.unwrap();
        let mine = RecordingHandler::acking(b"");

        let conn = client.connect("/server", mine.clone()).await.unwrap();
        conn.close().await.unwrap();

        assert!(matches!(
            conn.close().await,
            Err(NetworkError::ConnectionClosed)
        ));
        assert!(matches!(
            conn.peer().close().await,
            Err(NetworkError::ConnectionClosed)
        ));
        assert!(matches!(
            conn.send("late", SendOptions::default()).await,
            Err(NetworkError::ConnectionClosed)
        ));
        assert_eq!(mine.close_count(), 1);
        assert_eq!(listener.handler().close_count(), 1);
        assert_eq!(server.open_count(), 0);
        assert_eq!(client.open_count(), 0);
    }

    // =========================================================================
    // INTEGRATION TESTS: REVOKE
    // =========================================================================

    #[tokio::test]
    async fn test_revoke_tears_down_port() {
        let protocol = loopback_protocol().await;
        let server = protocol.bind("/server").await.unwrap();
        let listener = RecordingListener::acking(b"ack");
        server.add_listener(listener.clone()).await.unwrap();

        let client = protocol.bind("/client").await.unwrap();
        let first = RecordingHandler::acking(b"");
        let second = RecordingHandler::acking(b"");
        let a = client.connect("/server", first.clone()).await.unwrap();
        let b = client.connect("/server", second.clone()).await.unwrap();
        assert_eq!(server.open_count(), 2);

        let summary = server.revoke().await.unwrap();

        assert_eq!(summary.closed, 2);
        assert_eq!(summary.failed, 0);
        assert!(summary.listener_removed);
        assert_eq!(server.revoke_state(), RevokeState::Revoked);
        assert!(a.is_closed());
        assert!(b.is_closed());
        assert_eq!(first.close_reasons(), vec![Some(CLOSE_REASON_FINALIZER.to_string())]);
        assert_eq!(second.close_count(), 1);
        assert_eq!(listener.handler().close_count(), 2);
        assert_eq!(listener.remove_count(), 1);

        assert!(matches!(
            server.revoke().await,
            Err(NetworkError::AlreadyRevoked(_))
        ));
        assert!(matches!(
            client.connect("/server", incapable()).await,
            Err(NetworkError::UnknownListener(_))
        ));
    }

    #[tokio::test]
    async fn test_revoked_port_rejects_operations() {
        let protocol = loopback_protocol().await;
        let port = protocol.bind("/gone").await.unwrap();
        port.revoke().await.unwrap();

        assert!(matches!(
            port.add_listener(RecordingListener::acking(b"")).await,
            Err(NetworkError::PortRevoked(_))
        ));
        assert!(matches!(
            port.connect("/anywhere", incapable()).await,
            Err(NetworkError::PortRevoked(_))
        ));

        let rebound = protocol.bind("/gone").await.unwrap();
        assert_ne!(rebound, port);
        assert_eq!(rebound.revoke_state(), RevokeState::NotRevoked);
    }
}
