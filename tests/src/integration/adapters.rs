//! # Adapter Flows
//!
//! The bundled adapters wired together: echo listeners over the loopback
//! handler, the port allocator, file-based configuration and metrics.

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use vnet_protocol::{
        ConfigProvider, EchoListener, IncapableHandler, LoopbackProtocolHandler, NetworkError,
        PortAllocator, SendOptions, TomlConfigProvider, CLOSE_REASON_FINALIZER,
    };

    use crate::integration::support::{loopback_protocol, protocol_with, RecordingHandler};

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file
    }

    // =========================================================================
    // INTEGRATION TESTS: ECHO
    // =========================================================================

    #[tokio::test]
    async fn test_echo_round_trip() {
        let protocol = loopback_protocol().await;
        let server = protocol.bind("/echo").await.unwrap();
        let echo = Arc::new(EchoListener::new());
        server.add_listener(echo.clone()).await.unwrap();

        let client = protocol.bind("/client/").await.unwrap();
        let conn = client
            .connect("/echo", Arc::new(IncapableHandler))
            .await
            .unwrap();

        for packet in ["one", "two", "three"] {
            let ack = conn.send(packet, SendOptions::default()).await.unwrap();
            assert_eq!(ack, packet);
        }

        conn.close().await.unwrap();
        assert!(echo.handler().closed_reason().is_some());
    }

    #[tokio::test]
    async fn test_echo_sees_finalizer_on_revoke() {
        let protocol = loopback_protocol().await;
        let server = protocol.bind("/echo").await.unwrap();
        let echo = Arc::new(EchoListener::new());
        server.add_listener(echo.clone()).await.unwrap();

        let client = protocol.bind("/client").await.unwrap();
        let mine = RecordingHandler::acking(b"");
        client.connect("/echo", mine.clone()).await.unwrap();

        client.revoke().await.unwrap();

        assert_eq!(
            echo.handler().closed_reason().as_deref(),
            Some(CLOSE_REASON_FINALIZER)
        );
        assert_eq!(mine.close_count(), 1);
        // The server keeps listening.
        let other = protocol.bind("/other").await.unwrap();
        assert!(other
            .connect("/echo", Arc::new(IncapableHandler))
            .await
            .is_ok());
    }

    // =========================================================================
    // INTEGRATION TESTS: ALLOCATOR
    // =========================================================================

    #[tokio::test]
    async fn test_allocated_ports_connect() {
        let protocol = loopback_protocol().await;
        let allocator = PortAllocator::new(protocol.clone());

        let transfer = allocator
            .allocate_custom_ibc_port(Some("transfer"))
            .await
            .unwrap();
        transfer
            .add_listener(Arc::new(EchoListener::new()))
            .await
            .unwrap();
        let controller = allocator.allocate_ica_controller_port().await.unwrap();

        let conn = controller
            .connect("/ibc-port/custom-transfer", Arc::new(IncapableHandler))
            .await
            .unwrap();
        let ack = conn.send("packet", SendOptions::default()).await.unwrap();

        assert_eq!(ack, "packet");
        assert_eq!(controller.local_address(), "/ibc-port/icacontroller-1");
    }

    #[tokio::test]
    async fn test_allocating_bound_name_returns_same_port() {
        let protocol = loopback_protocol().await;
        let allocator = PortAllocator::new(protocol.clone());

        let first = allocator
            .allocate_custom_local_port(Some("svc"))
            .await
            .unwrap();
        let second = protocol.bind("/local/custom-svc").await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_allocator_rejects_bad_names() {
        let protocol = loopback_protocol().await;
        let allocator = PortAllocator::new(protocol);

        let result = allocator.allocate_custom_ibc_port(Some("no/slashes")).await;
        assert!(matches!(result, Err(NetworkError::InvalidPortName(_))));
    }

    // =========================================================================
    // INTEGRATION TESTS: CONFIGURATION
    // =========================================================================

    #[tokio::test]
    async fn test_toml_config_drives_handler_and_allocator() {
        let file = config_file(
            r#"
            [loopback]
            instance_prefix = "inst/"

            [allocator]
            ibc_port_prefix = "/chain/"
            port_name_max_len = 16
            "#,
        );
        let provider = TomlConfigProvider::load(file.path()).unwrap();
        let config = provider.network_config();

        let protocol = protocol_with(
            "configured",
            Arc::new(LoopbackProtocolHandler::with_config(&config)),
        )
        .await;
        let allocator = PortAllocator::from_provider(protocol.clone(), &provider);

        let server = allocator
            .allocate_custom_ibc_port(Some("transfer"))
            .await
            .unwrap();
        assert_eq!(server.local_address(), "/chain/custom-transfer");
        server
            .add_listener(Arc::new(EchoListener::new()))
            .await
            .unwrap();

        let client = protocol.bind("/client").await.unwrap();
        let conn = client
            .connect("/chain/custom-transfer", Arc::new(IncapableHandler))
            .await
            .unwrap();
        assert!(conn.local_address().starts_with("/client/inst/"));
        assert!(conn.remote_address().starts_with("/chain/custom-transfer/inst/"));

        let too_long = "x".repeat(17);
        assert!(allocator
            .allocate_custom_ibc_port(Some(&too_long))
            .await
            .is_err());
    }

    // =========================================================================
    // INTEGRATION TESTS: METRICS
    // =========================================================================

    #[tokio::test]
    async fn test_connections_are_counted() {
        vnet_telemetry::register_metrics().unwrap();

        let protocol = loopback_protocol().await;
        let server = protocol.bind("/metered").await.unwrap();
        server
            .add_listener(Arc::new(EchoListener::new()))
            .await
            .unwrap();
        let client = protocol.bind("/client").await.unwrap();
        client
            .connect("/metered", Arc::new(IncapableHandler))
            .await
            .unwrap();

        let output = vnet_telemetry::gather_metrics().unwrap();
        assert!(output.contains("vnet_ports_bound_total"));
        assert!(output.contains("vnet_connections_opened_total{path=\"loopback\"}"));
    }
}
