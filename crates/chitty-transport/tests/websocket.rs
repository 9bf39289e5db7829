//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on an OS-assigned port and talk to it
//! over loopback, so they exercise the actual upgrade, framing and close
//! handshake.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use chitty_transport::{
        ClientWebSocketConnection, Connection, Transport, Upgrade,
        WebSocketTransport,
    };

    /// Binds a transport on `127.0.0.1:0` and returns it with its URL.
    async fn bind() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("should have addr");
        (transport, format!("ws://{addr}"))
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (mut transport, url) = bind().await;

        let server_handle = tokio::spawn(async move {
            transport
                .accept()
                .await
                .expect("should accept")
                .upgrade()
                .await
                .expect("should upgrade")
        });

        let client = ClientWebSocketConnection::connect(&url)
            .await
            .expect("client should connect");
        let server_conn = server_handle.await.expect("task should complete");

        assert!(server_conn.id().into_inner() > 0);
        assert_ne!(server_conn.id(), client.id());

        // --- Server sends, client receives ---
        server_conn
            .send(b"hello from server")
            .await
            .expect("send should succeed");
        let received = client.recv().await.expect("recv").expect("data");
        assert_eq!(received, b"hello from server");

        // --- Client sends, server receives ---
        client.send(b"hello from client").await.expect("send");
        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, b"hello from client");

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (mut transport, url) = bind().await;

        let server_handle = tokio::spawn(async move {
            transport
                .accept()
                .await
                .expect("should accept")
                .upgrade()
                .await
                .expect("should upgrade")
        });

        let client = ClientWebSocketConnection::connect(&url).await.expect("connect");
        let server_conn = server_handle.await.unwrap();

        client.close().await.expect("client close");

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_send_not_blocked_by_pending_recv() {
        // A chat session is parked in recv() almost all of the time; other
        // clients' broadcasts still have to get through send().
        let (mut transport, url) = bind().await;

        let server_handle = tokio::spawn(async move {
            transport
                .accept()
                .await
                .expect("should accept")
                .upgrade()
                .await
                .expect("should upgrade")
        });
        let client = ClientWebSocketConnection::connect(&url).await.expect("connect");
        let server_conn = Arc::new(server_handle.await.unwrap());

        let reader = Arc::clone(&server_conn);
        let pending = tokio::spawn(async move { reader.recv().await });

        // Give the reader time to take the read lock.
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(
            Duration::from_secs(1),
            server_conn.send(b"broadcast"),
        )
        .await
        .expect("send must not wait for recv")
        .expect("send should succeed");

        let got = client.recv().await.expect("recv").expect("data");
        assert_eq!(got, b"broadcast");

        client.send(b"reply").await.expect("send");
        let echoed = pending.await.unwrap().expect("recv").expect("data");
        assert_eq!(echoed, b"reply");
    }

    #[tokio::test]
    async fn test_websocket_accept_not_held_up_by_silent_peer() {
        let (mut transport, url) = bind().await;
        let addr = transport.local_addr().unwrap();

        // Connects at the TCP level and never sends the upgrade request.
        let _silent = tokio::net::TcpStream::connect(addr).await.expect("tcp connect");
        let stalled = tokio::time::timeout(Duration::from_secs(1), transport.accept())
            .await
            .expect("accept must not wait for the upgrade")
            .expect("should accept");
        assert_eq!(stalled.peer_addr().ip(), addr.ip());

        let next = tokio::spawn(async move {
            transport
                .accept()
                .await
                .expect("should accept")
                .upgrade()
                .await
                .expect("should upgrade")
        });
        let client = ClientWebSocketConnection::connect(&url).await.expect("connect");
        let server_conn = tokio::time::timeout(Duration::from_secs(1), next)
            .await
            .expect("second peer must not wait behind the silent one")
            .unwrap();
        assert_ne!(server_conn.id(), client.id());

        let upgrade = tokio::time::timeout(Duration::from_millis(100), stalled.upgrade()).await;
        assert!(upgrade.is_err(), "silent peer never completes the upgrade");
    }
}
