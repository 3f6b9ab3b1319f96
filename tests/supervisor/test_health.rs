//! Unit tests for `HealthProbe`
//!
//! Tests the probe against a minimal local HTTP responder

use std::time::Duration;

use kodegen_agent_fleet::supervisor::{HealthProbe, HealthStatus};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve one canned HTTP response per connection, forever
async fn serve(status_line: &'static str, body: &'static str) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    port
}

#[tokio::test]
async fn test_healthy_response() {
    let port = serve("200 OK", r#"{"status":"ok"}"#).await;
    let probe =
        HealthProbe::new(format!("http://127.0.0.1:{port}/health"), Duration::from_secs(5))
            .unwrap();

    let status = probe.check().await;
    assert_eq!(
        status,
        HealthStatus::Healthy {
            status: Some("ok".to_string())
        }
    );
    assert!(status.is_healthy());
}

#[tokio::test]
async fn test_error_status_is_unhealthy() {
    let port = serve("503 Service Unavailable", "{}").await;
    let probe =
        HealthProbe::new(format!("http://127.0.0.1:{port}/health"), Duration::from_secs(5))
            .unwrap();

    match probe.check().await {
        HealthStatus::Unhealthy { reason } => assert!(reason.contains("503")),
        other => panic!("expected unhealthy, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_refused_is_unhealthy() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let probe =
        HealthProbe::new(format!("http://127.0.0.1:{port}/health"), Duration::from_secs(2))
            .unwrap();

    assert!(!probe.check().await.is_healthy());
    assert!(probe.url().ends_with("/health"));
}
