//! `TungsteniteConnector` against a real WebSocket server on loopback.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::{self, Message};
use tv_remote::application::session::{ChannelConnector, ControlChannel};
use tv_remote::infrastructure::network::control_channel::TungsteniteConnector;
use tv_remote_core::{protocol::CHANNEL_CONNECT_EVENT, RemoteCommand, SessionConfig};

/// Accepts one WebSocket client, sends `greeting`, and reports the first text
/// frame it receives.
async fn spawn_tv(greeting: String) -> (u16, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        ws.send(Message::Text(greeting)).await.unwrap();
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Text(text) = message {
                let _ = tx.send(text);
                break;
            }
        }
    });

    (port, rx)
}

/// Like [`spawn_tv`], but serves the WebSocket over TLS with a freshly
/// generated self-signed certificate, the way the TVs do on port 8002.
fn spawn_tls_tv(greeting: String) -> (u16, oneshot::Receiver<String>) {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert = certified.cert.der().clone();
    let key = rustls::pki_types::PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der());
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let tls = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert], key.into())
        .unwrap();
    let tls = Arc::new(tls);

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = oneshot::channel();

    std::thread::spawn(move || {
        let (tcp, _) = listener.accept().unwrap();
        let conn = rustls::ServerConnection::new(tls).unwrap();
        let Ok(mut ws) = tungstenite::accept(rustls::StreamOwned::new(conn, tcp)) else {
            return;
        };
        ws.send(Message::Text(greeting)).unwrap();
        loop {
            match ws.read() {
                Ok(Message::Text(text)) => {
                    let _ = tx.send(text);
                    break;
                }
                Ok(_) => continue,
                Err(_) => break,
            }
        }
    });

    (port, rx)
}

#[tokio::test]
async fn test_open_receives_greeting_and_delivers_command() {
    // Arrange
    let greeting = format!(r#"{{"event":"{CHANNEL_CONNECT_EVENT}","data":{{"token":"777"}}}}"#);
    let (port, received) = spawn_tv(greeting.clone()).await;
    let config = SessionConfig::new("127.0.0.1")
        .with_port(port)
        .with_timeout(Duration::from_secs(2));
    let connector = TungsteniteConnector::new().unwrap();
    let url = format!("ws://127.0.0.1:{port}/api/v2/channels/samsung.remote.control?name=dGVzdA==");

    // Act
    let mut channel = connector.open(&url, &config).await.unwrap();
    let first = channel.recv_text().await.unwrap();
    let command = RemoteCommand::click("KEY_MUTE").to_json().unwrap();
    channel.send_text(command.clone()).await.unwrap();

    // Assert
    assert_eq!(first.as_deref(), Some(greeting.as_str()));
    let delivered = tokio::time::timeout(Duration::from_secs(2), received)
        .await
        .expect("server must receive the command")
        .unwrap();
    assert_eq!(delivered, command);

    channel.close().await;
}

#[tokio::test]
async fn test_wss_open_accepts_self_signed_certificate() {
    // Arrange
    let greeting = format!(r#"{{"event":"{CHANNEL_CONNECT_EVENT}","data":{{"token":"888"}}}}"#);
    let (port, received) = spawn_tls_tv(greeting.clone());
    let config = SessionConfig::new("127.0.0.1")
        .with_port(port)
        .with_timeout(Duration::from_secs(2));
    let connector = TungsteniteConnector::new().unwrap();
    let url = format!("wss://127.0.0.1:{port}/api/v2/channels/samsung.remote.control?name=dGVzdA==");

    // Act
    let mut channel = connector
        .open(&url, &config)
        .await
        .expect("self-signed certificate must be accepted");
    let first = channel.recv_text().await.unwrap();
    let command = RemoteCommand::click("KEY_POWER").to_json().unwrap();
    channel.send_text(command.clone()).await.unwrap();

    // Assert
    assert_eq!(first.as_deref(), Some(greeting.as_str()));
    let delivered = tokio::time::timeout(Duration::from_secs(2), received)
        .await
        .expect("server must receive the command over TLS")
        .unwrap();
    assert_eq!(delivered, command);

    channel.close().await;
}
