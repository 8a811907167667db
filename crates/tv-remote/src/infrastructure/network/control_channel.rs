//! WebSocket control channel over `tokio-tungstenite`.
//!
//! [`TungsteniteConnector`] opens the TCP connection itself so the connect
//! timeout and the upgrade timeout can be applied separately, then upgrades it
//! with `client_async_tls_with_config`.  `wss://` URLs are wrapped in TLS
//! using a rustls client config whose verifier accepts any certificate: the
//! TVs present a self-signed certificate that no root store can validate.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    client_async_tls_with_config,
    tungstenite::{Error as WsError, Message},
    Connector, MaybeTlsStream, WebSocketStream,
};
use tracing::debug;
use tv_remote_core::{HandshakeError, SessionConfig};

use crate::application::session::{ChannelConnector, ControlChannel, TransportError};

/// [`ChannelConnector`] backed by `tokio-tungstenite`.
pub struct TungsteniteConnector {
    tls: Arc<rustls::ClientConfig>,
}

impl TungsteniteConnector {
    /// Builds the connector and its TLS configuration.
    ///
    /// # Errors
    ///
    /// Returns the rustls error if no safe protocol version is available for
    /// the `ring` provider.
    pub fn new() -> Result<Self, rustls::Error> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let tls = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(InsecureCertVerifier))
            .with_no_client_auth();
        Ok(Self { tls: Arc::new(tls) })
    }
}

#[async_trait]
impl ChannelConnector for TungsteniteConnector {
    async fn open(
        &self,
        url: &str,
        config: &SessionConfig,
    ) -> Result<Box<dyn ControlChannel>, HandshakeError> {
        let addr = config.endpoint();
        let tcp = match tokio::time::timeout(config.connect_timeout, TcpStream::connect(&addr)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                debug!("TCP connect to {addr} failed: {e}");
                return Err(HandshakeError::from_io(&e));
            }
            Err(_) => return Err(HandshakeError::TimedOut),
        };
        if let Err(e) = tcp.set_nodelay(true) {
            debug!("could not set TCP_NODELAY: {e}");
        }

        let connector = url
            .starts_with("wss://")
            .then(|| Connector::Rustls(Arc::clone(&self.tls)));

        let upgrade = client_async_tls_with_config(url, tcp, None, connector);
        let (stream, response) = match tokio::time::timeout(config.handshake_timeout, upgrade).await
        {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => return Err(classify(e)),
            Err(_) => return Err(HandshakeError::TimedOut),
        };
        debug!("WebSocket upgrade to {addr} answered {}", response.status());

        Ok(Box::new(WebSocketChannel { stream }))
    }
}

fn classify(err: WsError) -> HandshakeError {
    match err {
        WsError::Io(e) => HandshakeError::from_io(&e),
        other => HandshakeError::Transport(other.to_string()),
    }
}

/// An upgraded control channel.
struct WebSocketChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl ControlChannel for WebSocketChannel {
    async fn recv_text(&mut self) -> Result<Option<String>, TransportError> {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Text(text)) => return Ok(Some(text)),
                Ok(Message::Binary(bytes)) => {
                    return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Ok(Message::Close(_)) => return Ok(None),
                // Ping/pong are answered by tungstenite itself.
                Ok(_) => continue,
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return Ok(None),
                Err(e) => return Err(TransportError::Receive(e.to_string())),
            }
        }
        Ok(None)
    }

    async fn send_text(&mut self, frame: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(frame))
            .await
            .map_err(|e| match e {
                WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
                other => TransportError::Send(other.to_string()),
            })
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("error closing control channel: {e}");
        }
    }
}

// ── TLS verifier ──────────────────────────────────────────────────────────────

/// Certificate verifier that accepts every server certificate.
#[derive(Debug)]
struct InsecureCertVerifier;

impl rustls::client::danger::ServerCertVerifier for InsecureCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[test]
    fn test_new_builds_tls_config() {
        assert!(TungsteniteConnector::new().is_ok());
    }

    #[test]
    fn test_classify_io_error_uses_os_classification() {
        let err = WsError::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        assert_eq!(classify(err), HandshakeError::TimedOut);
    }

    #[test]
    fn test_classify_protocol_error_is_transport() {
        assert!(matches!(
            classify(WsError::ConnectionClosed),
            HandshakeError::Transport(_)
        ));
    }

    #[tokio::test]
    async fn test_open_refused_port_is_transport_error() {
        // Arrange: grab a free port, then release it so nothing listens.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let config = SessionConfig::new("127.0.0.1")
            .with_port(port)
            .with_timeout(Duration::from_millis(500));
        let connector = TungsteniteConnector::new().unwrap();

        // Act
        let result = connector
            .open(&format!("ws://127.0.0.1:{port}/"), &config)
            .await;

        // Assert
        assert!(matches!(result, Err(HandshakeError::Transport(_))));
    }

    #[tokio::test]
    async fn test_open_times_out_when_server_never_upgrades() {
        // Arrange: accept the TCP connection but never answer the upgrade.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(socket);
        });
        let config = SessionConfig::new("127.0.0.1")
            .with_port(port)
            .with_timeout(Duration::from_millis(100));
        let connector = TungsteniteConnector::new().unwrap();

        // Act
        let result = connector
            .open(&format!("ws://127.0.0.1:{port}/"), &config)
            .await;

        // Assert
        assert!(matches!(result, Err(HandshakeError::TimedOut)));
        server.abort();
    }
}
