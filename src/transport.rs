//! Byte stream establishment.
//!
//! The engine never opens sockets itself; it asks a [`Connector`] for a
//! stream. [`TcpConnector`] is the production implementation (TCP with
//! keepalive, optionally wrapped in TLS). Tests substitute an in-memory
//! connector.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::rustls;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

/// Any duplex byte stream the engine can frame lines over.
pub trait IrcStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> IrcStream for T {}

/// A boxed [`IrcStream`].
pub type BoxedStream = Box<dyn IrcStream>;

/// Opens the stream for a connection attempt.
pub trait Connector: Send + Sync + 'static {
    /// Connect to `host:port`, negotiating TLS when `tls` is set.
    /// `verify` controls certificate verification.
    fn connect(
        &self,
        host: &str,
        port: u16,
        tls: bool,
        verify: bool,
    ) -> BoxFuture<'static, Result<BoxedStream>>;
}

/// TCP connector with optional TLS via rustls.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect(
        &self,
        host: &str,
        port: u16,
        tls: bool,
        verify: bool,
    ) -> BoxFuture<'static, Result<BoxedStream>> {
        let host = host.to_owned();
        Box::pin(async move {
            let stream = TcpStream::connect((host.as_str(), port)).await?;
            if let Err(e) = enable_keepalive(&stream) {
                warn!("failed to enable TCP keepalive: {}", e);
            }
            debug!(%host, port, tls, "TCP connected");

            if !tls {
                return Ok(Box::new(stream) as BoxedStream);
            }

            let config = if verify {
                verified_config()
            } else {
                warn!(%host, "TLS certificate verification disabled");
                insecure_config()
            };
            let server_name = rustls::pki_types::ServerName::try_from(host.clone())
                .map_err(|e| ClientError::Tls(format!("invalid server name {host}: {e}")))?;
            let stream = TlsConnector::from(Arc::new(config))
                .connect(server_name, stream)
                .await
                .map_err(|e| ClientError::Tls(format!("handshake with {host} failed: {e}")))?;
            debug!(%host, "TLS handshake complete");
            Ok(Box::new(stream) as BoxedStream)
        })
    }
}

fn enable_keepalive(stream: &TcpStream) -> io::Result<()> {
    use socket2::{SockRef, TcpKeepalive};

    let sock = SockRef::from(stream);
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(120))
        .with_interval(Duration::from_secs(30));

    sock.set_tcp_keepalive(&keepalive)
}

fn verified_config() -> rustls::ClientConfig {
    let roots = rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth()
}

fn insecure_config() -> rustls::ClientConfig {
    rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(InsecureVerifier))
        .with_no_client_auth()
}

/// Accepts any server certificate.
#[derive(Debug)]
struct InsecureVerifier;

impl rustls::client::danger::ServerCertVerifier for InsecureVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::CryptoProvider::get_default()
            .map(|p| p.signature_verification_algorithms.supported_schemes())
            .unwrap_or_default()
    }
}
