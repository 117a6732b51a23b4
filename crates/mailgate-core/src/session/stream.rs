//! Stream types for mail server connections.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use super::ConnectionError;

/// Upper bound for TCP connect plus TLS handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// A stream that can be either plaintext or TLS.
#[derive(Debug)]
pub enum MailStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl MailStream {
    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for MailStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MailStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Accepts any server certificate while still checking handshake signatures.
///
/// Only installed for endpoints with `accept_invalid_certs` set.
#[derive(Debug)]
struct AcceptInvalidCerts(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptInvalidCerts {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

/// Creates a TLS connector.
///
/// Uses the bundled web PKI roots unless `accept_invalid_certs` is set, in
/// which case certificate chains and host names are not checked.
///
/// # Errors
///
/// Returns an error if the TLS configuration cannot be built.
pub fn create_tls_connector(accept_invalid_certs: bool) -> Result<TlsConnector, ConnectionError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| ConnectionError::Tls(e.to_string()))?;

    let config = if accept_invalid_certs {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptInvalidCerts(provider)))
            .with_no_client_auth()
    } else {
        let root_store = rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        builder
            .with_root_certificates(root_store)
            .with_no_client_auth()
    };

    Ok(TlsConnector::from(Arc::new(config)))
}

async fn connect_tcp(host: &str, port: u16) -> Result<TcpStream, ConnectionError> {
    TcpStream::connect((host, port))
        .await
        .map_err(|source| ConnectionError::Connect {
            host: host.to_string(),
            port,
            source,
        })
}

/// Opens a TCP connection, bounded by [`CONNECT_TIMEOUT`].
pub(crate) async fn open_tcp(host: &str, port: u16) -> Result<TcpStream, ConnectionError> {
    tokio::time::timeout(CONNECT_TIMEOUT, connect_tcp(host, port))
        .await
        .map_err(|_| ConnectionError::Timeout(format!("{host}:{port}")))?
}

/// Runs the TLS handshake on an already connected socket.
///
/// Used directly after connecting for implicit TLS and after a successful
/// STARTTLS exchange.
///
/// # Errors
///
/// Returns an error if the host is not a valid server name or the
/// handshake fails or takes longer than [`CONNECT_TIMEOUT`].
pub async fn upgrade_tls(
    tcp: TcpStream,
    host: &str,
    accept_invalid_certs: bool,
) -> Result<MailStream, ConnectionError> {
    let connector = create_tls_connector(accept_invalid_certs)?;
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| ConnectionError::Tls(format!("invalid server name {host}: {e}")))?;

    let tls = tokio::time::timeout(CONNECT_TIMEOUT, connector.connect(server_name, tcp))
        .await
        .map_err(|_| ConnectionError::Timeout(host.to_string()))?
        .map_err(|e| ConnectionError::Tls(e.to_string()))?;

    Ok(MailStream::Tls(Box::new(tls)))
}

/// Connects to a server with TLS from the start.
///
/// # Errors
///
/// Returns an error if the TCP connection or the TLS handshake fails, or if
/// both together take longer than [`CONNECT_TIMEOUT`].
pub async fn connect_tls(
    host: &str,
    port: u16,
    accept_invalid_certs: bool,
) -> Result<MailStream, ConnectionError> {
    let connect = async {
        let tcp = connect_tcp(host, port).await?;
        upgrade_tls(tcp, host, accept_invalid_certs).await
    };

    tokio::time::timeout(CONNECT_TIMEOUT, connect)
        .await
        .map_err(|_| ConnectionError::Timeout(format!("{host}:{port}")))?
}

/// Connects to a server without TLS.
///
/// # Errors
///
/// Returns an error if the TCP connection fails or times out.
pub async fn connect_plain(host: &str, port: u16) -> Result<MailStream, ConnectionError> {
    Ok(MailStream::Plain(open_tcp(host, port).await?))
}
