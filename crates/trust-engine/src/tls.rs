//! Capture-only TLS handshake.
//!
//! The broker needs the certificate chain a server actually presents, even
//! when that chain is expired, revoked, or issued for the wrong host; those
//! are exactly the cases downstream checks must see. The client config
//! therefore installs a verifier that asserts success for every chain;
//! nothing from this handshake is ever treated as validated.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use crate::ports::ChainSource;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Fetches the presented certificate chain of a TLS server.
pub struct ChainFetcher {
    connector: TlsConnector,
}

impl ChainFetcher {
    pub fn new() -> Self {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = rustls::ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map(|builder| {
                builder
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
                    .with_no_client_auth()
            })
            .unwrap_or_else(|_| {
                // Default protocol versions are always supported by the ring
                // provider; this branch is unreachable in practice.
                unreachable!("ring provider supports default TLS versions")
            });
        Self {
            connector: TlsConnector::from(Arc::new(config)),
        }
    }

    /// Open a TCP+TLS connection with SNI `hostname` and return the chain
    /// the server presented, leaf first. Empty on any failure.
    pub async fn fetch_chain(&self, hostname: &str, port: u16) -> Vec<Vec<u8>> {
        let server_name = match ServerName::try_from(hostname.to_string()) {
            Ok(name) => name,
            Err(e) => {
                warn!(hostname = hostname, error = %e, "Invalid SNI name");
                return Vec::new();
            }
        };

        let stream = match timeout(CONNECT_TIMEOUT, TcpStream::connect((hostname, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!(hostname = hostname, port = port, error = %e, "TCP connect failed");
                return Vec::new();
            }
            Err(_) => {
                warn!(hostname = hostname, port = port, "TCP connect timed out");
                return Vec::new();
            }
        };

        let tls = match timeout(CONNECT_TIMEOUT, self.connector.connect(server_name, stream)).await
        {
            Ok(Ok(tls)) => tls,
            Ok(Err(e)) => {
                warn!(hostname = hostname, error = %e, "TLS handshake failed");
                return Vec::new();
            }
            Err(_) => {
                warn!(hostname = hostname, "TLS handshake timed out");
                return Vec::new();
            }
        };

        let (_, session) = tls.get_ref();
        let chain: Vec<Vec<u8>> = session
            .peer_certificates()
            .map(|certs| certs.iter().map(|c| c.as_ref().to_vec()).collect())
            .unwrap_or_default();
        debug!(hostname = hostname, certs = chain.len(), "Captured certificate chain");
        chain
    }
}

impl Default for ChainFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainSource for ChainFetcher {
    async fn fetch_chain(&self, hostname: &str, port: u16) -> Vec<Vec<u8>> {
        ChainFetcher::fetch_chain(self, hostname, port).await
    }
}

/// Verifier that accepts every server chain.
///
/// Signature checks still run so the handshake itself is well-formed; only
/// chain validation is skipped.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<rustls::crypto::CryptoProvider>,
}

impl rustls::client::danger::ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp: &[u8],
        _now: UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
