//! TLS connection handling using rustls.

use std::fs::File;
use std::io::BufReader;
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

use crate::config::TlsConfig;
use crate::error::{ClientError, Result};

/// A TLS-wrapped TCP stream. The handshake completes on first I/O.
pub type TlsStream = StreamOwned<ClientConnection, TcpStream>;

/// Wrap an open TCP stream in a TLS session for `host`.
pub fn connect(tcp_stream: TcpStream, config: &TlsConfig, host: &str) -> Result<TlsStream> {
    let tls_config = build_client_config(config)?;
    let server_name = server_name(config, host)?;

    let conn = ClientConnection::new(Arc::new(tls_config), server_name)
        .map_err(|e| ClientError::Tls(e.to_string()))?;

    Ok(StreamOwned::new(conn, tcp_stream))
}

fn server_name(config: &TlsConfig, host: &str) -> Result<ServerName<'static>> {
    let name = config.server_name.as_deref().unwrap_or(host);
    ServerName::try_from(name.to_string())
        .map_err(|_| ClientError::Tls(format!("Invalid server name: {}", name)))
}

/// Build a rustls ClientConfig from our TlsConfig.
pub fn build_client_config(config: &TlsConfig) -> Result<ClientConfig> {
    // Handle insecure mode (accept any certificate)
    if config.accept_invalid_certs {
        return Ok(build_insecure_config());
    }

    let mut root_store = RootCertStore::empty();

    if let Some(ca_path) = &config.ca_cert {
        for cert in load_certs(ca_path, "CA cert")? {
            root_store
                .add(cert)
                .map_err(|e| ClientError::Tls(format!("Failed to add CA cert: {}", e)))?;
        }
    } else {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    let builder = ClientConfig::builder().with_root_certificates(root_store);

    // Load client certificate for mutual TLS if provided
    let tls_config = if let (Some(cert_path), Some(key_path)) =
        (&config.client_cert, &config.client_key)
    {
        let certs = load_certs(cert_path, "client cert")?;

        let key_file = File::open(key_path)
            .map_err(|e| ClientError::Tls(format!("Failed to open client key: {}", e)))?;
        let mut key_reader = BufReader::new(key_file);
        let key = rustls_pemfile::private_key(&mut key_reader)
            .map_err(|e| ClientError::Tls(format!("Failed to parse client key: {}", e)))?
            .ok_or_else(|| ClientError::Tls("No private key found in file".to_string()))?;

        builder
            .with_client_auth_cert(certs, key)
            .map_err(|e| ClientError::Tls(format!("Failed to configure client auth: {}", e)))?
    } else {
        builder.with_no_client_auth()
    };

    Ok(tls_config)
}

fn load_certs(path: &Path, what: &str) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)
        .map_err(|e| ClientError::Tls(format!("Failed to open {}: {}", what, e)))?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| ClientError::Tls(format!("Failed to parse {}: {}", what, e)))?;
    if certs.is_empty() {
        return Err(ClientError::Tls(format!(
            "No certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

/// Danger: A certificate verifier that accepts any certificate.
/// Only use for testing with self-signed certificates.
mod danger {
    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::{DigitallySignedStruct, Error, SignatureScheme};

    #[derive(Debug)]
    pub struct NoCertificateVerification;

    impl ServerCertVerifier for NoCertificateVerification {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> std::result::Result<ServerCertVerified, Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> std::result::Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> std::result::Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            vec![
                SignatureScheme::RSA_PKCS1_SHA256,
                SignatureScheme::RSA_PKCS1_SHA384,
                SignatureScheme::RSA_PKCS1_SHA512,
                SignatureScheme::ECDSA_NISTP256_SHA256,
                SignatureScheme::ECDSA_NISTP384_SHA384,
                SignatureScheme::ECDSA_NISTP521_SHA512,
                SignatureScheme::RSA_PSS_SHA256,
                SignatureScheme::RSA_PSS_SHA384,
                SignatureScheme::RSA_PSS_SHA512,
                SignatureScheme::ED25519,
            ]
        }
    }
}

/// Build an insecure TLS config that accepts any certificate.
fn build_insecure_config() -> ClientConfig {
    ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(danger::NoCertificateVerification))
        .with_no_client_auth()
}
