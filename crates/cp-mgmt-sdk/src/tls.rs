// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Certificate fingerprint pinning.
//!
//! Management servers usually run with self-signed certificates, so chain
//! validation is replaced by comparing the SHA-1 fingerprint of the end-entity
//! certificate with the one the user trusted.

use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::error::{Result, SdkError};

/// SHA-1 fingerprint of a DER certificate, as colon separated upper-case hex.
pub fn fingerprint_of(der: &[u8]) -> String {
    Sha1::digest(der)
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Strip separators and case so differently formatted fingerprints compare equal.
pub fn normalize_fingerprint(fingerprint: &str) -> String {
    fingerprint
        .chars()
        .filter(|c| *c != ':' && *c != '-' && !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

pub fn fingerprints_match(a: &str, b: &str) -> bool {
    normalize_fingerprint(a) == normalize_fingerprint(b)
}

/// Verifier that accepts exactly one certificate, identified by fingerprint.
///
/// With no fingerprint any certificate is accepted; handshake signatures are
/// still checked against the presented key.
#[derive(Debug)]
pub struct PinnedCertVerifier {
    fingerprint: Option<String>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl PinnedCertVerifier {
    pub fn new(fingerprint: Option<String>, provider: &CryptoProvider) -> Self {
        Self {
            fingerprint: fingerprint.filter(|fp| !fp.is_empty()),
            algorithms: provider.signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for PinnedCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        let Some(expected) = &self.fingerprint else {
            return Ok(ServerCertVerified::assertion());
        };

        let presented = fingerprint_of(end_entity.as_ref());
        if fingerprints_match(expected, &presented) {
            Ok(ServerCertVerified::assertion())
        } else {
            debug!(expected = %expected, presented = %presented, "certificate fingerprint mismatch");
            Err(rustls::Error::General(format!(
                "server certificate fingerprint {} does not match {}",
                presented, expected
            )))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// rustls client config whose only trust anchor is the pinned fingerprint.
pub fn pinned_client_config(fingerprint: Option<String>) -> Result<rustls::ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = PinnedCertVerifier::new(fingerprint, &provider);

    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();

    Ok(config)
}

/// Complete a TLS handshake with the server and fingerprint its certificate.
///
/// Connects directly, never through the proxy.
pub fn probe_fingerprint(server: &str, port: u16, timeout: Duration) -> Result<String> {
    let timeout = (!timeout.is_zero()).then_some(timeout);

    let server_name = ServerName::try_from(server.to_string())
        .map_err(|e| SdkError::Tls(format!("invalid server name {}: {}", server, e)))?;
    let config = pinned_client_config(None)?;
    let mut conn = rustls::ClientConnection::new(Arc::new(config), server_name)?;

    let addr = (server, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| SdkError::Transport(format!("could not resolve {}", server)))?;
    let mut sock = match timeout {
        Some(t) => TcpStream::connect_timeout(&addr, t)?,
        None => TcpStream::connect(addr)?,
    };
    sock.set_read_timeout(timeout)?;
    sock.set_write_timeout(timeout)?;

    while conn.is_handshaking() {
        conn.complete_io(&mut sock)?;
    }

    let cert = conn
        .peer_certificates()
        .and_then(|certs| certs.first())
        .ok_or_else(|| SdkError::Tls(format!("{} presented no certificate", server)))?;

    let fingerprint = fingerprint_of(cert.as_ref());
    debug!(server = %server, fingerprint = %fingerprint, "probed server fingerprint");
    conn.send_close_notify();
    let _ = conn.complete_io(&mut sock);

    Ok(fingerprint)
}
