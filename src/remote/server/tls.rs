// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Mutual TLS of the remote access server.
//!
//! The serving certificate comes from a `kubernetes.io/tls` secret and can be
//! rotated while the server runs. [`DynamicCertResolver`] keeps the certificates
//! of earlier secret versions while they are still valid, so clients that
//! picked up the old certificate keep working during a rotation.
//!
//! Clients must present a certificate signed by the configured CA. The first
//! label of its common name names the namespace the client may log in to, or
//! `*` for all namespaces.

use crate::dns_errors::RemoteError;
use arc_swap::ArcSwap;
use chrono::Utc;
use futures::Stream;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::{ClientHello, ResolvesServerCert, WebPkiClientVerifier};
use rustls::sign::CertifiedKey;
use rustls::{RootCertStore, ServerConfig};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

const TLS_HANDSHAKE_TIMEOUT_SECS: u64 = 10;
const TLS_ACCEPT_QUEUE: usize = 64;

fn tls_error(reason: impl std::fmt::Display) -> RemoteError {
    RemoteError::Tls {
        reason: reason.to_string(),
    }
}

fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Parses all certificates of a PEM bundle.
///
/// # Errors
///
/// Returns [`RemoteError::Tls`] if the bundle is malformed or empty.
pub fn parse_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, RemoteError> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| tls_error(format!("invalid certificate PEM: {e}")))?;
    if certs.is_empty() {
        return Err(tls_error("no certificate found in PEM"));
    }
    Ok(certs)
}

/// Builds a signing certificate chain from PEM encoded certificate and key.
///
/// # Errors
///
/// Returns [`RemoteError::Tls`] if either part cannot be parsed.
pub fn load_certified_key(cert_pem: &[u8], key_pem: &[u8]) -> Result<CertifiedKey, RemoteError> {
    let certs = parse_certificates(cert_pem)?;
    let key = PrivateKeyDer::from_pem_slice(key_pem)
        .map_err(|e| tls_error(format!("invalid private key PEM: {e}")))?;
    let signing_key = rustls::crypto::ring::sign::any_supported_type(&key).map_err(tls_error)?;
    Ok(CertifiedKey::new(certs, signing_key))
}

fn is_expired(key: &CertifiedKey) -> bool {
    key.cert.first().is_none_or(|der| {
        x509_parser::parse_x509_certificate(der)
            .map(|(_, cert)| cert.validity().not_after.timestamp() <= Utc::now().timestamp())
            .unwrap_or(true)
    })
}

/// Server certificate resolver that can be updated at runtime.
#[derive(Debug, Default)]
pub struct DynamicCertResolver {
    certificates: ArcSwap<Vec<Arc<CertifiedKey>>>,
    last_version: Mutex<Option<String>>,
}

impl DynamicCertResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the certificate of secret version `resource_version`.
    ///
    /// Updates with an already seen version are ignored. Still valid
    /// certificates of earlier versions are kept behind the new one. If the new
    /// material cannot be parsed the current certificates stay in place.
    /// Returns true if a new certificate was installed.
    pub fn update(&self, resource_version: &str, cert_pem: &[u8], key_pem: &[u8]) -> bool {
        {
            let mut last = self.last_version.lock().unwrap_or_else(PoisonError::into_inner);
            if last.as_deref() == Some(resource_version) {
                return false;
            }
            *last = Some(resource_version.to_string());
        }
        match load_certified_key(cert_pem, key_pem) {
            Ok(key) => {
                let mut certificates = vec![Arc::new(key)];
                for old in self.certificates.load().iter() {
                    if old.cert != certificates[0].cert && !is_expired(old) {
                        certificates.push(Arc::clone(old));
                    }
                }
                info!(
                    version = resource_version,
                    retained = certificates.len() - 1,
                    "New server certificate installed"
                );
                self.certificates.store(Arc::new(certificates));
                true
            }
            Err(err) => {
                warn!(version = resource_version, "Keeping current server certificate: {err}");
                false
            }
        }
    }

    /// Number of certificates currently served.
    #[must_use]
    pub fn len(&self) -> usize {
        self.certificates.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResolvesServerCert for DynamicCertResolver {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        self.certificates.load().first().cloned()
    }
}

/// TLS configuration requiring client certificates signed by `client_ca_pem`.
///
/// # Errors
///
/// Returns [`RemoteError::Tls`] if the CA bundle is unusable.
pub fn server_tls_config(
    resolver: Arc<DynamicCertResolver>,
    client_ca_pem: &[u8],
) -> Result<ServerConfig, RemoteError> {
    let mut roots = RootCertStore::empty();
    for cert in parse_certificates(client_ca_pem)? {
        roots.add(cert).map_err(tls_error)?;
    }
    let provider = crypto_provider();
    let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider))
        .build()
        .map_err(tls_error)?;
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(tls_error)?
        .with_client_cert_verifier(verifier)
        .with_cert_resolver(resolver);
    config.alpn_protocols = vec![b"h2".to_vec()];
    Ok(config)
}

/// Accepts TCP connections and completes their TLS handshake.
///
/// Every handshake runs on its own task, so a connection that stalls during
/// the handshake does not hold back the others. Failed handshakes are logged
/// and skipped. Accepting stops once the returned stream is dropped.
///
/// Must be called within a tokio runtime.
pub fn tls_incoming(
    listener: TcpListener,
    acceptor: TlsAcceptor,
) -> impl Stream<Item = std::io::Result<TlsStream<TcpStream>>> {
    let (tx, rx) = mpsc::channel(TLS_ACCEPT_QUEUE);
    tokio::spawn(async move {
        loop {
            let accepted = tokio::select! {
                () = tx.closed() => return,
                accepted = listener.accept() => accepted,
            };
            let (tcp, peer) = match accepted {
                Ok(conn) => conn,
                Err(err) => {
                    if tx.send(Err(err)).await.is_err() {
                        return;
                    }
                    continue;
                }
            };
            let acceptor = acceptor.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let handshake = tokio::time::timeout(
                    Duration::from_secs(TLS_HANDSHAKE_TIMEOUT_SECS),
                    acceptor.accept(tcp),
                );
                match handshake.await {
                    Ok(Ok(tls)) => {
                        // Receiver gone means the server stopped
                        let _ = tx.send(Ok(tls)).await;
                    }
                    Ok(Err(err)) => warn!(%peer, "TLS handshake failed: {err}"),
                    Err(_) => warn!(%peer, "TLS handshake timed out"),
                }
            });
        }
    });
    ReceiverStream::new(rx)
}

/// Common name of a DER encoded certificate.
#[must_use]
pub fn common_name(der: &[u8]) -> Option<String> {
    let (_, cert) = x509_parser::parse_x509_certificate(der).ok()?;
    let cn = cert.subject().iter_common_name().next()?;
    cn.as_str().ok().map(str::to_string)
}

/// Decides whether a caller may access a namespace.
pub trait NamespaceAuthorizer: Send + Sync {
    /// # Errors
    ///
    /// Returns the reason the caller is rejected.
    fn authorize(
        &self,
        namespace: &str,
        peer_certs: Option<&[CertificateDer<'static>]>,
    ) -> Result<(), RemoteError>;
}

/// Checks the common name of the verified client certificate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClientCertAuthorizer;

impl NamespaceAuthorizer for ClientCertAuthorizer {
    fn authorize(
        &self,
        namespace: &str,
        peer_certs: Option<&[CertificateDer<'static>]>,
    ) -> Result<(), RemoteError> {
        let leaf = peer_certs
            .and_then(<[_]>::first)
            .ok_or(RemoteError::MissingClientCertificate)?;
        let cn = common_name(leaf).unwrap_or_default();
        let first_label = cn.split('.').next().unwrap_or_default();
        if first_label == namespace || first_label == "*" {
            return Ok(());
        }
        Err(RemoteError::NamespaceMismatch {
            common_name: cn,
            namespace: namespace.to_string(),
        })
    }
}

/// Accepts every caller. Only for servers behind a trusted transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllNamespaces;

impl NamespaceAuthorizer for AllowAllNamespaces {
    fn authorize(
        &self,
        _namespace: &str,
        _peer_certs: Option<&[CertificateDer<'static>]>,
    ) -> Result<(), RemoteError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "tls_tests.rs"]
mod tls_tests;
