// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Remote access server.
//!
//! # Modules
//!
//! - [`logs`] - Collection of handler logs for the caller
//! - [`service`] - The gRPC service and provider registration
//! - [`state`] - Per namespace handlers, tokens and locks
//! - [`tls`] - Mutual TLS and rotating server certificates

pub mod logs;
pub mod service;
pub mod state;
pub mod tls;

pub use service::{to_status, RemoteAccessServer};
pub use tls::{
    AllowAllNamespaces, ClientCertAuthorizer, DynamicCertResolver, NamespaceAuthorizer,
};

use crate::remote::proto::remote_provider_server::RemoteProviderServer;
use anyhow::{Context, Result};
use rustls::ServerConfig;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::info;

/// Serves the remote access service with mutual TLS until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the gRPC server fails.
pub async fn serve_tls(
    server: Arc<RemoteAccessServer>,
    listener: TcpListener,
    tls: ServerConfig,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let addr = listener.local_addr().context("listener has no local address")?;
    info!(%addr, "Remote access server listening");
    let incoming = tls::tls_incoming(listener, TlsAcceptor::from(Arc::new(tls)));
    tonic::transport::Server::builder()
        .add_service(RemoteProviderServer::from_arc(server))
        .serve_with_incoming_shutdown(incoming, shutdown)
        .await
        .context("remote access server failed")
}
