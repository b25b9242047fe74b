// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use clap::Parser;
use dnsman::{
    config::{DnsManagerConfiguration, ProviderDefinition, RemoteAccessServerConfig},
    constants::{
        HEALTHZ_PATH, METRICS_SERVER_PATH, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY, TOKIO_WORKER_THREADS,
    },
    handlers::{self, mock::InMemoryAccounts},
    metrics,
    provider::{
        account::{AccountMap, DnsAccount, DnsAccountConfig},
        registry::DnsHandlerRegistry,
        DnsHandler, DnsHandlerFactory, Properties,
    },
    remote::server::{self, ClientCertAuthorizer, DynamicCertResolver, RemoteAccessServer},
};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    runtime::{watcher, WatchStreamExt},
    Api, Client,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Resource version used for certificates read from files
const FILE_CERT_VERSION: &str = "file";

#[derive(Debug, Parser)]
#[command(name = "dnsman", version, about = "DNS provider manager with remote provider access")]
struct Args {
    /// Path of the YAML configuration
    #[arg(long, env = "DNSMAN_CONFIG", default_value = "/etc/dnsman/config.yaml")]
    config: PathBuf,

    /// Listen address of the metrics and health endpoints
    #[arg(long, env = "DNSMAN_METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: SocketAddr,

    /// Namespace of the server certificate secret if the configuration names none
    #[arg(long, env = "POD_NAMESPACE", default_value = "default")]
    namespace: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("dnsman")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

fn init_tracing() {
    // RUST_LOG selects the level (default info), RUST_LOG_FORMAT=json switches to JSON lines
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(args: Args) -> Result<()> {
    init_tracing();
    info!(config = %args.config.display(), "Starting DNS manager");

    let config = Arc::new(DnsManagerConfiguration::load(&args.config)?);

    let mut registry = DnsHandlerRegistry::new();
    handlers::register_all(&mut registry, Arc::new(InMemoryAccounts::new()));
    let registry = Arc::new(registry);
    let accounts = AccountMap::new(DnsAccountConfig::new(
        Arc::clone(&registry) as Arc<dyn DnsHandlerFactory>,
        Arc::clone(&config),
    ));

    let client = if needs_kubernetes(&config) {
        debug!("Initializing Kubernetes client");
        Some(Client::try_default().await.context("failed to create Kubernetes client")?)
    } else {
        None
    };

    let remote = config.remote_access.as_ref().map(|remote_config| {
        Arc::new(RemoteAccessServer::from_config(
            remote_config,
            Arc::new(ClientCertAuthorizer),
        ))
    });

    let mut loaded: Vec<(String, Arc<DnsAccount>)> = Vec::new();
    for definition in &config.providers {
        match load_provider(definition, &registry, &accounts, client.as_ref()).await {
            Ok(account) => {
                info!(
                    namespace = %definition.namespace,
                    provider = %definition.name,
                    account = %account.hash(),
                    "Provider loaded"
                );
                if let Some(server) = &remote {
                    server
                        .provider_updated_event(
                            &definition.namespace,
                            &definition.name,
                            definition.remote_access,
                            Arc::clone(&account) as Arc<dyn DnsHandler>,
                        )
                        .await;
                }
                loaded.push((definition.object_key(), account));
            }
            Err(err) => error!(
                namespace = %definition.namespace,
                provider = %definition.name,
                "Failed to load provider: {err:#}"
            ),
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let remote_task = match (remote, config.remote_access.clone()) {
        (Some(server), Some(remote_config)) => {
            let resolver = Arc::new(DynamicCertResolver::new());
            install_server_certificate(
                &remote_config,
                &args.namespace,
                client.clone(),
                Arc::clone(&resolver),
            )
            .await?;
            let mut rx = shutdown_rx.clone();
            let shutdown = async move {
                let _ = rx.changed().await;
            };
            Some(tokio::spawn(run_remote_access(
                remote_config,
                server,
                resolver,
                shutdown,
            )))
        }
        _ => None,
    };

    tokio::select! {
        result = serve_metrics(args.metrics_addr) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
        }
        () = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    if let Some(task) = remote_task {
        match task.await {
            Ok(result) => result?,
            Err(err) => error!("Remote access server task failed: {err}"),
        }
    }
    for (object_key, account) in &loaded {
        accounts.release(account, object_key);
    }
    info!("DNS manager stopped");
    Ok(())
}

fn needs_kubernetes(config: &DnsManagerConfiguration) -> bool {
    config.providers.iter().any(|p| p.secret_name.is_some())
        || config
            .remote_access
            .as_ref()
            .is_some_and(|remote| remote.server_secret_name.is_some())
}

/// Validates a provider definition and returns its account.
async fn load_provider(
    definition: &ProviderDefinition,
    registry: &DnsHandlerRegistry,
    accounts: &AccountMap,
    client: Option<&Client>,
) -> Result<Arc<DnsAccount>> {
    let mut properties = definition.properties.clone();
    if let Some(secret_name) = &definition.secret_name {
        let client = client.context("Kubernetes client required for provider secrets")?;
        let secret = Api::<Secret>::namespaced(client.clone(), &definition.namespace)
            .get(secret_name)
            .await
            .with_context(|| format!("failed to read secret {}/{secret_name}", definition.namespace))?;
        properties.extend(secret_properties(&secret));
    }

    let adapter = registry
        .get_dns_handler_adapter(&definition.provider_type)
        .with_context(|| format!("unknown provider type {}", definition.provider_type))?;
    adapter.validate_credentials_and_provider_config(&properties, definition.provider_config.as_ref())?;

    let provider_config = definition.provider_config_bytes();
    Ok(accounts.get(
        &definition.object_key(),
        &definition.provider_type,
        &properties,
        provider_config.as_deref(),
    )?)
}

/// Secret data as provider properties. Non UTF-8 bytes are replaced.
fn secret_properties(secret: &Secret) -> Properties {
    secret
        .data
        .iter()
        .flatten()
        .map(|(key, value)| (key.clone(), String::from_utf8_lossy(&value.0).into_owned()))
        .collect()
}

/// Installs the certificate of a TLS secret, returns true if it was new.
fn install_secret(resolver: &DynamicCertResolver, secret: &Secret) -> bool {
    let Some(data) = secret.data.as_ref() else {
        warn!("Server certificate secret has no data");
        return false;
    };
    let (Some(cert), Some(key)) = (data.get(TLS_CERT_KEY), data.get(TLS_PRIVATE_KEY_KEY)) else {
        warn!("Server certificate secret misses {TLS_CERT_KEY} or {TLS_PRIVATE_KEY_KEY}");
        return false;
    };
    let version = secret.metadata.resource_version.as_deref().unwrap_or_default();
    resolver.update(version, &cert.0, &key.0)
}

/// Loads the server certificate from files, or starts watching its secret.
async fn install_server_certificate(
    config: &RemoteAccessServerConfig,
    default_namespace: &str,
    client: Option<Client>,
    resolver: Arc<DynamicCertResolver>,
) -> Result<()> {
    if let Some(secret_name) = config.server_secret_name.clone() {
        let client = client.context("Kubernetes client required for the server certificate secret")?;
        let namespace = config
            .server_secret_namespace
            .clone()
            .unwrap_or_else(|| default_namespace.to_string());
        tokio::spawn(async move {
            if let Err(err) = watch_server_secret(client, &namespace, &secret_name, resolver).await {
                error!(%namespace, secret = %secret_name, "Server certificate watch stopped: {err:#}");
            }
        });
        return Ok(());
    }

    let (Some(cert_file), Some(key_file)) = (&config.server_cert_file, &config.server_key_file) else {
        anyhow::bail!("remote access needs serverSecretName or serverCertFile and serverKeyFile");
    };
    let cert_pem = tokio::fs::read(cert_file)
        .await
        .with_context(|| format!("failed to read {cert_file}"))?;
    let key_pem = tokio::fs::read(key_file)
        .await
        .with_context(|| format!("failed to read {key_file}"))?;
    if !resolver.update(FILE_CERT_VERSION, &cert_pem, &key_pem) {
        anyhow::bail!("invalid server certificate in {cert_file}");
    }
    Ok(())
}

async fn watch_server_secret(
    client: Client,
    namespace: &str,
    name: &str,
    resolver: Arc<DynamicCertResolver>,
) -> Result<()> {
    info!(namespace, secret = name, "Watching server certificate secret");
    let api = Api::<Secret>::namespaced(client, namespace);
    let config = watcher::Config::default().fields(&format!("metadata.name={name}"));
    let mut stream = watcher(api, config).applied_objects().boxed();
    while let Some(event) = stream.next().await {
        match event {
            Ok(secret) => {
                install_secret(&resolver, &secret);
            }
            Err(err) => warn!(namespace, secret = name, "Secret watch error: {err}"),
        }
    }
    Ok(())
}

async fn run_remote_access(
    config: RemoteAccessServerConfig,
    server: Arc<RemoteAccessServer>,
    resolver: Arc<DynamicCertResolver>,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let client_ca = tokio::fs::read(&config.server_ca_file)
        .await
        .with_context(|| format!("failed to read client CA {}", config.server_ca_file))?;
    let tls = server::tls::server_tls_config(resolver, &client_ca)?;
    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind remote access port {}", config.port))?;
    let cleanup = server.spawn_token_cleanup();
    let result = server::serve_tls(server, listener, tls, shutdown).await;
    cleanup.abort();
    result
}

async fn serve_metrics(addr: SocketAddr) -> Result<()> {
    let app = Router::new()
        .route(HEALTHZ_PATH, get(healthz))
        .route(METRICS_SERVER_PATH, get(metrics_text));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind metrics address {addr}"))?;
    info!(%addr, "Metrics server listening");
    axum::serve(listener, app).await.context("metrics server failed")
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics_text() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(text) => (StatusCode::OK, text),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(err) => {
                warn!("Cannot install SIGTERM handler: {err}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
