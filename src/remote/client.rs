// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Remote provider client.
//!
//! [`RemoteHandler`] implements [`DnsHandler`] by calling a remote access
//! server. It logs in lazily, keeps the issued token and logs in again exactly
//! once when the server rejects the token. The per change states returned by
//! `Execute` are reported through the done handler of the change requests,
//! and the server's execution log is replayed into the local log sink.

use crate::constants::{
    BUSY, CURRENT_PROTOCOL_VERSION, INVALID_TOKEN, REMOTE_EXECUTE_TIMEOUT_SECS,
    REMOTE_GET_ZONES_TIMEOUT_SECS, TLS_CA_KEY, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY,
};
use crate::dns::{normalize_domain_name, DnsHostedZone, DnsSets};
use crate::dns_errors::{DnsError, ProviderError, RemoteError, Result, ThrottlingError};
use crate::provider::checks::{ChecksAdapter, DnsHandlerAdapterChecks, PropertyCheck};
use crate::provider::rate_limiter::RateLimiter;
use crate::provider::{
    validators, ChangeRequests, DnsHandler, DnsHandlerConfig, LogLevel, LogSink, Metrics,
    REQUEST_TYPE_DELETE_RECORDS, REQUEST_TYPE_LIST_RECORDS, REQUEST_TYPE_LIST_ZONES,
    REQUEST_TYPE_UPDATE_RECORDS,
};
use crate::remote::conversion::{marshal_change_request, unmarshal_dns_sets};
use crate::remote::proto::{self, remote_provider_client::RemoteProviderClient, ChangeState};
use crate::remote::server::tls::load_certified_key;
use async_trait::async_trait;
use chrono::DateTime;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Identity};
use tonic::{Code, Status};
use tracing::{debug, info};

pub const PROVIDER_TYPE: &str = "remote";

pub const PROPERTY_REMOTE_ENDPOINT: &str = "REMOTE_ENDPOINT";
pub const PROPERTY_SERVER_CA_CERT: &str = "SERVER_CA_CERT";
pub const PROPERTY_CLIENT_CERT: &str = "CLIENT_CERT";
pub const PROPERTY_CLIENT_KEY: &str = "CLIENT_KEY";
pub const PROPERTY_NAMESPACE: &str = "NAMESPACE";
pub const PROPERTY_OVERRIDE_SERVER_NAME: &str = "OVERRIDE_SERVER_NAME";

const PREFACE_ERROR: &str = "connection closed before server preface received";

/// Client id announced at login.
///
/// Uses the configured id, else the pod or host name from the environment,
/// else the system host name, else the process id.
#[must_use]
pub fn client_id(configured: Option<&str>) -> String {
    let non_empty = |s: String| {
        let s = s.trim().to_string();
        (!s.is_empty()).then_some(s)
    };
    configured
        .map(str::to_string)
        .and_then(non_empty)
        .or_else(|| std::env::var("POD_NAME").ok().and_then(non_empty))
        .or_else(|| std::env::var("HOSTNAME").ok().and_then(non_empty))
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok().and_then(non_empty))
        .unwrap_or_else(|| format!("pid-{}", std::process::id()))
}

fn transport_error(reason: impl std::fmt::Display) -> RemoteError {
    RemoteError::Transport {
        reason: reason.to_string(),
    }
}

/// Builds a lazily connecting channel to `endpoint`.
///
/// Endpoints without scheme use TLS. `http://` endpoints are plaintext.
fn connect(
    endpoint: &str,
    server_ca: Option<&str>,
    client_cert: &str,
    client_key: &str,
    override_server_name: Option<&str>,
) -> Result<Channel, RemoteError> {
    let uri = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}")
    };
    let mut channel = Endpoint::from_shared(uri.clone()).map_err(transport_error)?;
    if uri.starts_with("https://") {
        let mut tls = ClientTlsConfig::new().identity(Identity::from_pem(client_cert, client_key));
        tls = match server_ca {
            Some(ca) => tls.ca_certificate(Certificate::from_pem(ca)),
            None => tls.with_webpki_roots(),
        };
        if let Some(name) = override_server_name {
            tls = tls.domain_name(name);
        }
        channel = channel.tls_config(tls).map_err(|e| RemoteError::Tls {
            reason: e.to_string(),
        })?;
    }
    Ok(channel.connect_lazy())
}

fn is_invalid_token(status: &Status) -> bool {
    status.message().contains(INVALID_TOKEN)
}

#[derive(Clone, Debug)]
struct Session {
    token: String,
    protocol_version: i32,
}

/// Handler of the `remote` provider type.
pub struct RemoteHandler {
    client: RemoteProviderClient<Channel>,
    client_id: String,
    namespace: String,
    session: Mutex<Option<Session>>,
    metrics: Arc<dyn Metrics>,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl RemoteHandler {
    /// # Errors
    ///
    /// Returns an error if a required property is missing, the client
    /// certificate cannot be parsed or the endpoint is malformed.
    pub fn new(config: &DnsHandlerConfig) -> Result<Self> {
        let endpoint = config.get_required_property(PROPERTY_REMOTE_ENDPOINT, &["remoteEndpoint"])?;
        let server_ca = config.get_property(PROPERTY_SERVER_CA_CERT, &[TLS_CA_KEY]);
        let client_cert = config.get_required_property(PROPERTY_CLIENT_CERT, &[TLS_CERT_KEY])?;
        let client_key = config.get_required_property(PROPERTY_CLIENT_KEY, &[TLS_PRIVATE_KEY_KEY])?;
        let namespace = config.get_required_property(PROPERTY_NAMESPACE, &["namespace"])?;
        let override_server_name =
            config.get_property(PROPERTY_OVERRIDE_SERVER_NAME, &["overrideServerName"]);

        load_certified_key(client_cert.as_bytes(), client_key.as_bytes())?;
        info!(
            endpoint = %endpoint,
            namespace = %namespace,
            override_server_name = override_server_name.as_deref().unwrap_or_default(),
            "Creating remote handler"
        );
        let channel = connect(
            &endpoint,
            server_ca.as_deref(),
            &client_cert,
            &client_key,
            override_server_name.as_deref(),
        )?;

        Ok(Self {
            client: RemoteProviderClient::new(channel),
            client_id: client_id(config.global.remote_access_client_id.as_deref()),
            namespace,
            session: Mutex::new(None),
            metrics: Arc::clone(&config.metrics),
            rate_limiter: Arc::clone(&config.rate_limiter),
        })
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn current_session(&self) -> Option<Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn status_error(&self, status: &Status) -> DnsError {
        if is_invalid_token(status) {
            return RemoteError::InvalidToken {
                namespace: self.namespace.clone(),
            }
            .into();
        }
        match status.code() {
            Code::Unavailable if status.message() == BUSY => ProviderError::Busy.into(),
            Code::Unavailable if status.message() == PREFACE_ERROR => {
                transport_error(format!("{PREFACE_ERROR} (hint: certificate not valid?)")).into()
            }
            Code::Unavailable | Code::Unknown if status.message().contains("transport error") => {
                transport_error(status.message()).into()
            }
            Code::DeadlineExceeded | Code::Cancelled => transport_error(status.message()).into(),
            code => RemoteError::Status {
                code: format!("{code:?}"),
                message: status.message().to_string(),
            }
            .into(),
        }
    }

    async fn login(&self) -> Result<Session> {
        self.rate_limiter.accept().await;
        let response = self
            .client
            .clone()
            .login(proto::LoginRequest {
                namespace: self.namespace.clone(),
                client_id: self.client_id.clone(),
                client_protocol_version: CURRENT_PROTOCOL_VERSION,
            })
            .await
            .map_err(|status| self.status_error(&status))?
            .into_inner();
        let session = Session {
            token: response.token,
            protocol_version: response.server_protocol_version.min(CURRENT_PROTOCOL_VERSION),
        };
        debug!(namespace = %self.namespace, version = session.protocol_version, "Logged in to remote server");
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(session)
    }

    async fn session(&self) -> Result<Session> {
        match self.current_session() {
            Some(session) => Ok(session),
            None => self.login().await,
        }
    }

    /// Runs `call` with the current token, logging in again once if the
    /// server rejects it.
    async fn call_with_token<T, F, Fut>(&self, operation: &str, timeout_secs: u64, call: F) -> Result<T>
    where
        F: Fn(RemoteProviderClient<Channel>, Session) -> Fut,
        Fut: Future<Output = std::result::Result<T, Status>>,
    {
        let run = async {
            let session = self.session().await?;
            self.rate_limiter.accept().await;
            match call(self.client.clone(), session).await {
                Err(status) if is_invalid_token(&status) => {
                    info!(namespace = %self.namespace, "Token rejected by remote server, logging in again");
                    let session = self.login().await?;
                    self.rate_limiter.accept().await;
                    call(self.client.clone(), session)
                        .await
                        .map_err(|status| self.status_error(&status))
                }
                result => result.map_err(|status| self.status_error(&status)),
            }
        };
        tokio::time::timeout(Duration::from_secs(timeout_secs), run)
            .await
            .map_err(|_| ProviderError::Timeout {
                operation: operation.to_string(),
                seconds: timeout_secs,
            })?
    }
}

/// Worst state of a set of change responses with its error message.
///
/// Invalid beats failed beats throttled beats not processed beats succeeded.
/// Missing responses count as not processed.
fn aggregate_state(responses: &[proto::ChangeResponse], expected: usize) -> (ChangeState, String) {
    fn rank(state: ChangeState) -> u8 {
        match state {
            ChangeState::Succeeded => 0,
            ChangeState::NotProcessed => 1,
            ChangeState::Throttled => 2,
            ChangeState::Failed => 3,
            ChangeState::Invalid => 4,
        }
    }
    let mut worst = if responses.len() < expected {
        (ChangeState::NotProcessed, String::new())
    } else {
        (ChangeState::Succeeded, String::new())
    };
    for response in responses {
        let state = ChangeState::try_from(response.state).unwrap_or(ChangeState::NotProcessed);
        if rank(state) > rank(worst.0) {
            worst = (state, response.error_message.clone());
        }
    }
    worst
}

fn log_level(level: i32) -> LogLevel {
    match proto::LogEntryLevel::try_from(level) {
        Ok(proto::LogEntryLevel::Debug) => LogLevel::Debug,
        Ok(proto::LogEntryLevel::Warn) => LogLevel::Warn,
        Ok(proto::LogEntryLevel::Error) => LogLevel::Error,
        Ok(proto::LogEntryLevel::Info) | Err(_) => LogLevel::Info,
    }
}

fn replay_logs(log: &dyn LogSink, entries: &[proto::LogEntry]) {
    for entry in entries {
        let ts = DateTime::from_timestamp_nanos(entry.timestamp);
        log.log(log_level(entry.level), &format!("{} {}", ts.to_rfc3339(), entry.message));
    }
}

#[async_trait]
impl DnsHandler for RemoteHandler {
    fn provider_type(&self) -> &str {
        PROVIDER_TYPE
    }

    async fn get_zones(&self) -> Result<Vec<DnsHostedZone>> {
        let zones = self
            .call_with_token(REQUEST_TYPE_LIST_ZONES, REMOTE_GET_ZONES_TIMEOUT_SECS, |mut client, session| async move {
                client
                    .get_zones(proto::GetZonesRequest { token: session.token })
                    .await
                    .map(tonic::Response::into_inner)
            })
            .await?;
        self.metrics.add_generic_requests(REQUEST_TYPE_LIST_ZONES, 1);

        Ok(zones
            .zone
            .into_iter()
            .map(|z| {
                DnsHostedZone::new(PROVIDER_TYPE, z.id, &normalize_domain_name(&z.domain), z.key, z.private_zone)
                    .with_forwarded_domains(z.forwarded_domain)
            })
            .collect())
    }

    async fn get_zone_state(&self, zone: &DnsHostedZone) -> Result<DnsSets> {
        let zone_id = zone.id().to_string();
        let state = self
            .call_with_token(REQUEST_TYPE_LIST_RECORDS, REMOTE_EXECUTE_TIMEOUT_SECS, |mut client, session| {
                let zoneid = zone_id.clone();
                async move {
                    client
                        .get_zone_state(proto::GetZoneStateRequest {
                            token: session.token,
                            zoneid,
                        })
                        .await
                        .map(tonic::Response::into_inner)
                }
            })
            .await?;
        self.metrics.add_zone_requests(&zone_id, REQUEST_TYPE_LIST_RECORDS, 1);
        Ok(unmarshal_dns_sets(state.dns_sets)?)
    }

    async fn execute_requests(
        &self,
        log: &dyn LogSink,
        zone: &DnsHostedZone,
        requests: &ChangeRequests,
    ) -> Result<()> {
        if requests.updates.is_empty() {
            return Ok(());
        }
        let version = self.session().await?.protocol_version;

        let mut changes = Vec::with_capacity(requests.updates.len());
        for (record_type, update) in &requests.updates {
            let change = match marshal_change_request(&requests.name, "", *record_type, update, version) {
                Ok(change) => change,
                Err(err) => {
                    if let Some(done) = &requests.done {
                        done.set_invalid(&err);
                    }
                    return Err(err);
                }
            };
            let request_type = if change.action == proto::ChangeAction::Delete as i32 {
                REQUEST_TYPE_DELETE_RECORDS
            } else {
                REQUEST_TYPE_UPDATE_RECORDS
            };
            self.metrics.add_zone_requests(zone.id(), request_type, 1);
            changes.push(change);
        }

        let expected = changes.len();
        let zone_id = zone.id().to_string();
        let response = self
            .call_with_token(REQUEST_TYPE_UPDATE_RECORDS, REMOTE_EXECUTE_TIMEOUT_SECS, |mut client, session| {
                let request = proto::ExecuteRequest {
                    token: session.token,
                    zoneid: zone_id.clone(),
                    change_requests: changes.clone(),
                };
                async move { client.execute(request).await.map(tonic::Response::into_inner) }
            })
            .await?;

        replay_logs(log, &response.log_messages);

        let (state, message) = aggregate_state(&response.change_responses, expected);
        let done = requests.done.as_ref();
        match state {
            ChangeState::Succeeded => {
                if let Some(done) = done {
                    done.succeeded();
                }
                Ok(())
            }
            ChangeState::Invalid => {
                let err: DnsError = RemoteError::Status {
                    code: "Invalid".to_string(),
                    message: format!("remote: {message}"),
                }
                .into();
                if let Some(done) = done {
                    done.set_invalid(&err);
                }
                Err(err)
            }
            ChangeState::Failed => {
                let err: DnsError = ProviderError::backend(format!("remote: {message}")).into();
                if let Some(done) = done {
                    done.failed(&err);
                }
                Err(err)
            }
            ChangeState::Throttled => {
                if let Some(done) = done {
                    done.throttled();
                }
                Err(ProviderError::Throttled(ThrottlingError::new("remote: throttled")).into())
            }
            ChangeState::NotProcessed => {
                log.info(&format!("not processed: {}", requests.name));
                Err(ProviderError::backend(format!("remote: {} not processed", requests.name)).into())
            }
        }
    }

    fn release(&self) {
        debug!(namespace = %self.namespace, "Releasing remote handler");
        self.session.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

/// Property checks of the `remote` provider type.
#[must_use]
pub fn adapter() -> ChecksAdapter {
    let mut checks = DnsHandlerAdapterChecks::new();
    checks.add(
        PropertyCheck::required(PROPERTY_REMOTE_ENDPOINT)
            .aliases(&["remoteEndpoint"])
            .validators([validators::no_trailing_whitespace(), validators::max_length(256)]),
    );
    checks.add(
        PropertyCheck::optional(PROPERTY_SERVER_CA_CERT)
            .aliases(&[TLS_CA_KEY])
            .validators([validators::ca_cert()]),
    );
    checks.add(
        PropertyCheck::required(PROPERTY_CLIENT_CERT)
            .aliases(&[TLS_CERT_KEY])
            .validators([validators::pem()]),
    );
    checks.add(
        PropertyCheck::required(PROPERTY_CLIENT_KEY)
            .aliases(&[TLS_PRIVATE_KEY_KEY])
            .validators([validators::pem()])
            .hide_value(),
    );
    checks.add(
        PropertyCheck::required(PROPERTY_NAMESPACE)
            .aliases(&["namespace"])
            .validators([validators::no_trailing_whitespace(), validators::max_length(63)]),
    );
    checks.add(
        PropertyCheck::optional(PROPERTY_OVERRIDE_SERVER_NAME)
            .aliases(&["overrideServerName"])
            .validators([validators::no_trailing_whitespace(), validators::max_length(253)]),
    );
    ChecksAdapter::new(PROVIDER_TYPE, checks)
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
