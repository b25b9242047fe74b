// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! gRPC service of the remote access server.
//!
//! Providers flagged for remote access are registered per namespace with
//! [`RemoteAccessServer::provider_updated_event`]. Clients log in to a
//! namespace, receive a token and use it for all further calls. Every call
//! touching a provider takes the provider's try-lock first and answers
//! "busy" if it stays taken for the spinning period.

use super::logs::LogCollector;
use super::state::{NamespaceState, TokenInfo};
use super::tls::NamespaceAuthorizer;
use crate::config::RemoteAccessServerConfig;
use crate::constants::{
    CURRENT_PROTOCOL_VERSION, HANDLER_LOCK_SPINNING_SECS, SERVER_ID_RANDOM_BYTES,
    TOKEN_RANDOM_BYTES, TOKEN_TTL_SECS,
};
use crate::dns::DnsHostedZone;
use crate::dns_errors::{DnsError, ProviderError, RemoteError};
use crate::metrics;
use crate::provider::{ChangeRequests, DnsHandler, DoneHandler};
use crate::remote::conversion::{marshal_dns_sets, unmarshal_change_request};
use crate::remote::proto::{
    self, remote_provider_server::RemoteProvider, ChangeResponse, ChangeState,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tonic::{Request, Response, Status};
use tracing::{info, warn};

const REQUEST_GET_ZONES: &str = "get_zones";
const REQUEST_GET_ZONE_STATE: &str = "get_zone_state";
const REQUEST_EXECUTE: &str = "execute";

fn random_string<const N: usize>() -> String {
    BASE64.encode(rand::random::<[u8; N]>())
}

/// Maps a failed call to the gRPC status returned to the client.
///
/// Invalid tokens keep the `InvalidToken` marker in the message so that clients
/// can log in again.
#[must_use]
pub fn to_status(err: &DnsError) -> Status {
    let message = err.to_string();
    match err {
        DnsError::Remote(RemoteError::InvalidToken { .. }) => Status::unauthenticated(message),
        DnsError::Remote(RemoteError::NamespaceNotFound { .. })
        | DnsError::Provider(ProviderError::ZoneNotFound { .. }) => Status::not_found(message),
        DnsError::Remote(
            RemoteError::NamespaceMismatch { .. } | RemoteError::MissingClientCertificate,
        ) => Status::permission_denied(message),
        DnsError::Provider(ProviderError::Busy) => Status::unavailable(message),
        DnsError::Remote(RemoteError::InvalidMessage { .. }) => Status::invalid_argument(message),
        _ => Status::internal(message),
    }
}

/// Records the outcome of one change into its wire response.
struct ResponseDoneHandler {
    response: Mutex<ChangeResponse>,
}

impl ResponseDoneHandler {
    fn new() -> Self {
        Self {
            response: Mutex::new(ChangeResponse::default()),
        }
    }

    fn set(&self, state: ChangeState, error_message: String) {
        let mut response = self.response.lock().unwrap_or_else(PoisonError::into_inner);
        response.state = state as i32;
        response.error_message = error_message;
    }

    fn is_processed(&self) -> bool {
        self.response.lock().unwrap_or_else(PoisonError::into_inner).state
            != ChangeState::NotProcessed as i32
    }

    fn take(&self) -> ChangeResponse {
        std::mem::take(&mut *self.response.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl DoneHandler for ResponseDoneHandler {
    fn set_invalid(&self, err: &DnsError) {
        self.set(ChangeState::Invalid, err.to_string());
    }

    fn failed(&self, err: &DnsError) {
        self.set(ChangeState::Failed, err.to_string());
    }

    fn throttled(&self) {
        self.set(ChangeState::Throttled, String::new());
    }

    fn succeeded(&self) {
        self.set(ChangeState::Succeeded, String::new());
    }
}

fn marshal_zone(zone: &DnsHostedZone) -> proto::Zone {
    proto::Zone {
        id: zone.id().to_string(),
        provider_type: zone.zone_id.provider_type.clone(),
        key: zone.key.clone(),
        domain: zone.domain.clone(),
        forwarded_domain: zone.forwarded_domains.clone(),
        private_zone: zone.is_private,
    }
}

/// The remote access server.
pub struct RemoteAccessServer {
    server_id: String,
    spinning: Duration,
    token_ttl: Duration,
    authorizer: Arc<dyn NamespaceAuthorizer>,
    namespaces: Mutex<HashMap<String, Arc<NamespaceState>>>,
}

impl RemoteAccessServer {
    #[must_use]
    pub fn new(authorizer: Arc<dyn NamespaceAuthorizer>) -> Self {
        Self {
            server_id: random_string::<SERVER_ID_RANDOM_BYTES>(),
            spinning: Duration::from_secs(HANDLER_LOCK_SPINNING_SECS),
            token_ttl: Duration::from_secs(TOKEN_TTL_SECS),
            authorizer,
            namespaces: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn from_config(config: &RemoteAccessServerConfig, authorizer: Arc<dyn NamespaceAuthorizer>) -> Self {
        Self::new(authorizer)
            .with_spinning(config.spinning())
            .with_token_ttl(config.token_ttl())
    }

    #[must_use]
    pub fn with_spinning(mut self, spinning: Duration) -> Self {
        self.spinning = spinning;
        self
    }

    #[must_use]
    pub fn with_token_ttl(mut self, token_ttl: Duration) -> Self {
        self.token_ttl = token_ttl;
        self
    }

    #[must_use]
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<NamespaceState>>> {
        self.namespaces.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Namespace state with at least one provider.
    fn namespace(&self, namespace: &str) -> Option<Arc<NamespaceState>> {
        self.lock()
            .get(namespace)
            .filter(|state| !state.is_empty())
            .cloned()
    }

    fn namespace_or_create(&self, namespace: &str) -> Arc<NamespaceState> {
        Arc::clone(
            self.lock()
                .entry(namespace.to_string())
                .or_insert_with(|| Arc::new(NamespaceState::new(namespace))),
        )
    }

    /// Registers, replaces or removes a provider.
    ///
    /// Providers without the remote access flag are removed.
    pub async fn provider_updated_event(
        &self,
        namespace: &str,
        name: &str,
        remote_access: bool,
        handler: Arc<dyn DnsHandler>,
    ) {
        if !remote_access {
            self.provider_removed_event(namespace, name);
            return;
        }
        let state = self.namespace_or_create(namespace);
        if state.update_handler(name, handler).await {
            info!(namespace, provider = name, "Added/updated for remote access");
        }
    }

    pub fn provider_removed_event(&self, namespace: &str, name: &str) {
        let Some(state) = self.lock().get(namespace).cloned() else {
            return;
        };
        if state.remove_handler(name) {
            info!(namespace, provider = name, "Removed provider from remote access");
        }
    }

    /// Validates a token and counts the request.
    ///
    /// The namespace is the token prefix up to the first `|`.
    fn check_auth(
        &self,
        token: &str,
        request_type: &str,
        zone_id: &str,
    ) -> Result<(Arc<NamespaceState>, TokenInfo), DnsError> {
        let namespace = token.split('|').next().unwrap_or_default();
        let state = self
            .namespace(namespace)
            .ok_or_else(|| RemoteError::NamespaceNotFound {
                namespace: namespace.to_string(),
            })?;
        let info = state.get_token(token, Utc::now())?;
        metrics::report_remote_access_requests(namespace, &info.client_id, request_type, zone_id);
        Ok((state, info))
    }

    /// Drops expired tokens of all namespaces and returns how many were dropped.
    pub fn cleanup_tokens(&self, now: DateTime<Utc>) -> usize {
        let states: Vec<_> = self.lock().values().cloned().collect();
        let count = states.iter().map(|state| state.cleanup_tokens(now)).sum();
        info!("Token cleanup of {count} outdated tokens");
        count
    }

    /// Runs the token cleanup every token TTL.
    pub fn spawn_token_cleanup(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let server = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(server.token_ttl);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                server.cleanup_tokens(Utc::now());
            }
        })
    }

    fn do_login(
        &self,
        request: &proto::LoginRequest,
        peer_certs: Option<&[rustls::pki_types::CertificateDer<'static>]>,
    ) -> Result<proto::LoginResponse, DnsError> {
        let (namespace, client) = (request.namespace.as_str(), request.client_id.as_str());
        info!(namespace, client, "Login");

        let authorized = self.authorizer.authorize(namespace, peer_certs).and_then(|()| {
            self.namespace(namespace)
                .ok_or_else(|| RemoteError::NamespaceNotFound {
                    namespace: namespace.to_string(),
                })
        });
        let state = match authorized {
            Ok(state) => state,
            Err(err) => {
                metrics::report_remote_access_logins(namespace, client, false);
                warn!(namespace, client, "Login rejected: {err}");
                return Err(err.into());
            }
        };
        metrics::report_remote_access_logins(namespace, client, true);

        let version = request.client_protocol_version.min(CURRENT_PROTOCOL_VERSION);
        let token = state.generate_and_add_token(
            self.token_ttl,
            &random_string::<TOKEN_RANDOM_BYTES>(),
            client,
            &self.server_id,
            version,
            Utc::now(),
        );
        Ok(proto::LoginResponse {
            token,
            server_protocol_version: CURRENT_PROTOCOL_VERSION,
        })
    }

    async fn do_get_zones(&self, request: &proto::GetZonesRequest) -> Result<proto::Zones, DnsError> {
        let (state, info) = self.check_auth(&request.token, REQUEST_GET_ZONES, "")?;
        let (namespace, client) = (state.name(), info.client_id.as_str());
        info!(namespace, client, "GetZones");

        let zones = state.get_all_zones(self.spinning).await.inspect_err(|err| {
            if matches!(err, DnsError::Provider(ProviderError::Busy)) {
                info!(namespace, client, "GetZones rejected: busy");
            }
        })?;
        let result = proto::Zones {
            zone: zones.iter().map(marshal_zone).collect(),
        };
        info!(namespace, client, "GetZones: {} zones", result.zone.len());
        Ok(result)
    }

    async fn do_get_zone_state(
        &self,
        request: &proto::GetZoneStateRequest,
    ) -> Result<proto::ZoneState, DnsError> {
        let zone_id = request.zoneid.as_str();
        let (state, info) = self.check_auth(&request.token, REQUEST_GET_ZONE_STATE, zone_id)?;
        let (namespace, client) = (state.name(), info.client_id.as_str());
        info!(namespace, client, zone = zone_id, "GetZoneState");

        let entry = state.lookup_zone(zone_id)?;
        let Some(_guard) = entry.handler.lock.try_lock_spinning(self.spinning).await else {
            info!(namespace, client, zone = zone_id, "GetZoneState rejected: busy");
            return Err(ProviderError::Busy.into());
        };
        let sets = entry.handler.handler.get_zone_state(&entry.zone).await?;
        let result = proto::ZoneState {
            dns_sets: marshal_dns_sets(&sets, info.protocol_version),
        };
        info!(namespace, client, zone = zone_id, "GetZoneState: {} DNSSets", result.dns_sets.len());
        Ok(result)
    }

    async fn do_execute(&self, request: proto::ExecuteRequest) -> Result<proto::ExecuteResponse, DnsError> {
        let zone_id = request.zoneid.as_str();
        let (state, info) = self.check_auth(&request.token, REQUEST_EXECUTE, zone_id)?;
        let (namespace, client) = (state.name(), info.client_id.as_str());
        info!(namespace, client, zone = zone_id, "Execute: {} changes", request.change_requests.len());

        let entry = state.lookup_zone(zone_id)?;
        let Some(_guard) = entry.handler.lock.try_lock_spinning(self.spinning).await else {
            info!(namespace, client, zone = zone_id, "Execute rejected: busy");
            return Err(ProviderError::Busy.into());
        };

        // Updates carry only the new record set, the old one comes from the zone state.
        let needs_state = request
            .change_requests
            .iter()
            .any(|change| change.action == proto::ChangeAction::Update as i32);
        let zone_state = if needs_state {
            Some(entry.handler.handler.get_zone_state(&entry.zone).await?)
        } else {
            None
        };

        let log = LogCollector::new(namespace, client);
        let mut done_handlers = Vec::with_capacity(request.change_requests.len());
        for change in request.change_requests {
            let done = Arc::new(ResponseDoneHandler::new());
            done_handlers.push(Arc::clone(&done));
            let (name, record_type, update) = match unmarshal_change_request(change, zone_state.as_ref()) {
                Ok(parsed) => parsed,
                Err(err) => {
                    done.set_invalid(&DnsError::from(err));
                    continue;
                }
            };
            let requests = ChangeRequests::new(name)
                .with_update(record_type, update)
                .with_done(done.clone());
            let result = entry
                .handler
                .handler
                .execute_requests(&log, &entry.zone, &requests)
                .await;
            if !done.is_processed() {
                requests.report(&result);
            }
        }

        Ok(proto::ExecuteResponse {
            change_responses: done_handlers.iter().map(|done| done.take()).collect(),
            log_messages: log.into_entries(),
        })
    }
}

#[tonic::async_trait]
impl RemoteProvider for RemoteAccessServer {
    async fn login(
        &self,
        request: Request<proto::LoginRequest>,
    ) -> Result<Response<proto::LoginResponse>, Status> {
        let peer_certs = request.peer_certs();
        self.do_login(request.get_ref(), peer_certs.as_deref().map(Vec::as_slice))
            .map(Response::new)
            .map_err(|err| to_status(&err))
    }

    async fn get_zones(
        &self,
        request: Request<proto::GetZonesRequest>,
    ) -> Result<Response<proto::Zones>, Status> {
        let start = Instant::now();
        let result = self.do_get_zones(request.get_ref()).await;
        metrics::record_remote_access_duration(REQUEST_GET_ZONES, start.elapsed());
        result.map(Response::new).map_err(|err| to_status(&err))
    }

    async fn get_zone_state(
        &self,
        request: Request<proto::GetZoneStateRequest>,
    ) -> Result<Response<proto::ZoneState>, Status> {
        let start = Instant::now();
        let result = self.do_get_zone_state(request.get_ref()).await;
        metrics::record_remote_access_duration(REQUEST_GET_ZONE_STATE, start.elapsed());
        result.map(Response::new).map_err(|err| to_status(&err))
    }

    async fn execute(
        &self,
        request: Request<proto::ExecuteRequest>,
    ) -> Result<Response<proto::ExecuteResponse>, Status> {
        let start = Instant::now();
        let result = self.do_execute(request.into_inner()).await;
        metrics::record_remote_access_duration(REQUEST_EXECUTE, start.elapsed());
        result.map(Response::new).map_err(|err| to_status(&err))
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod service_tests;
