// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared provider accounts.
//!
//! Provider objects with identical credentials share one [`DnsAccount`]. The
//! account owns the handler, caches its zone list for the configured zone
//! cache TTL and keeps one [`DnsCache`] per zone for DNS queries.
//!
//! [`AccountMap`] hands out accounts by fingerprint and counts the provider
//! objects using each of them. The handler is released when the last provider
//! object lets go of its account.
//!
//! # Example
//!
//! ```rust,no_run
//! use dnsman::provider::account::{AccountMap, DnsAccountConfig};
//! use dnsman::provider::DnsHandler;
//! # async fn example(config: DnsAccountConfig) -> dnsman::dns_errors::Result<()> {
//! let accounts = AccountMap::new(config);
//! let account = accounts.get("default/my-provider", "mock-inmemory", &Default::default(), None)?;
//! let zones = account.get_zones().await?;
//! accounts.release(&account, "default/my-provider");
//! # Ok(())
//! # }
//! ```

use super::backoff::Backoff;
use super::registry::TargetsMapper;
use super::{
    ChangeRequests, DnsHandler, DnsHandlerConfig, DnsHandlerFactory, LogSink, Metrics, Properties,
    REQUEST_TYPE_CACHED_GET_ZONES,
};
use crate::config::DnsManagerConfiguration;
use crate::dns::cache::DnsCache;
use crate::dns::query::{QueryDns, QueryDnsFactory, QueryDnsResult, StandardQueryDns, StaticNameservers};
use crate::dns::{DnsHostedZone, DnsSetName, DnsSets, RecordType, Target, ZoneId};
use crate::dns_errors::{ConfigError, Result};
use crate::metrics;
use async_trait::async_trait;
use sha2::{Digest, Sha224};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Fingerprint of a credential set.
///
/// SHA-224 over the sorted properties (`key NUL value NUL`), the raw provider
/// config bytes, a NUL separator and the provider type, hex encoded. The
/// config bytes are hashed as given, so any byte difference yields another
/// account.
#[must_use]
pub fn account_hash(properties: &Properties, provider_type: &str, provider_config: Option<&[u8]>) -> String {
    let mut hasher = Sha224::new();
    // BTreeMap iterates in key order
    for (key, value) in properties {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
        hasher.update([0u8]);
    }
    if let Some(config) = provider_config {
        hasher.update(config);
    }
    hasher.update([0u8]);
    hasher.update(provider_type.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Metrics sink of one account.
#[derive(Debug, Clone)]
pub struct AccountMetrics {
    provider_type: String,
    hash: String,
}

impl AccountMetrics {
    #[must_use]
    pub fn new(provider_type: &str, hash: &str) -> Self {
        Self {
            provider_type: provider_type.to_string(),
            hash: hash.to_string(),
        }
    }
}

impl Metrics for AccountMetrics {
    fn add_generic_requests(&self, request_type: &str, n: u64) {
        metrics::add_requests(&self.provider_type, &self.hash, request_type, n, None);
    }

    fn add_zone_requests(&self, zone_id: &str, request_type: &str, n: u64) {
        metrics::add_requests(&self.provider_type, &self.hash, request_type, n, Some(zone_id));
    }
}

/// Process wide inputs of account creation.
#[derive(Clone)]
pub struct DnsAccountConfig {
    pub factory: Arc<dyn DnsHandlerFactory>,
    pub global: Arc<DnsManagerConfiguration>,
    /// Standard query used when a handler has no custom query path
    pub default_query: QueryDnsFactory,
}

impl DnsAccountConfig {
    /// Config querying the nameservers of the global configuration.
    #[must_use]
    pub fn new(factory: Arc<dyn DnsHandlerFactory>, global: Arc<DnsManagerConfiguration>) -> Self {
        let nameservers = Arc::new(StaticNameservers::new(&global.default_nameservers));
        Self {
            factory,
            global,
            default_query: StandardQueryDns::factory(nameservers),
        }
    }

    #[must_use]
    pub fn with_default_query(mut self, default_query: QueryDnsFactory) -> Self {
        self.default_query = default_query;
        self
    }
}

#[derive(Default)]
struct AccountState {
    zones: Option<(Instant, Vec<DnsHostedZone>)>,
    dns_caches: HashMap<ZoneId, Arc<DnsCache>>,
}

/// A handler shared by all provider objects with the same fingerprint.
pub struct DnsAccount {
    handler: Arc<dyn DnsHandler>,
    targets_mapper: Option<TargetsMapper>,
    provider_type: String,
    hash: String,
    zone_cache_ttl: Duration,
    dns_cache_ttl: Duration,
    default_query: QueryDnsFactory,
    metrics: AccountMetrics,
    backoff: Backoff,
    clients: Mutex<BTreeSet<String>>,
    state: tokio::sync::Mutex<AccountState>,
}

impl DnsAccount {
    fn new(handler: Arc<dyn DnsHandler>, hash: String, config: &DnsAccountConfig) -> Self {
        let provider_type = handler.provider_type().to_string();
        Self {
            metrics: AccountMetrics::new(&provider_type, &hash),
            targets_mapper: config.factory.targets_mapper(&provider_type),
            handler,
            provider_type,
            hash,
            zone_cache_ttl: config.global.cache.zone_cache_ttl(),
            dns_cache_ttl: config.global.cache.dns_cache_ttl(),
            default_query: config.default_query.clone(),
            backoff: Backoff::default(),
            clients: Mutex::new(BTreeSet::new()),
            state: tokio::sync::Mutex::new(AccountState::default()),
        }
    }

    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Number of provider objects using this account.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients_lock().len()
    }

    /// Failure tracker of zone listings.
    #[must_use]
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Looks up a name through the query cache of `zone`.
    ///
    /// # Errors
    ///
    /// Returns the query error, or an error if the handler cannot provide a
    /// query path for the zone.
    pub async fn query_dns(
        &self,
        zone: &DnsHostedZone,
        set_name: &DnsSetName,
        record_type: RecordType,
    ) -> QueryDnsResult {
        let cache = {
            let mut state = self.state.lock().await;
            match state.dns_caches.get(&zone.zone_id) {
                Some(cache) => Arc::clone(cache),
                None => {
                    let query = self
                        .handler
                        .get_custom_query_dns_func(zone, &self.default_query)?;
                    let cache = Arc::new(DnsCache::new(query, self.dns_cache_ttl));
                    state.dns_caches.insert(zone.zone_id.clone(), Arc::clone(&cache));
                    cache
                }
            }
        };
        cache.get(set_name, record_type).await
    }

    fn add_client(&self, key: &str) -> usize {
        let mut clients = self.clients_lock();
        clients.insert(key.to_string());
        clients.len()
    }

    fn remove_client(&self, key: &str) -> usize {
        let mut clients = self.clients_lock();
        clients.remove(key);
        clients.len()
    }

    fn clients_lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        self.clients
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl DnsHandler for DnsAccount {
    fn provider_type(&self) -> &str {
        &self.provider_type
    }

    /// Zone list, served from the cache while it is younger than the zone cache TTL.
    async fn get_zones(&self) -> Result<Vec<DnsHostedZone>> {
        let mut state = self.state.lock().await;
        if let Some((fetched, zones)) = &state.zones {
            if fetched.elapsed() < self.zone_cache_ttl {
                self.metrics
                    .add_generic_requests(REQUEST_TYPE_CACHED_GET_ZONES, 1);
                return Ok(zones.clone());
            }
        }

        match self.handler.get_zones().await {
            Ok(zones) => {
                self.backoff.succeeded();
                let before = state.dns_caches.len();
                state
                    .dns_caches
                    .retain(|id, _| zones.iter().any(|z| &z.zone_id == id));
                if state.dns_caches.len() != before {
                    debug!(
                        provider = %self.provider_type,
                        pruned = before - state.dns_caches.len(),
                        "Pruned DNS caches of vanished zones"
                    );
                }
                state.zones = Some((Instant::now(), zones.clone()));
                Ok(zones)
            }
            Err(err) => {
                let wait = self.backoff.failed();
                warn!(
                    provider = %self.provider_type,
                    account = %self.hash,
                    retry_in = ?wait,
                    "Listing zones failed: {err}"
                );
                Err(err)
            }
        }
    }

    fn get_custom_query_dns_func(
        &self,
        zone: &DnsHostedZone,
        factory: &QueryDnsFactory,
    ) -> Result<Arc<dyn QueryDns>> {
        self.handler.get_custom_query_dns_func(zone, factory)
    }

    async fn get_zone_state(&self, zone: &DnsHostedZone) -> Result<DnsSets> {
        self.handler.get_zone_state(zone).await
    }

    async fn execute_requests(
        &self,
        log: &dyn LogSink,
        zone: &DnsHostedZone,
        requests: &ChangeRequests,
    ) -> Result<()> {
        self.handler.execute_requests(log, zone, requests).await
    }

    /// Uses the targets mapper of the provider type if one is registered.
    fn map_targets(&self, dns_name: &str, targets: Vec<Target>) -> Vec<Target> {
        match &self.targets_mapper {
            Some(mapper) => mapper(dns_name, targets),
            None => self.handler.map_targets(dns_name, targets),
        }
    }

    fn release(&self) {
        self.handler.release();
    }
}

/// Accounts by fingerprint.
pub struct AccountMap {
    config: DnsAccountConfig,
    accounts: Mutex<HashMap<String, Arc<DnsAccount>>>,
}

impl AccountMap {
    #[must_use]
    pub fn new(config: DnsAccountConfig) -> Self {
        Self {
            config,
            accounts: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the account for the credentials, creating it on first use.
    ///
    /// `object_key` identifies the provider object and is added to the
    /// clients of the account. `provider_config` holds the raw JSON bytes of
    /// the provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider type is unknown, the provider config
    /// is not valid JSON or the handler cannot be built from the properties.
    pub fn get(
        &self,
        object_key: &str,
        provider_type: &str,
        properties: &Properties,
        provider_config: Option<&[u8]>,
    ) -> Result<Arc<DnsAccount>> {
        let hash = account_hash(properties, provider_type, provider_config);
        let mut accounts = self.lock();

        if let Some(account) = accounts.get(&hash) {
            let clients = account.add_client(object_key);
            debug!(provider = provider_type, account = %hash, clients, "Reusing account");
            metrics::report_account_providers(provider_type, &hash, clients);
            return Ok(Arc::clone(account));
        }

        let provider_config = provider_config
            .map(serde_json::from_slice::<serde_json::Value>)
            .transpose()
            .map_err(|err| ConfigError::InvalidProviderConfig {
                provider_type: provider_type.to_string(),
                reason: err.to_string(),
            })?;
        let handler_config = DnsHandlerConfig::new(provider_type, properties.clone())
            .with_provider_config(provider_config)
            .with_global(Arc::clone(&self.config.global))
            .with_metrics(Arc::new(AccountMetrics::new(provider_type, &hash)));
        let handler = self.config.factory.create(provider_type, handler_config)?;

        info!(provider = provider_type, account = %hash, "Creating account");
        let account = Arc::new(DnsAccount::new(handler, hash.clone(), &self.config));
        let clients = account.add_client(object_key);
        metrics::report_account_providers(provider_type, &hash, clients);
        accounts.insert(hash, Arc::clone(&account));
        Ok(account)
    }

    /// Removes `object_key` from the clients of `account`.
    ///
    /// The handler is released once no clients are left. Releasing an account
    /// that is no longer registered is a no-op.
    pub fn release(&self, account: &Arc<DnsAccount>, object_key: &str) {
        let mut accounts = self.lock();
        let clients = account.remove_client(object_key);
        let registered = accounts
            .get(&account.hash)
            .is_some_and(|current| Arc::ptr_eq(current, account));
        if !registered {
            return;
        }
        if clients > 0 {
            metrics::report_account_providers(&account.provider_type, &account.hash, clients);
            return;
        }
        accounts.remove(&account.hash);
        metrics::delete_account(&account.provider_type, &account.hash);
        info!(provider = %account.provider_type, account = %account.hash, "Releasing account");
        account.release();
    }

    /// Number of live accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<DnsAccount>>> {
        self.accounts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "account_tests.rs"]
mod account_tests;
