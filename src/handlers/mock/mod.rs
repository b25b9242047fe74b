// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory mock provider.
//!
//! The mock keeps all records in process memory. Its behavior is controlled by
//! the provider configuration ([`MockConfig`]): the zones it hosts, forced
//! failures, artificial latency and routing policy support. Stores are
//! registered in an [`InMemoryAccounts`] registry by account name so tests can
//! inspect them.

pub mod inmemory;

pub use inmemory::{InMemory, InMemoryAccounts};

use crate::dns::query::{QueryDns, QueryDnsFactory, QueryDnsResult};
use crate::dns::{DnsHostedZone, DnsSetName, DnsSets, RecordType, ZoneId};
use crate::dns_errors::{ConfigError, DnsError, ProviderError, Result};
use crate::provider::checks::{ChecksAdapter, DnsHandlerAdapterChecks};
use crate::provider::rate_limiter::RateLimiter;
use crate::provider::{
    ChangeRequests, DnsHandler, DnsHandlerConfig, LogSink, Metrics,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const PROVIDER_TYPE: &str = "mock-inmemory";

/// Zone hosted by a mock account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockZone {
    #[serde(default)]
    pub zone_suffix: String,
    #[serde(default)]
    pub dns_name: String,
}

impl MockZone {
    /// Zone id `account:suffix+dnsName`.
    #[must_use]
    pub fn zone_id(&self, account: &str) -> ZoneId {
        ZoneId::new(
            PROVIDER_TYPE,
            format!("{account}:{}{}", self.zone_suffix, self.dns_name),
        )
    }
}

/// Provider configuration of the mock.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockConfig {
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub zones: Vec<MockZone>,
    #[serde(default)]
    pub fail_get_zones: bool,
    #[serde(default)]
    pub fail_delete_entry: bool,
    #[serde(default)]
    pub latency_millis: u64,
    #[serde(default)]
    pub support_routing_policy: bool,
}

/// Handler of the mock provider.
pub struct MockHandler {
    mock: Arc<InMemory>,
    mock_config: MockConfig,
    accounts: Arc<InMemoryAccounts>,
    metrics: Arc<dyn Metrics>,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl MockHandler {
    /// Creates the handler and registers its store in `accounts`.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider config is malformed or the account is
    /// already in use.
    pub fn new(config: DnsHandlerConfig, accounts: Arc<InMemoryAccounts>) -> Result<Self> {
        let mock_config: MockConfig = config.provider_config_as().map_err(|err| match err {
            ConfigError::InvalidProviderConfig { reason, .. } => DnsError::Generic(format!(
                "unmarshal mock providerConfig failed with: {reason}"
            )),
            other => other.into(),
        })?;
        let mock = Arc::new(InMemory::new(mock_config.support_routing_policy));
        accounts.add(&mock_config.account, Arc::clone(&mock)).map_err(|err| {
            DnsError::Generic(format!(
                "failed to add in-memory mock for account {}: {err}",
                mock_config.account
            ))
        })?;

        for zone in mock_config.zones.iter().filter(|z| !z.dns_name.is_empty()) {
            let zone_id = zone.zone_id(&mock_config.account);
            info!(zone = %zone.dns_name, zone_id = %zone_id.id, "Providing mock DNS zone");
            let is_private = zone.zone_suffix.contains(":private");
            mock.add_zone(DnsHostedZone::new(
                PROVIDER_TYPE,
                zone_id.id,
                &zone.dns_name,
                "",
                is_private,
            ));
        }

        Ok(Self {
            mock,
            mock_config,
            accounts,
            metrics: config.metrics,
            rate_limiter: config.rate_limiter,
        })
    }

    /// Store of this handler.
    #[must_use]
    pub fn in_memory(&self) -> Arc<InMemory> {
        Arc::clone(&self.mock)
    }

    async fn apply_requests(&self, log: &dyn LogSink, zone: &DnsHostedZone, requests: &ChangeRequests) -> Result<()> {
        log.info(&format!(
            "executing requests for zone {}: {} updates",
            zone.zone_id,
            requests.updates.len()
        ));
        let mut succeeded = 0usize;
        let mut failed = 0usize;
        for (record_type, update) in &requests.updates {
            self.rate_limiter.accept().await;
            let result = if self.mock_config.fail_delete_entry && update.new.is_none() {
                Err(DnsError::Generic(
                    "forced error by mockConfig.FailDeleteEntry".to_string(),
                ))
            } else {
                self.mock.apply(
                    &zone.zone_id,
                    &requests.name,
                    *record_type,
                    update,
                    self.metrics.as_ref(),
                )
            };
            match result {
                Ok(()) => succeeded += 1,
                Err(err) => {
                    failed += 1;
                    log.error(&format!("apply failed: {err}"));
                }
            }
        }
        if succeeded > 0 {
            log.info(&format!(
                "succeeded updates for records in zone {}: {succeeded}",
                zone.zone_id
            ));
        }
        if failed > 0 {
            log.info(&format!(
                "failed updates for records in zone {}: {failed}",
                zone.zone_id
            ));
            return Err(ProviderError::ChangesFailed { count: failed }.into());
        }
        Ok(())
    }
}

#[async_trait]
impl DnsHandler for MockHandler {
    fn provider_type(&self) -> &str {
        PROVIDER_TYPE
    }

    async fn get_zones(&self) -> Result<Vec<DnsHostedZone>> {
        if self.mock_config.fail_get_zones {
            return Err(DnsError::Generic(
                "forced error by mockConfig.FailGetZones".to_string(),
            ));
        }
        self.rate_limiter.accept().await;
        Ok(self.mock.get_zones())
    }

    fn get_custom_query_dns_func(
        &self,
        zone: &DnsHostedZone,
        _factory: &QueryDnsFactory,
    ) -> Result<Arc<dyn QueryDns>> {
        Ok(Arc::new(MockQuery {
            mock: Arc::clone(&self.mock),
            zone_id: zone.zone_id.clone(),
        }))
    }

    async fn get_zone_state(&self, zone: &DnsHostedZone) -> Result<DnsSets> {
        self.mock
            .get_dns_sets(&zone.zone_id)
            .ok_or_else(|| ProviderError::ZoneNotFound {
                zone: zone.zone_id.to_string(),
            }.into())
    }

    async fn execute_requests(
        &self,
        log: &dyn LogSink,
        zone: &DnsHostedZone,
        requests: &ChangeRequests,
    ) -> Result<()> {
        let result = self.apply_requests(log, zone, requests).await;
        if self.mock_config.latency_millis > 0 {
            tokio::time::sleep(Duration::from_millis(self.mock_config.latency_millis)).await;
        }
        result
    }

    fn release(&self) {
        self.accounts.delete(&self.mock_config.account);
    }
}

/// Answers queries from the store instead of DNS.
struct MockQuery {
    mock: Arc<InMemory>,
    zone_id: ZoneId,
}

#[async_trait]
impl QueryDns for MockQuery {
    async fn query(&self, set_name: &DnsSetName, record_type: RecordType) -> QueryDnsResult {
        Ok(self
            .mock
            .get_record_set(&self.zone_id, &set_name.normalize(), record_type))
    }
}

/// Validation adapter of the mock. Properties are not used.
#[must_use]
pub fn adapter() -> ChecksAdapter {
    ChecksAdapter::new(PROVIDER_TYPE, DnsHandlerAdapterChecks::new()).with_provider_config_validator(
        Arc::new(|value| {
            serde_json::from_value::<MockConfig>(value.clone())
                .map(|_| ())
                .map_err(|err| err.to_string())
        }),
    )
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
