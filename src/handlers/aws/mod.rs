// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! AWS Route53 backend.
//!
//! The handler is built on an injected [`Route53Api`] client, see
//! [`register`]. Changes of a
//! request are submitted in batches (see [`execution`]); CNAME targets of AWS
//! load balancers become alias records (see [`alias`]).
//!
//! Weighted and geolocation routing policies are supported natively through
//! the set identifier of a record set.

pub mod alias;
pub mod api;
pub mod execution;

pub use alias::{alias_target_mapper, canonical_hosted_zone};
pub use api::{Route53Api, Route53Error};

use crate::constants::{DEFAULT_AWS_BATCH_SIZE, EXECUTE_TIMEOUT_SECS, GET_ZONES_TIMEOUT_SECS};
use crate::dns::query::{QueryDns, QueryDnsFactory, QueryDnsResult};
use crate::dns::{
    ensure_trailing_dot, normalize_domain_name, unquote_lenient, DnsHostedZone, DnsSetName,
    DnsSets, Record, RecordSet, RecordType, Target,
};
use crate::dns_errors::{stable_error, DnsError, ProviderError, Result, ThrottlingError};
use crate::provider::checks::{ChecksAdapter, DnsHandlerAdapterChecks};
use crate::provider::rate_limiter::RateLimiter;
use crate::provider::registry::DnsHandlerRegistry;
use crate::provider::{
    ChangeRequests, DnsHandler, DnsHandlerConfig, LogSink, Metrics, REQUEST_TYPE_LIST_RECORDS,
    REQUEST_TYPE_LIST_ZONES,
};
use api::{ChangeAction, ResourceRecordSet, RR_TYPE_A, RR_TYPE_AAAA, RR_TYPE_CNAME, RR_TYPE_NS, RR_TYPE_TXT};
use async_trait::async_trait;
use execution::{extract_routing_policy, route53_type, Execution};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const PROVIDER_TYPE: &str = "aws-route53";

/// Maps a Route53 error to a handler error with a stable message.
fn map_error(err: &Route53Error) -> DnsError {
    let message = stable_error(&err.to_string());
    if err.is_throttling() {
        return ProviderError::from(ThrottlingError::new(message)).into();
    }
    ProviderError::backend(message).into()
}

async fn with_timeout<T>(operation: &str, seconds: u64, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(Duration::from_secs(seconds), fut)
        .await
        .map_err(|_| ProviderError::Timeout {
            operation: operation.to_string(),
            seconds,
        })?
}

/// Record set of a plain Route53 record set, `None` for unsupported types.
fn record_set_from_route53(rrs: &ResourceRecordSet) -> Option<RecordSet> {
    if let Some(rs) = alias::record_set_from_alias_target(rrs) {
        return Some(rs.with_routing_policy(extract_routing_policy(rrs)));
    }
    let record_type = match rrs.record_type.as_str() {
        RR_TYPE_A => RecordType::A,
        RR_TYPE_AAAA => RecordType::Aaaa,
        RR_TYPE_CNAME => RecordType::Cname,
        RR_TYPE_TXT => RecordType::Txt,
        RR_TYPE_NS => RecordType::Ns,
        _ => return None,
    };
    let records = rrs
        .values
        .iter()
        .map(|v| match record_type {
            RecordType::Txt => Record::new(unquote_lenient(v)),
            RecordType::Cname => Record::new(normalize_domain_name(v)),
            _ => Record::new(v.clone()),
        })
        .collect();
    Some(
        RecordSet::new(record_type, rrs.ttl.unwrap_or_default(), records)
            .with_routing_policy(extract_routing_policy(rrs)),
    )
}

fn set_name_of(rrs: &ResourceRecordSet) -> DnsSetName {
    DnsSetName::with_set_identifier(
        normalize_domain_name(&rrs.name),
        rrs.set_identifier.clone().unwrap_or_default(),
    )
}

/// Registers the `aws-route53` provider type with handlers built on `api`.
///
/// CNAME targets of AWS load balancers are mapped to alias records. The
/// credentials live in `api`, so no secret properties are accepted.
pub fn register(registry: &mut DnsHandlerRegistry, api: Arc<dyn Route53Api>) {
    registry.register(
        PROVIDER_TYPE,
        Arc::new(move |config| Ok(Arc::new(AwsHandler::new(&config, Arc::clone(&api))) as Arc<dyn DnsHandler>)),
        Arc::new(ChecksAdapter::new(PROVIDER_TYPE, DnsHandlerAdapterChecks::new())),
        None,
        Some(Arc::new(alias_target_mapper)),
    );
}

/// Handler of the `aws-route53` provider type.
pub struct AwsHandler {
    api: Arc<dyn Route53Api>,
    batch_size: usize,
    blocked_zones: Vec<String>,
    metrics: Arc<dyn Metrics>,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AwsHandler {
    /// Builds a handler on `api`. The batch size comes from the advanced
    /// options of the provider type.
    pub fn new(config: &DnsHandlerConfig, api: Arc<dyn Route53Api>) -> Self {
        let options = config.advanced_options();
        Self {
            api,
            batch_size: options.batch_size.unwrap_or(DEFAULT_AWS_BATCH_SIZE),
            blocked_zones: options.blocked_zones,
            metrics: Arc::clone(&config.metrics),
            rate_limiter: Arc::clone(&config.rate_limiter),
        }
    }

    async fn list_record_sets(&self, zone_id: &str) -> Result<Vec<ResourceRecordSet>> {
        self.rate_limiter.accept().await;
        self.metrics
            .add_zone_requests(zone_id, REQUEST_TYPE_LIST_RECORDS, 1);
        self.api
            .list_resource_record_sets(zone_id)
            .await
            .map_err(|err| map_error(&err))
    }

    async fn submit(&self, log: &dyn LogSink, zone: &DnsHostedZone, requests: &ChangeRequests) -> Result<()> {
        let mut execution = Execution::new(log, self.api.as_ref(), zone.id(), self.batch_size);
        let mut errors = Vec::new();
        for update in requests.updates.values() {
            let added = match (&update.old, &update.new) {
                (None, None) => Err(ProviderError::backend(format!(
                    "both old and new record sets are empty for {}",
                    requests.name
                ))
                .into()),
                (Some(old), None) => execution.add_change(ChangeAction::Delete, &requests.name, old),
                (None, Some(new)) => execution.add_change(ChangeAction::Create, &requests.name, new),
                (Some(old), Some(new)) if old.record_type != new.record_type => execution
                    .add_change(ChangeAction::Delete, &requests.name, old)
                    .and_then(|()| execution.add_change(ChangeAction::Create, &requests.name, new)),
                (Some(_), Some(new)) => execution.add_change(ChangeAction::Upsert, &requests.name, new),
            };
            if let Err(err) = added {
                errors.push(err);
            }
        }
        if let Some(err) = errors.into_iter().next() {
            return Err(err);
        }
        execution
            .submit_changes(self.metrics.as_ref(), self.rate_limiter.as_ref())
            .await
    }
}

#[async_trait]
impl DnsHandler for AwsHandler {
    fn provider_type(&self) -> &str {
        PROVIDER_TYPE
    }

    async fn get_zones(&self) -> Result<Vec<DnsHostedZone>> {
        with_timeout("list hosted zones", GET_ZONES_TIMEOUT_SECS, async {
            self.rate_limiter.accept().await;
            self.metrics.add_generic_requests(REQUEST_TYPE_LIST_ZONES, 1);
            let hosted = self
                .api
                .list_hosted_zones()
                .await
                .map_err(|err| map_error(&err))?;

            let mut zones = Vec::with_capacity(hosted.len());
            for zone in hosted {
                let id = zone.id.rsplit('/').next().unwrap_or(&zone.id).to_string();
                if self.blocked_zones.contains(&id) {
                    info!(zone = %id, "ignoring blocked zone");
                    continue;
                }
                let domain = normalize_domain_name(&zone.name);
                zones.push(DnsHostedZone::new(PROVIDER_TYPE, id, &domain, zone.id, zone.private_zone));
            }
            Ok(zones)
        })
        .await
    }

    fn get_custom_query_dns_func(
        &self,
        zone: &DnsHostedZone,
        factory: &QueryDnsFactory,
    ) -> Result<Arc<dyn QueryDns>> {
        Ok(Arc::new(Route53Query {
            api: Arc::clone(&self.api),
            metrics: Arc::clone(&self.metrics),
            rate_limiter: Arc::clone(&self.rate_limiter),
            zone_id: zone.id().to_string(),
            is_private: zone.is_private,
            fallback: factory(),
        }))
    }

    async fn get_zone_state(&self, zone: &DnsHostedZone) -> Result<DnsSets> {
        let record_sets = self.list_record_sets(zone.id()).await?;
        let mut sets = DnsSets::new();
        for rrs in &record_sets {
            if let Some(rs) = record_set_from_route53(rrs) {
                sets.add_record_set(&set_name_of(rrs), rs);
            }
        }
        debug!(zone = zone.id(), names = sets.len(), "zone state read");
        Ok(sets)
    }

    async fn execute_requests(
        &self,
        log: &dyn LogSink,
        zone: &DnsHostedZone,
        requests: &ChangeRequests,
    ) -> Result<()> {
        with_timeout(
            "execute requests",
            EXECUTE_TIMEOUT_SECS,
            self.submit(log, zone, requests),
        )
        .await
    }

    fn map_targets(&self, dns_name: &str, targets: Vec<Target>) -> Vec<Target> {
        alias_target_mapper(dns_name, targets)
    }
}

/// Query path of Route53 zones.
///
/// Private zones, set identifiers and alias records are answered from the
/// Route53 API; everything else goes to the standard DNS query.
struct Route53Query {
    api: Arc<dyn Route53Api>,
    metrics: Arc<dyn Metrics>,
    rate_limiter: Arc<dyn RateLimiter>,
    zone_id: String,
    is_private: bool,
    fallback: Arc<dyn QueryDns>,
}

#[async_trait]
impl QueryDns for Route53Query {
    async fn query(&self, set_name: &DnsSetName, record_type: RecordType) -> QueryDnsResult {
        if !self.is_private && !set_name.has_set_identifier() && !record_type.is_alias() {
            return self.fallback.query(set_name, record_type).await;
        }
        self.rate_limiter.accept().await;
        self.metrics
            .add_zone_requests(&self.zone_id, REQUEST_TYPE_LIST_RECORDS, 1);
        let record_sets = self
            .api
            .list_resource_record_sets(&self.zone_id)
            .await
            .map_err(|err| map_error(&err))?;
        let name = ensure_trailing_dot(&normalize_domain_name(&set_name.dns_name));
        let rr_type = route53_type(record_type);
        Ok(record_sets
            .iter()
            .filter(|rrs| {
                ensure_trailing_dot(&normalize_domain_name(&rrs.name)) == name
                    && rrs.record_type == rr_type
                    && rrs.set_identifier.as_deref().unwrap_or_default() == set_name.set_identifier
                    && rrs.alias_target.is_some() == record_type.is_alias()
            })
            .find_map(record_set_from_route53))
    }
}

#[cfg(test)]
pub(crate) mod fake;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
