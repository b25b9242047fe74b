// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Google Cloud DNS backend.
//!
//! The handler is built on an injected [`CloudDnsApi`] client. Zone ids have
//! the form `project/zoneName`. All change requests of one call are submitted
//! as a single atomic change (see [`execution`]).
//!
//! Weighted routing uses the set identifier as index into the weighted round
//! robin item list, geolocation routing uses the location as set identifier.

pub mod api;
pub mod execution;
pub mod routing_policy;

pub use api::{CloudDnsApi, CloudDnsError};

use crate::constants::{EXECUTE_TIMEOUT_SECS, GET_ZONES_TIMEOUT_SECS};
use crate::dns::query::{QueryDns, QueryDnsFactory, QueryDnsResult};
use crate::dns::{
    ensure_trailing_dot, normalize_domain_name, unquote_lenient, DnsHostedZone, DnsSetName,
    DnsSets, Record, RecordSet, RecordType, RoutingPolicy,
};
use crate::dns_errors::{ProviderError, Result};
use crate::provider::rate_limiter::RateLimiter;
use crate::provider::{
    ChangeRequests, DnsHandler, DnsHandlerConfig, LogSink, Metrics, REQUEST_TYPE_LIST_RECORDS,
    REQUEST_TYPE_LIST_ZONES,
};
use api::{ResourceRecordSet, RrSetRoutingPolicy};
use async_trait::async_trait;
use execution::{map_error, ExecAction, Execution};
use routing_policy::is_placeholder_item;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const PROVIDER_TYPE: &str = "google-clouddns";

/// Request type of single record set reads.
const REQUEST_TYPE_GET_RECORD_SET: &str = "get_record_set";

async fn with_timeout<T>(operation: &str, seconds: u64, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(Duration::from_secs(seconds), fut)
        .await
        .map_err(|_| ProviderError::Timeout {
            operation: operation.to_string(),
            seconds,
        })?
}

/// Splits a zone id into project and zone name.
///
/// # Errors
///
/// Returns an error if `id` has no `/`.
pub fn split_zone_id(id: &str) -> Result<(&str, &str)> {
    id.split_once('/')
        .ok_or_else(|| ProviderError::backend(format!("invalid zone ID format: {id}")).into())
}

fn record_type_of(rrs: &ResourceRecordSet) -> Option<RecordType> {
    match rrs.record_type.as_str() {
        "A" => Some(RecordType::A),
        "AAAA" => Some(RecordType::Aaaa),
        "CNAME" => Some(RecordType::Cname),
        "TXT" => Some(RecordType::Txt),
        "NS" => Some(RecordType::Ns),
        _ => None,
    }
}

fn build_record_set(record_type: RecordType, ttl: i64, rrdatas: &[String]) -> Option<RecordSet> {
    if rrdatas.is_empty() {
        return None;
    }
    let records = rrdatas
        .iter()
        .map(|rr| match record_type {
            RecordType::Cname => Record::new(normalize_domain_name(rr)),
            RecordType::Txt => Record::new(unquote_lenient(rr)),
            _ => Record::new(rr.clone()),
        })
        .collect();
    Some(RecordSet::new(record_type, ttl, records))
}

/// Weights are stored as floating point numbers.
fn weight_of(weight: f64) -> i64 {
    (weight + 0.00001) as i64
}

/// Splits a Cloud DNS record set into its variants.
fn variants_of(rrs: &ResourceRecordSet) -> Vec<(DnsSetName, RecordSet)> {
    let Some(record_type) = record_type_of(rrs) else {
        return Vec::new();
    };
    let name = normalize_domain_name(&rrs.name);
    match &rrs.routing_policy {
        None => build_record_set(record_type, rrs.ttl, &rrs.rrdatas)
            .map(|rs| vec![(DnsSetName::new(name), rs)])
            .unwrap_or_default(),
        Some(RrSetRoutingPolicy::Wrr(items)) => items
            .iter()
            .enumerate()
            .filter(|(_, item)| !is_placeholder_item(&rrs.record_type, item))
            .filter_map(|(i, item)| {
                let rs = build_record_set(record_type, rrs.ttl, &item.rrdatas)?
                    .with_routing_policy(Some(RoutingPolicy::weighted(weight_of(item.weight))));
                Some((DnsSetName::with_set_identifier(name.clone(), i.to_string()), rs))
            })
            .collect(),
        Some(RrSetRoutingPolicy::Geo(items)) => items
            .iter()
            .filter_map(|item| {
                let rs = build_record_set(record_type, rrs.ttl, &item.rrdatas)?
                    .with_routing_policy(Some(RoutingPolicy::geolocation(&item.location)));
                Some((DnsSetName::with_set_identifier(name.clone(), item.location.clone()), rs))
            })
            .collect(),
    }
}

/// Handler of the `google-clouddns` provider type.
pub struct GoogleHandler {
    api: Arc<dyn CloudDnsApi>,
    blocked_zones: Vec<String>,
    metrics: Arc<dyn Metrics>,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl GoogleHandler {
    pub fn new(config: &DnsHandlerConfig, api: Arc<dyn CloudDnsApi>) -> Self {
        Self {
            api,
            blocked_zones: config.advanced_options().blocked_zones,
            metrics: Arc::clone(&config.metrics),
            rate_limiter: Arc::clone(&config.rate_limiter),
        }
    }

    fn make_zone_id(&self, name: &str) -> String {
        format!("{}/{}", self.api.project(), name)
    }

    async fn list_record_sets(&self, project: &str, zone: &str) -> Result<Vec<ResourceRecordSet>> {
        self.rate_limiter.accept().await;
        self.metrics
            .add_zone_requests(&format!("{project}/{zone}"), REQUEST_TYPE_LIST_RECORDS, 1);
        self.api
            .list_resource_record_sets(project, zone)
            .await
            .map_err(|err| map_error(&err))
    }

    /// Subdomains delegated by NS records below the apex.
    async fn forwarded_domains(&self, project: &str, zone: &str, domain: &str) -> Result<Vec<String>> {
        let record_sets = self.list_record_sets(project, zone).await?;
        Ok(record_sets
            .iter()
            .filter(|rrs| rrs.record_type == "NS")
            .map(|rrs| normalize_domain_name(&rrs.name))
            .filter(|name| name != domain)
            .collect())
    }

    async fn submit(&self, log: &dyn LogSink, zone: &DnsHostedZone, requests: &ChangeRequests) -> Result<()> {
        let (project, zone_name) = split_zone_id(zone.id())?;
        let mut execution = Execution::new(log, self.api.as_ref(), project, zone_name);
        let mut errors = Vec::new();
        for update in requests.updates.values() {
            if update.old.is_none() && update.new.is_none() {
                errors.push(format!("both old and new record sets are empty for {}", requests.name));
            }
            if let Some(old) = &update.old {
                if let Err(err) = execution.add_change(ExecAction::Delete, &requests.name, old) {
                    errors.push(err.to_string());
                }
            }
            if let Some(new) = &update.new {
                if let Err(err) = execution.add_change(ExecAction::Create, &requests.name, new) {
                    errors.push(err.to_string());
                }
            }
        }
        if !errors.is_empty() {
            return Err(ProviderError::InvalidRoutingPolicy {
                reason: format!(
                    "failed to execute change requests for zone {}: {}",
                    zone.zone_id,
                    errors.join("; ")
                ),
            }
            .into());
        }
        execution
            .submit_changes(self.metrics.as_ref(), self.rate_limiter.as_ref())
            .await
    }
}

#[async_trait]
impl DnsHandler for GoogleHandler {
    fn provider_type(&self) -> &str {
        PROVIDER_TYPE
    }

    async fn get_zones(&self) -> Result<Vec<DnsHostedZone>> {
        with_timeout("list managed zones", GET_ZONES_TIMEOUT_SECS, async {
            self.rate_limiter.accept().await;
            self.metrics.add_generic_requests(REQUEST_TYPE_LIST_ZONES, 1);
            let project = self.api.project().to_string();
            let managed = self
                .api
                .list_managed_zones(&project)
                .await
                .map_err(|err| map_error(&err))?;

            let mut zones = Vec::with_capacity(managed.len());
            for zone in managed {
                let id = self.make_zone_id(&zone.name);
                if self.blocked_zones.contains(&id) {
                    info!(zone = %id, "ignoring blocked zone");
                    continue;
                }
                let domain = normalize_domain_name(&zone.dns_name);
                let forwarded = self.forwarded_domains(&project, &zone.name, &domain).await?;
                zones.push(
                    DnsHostedZone::new(PROVIDER_TYPE, id, &domain, String::new(), zone.private)
                        .with_forwarded_domains(forwarded),
                );
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
        let (project, zone_name) = split_zone_id(zone.id())?;
        Ok(Arc::new(CloudDnsQuery {
            api: Arc::clone(&self.api),
            metrics: Arc::clone(&self.metrics),
            project: project.to_string(),
            zone: zone_name.to_string(),
            fallback: (!zone.is_private).then(|| factory()),
        }))
    }

    async fn get_zone_state(&self, zone: &DnsHostedZone) -> Result<DnsSets> {
        let (project, zone_name) = split_zone_id(zone.id())?;
        let record_sets = self.list_record_sets(project, zone_name).await?;
        let mut sets = DnsSets::new();
        for rrs in &record_sets {
            for (name, rs) in variants_of(rrs) {
                sets.add_record_set(&name, rs);
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
}

/// Query path of Cloud DNS zones.
///
/// Private zones and set identifiers are answered from the API, everything
/// else goes to the standard DNS query.
struct CloudDnsQuery {
    api: Arc<dyn CloudDnsApi>,
    metrics: Arc<dyn Metrics>,
    project: String,
    zone: String,
    /// `None` for private zones
    fallback: Option<Arc<dyn QueryDns>>,
}

#[async_trait]
impl QueryDns for CloudDnsQuery {
    async fn query(&self, set_name: &DnsSetName, record_type: RecordType) -> QueryDnsResult {
        if let Some(fallback) = &self.fallback {
            if !set_name.has_set_identifier() {
                return fallback.query(set_name, record_type).await;
            }
        }
        self.metrics.add_generic_requests(REQUEST_TYPE_GET_RECORD_SET, 1);
        let rrs = match self
            .api
            .get_resource_record_set(
                &self.project,
                &self.zone,
                &ensure_trailing_dot(&set_name.dns_name),
                record_type.as_str(),
            )
            .await
        {
            Ok(rrs) => rrs,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(map_error(&err)),
        };
        if !set_name.has_set_identifier() {
            return Ok(build_record_set(record_type, rrs.ttl, &rrs.rrdatas));
        }
        if rrs.routing_policy.is_none() {
            return Err(ProviderError::backend(format!(
                "unsupported record set type for {}[{record_type}] with set identifier {}",
                set_name.dns_name, set_name.set_identifier
            ))
            .into());
        }
        Ok(variants_of(&rrs)
            .into_iter()
            .find(|(name, _)| name.set_identifier == set_name.set_identifier)
            .map(|(_, rs)| rs))
    }
}

#[cfg(test)]
pub(crate) mod fake;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
