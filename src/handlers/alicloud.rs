// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Alibaba Cloud DNS backend.
//!
//! Records are managed one by one through the generic per-record engine
//! ([`raw::execute_requests`]). Alidns has no routing policy object; a weighted
//! variant is stored as the remark of a record (set identifier) together with
//! the native record weight. An update clears the remark by sending
//! [`DELETE_REMARK`], because an empty remark leaves the stored one untouched.
//!
//! Only weighted routing is supported.

use crate::dns::query::{QueryDns, QueryDnsFactory, QueryDnsResult};
use crate::dns::records::ROUTING_POLICY_KEY_WEIGHT;
use crate::dns::{
    normalize_domain_name, DnsHostedZone, DnsSetName, DnsSets, RecordType, RoutingPolicy,
    RoutingPolicyType,
};
use crate::dns_errors::{DnsError, ProviderError, Result, ThrottlingError};
use crate::provider::rate_limiter::RateLimiter;
use crate::provider::raw::{self, dns_sets_from_records, ensure_quoted_text, Executor, Record, RecordList};
use crate::provider::{
    ChangeRequestUpdate, ChangeRequests, DnsHandler, DnsHandlerConfig, LogSink, Metrics,
    REQUEST_TYPE_CREATE_RECORDS, REQUEST_TYPE_DELETE_RECORDS, REQUEST_TYPE_LIST_RECORDS,
    REQUEST_TYPE_LIST_ZONES, REQUEST_TYPE_UPDATE_RECORDS,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub const PROVIDER_TYPE: &str = "alicloud-dns";

/// Host record of the zone apex.
pub const NULL_HOST: &str = "@";

/// Remark that clears the set identifier of a record.
pub const DELETE_REMARK: &str = "-";

/// Failure of an Alidns call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("alidns error {code}: {message}")]
pub struct AlidnsError {
    pub code: String,
    pub message: String,
}

impl AlidnsError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_throttling(&self) -> bool {
        self.code.starts_with("Throttling")
    }
}

fn map_error(err: &AlidnsError) -> DnsError {
    if err.is_throttling() {
        return ProviderError::from(ThrottlingError::new(err.to_string())).into();
    }
    ProviderError::backend(err).into()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlidnsDomain {
    pub domain_id: String,
    pub domain_name: String,
}

/// A record as exchanged with Alidns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlidnsRecord {
    /// Empty for records not yet created
    pub record_id: String,
    pub domain_name: String,
    /// Host record relative to the domain, [`NULL_HOST`] for the apex
    pub rr: String,
    pub record_type: String,
    pub value: String,
    pub ttl: i64,
    pub weight: Option<i64>,
    pub remark: String,
}

/// Alidns calls of the Alicloud backend.
#[async_trait]
pub trait AlidnsApi: Send + Sync {
    async fn list_domains(&self) -> std::result::Result<Vec<AlidnsDomain>, AlidnsError>;

    async fn list_records(&self, domain_name: &str) -> std::result::Result<Vec<AlidnsRecord>, AlidnsError>;

    /// Creates a record and returns its id.
    async fn add_record(&self, record: &AlidnsRecord) -> std::result::Result<String, AlidnsError>;

    async fn update_record(&self, record: &AlidnsRecord) -> std::result::Result<(), AlidnsError>;

    async fn delete_record(&self, record_id: &str) -> std::result::Result<(), AlidnsError>;
}

/// Host record of `dns_name` relative to `domain`.
#[must_use]
pub fn get_rr(dns_name: &str, domain: &str) -> String {
    let name = normalize_domain_name(dns_name);
    let domain = normalize_domain_name(domain);
    if name == domain {
        return NULL_HOST.to_string();
    }
    name.strip_suffix(&format!(".{domain}"))
        .map_or(name.clone(), ToString::to_string)
}

/// Fully qualified name of a host record.
#[must_use]
pub fn get_dns_name(rr: &str, domain: &str) -> String {
    if rr == NULL_HOST {
        normalize_domain_name(domain)
    } else {
        normalize_domain_name(&format!("{rr}.{domain}"))
    }
}

/// [`raw::Record`] view of an Alidns record.
#[derive(Clone, Debug)]
pub struct AlicloudRecord {
    inner: AlidnsRecord,
    record_type: RecordType,
    dns_name: String,
}

impl AlicloudRecord {
    /// `None` for record types that are not managed.
    #[must_use]
    pub fn from_alidns(inner: AlidnsRecord) -> Option<Self> {
        let record_type = match inner.record_type.as_str() {
            "A" => RecordType::A,
            "AAAA" => RecordType::Aaaa,
            "CNAME" => RecordType::Cname,
            "TXT" => RecordType::Txt,
            "NS" => RecordType::Ns,
            _ => return None,
        };
        let dns_name = get_dns_name(&inner.rr, &inner.domain_name);
        Some(Self {
            inner,
            record_type,
            dns_name,
        })
    }

    #[must_use]
    pub fn alidns(&self) -> &AlidnsRecord {
        &self.inner
    }
}

impl Record for AlicloudRecord {
    fn id(&self) -> &str {
        &self.inner.record_id
    }

    fn record_type(&self) -> RecordType {
        self.record_type
    }

    fn value(&self) -> &str {
        &self.inner.value
    }

    fn dns_name(&self) -> &str {
        &self.dns_name
    }

    fn set_identifier(&self) -> &str {
        match self.inner.remark.as_str() {
            DELETE_REMARK => "",
            remark => remark,
        }
    }

    fn ttl(&self) -> i64 {
        self.inner.ttl
    }

    fn set_ttl(&mut self, ttl: i64) {
        self.inner.ttl = ttl;
    }

    fn routing_policy(&self) -> Option<RoutingPolicy> {
        if self.set_identifier().is_empty() {
            return None;
        }
        Some(RoutingPolicy::weighted(self.inner.weight.unwrap_or_default()))
    }

    fn set_routing_policy(&mut self, set_identifier: &str, policy: Option<&RoutingPolicy>) {
        let weight = policy
            .filter(|p| p.policy_type == RoutingPolicyType::Weighted)
            .and_then(|p| p.parameter(ROUTING_POLICY_KEY_WEIGHT))
            .and_then(|w| w.parse::<i64>().ok());
        match weight {
            Some(weight) if !set_identifier.is_empty() => {
                self.inner.remark = set_identifier.to_string();
                self.inner.weight = Some(weight);
            }
            _ => {
                if !self.inner.remark.is_empty() {
                    self.inner.remark = DELETE_REMARK.to_string();
                }
                self.inner.weight = None;
            }
        }
    }

    fn clone_box(&self) -> Box<dyn Record> {
        Box::new(self.clone())
    }
}

/// Accepts plain updates and weighted variants with a non-negative weight.
///
/// # Errors
///
/// Returns [`ProviderError::RoutingPolicyNotSupported`] for other policies and
/// [`ProviderError::InvalidRoutingPolicy`] for malformed weighted ones.
pub fn check_valid_routing_policy(name: &DnsSetName, update: &ChangeRequestUpdate) -> Result<()> {
    for rs in [&update.old, &update.new].into_iter().flatten() {
        let Some(policy) = &rs.routing_policy else {
            if name.has_set_identifier() {
                return Err(ProviderError::InvalidRoutingPolicy {
                    reason: "missing routing policy".to_string(),
                }
                .into());
            }
            continue;
        };
        if !name.has_set_identifier() {
            return Err(ProviderError::InvalidRoutingPolicy {
                reason: "missing set identifier".to_string(),
            }
            .into());
        }
        if policy.policy_type != RoutingPolicyType::Weighted {
            return Err(ProviderError::RoutingPolicyNotSupported.into());
        }
        if let Some(key) = policy.parameters.keys().find(|k| *k != ROUTING_POLICY_KEY_WEIGHT) {
            return Err(ProviderError::InvalidRoutingPolicy {
                reason: format!("unsupported parameter {key}"),
            }
            .into());
        }
        let value = policy.parameter(ROUTING_POLICY_KEY_WEIGHT).unwrap_or_default();
        if !value.parse::<i64>().is_ok_and(|w| w >= 0) {
            return Err(ProviderError::InvalidRoutingPolicy {
                reason: format!("invalid value for weight: {value:?} (only non-negative integers are allowed)"),
            }
            .into());
        }
    }
    Ok(())
}

/// Handler of the `alicloud-dns` provider type.
#[derive(Clone)]
pub struct AlicloudHandler {
    api: Arc<dyn AlidnsApi>,
    blocked_zones: Vec<String>,
    metrics: Arc<dyn Metrics>,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AlicloudHandler {
    pub fn new(config: &DnsHandlerConfig, api: Arc<dyn AlidnsApi>) -> Self {
        Self {
            api,
            blocked_zones: config.advanced_options().blocked_zones,
            metrics: Arc::clone(&config.metrics),
            rate_limiter: Arc::clone(&config.rate_limiter),
        }
    }

    async fn list_records(&self, zone: &DnsHostedZone) -> Result<Vec<AlicloudRecord>> {
        self.rate_limiter.accept().await;
        self.metrics
            .add_zone_requests(zone.id(), REQUEST_TYPE_LIST_RECORDS, 1);
        let records = self
            .api
            .list_records(&zone.domain)
            .await
            .map_err(|err| map_error(&err))?;
        Ok(records.into_iter().filter_map(AlicloudRecord::from_alidns).collect())
    }
}

/// Converts a generic record back into the Alidns form.
///
/// Updates of records without routing policy carry [`DELETE_REMARK`].
fn to_alidns(record: &dyn Record, zone: &DnsHostedZone, update: bool) -> AlidnsRecord {
    let (remark, weight) = match record.routing_policy() {
        Some(policy) => (
            record.set_identifier().to_string(),
            policy
                .parameter(ROUTING_POLICY_KEY_WEIGHT)
                .and_then(|w| w.parse().ok()),
        ),
        None if update => (DELETE_REMARK.to_string(), None),
        None => (String::new(), None),
    };
    AlidnsRecord {
        record_id: record.id().to_string(),
        domain_name: zone.domain.clone(),
        rr: get_rr(record.dns_name(), &zone.domain),
        record_type: record.record_type().as_str().to_string(),
        value: record.value().to_string(),
        ttl: record.ttl(),
        weight,
        remark,
    }
}

#[async_trait]
impl Executor for AlicloudHandler {
    async fn create_record(&self, record: &dyn Record, zone: &DnsHostedZone) -> Result<()> {
        self.rate_limiter.accept().await;
        self.metrics
            .add_zone_requests(zone.id(), REQUEST_TYPE_CREATE_RECORDS, 1);
        self.api
            .add_record(&to_alidns(record, zone, false))
            .await
            .map(|_| ())
            .map_err(|err| map_error(&err))
    }

    async fn update_record(&self, record: &dyn Record, zone: &DnsHostedZone) -> Result<()> {
        self.rate_limiter.accept().await;
        self.metrics
            .add_zone_requests(zone.id(), REQUEST_TYPE_UPDATE_RECORDS, 1);
        self.api
            .update_record(&to_alidns(record, zone, true))
            .await
            .map_err(|err| map_error(&err))
    }

    async fn delete_record(&self, record: &dyn Record, zone: &DnsHostedZone) -> Result<()> {
        self.rate_limiter.accept().await;
        self.metrics
            .add_zone_requests(zone.id(), REQUEST_TYPE_DELETE_RECORDS, 1);
        self.api
            .delete_record(record.id())
            .await
            .map_err(|err| map_error(&err))
    }

    fn new_record(
        &self,
        dns_name: &str,
        record_type: RecordType,
        value: &str,
        zone: &DnsHostedZone,
        ttl: i64,
    ) -> Box<dyn Record> {
        let value = if record_type == RecordType::Txt {
            ensure_quoted_text(value)
        } else {
            value.to_string()
        };
        Box::new(AlicloudRecord {
            inner: AlidnsRecord {
                domain_name: zone.domain.clone(),
                rr: get_rr(dns_name, &zone.domain),
                record_type: record_type.as_str().to_string(),
                value,
                ttl,
                ..AlidnsRecord::default()
            },
            record_type,
            dns_name: normalize_domain_name(dns_name),
        })
    }

    async fn get_record_list(
        &self,
        dns_name: &str,
        record_type: RecordType,
        zone: &DnsHostedZone,
    ) -> Result<RecordList> {
        let name = normalize_domain_name(dns_name);
        Ok(self
            .list_records(zone)
            .await?
            .into_iter()
            .filter(|r| r.dns_name == name && r.record_type == record_type)
            .map(|r| Box::new(r) as Box<dyn Record>)
            .collect())
    }
}

#[async_trait]
impl DnsHandler for AlicloudHandler {
    fn provider_type(&self) -> &str {
        PROVIDER_TYPE
    }

    async fn get_zones(&self) -> Result<Vec<DnsHostedZone>> {
        self.rate_limiter.accept().await;
        self.metrics.add_generic_requests(REQUEST_TYPE_LIST_ZONES, 1);
        let domains = self
            .api
            .list_domains()
            .await
            .map_err(|err| map_error(&err))?;
        Ok(domains
            .into_iter()
            .filter(|d| {
                let blocked = self.blocked_zones.contains(&d.domain_id);
                if blocked {
                    info!(zone = %d.domain_id, "ignoring blocked zone");
                }
                !blocked
            })
            .map(|d| DnsHostedZone::new(PROVIDER_TYPE, d.domain_id, &d.domain_name, d.domain_name.clone(), false))
            .collect())
    }

    fn get_custom_query_dns_func(
        &self,
        zone: &DnsHostedZone,
        factory: &QueryDnsFactory,
    ) -> Result<Arc<dyn QueryDns>> {
        Ok(Arc::new(AlicloudQuery {
            handler: self.clone(),
            zone: zone.clone(),
            fallback: factory(),
        }))
    }

    async fn get_zone_state(&self, zone: &DnsHostedZone) -> Result<DnsSets> {
        let records: RecordList = self
            .list_records(zone)
            .await?
            .into_iter()
            .map(|r| Box::new(r) as Box<dyn Record>)
            .collect();
        let sets = dns_sets_from_records(&records);
        debug!(zone = zone.id(), names = sets.len(), "zone state read");
        Ok(sets)
    }

    async fn execute_requests(
        &self,
        log: &dyn LogSink,
        zone: &DnsHostedZone,
        requests: &ChangeRequests,
    ) -> Result<()> {
        raw::execute_requests(log, self, zone, requests, Some(check_valid_routing_policy)).await
    }
}

/// Query path of Alicloud zones: set identifiers are answered from the API.
struct AlicloudQuery {
    handler: AlicloudHandler,
    zone: DnsHostedZone,
    fallback: Arc<dyn QueryDns>,
}

#[async_trait]
impl QueryDns for AlicloudQuery {
    async fn query(&self, set_name: &DnsSetName, record_type: RecordType) -> QueryDnsResult {
        if !set_name.has_set_identifier() {
            return self.fallback.query(set_name, record_type).await;
        }
        let records: RecordList = self
            .handler
            .get_record_list(&set_name.dns_name, record_type, &self.zone)
            .await?
            .into_iter()
            .filter(|r| r.set_identifier() == set_name.set_identifier)
            .collect();
        let sets = dns_sets_from_records(&records);
        Ok(sets.record_set(&set_name.normalize(), record_type).cloned())
    }
}

#[cfg(test)]
#[path = "alicloud_tests.rs"]
mod alicloud_tests;
