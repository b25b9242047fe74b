// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! RFC 2136 dynamic update backend.
//!
//! Serves exactly one zone of an authoritative nameserver. Changes are sent as
//! TSIG signed UPDATE messages over TCP: removed values are deleted by rdata,
//! added values are appended. Values whose TTL changed are deleted and added
//! again.

use crate::constants::{DNS_PORT, DNS_QUERY_TIMEOUT_SECS, TSIG_FUDGE_TIME_SECS};
use crate::dns::{
    ensure_trailing_dot, normalize_domain_name, ttl_to_u32, unquote_lenient, DnsHostedZone,
    DnsSetName, Record, RecordSet, RecordType,
};
use crate::dns_errors::{ConfigError, DnsError, ProviderError, Result};
use crate::provider::checks::{ChecksAdapter, DnsHandlerAdapterChecks, PropertyCheck};
use crate::provider::rate_limiter::RateLimiter;
use crate::provider::validators::{self, PropertyValidator};
use crate::provider::{
    ChangeRequestUpdate, ChangeRequests, DnsHandler, DnsHandlerConfig, LogSink, Metrics,
    REQUEST_TYPE_DELETE_RECORDS, REQUEST_TYPE_LIST_ZONES, REQUEST_TYPE_UPDATE_RECORDS,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hickory_client::client::{Client, SyncClient};
use hickory_client::op::ResponseCode;
use hickory_client::rr::rdata::tsig::TsigAlgorithm;
use hickory_client::rr::rdata::{A, AAAA, CNAME, TXT};
use hickory_client::rr::{DNSClass, Name, RData, Record as HickoryRecord, RecordSet as HickoryRecordSet};
use hickory_client::tcp::TcpClientConnection;
use hickory_proto::rr::dnssec::tsig::TSigner;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const PROVIDER_TYPE: &str = "rfc2136";

pub const PROPERTY_SERVER: &str = "Server";
pub const PROPERTY_ZONE: &str = "Zone";
pub const PROPERTY_TSIG_KEY_NAME: &str = "TSIGKeyName";
pub const PROPERTY_TSIG_SECRET: &str = "TSIGSecret";
pub const PROPERTY_TSIG_SECRET_ALGORITHM: &str = "TSIGSecretAlgorithm";

const TSIG_ALGORITHMS: [(&str, TsigAlgorithm); 5] = [
    ("hmac-sha1.", TsigAlgorithm::HmacSha1),
    ("hmac-sha224.", TsigAlgorithm::HmacSha224),
    ("hmac-sha256.", TsigAlgorithm::HmacSha256),
    ("hmac-sha384.", TsigAlgorithm::HmacSha384),
    ("hmac-sha512.", TsigAlgorithm::HmacSha512),
];

/// Resolves a TSIG algorithm name. An empty name selects HMAC-SHA256.
///
/// # Errors
///
/// Returns a description of the supported algorithms for unknown names.
pub fn find_tsig_algorithm(name: &str) -> std::result::Result<TsigAlgorithm, String> {
    if name.is_empty() {
        return Ok(TsigAlgorithm::HmacSha256);
    }
    let fqdn = ensure_trailing_dot(&name.to_lowercase());
    TSIG_ALGORITHMS
        .iter()
        .find(|(n, _)| *n == fqdn)
        .map(|(_, alg)| alg.clone())
        .ok_or_else(|| {
            let supported: Vec<&str> = TSIG_ALGORITHMS
                .iter()
                .map(|(n, _)| n.trim_end_matches('.'))
                .collect();
            format!(
                "invalid TSIG secret algorithm: {name} (supported: {})",
                supported.join(",")
            )
        })
}

fn canonical_name(name: &str) -> String {
    ensure_trailing_dot(&name.to_lowercase())
}

fn zone_validator() -> PropertyValidator {
    Arc::new(|value: &str| {
        let canonical = canonical_name(value);
        if value == canonical {
            Ok(())
        } else {
            Err(format!(
                "zone must be given in canonical form: '{canonical}' instead of '{value}'"
            ))
        }
    })
}

fn fqdn_validator() -> PropertyValidator {
    Arc::new(|value: &str| {
        if value.ends_with('.') {
            Ok(())
        } else {
            Err("TSIGKeyName must end with '.'".to_string())
        }
    })
}

fn algorithm_validator() -> PropertyValidator {
    Arc::new(|value: &str| find_tsig_algorithm(value).map(|_| ()))
}

/// Kind of an UPDATE message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOperation {
    /// Add records to their rrset
    Insert,
    /// Remove records by rdata
    Remove,
}

impl UpdateOperation {
    fn request_type(self) -> &'static str {
        match self {
            UpdateOperation::Insert => REQUEST_TYPE_UPDATE_RECORDS,
            UpdateOperation::Remove => REQUEST_TYPE_DELETE_RECORDS,
        }
    }
}

/// Sends UPDATE messages for one rrset.
#[async_trait]
pub trait DnsUpdater: Send + Sync {
    async fn update(&self, operation: UpdateOperation, records: HickoryRecordSet) -> Result<()>;
}

/// TSIG key of the nameserver.
#[derive(Clone)]
pub struct TsigKey {
    pub name: String,
    pub secret: String,
    pub algorithm: TsigAlgorithm,
}

impl TsigKey {
    fn signer(&self) -> Result<TSigner> {
        let key = BASE64.decode(&self.secret).map_err(|e| ConfigError::InvalidProperty {
            key: PROPERTY_TSIG_SECRET.to_string(),
            reason: format!("cannot decode TSIG secret: {e}"),
        })?;
        let name = Name::from_str(&self.name).map_err(|e| ConfigError::InvalidProperty {
            key: PROPERTY_TSIG_KEY_NAME.to_string(),
            reason: e.to_string(),
        })?;
        TSigner::new(key, self.algorithm.clone(), name, TSIG_FUDGE_TIME_SECS)
            .map_err(|e| ProviderError::backend(format!("cannot create TSIG signer: {e}")).into())
    }
}

/// [`DnsUpdater`] speaking RFC 2136 over TCP with hickory.
pub struct HickoryUpdater {
    nameserver: String,
    zone: String,
    key: TsigKey,
}

impl HickoryUpdater {
    #[must_use]
    pub fn new(nameserver: String, zone: String, key: TsigKey) -> Self {
        Self {
            nameserver,
            zone,
            key,
        }
    }
}

#[async_trait]
impl DnsUpdater for HickoryUpdater {
    async fn update(&self, operation: UpdateOperation, records: HickoryRecordSet) -> Result<()> {
        let server = self.nameserver.clone();
        let zone = self.zone.clone();
        let signer = self.key.signer()?;

        tokio::task::spawn_blocking(move || -> Result<()> {
            let addr: SocketAddr = server
                .to_socket_addrs()
                .ok()
                .and_then(|mut addrs| addrs.next())
                .ok_or_else(|| ProviderError::backend(format!("invalid nameserver address: {server}")))?;
            let conn = TcpClientConnection::with_timeout(addr, Duration::from_secs(DNS_QUERY_TIMEOUT_SECS))
                .map_err(|e| ProviderError::backend(format!("cannot connect to {server}: {e}")))?;
            let client = SyncClient::with_tsigner(conn, signer);
            let origin = Name::from_str(&zone)
                .map_err(|e| ProviderError::backend(format!("invalid zone name {zone}: {e}")))?;

            let response = match operation {
                UpdateOperation::Insert => client.append(records, origin, false),
                UpdateOperation::Remove => client.delete_by_rdata(records, origin),
            }
            .map_err(|e| ProviderError::backend(format!("DNS update failed: {e}")))?;

            match response.response_code() {
                ResponseCode::NoError => Ok(()),
                code => Err(ProviderError::backend(format!(
                    "DNS server returned error code on {}: {code}",
                    operation.request_type()
                ))
                .into()),
            }
        })
        .await
        .map_err(|e| DnsError::Generic(format!("DNS update task failed: {e}")))?
    }
}

/// Converts a record set into hickory records of `name`.
///
/// TXT values become the strings of a single TXT record.
///
/// # Errors
///
/// Fails for routing policies, malformed addresses and unsupported types.
pub fn build_resource_records(name: &DnsSetName, rs: &RecordSet) -> Result<HickoryRecordSet> {
    if name.has_set_identifier() || rs.routing_policy.is_some() {
        return Err(ProviderError::backend(format!(
            "routing policies not supported for {PROVIDER_TYPE}"
        ))
        .into());
    }
    let fqdn = Name::from_str(&ensure_trailing_dot(&name.dns_name))
        .map_err(|e| ProviderError::backend(format!("invalid DNS name {}: {e}", name.dns_name)))?;
    let ttl = ttl_to_u32(rs.ttl);

    let rdatas: Vec<RData> = match rs.record_type {
        RecordType::A => rs
            .records
            .iter()
            .map(|r| {
                Ipv4Addr::from_str(&r.value)
                    .map(|ip| RData::A(A(ip)))
                    .map_err(|_| ProviderError::backend(format!("not an IPv4 address: {}", r.value)))
            })
            .collect::<std::result::Result<_, _>>()?,
        RecordType::Aaaa => rs
            .records
            .iter()
            .map(|r| {
                Ipv6Addr::from_str(&r.value)
                    .map(|ip| RData::AAAA(AAAA(ip)))
                    .map_err(|_| ProviderError::backend(format!("not an IPv6 address: {}", r.value)))
            })
            .collect::<std::result::Result<_, _>>()?,
        RecordType::Cname => rs
            .records
            .iter()
            .map(|r| {
                Name::from_str(&ensure_trailing_dot(&r.value))
                    .map(|target| RData::CNAME(CNAME(target)))
                    .map_err(|e| ProviderError::backend(format!("invalid CNAME target {}: {e}", r.value)))
            })
            .collect::<std::result::Result<_, _>>()?,
        RecordType::Txt => {
            let strings: Vec<String> = rs.records.iter().map(|r| unquote_lenient(&r.value)).collect();
            vec![RData::TXT(TXT::new(strings))]
        }
        other => {
            return Err(ProviderError::backend(format!("unexpected record type: {other}")).into());
        }
    };

    let mut set = HickoryRecordSet::with_ttl(fqdn.clone(), record_type_of(rs.record_type), ttl);
    for rdata in rdatas {
        let mut record = HickoryRecord::from_rdata(fqdn.clone(), ttl, rdata);
        record.set_dns_class(DNSClass::IN);
        set.insert(record, 0);
    }
    Ok(set)
}

fn record_type_of(record_type: RecordType) -> hickory_client::rr::RecordType {
    use hickory_client::rr::RecordType as H;
    match record_type {
        RecordType::A | RecordType::AliasA => H::A,
        RecordType::Aaaa | RecordType::AliasAaaa => H::AAAA,
        RecordType::Cname => H::CNAME,
        RecordType::Txt => H::TXT,
        RecordType::Ns => H::NS,
    }
}

/// Handler of the `rfc2136` provider type.
pub struct Rfc2136Handler {
    zone: String,
    updater: Arc<dyn DnsUpdater>,
    metrics: Arc<dyn Metrics>,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl Rfc2136Handler {
    /// # Errors
    ///
    /// Returns an error if a property is missing or malformed.
    pub fn new(config: &DnsHandlerConfig) -> Result<Self> {
        let mut server = config.get_required_property(PROPERTY_SERVER, &[])?;
        if !server.contains(':') {
            server = format!("{server}:{DNS_PORT}");
        }
        let zone = config.get_required_property(PROPERTY_ZONE, &[])?;
        let canonical = canonical_name(&zone);
        if zone != canonical {
            return Err(ConfigError::InvalidProperty {
                key: PROPERTY_ZONE.to_string(),
                reason: format!("zone must be given in canonical form: '{canonical}' instead of '{zone}'"),
            }
            .into());
        }
        let key_name = config.get_required_property(PROPERTY_TSIG_KEY_NAME, &[])?;
        if !key_name.ends_with('.') {
            return Err(ConfigError::InvalidProperty {
                key: PROPERTY_TSIG_KEY_NAME.to_string(),
                reason: "TSIGKeyName must end with '.'".to_string(),
            }
            .into());
        }
        let secret = config.get_required_property(PROPERTY_TSIG_SECRET, &[])?;
        let algorithm = config.get_defaulted_property(PROPERTY_TSIG_SECRET_ALGORITHM, "", &[]);
        let algorithm = find_tsig_algorithm(&algorithm).map_err(|reason| ConfigError::InvalidProperty {
            key: PROPERTY_TSIG_SECRET_ALGORITHM.to_string(),
            reason,
        })?;
        let key = TsigKey {
            name: key_name,
            secret,
            algorithm,
        };
        key.signer()?;

        let updater = Arc::new(HickoryUpdater::new(server, zone.clone(), key));
        Ok(Self::with_updater(config, zone, updater))
    }

    /// Handler sending its updates through `updater`.
    #[must_use]
    pub fn with_updater(config: &DnsHandlerConfig, zone: String, updater: Arc<dyn DnsUpdater>) -> Self {
        Self {
            zone,
            updater,
            metrics: Arc::clone(&config.metrics),
            rate_limiter: Arc::clone(&config.rate_limiter),
        }
    }

    async fn exchange(&self, operation: UpdateOperation, records: HickoryRecordSet) -> Result<()> {
        self.rate_limiter.accept().await;
        debug!(zone = %self.zone, ?operation, name = %records.name(), "Sending DNS update");
        let result = self.updater.update(operation, records).await;
        self.metrics
            .add_zone_requests(&self.zone, operation.request_type(), 1);
        result
    }

    async fn apply(&self, log: &dyn LogSink, name: &DnsSetName, update: &ChangeRequestUpdate) -> Result<()> {
        let domain = normalize_domain_name(&self.zone);
        let mut additions = None;
        let mut deletions = None;

        if let Some(new) = &update.new {
            let action = if update.old.is_some() { "UPDATE" } else { "CREATE" };
            log.info(&format!(
                "desired {action}: {} record set {}[{domain}] with TTL {}: {}",
                new.record_type,
                name.dns_name,
                new.ttl,
                new.record_string()
            ));
            match &update.old {
                None => additions = Some(build_resource_records(name, new)?),
                Some(old) => {
                    let (created, updated, mut removed) = new.diff_to(old);
                    removed.extend(updated.iter().cloned());
                    let added: Vec<Record> = created.into_iter().chain(updated).collect();
                    if !added.is_empty() {
                        let rs = RecordSet::new(new.record_type, new.ttl, added);
                        additions = Some(build_resource_records(name, &rs)?);
                    }
                    if !removed.is_empty() {
                        let rs = RecordSet::new(old.record_type, old.ttl, removed);
                        deletions = Some(build_resource_records(name, &rs)?);
                    }
                }
            }
        } else if let Some(old) = &update.old {
            log.info(&format!(
                "desired DELETE: {} record set {}[{domain}] with TTL {}: {}",
                old.record_type,
                name.dns_name,
                old.ttl,
                old.record_string()
            ));
            deletions = Some(build_resource_records(name, old)?);
        }

        if let Some(records) = deletions.filter(|rs| !rs.is_empty()) {
            self.exchange(UpdateOperation::Remove, records).await?;
        }
        if let Some(records) = additions.filter(|rs| !rs.is_empty()) {
            self.exchange(UpdateOperation::Insert, records).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl DnsHandler for Rfc2136Handler {
    fn provider_type(&self) -> &str {
        PROVIDER_TYPE
    }

    async fn get_zones(&self) -> Result<Vec<DnsHostedZone>> {
        let domain = normalize_domain_name(&self.zone);
        self.metrics.add_generic_requests(REQUEST_TYPE_LIST_ZONES, 1);
        Ok(vec![DnsHostedZone::new(
            PROVIDER_TYPE,
            self.zone.clone(),
            &domain,
            self.zone.clone(),
            false,
        )])
    }

    async fn execute_requests(
        &self,
        log: &dyn LogSink,
        zone: &DnsHostedZone,
        requests: &ChangeRequests,
    ) -> Result<()> {
        let mut succeeded = 0usize;
        let mut failed = 0usize;
        for update in requests.updates.values() {
            match self.apply(log, &requests.name, update).await {
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
                zone.id()
            ));
        }
        if failed > 0 {
            log.info(&format!(
                "failed updates for records in zone {}: {failed}",
                zone.id()
            ));
            return Err(ProviderError::ChangesFailed { count: failed }.into());
        }
        Ok(())
    }
}

/// Property checks of the `rfc2136` provider type. Provider configs are rejected.
#[must_use]
pub fn adapter() -> ChecksAdapter {
    let mut checks = DnsHandlerAdapterChecks::new();
    checks.add(PropertyCheck::required(PROPERTY_SERVER).validators([
        validators::no_trailing_whitespace(),
        validators::alpha_numeric_punctuation(),
        validators::max_length(256),
    ]));
    checks.add(PropertyCheck::required(PROPERTY_ZONE).validators([
        validators::no_trailing_whitespace(),
        validators::alpha_numeric_punctuation(),
        validators::max_length(256),
        zone_validator(),
    ]));
    checks.add(PropertyCheck::required(PROPERTY_TSIG_KEY_NAME).validators([
        validators::no_trailing_whitespace(),
        validators::alpha_numeric_punctuation(),
        validators::max_length(256),
        fqdn_validator(),
    ]));
    checks.add(
        PropertyCheck::required(PROPERTY_TSIG_SECRET)
            .validators([validators::no_trailing_whitespace(), validators::max_length(128)])
            .hide_value(),
    );
    checks.add(PropertyCheck::optional(PROPERTY_TSIG_SECRET_ALGORITHM).validators([algorithm_validator()]));
    ChecksAdapter::new(PROVIDER_TYPE, checks).with_provider_config_validator(Arc::new(|_| {
        Err(format!("provider config not supported for {PROVIDER_TYPE} provider"))
    }))
}

#[cfg(test)]
#[path = "rfc2136_tests.rs"]
mod rfc2136_tests;
