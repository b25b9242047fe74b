// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! PowerDNS authoritative server backend.
//!
//! Talks to the PowerDNS HTTP API. Every record type of a change request is
//! applied as one rrset: `REPLACE` for creations and updates, `DELETE` for
//! deletions. Routing policies are not supported.
//!
//! The non-secret settings `server`, `virtualHost` and `insecureSkipVerify`
//! may be set in the provider config instead of the secret.

use crate::dns::{
    ensure_trailing_dot, normalize_domain_name, quote, ttl_to_u32, DnsHostedZone, DnsSetName,
    RecordSet, RecordType,
};
use crate::dns_errors::{ConfigError, ProviderError, Result, ThrottlingError};
use crate::provider::checks::{ChecksAdapter, DnsHandlerAdapterChecks, PropertyCheck};
use crate::provider::rate_limiter::RateLimiter;
use crate::provider::validators;
use crate::provider::{
    ChangeRequestUpdate, ChangeRequests, DnsHandler, DnsHandlerConfig, LogSink, Metrics,
    REQUEST_TYPE_DELETE_RECORDS, REQUEST_TYPE_LIST_ZONES, REQUEST_TYPE_UPDATE_RECORDS,
};
use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

pub const PROVIDER_TYPE: &str = "powerdns";

const DEFAULT_VIRTUAL_HOST: &str = "localhost";

/// Zone entry of the zone listing.
#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct PatchRequest {
    rrsets: Vec<RrSet>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum ChangeType {
    Replace,
    Delete,
}

#[derive(Debug, Serialize)]
struct RrSet {
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl: Option<u32>,
    changetype: ChangeType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    records: Vec<RrRecord>,
}

#[derive(Debug, Serialize)]
struct RrRecord {
    content: String,
    disabled: bool,
}

/// PowerDNS rrset built from a record set.
#[derive(Debug, Clone, PartialEq)]
struct PdnsRecordSet {
    name: String,
    record_type: String,
    ttl: u32,
    content: Vec<String>,
}

fn build_record_set(name: &DnsSetName, rs: &RecordSet) -> Result<PdnsRecordSet> {
    if rs.routing_policy.is_some() || name.has_set_identifier() {
        return Err(ProviderError::backend("PowerDNS provider does not support routing policies").into());
    }
    let content = rs
        .records
        .iter()
        .map(|r| match rs.record_type {
            RecordType::Cname => ensure_trailing_dot(&r.value),
            RecordType::Txt => quote(&r.value),
            _ => r.value.clone(),
        })
        .collect();
    Ok(PdnsRecordSet {
        name: name.dns_name.clone(),
        record_type: rs.record_type.as_str().to_string(),
        ttl: ttl_to_u32(rs.ttl),
        content,
    })
}

/// Non-secret settings, given in the provider config or in the secret but not in both.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PowerDnsSettings {
    server: Option<String>,
    virtual_host: Option<String>,
    insecure_skip_verify: Option<bool>,
}

impl PowerDnsSettings {
    fn from_config(config: &DnsHandlerConfig) -> Result<Self> {
        let mut settings = match config.provider_config {
            Some(_) => config.provider_config_as::<Self>()?,
            None => Self::default(),
        };
        config.fill_required_property(&mut settings.server, "Server", &["server"])?;
        config.fill_default_property(
            &mut settings.virtual_host,
            DEFAULT_VIRTUAL_HOST,
            "VirtualHost",
            &["virtualHost"],
        )?;
        config.fill_default_bool_property(
            &mut settings.insecure_skip_verify,
            false,
            "InsecureSkipVerify",
            &["insecureSkipVerify"],
        )?;
        Ok(settings)
    }
}

/// Handler of the `powerdns` provider type.
pub struct PowerDnsHandler {
    http: HttpClient,
    base_url: String,
    api_key: String,
    blocked_zones: Vec<String>,
    metrics: Arc<dyn Metrics>,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl PowerDnsHandler {
    /// # Errors
    ///
    /// Returns an error if a required property is missing or the HTTP client
    /// cannot be built from the TLS properties.
    pub fn new(config: &DnsHandlerConfig) -> Result<Self> {
        let settings = PowerDnsSettings::from_config(config)?;
        let api_key = config.get_required_property("ApiKey", &["apiKey"])?;
        let trusted_ca_cert = config.get_property("TrustedCaCert", &["trustedCaCert"]);

        let http = new_http_client(
            settings.insecure_skip_verify.unwrap_or_default(),
            trusted_ca_cert.as_deref(),
        )?;
        let server = settings.server.unwrap_or_default();
        let virtual_host = settings
            .virtual_host
            .unwrap_or_else(|| DEFAULT_VIRTUAL_HOST.to_string());
        Ok(Self {
            http,
            base_url: format!(
                "{}/api/v1/servers/{virtual_host}",
                server.trim_end_matches('/')
            ),
            api_key,
            blocked_zones: config.advanced_options().blocked_zones,
            metrics: Arc::clone(&config.metrics),
            rate_limiter: Arc::clone(&config.rate_limiter),
        })
    }

    fn is_blocked_zone(&self, zone_id: &str) -> bool {
        self.blocked_zones.iter().any(|z| z == zone_id)
    }

    fn zone_url(&self, zone_id: &str) -> String {
        format!("{}/zones/{}", self.base_url, ensure_trailing_dot(zone_id))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .header("X-API-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::backend(format!("PowerDNS request failed: {e}")))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        error!(status = %status, error = %text, "PowerDNS API request failed");
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::from(ThrottlingError::new(format!("HTTP {status}: {text}"))).into());
        }
        Err(ProviderError::backend(format!("HTTP {status}: {text}")).into())
    }

    async fn patch(&self, zone_id: &str, rrset: RrSet) -> Result<()> {
        self.rate_limiter.accept().await;
        let body = PatchRequest {
            rrsets: vec![rrset],
        };
        debug!(zone = zone_id, ?body, "PowerDNS rrset change");
        self.send(self.http.patch(self.zone_url(zone_id)).json(&body))
            .await
            .map(|_| ())
    }

    async fn replace(&self, zone_id: &str, rs: &PdnsRecordSet) -> Result<()> {
        let rrset = RrSet {
            name: ensure_trailing_dot(&rs.name),
            record_type: rs.record_type.clone(),
            ttl: Some(rs.ttl),
            changetype: ChangeType::Replace,
            records: rs
                .content
                .iter()
                .map(|c| RrRecord {
                    content: c.clone(),
                    disabled: false,
                })
                .collect(),
        };
        let result = self.patch(zone_id, rrset).await;
        self.metrics
            .add_zone_requests(zone_id, REQUEST_TYPE_UPDATE_RECORDS, 1);
        result
    }

    async fn delete(&self, zone_id: &str, rs: &PdnsRecordSet) -> Result<()> {
        let rrset = RrSet {
            name: ensure_trailing_dot(&rs.name),
            record_type: rs.record_type.clone(),
            ttl: None,
            changetype: ChangeType::Delete,
            records: Vec::new(),
        };
        let result = self.patch(zone_id, rrset).await;
        self.metrics
            .add_zone_requests(zone_id, REQUEST_TYPE_DELETE_RECORDS, 1);
        result
    }

    async fn apply(
        &self,
        log: &dyn LogSink,
        zone: &DnsHostedZone,
        name: &DnsSetName,
        update: &ChangeRequestUpdate,
    ) -> Result<()> {
        let old = update.old.as_ref().map(|rs| build_record_set(name, rs)).transpose()?;
        if let Some(set) = &update.new {
            let rs = build_record_set(name, set)?;
            log.info(&format!(
                "desired UPSERT: {} record set {}[{}] with TTL {}: {}",
                rs.record_type,
                name.dns_name,
                zone.id(),
                rs.ttl,
                set.record_string()
            ));
            return self.replace(zone.id(), &rs).await;
        }
        match (old, &update.old) {
            (Some(rs), Some(set)) => {
                log.info(&format!(
                    "desired DELETE: {} record set {}[{}] with TTL {}: {}",
                    rs.record_type,
                    name.dns_name,
                    zone.id(),
                    rs.ttl,
                    set.record_string()
                ));
                self.delete(zone.id(), &rs).await
            }
            _ => Err(ProviderError::backend(format!(
                "both old and new record sets are empty for {name}"
            ))
            .into()),
        }
    }
}

fn new_http_client(insecure_skip_verify: bool, trusted_ca_cert: Option<&str>) -> Result<HttpClient> {
    let mut builder = HttpClient::builder();
    if insecure_skip_verify {
        builder = builder.danger_accept_invalid_certs(true);
    }
    if let Some(pem) = trusted_ca_cert {
        let cert = reqwest::Certificate::from_pem(pem.as_bytes()).map_err(|e| {
            ConfigError::InvalidProperty {
                key: "TrustedCaCert".to_string(),
                reason: e.to_string(),
            }
        })?;
        builder = builder.add_root_certificate(cert);
    }
    builder
        .build()
        .map_err(|e| ProviderError::backend(format!("cannot build HTTP client: {e}")).into())
}

#[async_trait]
impl DnsHandler for PowerDnsHandler {
    fn provider_type(&self) -> &str {
        PROVIDER_TYPE
    }

    async fn get_zones(&self) -> Result<Vec<DnsHostedZone>> {
        self.rate_limiter.accept().await;
        let response = self
            .send(self.http.get(format!("{}/zones", self.base_url)))
            .await?;
        let zones: Vec<Zone> = response
            .json()
            .await
            .map_err(|e| ProviderError::backend(format!("cannot decode PowerDNS zones: {e}")))?;
        self.metrics.add_generic_requests(REQUEST_TYPE_LIST_ZONES, 1);

        Ok(zones
            .into_iter()
            .filter(|z| !self.is_blocked_zone(&z.id))
            .map(|z| {
                let domain = normalize_domain_name(&z.name);
                DnsHostedZone::new(PROVIDER_TYPE, z.id.clone(), &domain, z.id, false)
            })
            .collect())
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
            match self.apply(log, zone, &requests.name, update).await {
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

/// Property checks of the `powerdns` provider type. `Server`, `VirtualHost` and
/// `InsecureSkipVerify` may be given in the provider config instead.
#[must_use]
pub fn adapter() -> ChecksAdapter {
    let mut checks = DnsHandlerAdapterChecks::new();
    checks.add(
        PropertyCheck::optional("Server")
            .aliases(&["server"])
            .validators([validators::no_trailing_whitespace(), validators::url_schemes(&["http", "https"])]),
    );
    checks.add(
        PropertyCheck::required("ApiKey")
            .aliases(&["apiKey"])
            .validators([validators::no_trailing_whitespace(), validators::printable()])
            .hide_value(),
    );
    checks.add(
        PropertyCheck::optional("VirtualHost")
            .aliases(&["virtualHost"])
            .validators([validators::no_trailing_whitespace(), validators::max_length(255)]),
    );
    checks.add(
        PropertyCheck::optional("InsecureSkipVerify")
            .aliases(&["insecureSkipVerify"])
            .validators([validators::bool_value()]),
    );
    checks.add(
        PropertyCheck::optional("TrustedCaCert")
            .aliases(&["trustedCaCert"])
            .validators([validators::ca_cert()]),
    );
    ChecksAdapter::new(PROVIDER_TYPE, checks).with_provider_config_validator(Arc::new(|config| {
        serde_json::from_value::<PowerDnsSettings>(config.clone())
            .map(|_| ())
            .map_err(|err| err.to_string())
    }))
}

#[cfg(test)]
#[path = "powerdns_tests.rs"]
mod powerdns_tests;
