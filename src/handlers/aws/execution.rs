// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Batched submission of Route53 changes.
//!
//! Changes are split into batches of at most `batch_size` entries, deletions
//! first so that a record replaced by one of another type does not collide
//! with its predecessor. Each batch is one `ChangeResourceRecordSets` call.
//!
//! Route53 rejects a whole batch if a single change conflicts. When the
//! rejection names changes that are already in effect (a deletion of a missing
//! record, a creation of an identical existing record) these are counted as
//! succeeded and the rest of the batch is submitted again.

use super::alias::alias_target_for;
use super::api::{
    Change, ChangeAction, ResourceRecordSet, Route53Api, Route53Error, RR_TYPE_A, RR_TYPE_AAAA,
    RR_TYPE_CNAME, RR_TYPE_NS, RR_TYPE_TXT,
};
use crate::dns::{
    ensure_trailing_dot, normalize_domain_name, quote, DnsSetName, RecordSet, RecordType,
    RoutingPolicy, RoutingPolicyType,
};
use crate::dns::records::{ROUTING_POLICY_KEY_LOCATION, ROUTING_POLICY_KEY_WEIGHT};
use crate::dns_errors::{stable_error, ProviderError, Result, ThrottlingError};
use crate::provider::rate_limiter::RateLimiter;
use crate::provider::{LogSink, Metrics, REQUEST_TYPE_LIST_RECORDS, REQUEST_TYPE_UPDATE_RECORDS};
use regex::Regex;
use std::sync::LazyLock;

static PATTERN_NOT_FOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Tried to delete resource record set \[name='([^']+)', type='([^']+)'\] but it was not found")
        .expect("not found pattern must compile")
});

static PATTERN_EXISTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Tried to create resource record set \[name='([^']+)', type='([^']+)'\] but it already exists")
        .expect("exists pattern must compile")
});

/// Route53 type of a record type. Alias types map to A and AAAA.
#[must_use]
pub fn route53_type(record_type: RecordType) -> &'static str {
    match record_type {
        RecordType::A | RecordType::AliasA => RR_TYPE_A,
        RecordType::Aaaa | RecordType::AliasAaaa => RR_TYPE_AAAA,
        RecordType::Cname => RR_TYPE_CNAME,
        RecordType::Txt => RR_TYPE_TXT,
        RecordType::Ns => RR_TYPE_NS,
    }
}

/// Builds the Route53 record set of one record set of `name`.
///
/// # Errors
///
/// Returns an error if an alias target is not served by a canonical hosted
/// zone or the routing policy cannot be expressed.
pub fn build_resource_record_set(name: &DnsSetName, rs: &RecordSet) -> Result<ResourceRecordSet> {
    let mut rrs = ResourceRecordSet {
        name: ensure_trailing_dot(&name.dns_name),
        record_type: route53_type(rs.record_type).to_string(),
        ..ResourceRecordSet::default()
    };
    if rs.record_type.is_alias() {
        let alias = alias_target_for(rs).ok_or_else(|| {
            ProviderError::backend(format!("corrupted alias record set {name}: {}", rs.record_string()))
        })?;
        rrs.alias_target = Some(alias);
    } else {
        rrs.ttl = Some(rs.ttl);
        rrs.values = rs
            .records
            .iter()
            .map(|r| match rs.record_type {
                RecordType::Txt => quote(&r.value),
                RecordType::Cname => ensure_trailing_dot(&r.value),
                _ => r.value.clone(),
            })
            .collect();
    }
    add_routing_policy(&mut rrs, name, rs.routing_policy.as_ref())?;
    Ok(rrs)
}

fn add_routing_policy(
    rrs: &mut ResourceRecordSet,
    name: &DnsSetName,
    policy: Option<&RoutingPolicy>,
) -> Result<()> {
    let Some(policy) = policy else {
        if name.has_set_identifier() {
            return Err(invalid_policy(format!("missing routing policy for set identifier {}", name.set_identifier)));
        }
        return Ok(());
    };
    if !name.has_set_identifier() {
        return Err(invalid_policy("missing set identifier".to_string()));
    }
    rrs.set_identifier = Some(name.set_identifier.clone());
    match policy.policy_type {
        RoutingPolicyType::Weighted => {
            let value = policy
                .parameter(ROUTING_POLICY_KEY_WEIGHT)
                .ok_or_else(|| invalid_policy("missing weight parameter".to_string()))?;
            let weight = value
                .parse::<i64>()
                .ok()
                .filter(|w| *w >= 0)
                .ok_or_else(|| {
                    invalid_policy(format!(
                        "invalid value for weight: {value} (only non-negative integers are allowed)"
                    ))
                })?;
            rrs.weight = Some(weight);
        }
        RoutingPolicyType::GeoLocation => {
            let location = policy
                .parameter(ROUTING_POLICY_KEY_LOCATION)
                .filter(|l| !l.is_empty())
                .ok_or_else(|| invalid_policy("missing location parameter".to_string()))?;
            rrs.geo_location = Some(location.to_string());
        }
    }
    Ok(())
}

fn invalid_policy(reason: String) -> crate::dns_errors::DnsError {
    ProviderError::InvalidRoutingPolicy { reason }.into()
}

/// Routing policy carried by a Route53 record set.
#[must_use]
pub fn extract_routing_policy(rrs: &ResourceRecordSet) -> Option<RoutingPolicy> {
    if let Some(weight) = rrs.weight {
        return Some(RoutingPolicy::weighted(weight));
    }
    rrs.geo_location.as_deref().map(RoutingPolicy::geolocation)
}

/// Splits changes into batches of at most `max` entries, deletions first.
#[must_use]
pub fn limit_change_set(changes: &[Change], max: usize) -> Vec<Vec<Change>> {
    let max = max.max(1);
    let (deletions, others): (Vec<&Change>, Vec<&Change>) = changes
        .iter()
        .partition(|c| c.action == ChangeAction::Delete);
    let mut batches = Vec::new();
    for group in [deletions, others] {
        for chunk in group.chunks(max) {
            batches.push(chunk.iter().map(|c| (*c).clone()).collect());
        }
    }
    batches
}

/// Outcome of one batch.
#[derive(Debug, Default)]
struct BatchResult {
    succeeded: usize,
    failed: usize,
    error: Option<Route53Error>,
}

/// Collects the changes of one execution and submits them in batches.
pub struct Execution<'a> {
    log: &'a dyn LogSink,
    api: &'a dyn Route53Api,
    zone_id: &'a str,
    batch_size: usize,
    changes: Vec<Change>,
}

impl<'a> Execution<'a> {
    pub fn new(log: &'a dyn LogSink, api: &'a dyn Route53Api, zone_id: &'a str, batch_size: usize) -> Self {
        Self {
            log,
            api,
            zone_id,
            batch_size,
            changes: Vec::new(),
        }
    }

    /// Adds a change for one record set of `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record set cannot be mapped.
    pub fn add_change(&mut self, action: ChangeAction, name: &DnsSetName, rs: &RecordSet) -> Result<()> {
        let name = name.ensure_trailing_dot();
        self.log.info(&format!(
            "{action} {} record set {name}[{}]: {}({})",
            rs.record_type,
            self.zone_id,
            rs.record_string(),
            rs.ttl
        ));
        let record_set = build_resource_record_set(&name, rs).inspect_err(|err| {
            self.log
                .error(&format!("add change failed for {name}[{}]: {err}", self.zone_id));
        })?;
        self.changes.push(Change { action, record_set });
        Ok(())
    }

    #[must_use]
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Submits all changes.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::ChangesFailed`] if any change failed, wrapped
    /// as throttling error if every batch was throttled. The message of the
    /// last backend error is logged with volatile parts redacted.
    pub async fn submit_changes(self, metrics: &dyn Metrics, rate_limiter: &dyn RateLimiter) -> Result<()> {
        if self.changes.is_empty() {
            return Ok(());
        }
        let batches = limit_change_set(&self.changes, self.batch_size);
        self.log.info(&format!(
            "{} batches required for {} changes",
            batches.len(),
            self.changes.len()
        ));

        let mut failed = 0usize;
        let mut throttled = 0usize;
        let mut last_error = None;
        for (i, batch) in batches.iter().enumerate() {
            self.log.info(&format!(
                "processing batch {} for zone {} with {} changes",
                i + 1,
                self.zone_id,
                batch.len()
            ));
            for change in batch {
                let extra = change
                    .record_set
                    .alias_target
                    .as_ref()
                    .map(|a| format!(" (alias target hosted zone {})", a.hosted_zone_id))
                    .unwrap_or_default();
                self.log.info(&format!(
                    "desired change: {} {} {}{extra}",
                    change.action, change.record_set.name, change.record_set.record_type
                ));
            }

            let result = match self.change_batch(metrics, rate_limiter, batch).await {
                Ok(()) => BatchResult {
                    succeeded: batch.len(),
                    ..BatchResult::default()
                },
                Err(err) if err.is_invalid_change_batch() => {
                    self.try_fix_changes(metrics, rate_limiter, &err, batch).await
                }
                Err(err) => {
                    if err.is_throttling() {
                        throttled += 1;
                    }
                    BatchResult {
                        failed: batch.len(),
                        error: Some(err),
                        ..BatchResult::default()
                    }
                }
            };

            if result.failed > 0 {
                failed += result.failed;
                let message = result
                    .error
                    .as_ref()
                    .map(|e| stable_error(&e.to_string()))
                    .unwrap_or_default();
                self.log.error(&format!(
                    "{} records in zone {} failed: {message}",
                    result.failed, self.zone_id
                ));
                last_error = Some(message);
            }
            if result.succeeded > 0 {
                self.log.info(&format!(
                    "{} records in zone {} were successfully updated",
                    result.succeeded, self.zone_id
                ));
            }
        }

        if failed == 0 {
            return Ok(());
        }
        let err = ProviderError::ChangesFailed { count: failed };
        if throttled == batches.len() {
            return Err(ProviderError::from(ThrottlingError::new(
                last_error.unwrap_or_else(|| err.to_string()),
            ))
            .into());
        }
        Err(err.into())
    }

    async fn change_batch(
        &self,
        metrics: &dyn Metrics,
        rate_limiter: &dyn RateLimiter,
        batch: &[Change],
    ) -> std::result::Result<(), Route53Error> {
        rate_limiter.accept().await;
        metrics.add_zone_requests(self.zone_id, REQUEST_TYPE_UPDATE_RECORDS, 1);
        self.api.change_resource_record_sets(self.zone_id, batch).await
    }

    /// Sorts out changes of a rejected batch that are already in effect and
    /// resubmits the others.
    async fn try_fix_changes(
        &self,
        metrics: &dyn Metrics,
        rate_limiter: &dyn RateLimiter,
        err: &Route53Error,
        batch: &[Change],
    ) -> BatchResult {
        let not_found: Vec<(String, String)> = captures(&PATTERN_NOT_FOUND, &err.message);
        let exists: Vec<(String, String)> = captures(&PATTERN_EXISTS, &err.message);

        let mut result = BatchResult::default();
        let mut unclear = Vec::new();
        for change in batch {
            let rrs = &change.record_set;
            let named = |(name, record_type): &(String, String)| {
                normalize_domain_name(name) == normalize_domain_name(&rrs.name)
                    && *record_type == rrs.record_type
            };
            let already_created = change.action == ChangeAction::Create
                && exists.iter().any(named)
                && self.is_fetched_record_set_equal(metrics, rate_limiter, rrs).await;
            match change.action {
                ChangeAction::Delete if not_found.iter().any(named) => {
                    self.log.info(&format!(
                        "ignoring already deleted record {} ({})",
                        rrs.name, rrs.record_type
                    ));
                    result.succeeded += 1;
                }
                ChangeAction::Create if already_created => {
                    self.log.info(&format!(
                        "ignoring already created record {} ({})",
                        rrs.name, rrs.record_type
                    ));
                    result.succeeded += 1;
                }
                _ => unclear.push(change.clone()),
            }
        }

        if unclear.is_empty() {
            return result;
        }
        if unclear.len() == batch.len() {
            result.failed = unclear.len();
            result.error = Some(err.clone());
            return result;
        }
        match self.change_batch(metrics, rate_limiter, &unclear).await {
            Ok(()) => result.succeeded += unclear.len(),
            Err(retry_err) => {
                result.failed += unclear.len();
                result.error = Some(retry_err);
            }
        }
        result
    }

    async fn is_fetched_record_set_equal(
        &self,
        metrics: &dyn Metrics,
        rate_limiter: &dyn RateLimiter,
        rrs: &ResourceRecordSet,
    ) -> bool {
        rate_limiter.accept().await;
        metrics.add_zone_requests(self.zone_id, REQUEST_TYPE_LIST_RECORDS, 1);
        let Ok(existing) = self.api.list_resource_record_sets(self.zone_id).await else {
            return false;
        };
        existing.iter().any(|o| {
            normalize_domain_name(&o.name) == normalize_domain_name(&rrs.name)
                && o.record_type == rrs.record_type
                && o.set_identifier == rrs.set_identifier
                && o.ttl == rrs.ttl
                && o.values == rrs.values
                && o.alias_target == rrs.alias_target
        })
    }
}

fn captures(re: &Regex, message: &str) -> Vec<(String, String)> {
    re.captures_iter(message)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

#[cfg(test)]
#[path = "execution_tests.rs"]
mod execution_tests;
