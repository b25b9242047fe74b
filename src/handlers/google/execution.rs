// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Atomic change submission for Cloud DNS.
//!
//! All change requests of a zone are collected into a single Cloud DNS
//! change. Plain record sets go straight into deletions and additions;
//! routing policy variants are merged with the current record set first
//! (see [`routing_policy`](super::routing_policy)).

use super::api::{Change, CloudDnsApi, CloudDnsError, ResourceRecordSet};
use super::routing_policy::{
    describe_routing_policy, extract_routing_policy, map_policy_record_set, RoutingPolicyChanges,
};
use crate::constants::GOOGLE_DEFAULT_RECORD_TTL;
use crate::dns::{ensure_trailing_dot, quote, DnsSetName, RecordSet, RecordType};
use crate::dns_errors::{DnsError, ProviderError, Result, ThrottlingError};
use crate::provider::rate_limiter::RateLimiter;
use crate::provider::{LogSink, Metrics, REQUEST_TYPE_UPDATE_RECORDS};
use std::collections::BTreeSet;

/// HTTP status of a change whose deletions do not match the current state.
const PRECONDITION_FAILED: u16 = 412;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecAction {
    Create,
    Delete,
}

pub(super) fn map_error(err: &CloudDnsError) -> DnsError {
    if err.is_throttling() {
        return ProviderError::from(ThrottlingError::new(err.to_string())).into();
    }
    ProviderError::backend(err).into()
}

/// Cloud DNS record set of a plain record set, with the routing policy of the
/// variant applied.
///
/// # Errors
///
/// Returns an error if the routing policy is invalid for Cloud DNS.
pub fn map_record_set(name: &DnsSetName, rs: &RecordSet) -> Result<ResourceRecordSet> {
    let policy = extract_routing_policy(name, rs.routing_policy.as_ref())?;
    let rrdatas = rs
        .records
        .iter()
        .map(|r| match rs.record_type {
            RecordType::Cname => ensure_trailing_dot(&r.value),
            RecordType::Txt => quote(&r.value),
            _ => r.value.clone(),
        })
        .collect();
    // a missing TTL annotation arrives as 0
    let ttl = if rs.ttl > 0 { rs.ttl } else { GOOGLE_DEFAULT_RECORD_TTL };
    let rrs = ResourceRecordSet {
        name: ensure_trailing_dot(&name.dns_name),
        record_type: rs.record_type.as_str().to_string(),
        ttl,
        rrdatas,
        routing_policy: None,
    };
    Ok(map_policy_record_set(rrs, policy.as_ref()))
}

/// One Cloud DNS change under construction.
pub struct Execution<'a> {
    log: &'a dyn LogSink,
    api: &'a dyn CloudDnsApi,
    project: String,
    zone: String,
    change: Change,
    routing_policy_changes: RoutingPolicyChanges,
}

impl<'a> Execution<'a> {
    pub fn new(log: &'a dyn LogSink, api: &'a dyn CloudDnsApi, project: &str, zone: &str) -> Self {
        Self {
            log,
            api,
            project: project.to_string(),
            zone: zone.to_string(),
            change: Change::default(),
            routing_policy_changes: RoutingPolicyChanges::default(),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the routing policy of `rs` is invalid.
    pub fn add_change(&mut self, action: ExecAction, name: &DnsSetName, rs: &RecordSet) -> Result<()> {
        let set = map_record_set(name, rs)?;
        let set_name = name.ensure_trailing_dot();
        match action {
            ExecAction::Create => {
                self.log.info(&format!(
                    "create {} record set {set_name}[{}/{}]: {}({})",
                    rs.record_type,
                    self.project,
                    self.zone,
                    rs.record_string(),
                    set.ttl
                ));
                if set.routing_policy.is_none() {
                    self.change.additions.push(set);
                } else {
                    self.routing_policy_changes.add_change(&set, true)?;
                }
            }
            ExecAction::Delete => {
                self.log.info(&format!(
                    "delete {} record set {set_name}[{}/{}]: {}",
                    rs.record_type,
                    self.project,
                    self.zone,
                    rs.record_string()
                ));
                if set.routing_policy.is_none() {
                    self.change.deletions.push(set);
                } else {
                    self.routing_policy_changes.add_change(&set, false)?;
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn change(&self) -> &Change {
        &self.change
    }

    /// Merges the routing policy changes into the change.
    ///
    /// # Errors
    ///
    /// Returns an error if a current record set cannot be read.
    pub async fn prepare_submission(&mut self) -> Result<()> {
        let changes = std::mem::take(&mut self.routing_policy_changes);
        let (deletions, additions) = changes
            .calc_deletions_and_additions(self.api, &self.project, &self.zone)
            .await?;

        for c in &self.change.deletions {
            self.log.info(&format!(
                "desired change: Deletion {} {}: {}",
                c.name,
                c.record_type,
                c.rrdatas.join(",")
            ));
        }
        for c in deletions {
            self.log.info(&format!(
                "desired change: Deletion {} {} (routing policy: {})",
                c.name,
                c.record_type,
                describe_routing_policy(&c)
            ));
            self.change.deletions.push(c);
        }
        for c in &self.change.additions {
            self.log.info(&format!(
                "desired change: Addition {} {}: {}",
                c.name,
                c.record_type,
                c.rrdatas.join(",")
            ));
        }
        for c in additions {
            self.log.info(&format!(
                "desired change: Addition {} {} (routing policy: {})",
                c.name,
                c.record_type,
                describe_routing_policy(&c)
            ));
            self.change.additions.push(c);
        }
        Ok(())
    }

    /// Submits the change as one atomic Cloud DNS call.
    ///
    /// # Errors
    ///
    /// Returns an error if preparing or submitting the change fails.
    pub async fn submit_changes(&mut self, metrics: &dyn Metrics, rate_limiter: &dyn RateLimiter) -> Result<()> {
        if self.change.is_empty() && self.routing_policy_changes.is_empty() {
            return Ok(());
        }
        let zone_id = format!("{}/{}", self.project, self.zone);
        self.log.info(&format!("processing changes for zone {zone_id}"));
        self.prepare_submission().await?;

        metrics.add_zone_requests(&zone_id, REQUEST_TYPE_UPDATE_RECORDS, 1);
        rate_limiter.accept().await;
        if let Err(err) = self.api.create_change(&self.project, &self.zone, &self.change).await {
            // The record order of A and AAAA values is not stable, a deletion
            // built from a DNS query may not match the stored record set.
            let retried = if err.code == PRECONDITION_FAILED {
                self.retry_deletion_with_actual_records(err).await
            } else {
                Err(map_error(&err))
            };
            if let Err(err) = retried {
                self.log.error(&format!("failed to submit changes for zone {zone_id}: {err}"));
                return Err(err);
            }
        }
        self.log.info(&format!(
            "{} records added and {} deleted in zone {zone_id}",
            self.change.additions.len(),
            self.change.deletions.len()
        ));
        Ok(())
    }

    async fn retry_deletion_with_actual_records(&mut self, original: CloudDnsError) -> Result<()> {
        if self.change.deletions.is_empty() {
            return Err(map_error(&original));
        }
        let mut deletions = Vec::with_capacity(self.change.deletions.len());
        for rrs in &self.change.deletions {
            let actual = match self
                .api
                .get_resource_record_set(&self.project, &self.zone, &rrs.name, &rrs.record_type)
                .await
            {
                Ok(actual) => actual,
                // already deleted
                Err(err) if err.is_not_found() => continue,
                Err(err) => {
                    return Err(ProviderError::backend(format!(
                        "{original}; failed to get record set {}[{}] for reordering: {err}",
                        rrs.name, rrs.record_type
                    ))
                    .into())
                }
            };
            let mismatch = compare_record_sets(rrs, &actual);
            if !mismatch.is_empty() {
                self.log.warn(&format!(
                    "record set {}[{}] does not match expected deletion: {mismatch}",
                    rrs.name, rrs.record_type
                ));
            }
            deletions.push(actual);
        }
        self.change.deletions = deletions;
        self.api
            .create_change(&self.project, &self.zone, &self.change)
            .await
            .map_err(|err| map_error(&err))
    }
}

/// Describes how `actual` differs from `expected`.
pub(super) fn compare_record_sets(expected: &ResourceRecordSet, actual: &ResourceRecordSet) -> String {
    let mut msgs = Vec::new();
    if expected.ttl != actual.ttl {
        msgs.push(format!("TTL mismatch: expected {}, got {}", expected.ttl, actual.ttl));
    }
    let expected_set: BTreeSet<&String> = expected.rrdatas.iter().collect();
    let actual_set: BTreeSet<&String> = actual.rrdatas.iter().collect();
    let extra_expected: Vec<&&String> = expected_set.difference(&actual_set).collect();
    let extra_actual: Vec<&&String> = actual_set.difference(&expected_set).collect();
    if !extra_expected.is_empty() {
        msgs.push(format!("extra rrdatas in expected: {extra_expected:?}"));
    }
    if !extra_actual.is_empty() {
        msgs.push(format!("extra rrdatas in actual: {extra_actual:?}"));
    }
    if extra_expected.is_empty() && extra_actual.is_empty() && expected.rrdatas != actual.rrdatas {
        msgs.push("rrdatas match, but order differs".to_string());
    }
    msgs.join("; ")
}

#[cfg(test)]
#[path = "execution_tests.rs"]
mod execution_tests;
