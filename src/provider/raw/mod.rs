// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-record diff-and-apply support for REST style backends.
//!
//! A backend wraps its native record shape in [`Record`] and implements the
//! CRUD contract of [`Executor`]. [`execution::Execution`] then computes the
//! record level changes for a [`ChangeRequests`](super::ChangeRequests) and
//! issues them one by one.

pub mod execution;

pub use execution::{
    default_routing_policy_checker, execute_requests, Execution, RoutingPolicyChecker,
};

use crate::dns::{unquote, quote, DnsSetName, DnsSets, RecordSet, RecordType, RoutingPolicy};
use crate::dns::{DnsHostedZone, Record as DnsRecord};
use crate::dns_errors::Result;
use async_trait::async_trait;
use std::fmt;

/// Backend native record.
pub trait Record: fmt::Debug + Send + Sync {
    /// Backend id, empty for records not yet created.
    fn id(&self) -> &str;
    fn record_type(&self) -> RecordType;
    fn value(&self) -> &str;
    fn dns_name(&self) -> &str;
    /// Set identifier of a weighted or geolocation variant, empty otherwise.
    fn set_identifier(&self) -> &str;
    fn ttl(&self) -> i64;
    fn set_ttl(&mut self, ttl: i64);

    /// Routing policy carried by the record.
    fn routing_policy(&self) -> Option<RoutingPolicy> {
        None
    }

    /// Stores or clears the routing policy in the native representation.
    fn set_routing_policy(&mut self, set_identifier: &str, policy: Option<&RoutingPolicy>);

    fn clone_box(&self) -> Box<dyn Record>;
}

impl Clone for Box<dyn Record> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

pub type RecordList = Vec<Box<dyn Record>>;

/// Record CRUD of one backend.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn create_record(&self, record: &dyn Record, zone: &DnsHostedZone) -> Result<()>;
    async fn update_record(&self, record: &dyn Record, zone: &DnsHostedZone) -> Result<()>;
    async fn delete_record(&self, record: &dyn Record, zone: &DnsHostedZone) -> Result<()>;

    /// Builds a new, not yet created record.
    fn new_record(
        &self,
        dns_name: &str,
        record_type: RecordType,
        value: &str,
        zone: &DnsHostedZone,
        ttl: i64,
    ) -> Box<dyn Record>;

    /// Current records of a name and type. Empty if there are none.
    async fn get_record_list(
        &self,
        dns_name: &str,
        record_type: RecordType,
        zone: &DnsHostedZone,
    ) -> Result<RecordList>;
}

/// Quotes a TXT value unless it already is a valid quoted string.
#[must_use]
pub fn ensure_quoted_text(value: &str) -> String {
    match unquote(value) {
        Some(_) => value.to_string(),
        None => quote(value),
    }
}

/// Groups native records into DNS sets.
///
/// TXT values are unquoted; the TTL of the last record of a set wins.
#[must_use]
pub fn dns_sets_from_records(records: &[Box<dyn Record>]) -> DnsSets {
    let mut sets = DnsSets::new();
    for record in records {
        let name = DnsSetName::with_set_identifier(record.dns_name(), record.set_identifier());
        let record_type = record.record_type();
        let value = if record_type == RecordType::Txt {
            crate::dns::unquote_lenient(record.value())
        } else {
            record.value().to_string()
        };
        let mut rs = sets
            .record_set(&name, record_type)
            .cloned()
            .unwrap_or_else(|| {
                RecordSet::new(record_type, record.ttl(), Vec::new())
                    .with_routing_policy(record.routing_policy())
            });
        rs.ttl = record.ttl();
        rs.add(DnsRecord::new(value));
        sets.add_record_set(&name, rs);
    }
    sets
}
