// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Conversion between the DNS domain model and the wire messages.
//!
//! Marshaling is protocol version aware: version 0 peers predate routing
//! policies, so names with a set identifier are left out and record sets are
//! sent without policy.

use super::proto;
use crate::constants::PROTOCOL_VERSION_1;
use crate::dns::{
    ttl_to_i32, DnsSet, DnsSetName, DnsSets, Record, RecordSet, RecordType, RoutingPolicy,
};
use crate::dns_errors::{ProviderError, RemoteError, Result};
use crate::provider::ChangeRequestUpdate;

fn invalid(reason: impl Into<String>) -> RemoteError {
    RemoteError::InvalidMessage {
        reason: reason.into(),
    }
}

fn supports_routing_policies(version: i32) -> bool {
    version >= PROTOCOL_VERSION_1
}

/// Marshals a zone state, keyed by the display form of the set name.
#[must_use]
pub fn marshal_dns_sets(sets: &DnsSets, version: i32) -> std::collections::HashMap<String, proto::DnsSet> {
    sets.iter()
        .filter(|(name, _)| supports_routing_policies(version) || !name.has_set_identifier())
        .map(|(name, set)| (name.to_string(), marshal_dns_set(set, version)))
        .collect()
}

#[must_use]
pub fn marshal_dns_set(set: &DnsSet, version: i32) -> proto::DnsSet {
    proto::DnsSet {
        dns_name: set.name.dns_name.clone(),
        update_group: set.update_group.clone(),
        records: set
            .sets
            .iter()
            .map(|(t, rs)| (t.as_str().to_string(), marshal_record_set(rs, version)))
            .collect(),
        set_identifier: if supports_routing_policies(version) {
            set.name.set_identifier.clone()
        } else {
            String::new()
        },
    }
}

#[must_use]
pub fn marshal_record_set(rs: &RecordSet, version: i32) -> proto::RecordSet {
    proto::RecordSet {
        r#type: rs.record_type.as_str().to_string(),
        ttl: ttl_to_i32(rs.ttl),
        record: rs
            .records
            .iter()
            .map(|r| proto::Record {
                value: r.value.clone(),
            })
            .collect(),
        routing_policy: rs
            .routing_policy
            .as_ref()
            .filter(|_| supports_routing_policies(version))
            .map(marshal_routing_policy),
    }
}

fn marshal_routing_policy(policy: &RoutingPolicy) -> proto::RoutingPolicy {
    proto::RoutingPolicy {
        r#type: policy.policy_type.as_str().to_string(),
        parameters: policy
            .parameters
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
}

/// Unmarshals a zone state. The map keys are ignored; names come from the sets.
///
/// # Errors
///
/// Returns [`RemoteError::InvalidMessage`] for unknown record or policy types.
pub fn unmarshal_dns_sets(
    remote: std::collections::HashMap<String, proto::DnsSet>,
) -> Result<DnsSets, RemoteError> {
    let mut sets = DnsSets::new();
    for set in remote.into_values() {
        let set = unmarshal_dns_set(set)?;
        sets.insert(set.name.clone(), set);
    }
    Ok(sets)
}

/// # Errors
///
/// Returns [`RemoteError::InvalidMessage`] for unknown record or policy types.
pub fn unmarshal_dns_set(remote: proto::DnsSet) -> Result<DnsSet, RemoteError> {
    let name = DnsSetName::with_set_identifier(remote.dns_name, remote.set_identifier);
    let mut set = DnsSet::new(&name);
    set.update_group = remote.update_group;
    for (record_type, rs) in remote.records {
        let record_type = parse_record_type(&record_type)?;
        set.sets.insert(record_type, unmarshal_record_set(rs)?);
    }
    Ok(set)
}

/// # Errors
///
/// Returns [`RemoteError::InvalidMessage`] for unknown record or policy types.
pub fn unmarshal_record_set(remote: proto::RecordSet) -> Result<RecordSet, RemoteError> {
    let record_type = parse_record_type(&remote.r#type)?;
    let records = remote.record.into_iter().map(|r| Record::new(r.value)).collect();
    let policy = remote
        .routing_policy
        .map(|p| -> Result<RoutingPolicy, RemoteError> {
            Ok(RoutingPolicy {
                policy_type: p.r#type.parse().map_err(invalid)?,
                parameters: p.parameters.into_iter().collect(),
            })
        })
        .transpose()?;
    Ok(RecordSet::new(record_type, i64::from(remote.ttl), records).with_routing_policy(policy))
}

fn parse_record_type(s: &str) -> Result<RecordType, RemoteError> {
    s.parse().map_err(invalid)
}

/// Marshals the update of one record type of `name`.
///
/// # Errors
///
/// Returns an error if the update holds no record set, or if it needs a set
/// identifier or routing policy the peer's protocol version cannot carry.
pub fn marshal_change_request(
    name: &DnsSetName,
    update_group: &str,
    record_type: RecordType,
    update: &ChangeRequestUpdate,
    version: i32,
) -> Result<proto::ChangeRequest> {
    if !supports_routing_policies(version) && (name.has_set_identifier() || update.has_routing_policy()) {
        return Err(ProviderError::RoutingPolicyNotSupported.into());
    }
    let (action, rs) = match (&update.old, &update.new) {
        (None, Some(new)) => (proto::ChangeAction::Create, new),
        (Some(_), Some(new)) => (proto::ChangeAction::Update, new),
        (Some(old), None) => (proto::ChangeAction::Delete, old),
        (None, None) => {
            return Err(invalid(format!("empty change for {name} ({record_type})")).into());
        }
    };
    Ok(proto::ChangeRequest {
        action: action as i32,
        change: Some(proto::PartialDnsSet {
            dns_name: name.dns_name.clone(),
            update_group: update_group.to_string(),
            record_type: record_type.as_str().to_string(),
            record_set: Some(marshal_record_set(rs, version)),
            set_identifier: name.set_identifier.clone(),
        }),
    })
}

/// Unmarshals a wire change into a local update.
///
/// The wire only carries the desired record set of an update; the current one
/// is taken from `state`. An update of a name missing from `state` becomes a
/// creation.
///
/// # Errors
///
/// Returns [`RemoteError::InvalidMessage`] for unknown actions, a missing
/// change or unknown record types.
pub fn unmarshal_change_request(
    remote: proto::ChangeRequest,
    state: Option<&DnsSets>,
) -> Result<(DnsSetName, RecordType, ChangeRequestUpdate), RemoteError> {
    let action = proto::ChangeAction::try_from(remote.action)
        .map_err(|_| invalid(format!("invalid action: {}", remote.action)))?;
    let change = remote.change.ok_or_else(|| invalid("change request without change"))?;
    let name = DnsSetName::with_set_identifier(change.dns_name, change.set_identifier);
    let record_type = parse_record_type(&change.record_type)?;
    let rs = unmarshal_record_set(
        change
            .record_set
            .ok_or_else(|| invalid(format!("change of {name} without record set")))?,
    )?;
    let update = match action {
        proto::ChangeAction::Create => ChangeRequestUpdate::create(rs),
        proto::ChangeAction::Update => {
            match state.and_then(|s| s.record_set(&name, record_type)) {
                Some(old) => ChangeRequestUpdate::update(old.clone(), rs),
                None => ChangeRequestUpdate::create(rs),
            }
        }
        proto::ChangeAction::Delete => ChangeRequestUpdate::delete(rs),
    };
    Ok((name, record_type, update))
}

#[cfg(test)]
#[path = "conversion_tests.rs"]
mod conversion_tests;
