// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Record sets grouped by DNS name.

use super::records::{Record, RecordSet, RecordType, RoutingPolicy};
use super::{ensure_trailing_dot, normalize_domain_name};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// DNS name plus the set identifier of a routing policy variant.
///
/// An empty set identifier denotes the plain record without routing policy.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct DnsSetName {
    pub dns_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub set_identifier: String,
}

impl DnsSetName {
    pub fn new(dns_name: impl Into<String>) -> Self {
        Self {
            dns_name: dns_name.into(),
            set_identifier: String::new(),
        }
    }

    pub fn with_set_identifier(dns_name: impl Into<String>, set_identifier: impl Into<String>) -> Self {
        Self {
            dns_name: dns_name.into(),
            set_identifier: set_identifier.into(),
        }
    }

    #[must_use]
    pub fn normalize(&self) -> Self {
        Self {
            dns_name: normalize_domain_name(&self.dns_name),
            set_identifier: self.set_identifier.clone(),
        }
    }

    #[must_use]
    pub fn ensure_trailing_dot(&self) -> Self {
        Self {
            dns_name: ensure_trailing_dot(&self.dns_name),
            set_identifier: self.set_identifier.clone(),
        }
    }

    #[must_use]
    pub fn has_set_identifier(&self) -> bool {
        !self.set_identifier.is_empty()
    }

    /// Parses the [`Display`](fmt::Display) form `name` or `name#setIdentifier`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.split_once('#') {
            Some((name, id)) => Self::with_set_identifier(name, id),
            None => Self::new(s),
        }
    }
}

impl fmt::Display for DnsSetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.set_identifier.is_empty() {
            f.write_str(&self.dns_name)
        } else {
            write!(f, "{}#{}", self.dns_name, self.set_identifier)
        }
    }
}

/// All record sets of one [`DnsSetName`], keyed by record type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsSet {
    pub name: DnsSetName,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub update_group: String,
    pub sets: BTreeMap<RecordType, RecordSet>,
}

impl DnsSet {
    #[must_use]
    pub fn new(name: &DnsSetName) -> Self {
        Self {
            name: name.normalize(),
            update_group: String::new(),
            sets: BTreeMap::new(),
        }
    }

    pub fn set_record_set<S: AsRef<str>>(
        &mut self,
        record_type: RecordType,
        policy: Option<RoutingPolicy>,
        ttl: i64,
        values: impl IntoIterator<Item = S>,
    ) {
        let rs = RecordSet::from_values(record_type, ttl, values).with_routing_policy(policy);
        self.sets.insert(record_type, rs);
    }

    #[must_use]
    pub fn match_set(&self, other: &DnsSet) -> bool {
        if self.name != other.name || self.sets.len() != other.sets.len() {
            return false;
        }
        self.sets.iter().all(|(t, rs)| {
            other
                .sets
                .get(t)
                .is_some_and(|other_rs| rs.match_set(other_rs))
        })
    }

    /// Compares only the record sets of `record_type`.
    #[must_use]
    pub fn match_record_type_subset(&self, other: &DnsSet, record_type: RecordType) -> bool {
        if self.name != other.name {
            return false;
        }
        match (self.sets.get(&record_type), other.sets.get(&record_type)) {
            (Some(a), Some(b)) => a.match_set(b),
            (None, None) => true,
            _ => false,
        }
    }
}

/// Record sets of a zone keyed by name.
///
/// Zone states are rebuilt on every fetch; callers clone before mutating.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DnsSets(pub BTreeMap<DnsSetName, DnsSet>);

impl DnsSets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record set, normalizing the name and CNAME targets.
    pub fn add_record_set(&mut self, name: &DnsSetName, mut record_set: RecordSet) {
        let name = name.normalize();
        if record_set.record_type == RecordType::Cname {
            for record in &mut record_set.records {
                record.value = normalize_domain_name(&record.value);
            }
        }
        self.0
            .entry(name.clone())
            .or_insert_with(|| DnsSet::new(&name))
            .sets
            .insert(record_set.record_type, record_set);
    }

    /// Adds one value to the record set of `record_type`, creating it if needed.
    pub fn add_record(&mut self, name: &DnsSetName, record_type: RecordType, value: &str, ttl: i64) {
        let name = name.normalize();
        let value = if record_type == RecordType::Cname {
            normalize_domain_name(value)
        } else {
            value.to_string()
        };
        self.0
            .entry(name.clone())
            .or_insert_with(|| DnsSet::new(&name))
            .sets
            .entry(record_type)
            .or_insert_with(|| RecordSet::new(record_type, ttl, Vec::new()))
            .add(Record::new(value));
    }

    /// Removes a record set and drops the name once it has no sets left.
    pub fn remove_record_set(&mut self, name: &DnsSetName, record_type: RecordType) {
        let name = name.normalize();
        if let Some(set) = self.0.get_mut(&name) {
            set.sets.remove(&record_type);
            if set.sets.is_empty() {
                self.0.remove(&name);
            }
        }
    }

    /// Looks up the record set for a name and type.
    #[must_use]
    pub fn record_set(&self, name: &DnsSetName, record_type: RecordType) -> Option<&RecordSet> {
        self.0
            .get(&name.normalize())
            .and_then(|set| set.sets.get(&record_type))
    }
}

impl Deref for DnsSets {
    type Target = BTreeMap<DnsSetName, DnsSet>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DnsSets {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl FromIterator<(DnsSetName, DnsSet)> for DnsSets {
    fn from_iter<I: IntoIterator<Item = (DnsSetName, DnsSet)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
#[path = "dnsset_tests.rs"]
mod dnsset_tests;
