// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Record types, record sets and routing policies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// DNS record types handled by the manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordType {
    #[serde(rename = "NS")]
    Ns,
    #[serde(rename = "TXT")]
    Txt,
    #[serde(rename = "CNAME")]
    Cname,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "AAAA")]
    Aaaa,
    /// Provider specific alias for a CNAME (AWS alias target A)
    #[serde(rename = "ALIAS")]
    AliasA,
    /// Provider specific alias for a CNAME (AWS alias target AAAA)
    #[serde(rename = "ALIAS_AAAA")]
    AliasAaaa,
}

impl RecordType {
    pub const ALL: [RecordType; 7] = [
        RecordType::Ns,
        RecordType::Txt,
        RecordType::Cname,
        RecordType::A,
        RecordType::Aaaa,
        RecordType::AliasA,
        RecordType::AliasAaaa,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::Ns => "NS",
            RecordType::Txt => "TXT",
            RecordType::Cname => "CNAME",
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::AliasA => "ALIAS",
            RecordType::AliasAaaa => "ALIAS_AAAA",
        }
    }

    /// Alias types never carry their own TTL.
    #[must_use]
    pub fn is_alias(self) -> bool {
        matches!(self, RecordType::AliasA | RecordType::AliasAaaa)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown record type {s:?}"))
    }
}

/// A single record value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub value: String,
}

impl Record {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// Routing policy kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoutingPolicyType {
    #[serde(rename = "weighted")]
    Weighted,
    #[serde(rename = "geolocation")]
    GeoLocation,
}

impl RoutingPolicyType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RoutingPolicyType::Weighted => "weighted",
            RoutingPolicyType::GeoLocation => "geolocation",
        }
    }
}

impl fmt::Display for RoutingPolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingPolicyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weighted" => Ok(RoutingPolicyType::Weighted),
            "geolocation" => Ok(RoutingPolicyType::GeoLocation),
            other => Err(format!("unknown routing policy type {other:?}")),
        }
    }
}

/// Parameter key of a weighted policy
pub const ROUTING_POLICY_KEY_WEIGHT: &str = "weight";
/// Parameter key of a geolocation policy
pub const ROUTING_POLICY_KEY_LOCATION: &str = "location";

/// Routing policy of a record set with a set identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutingPolicy {
    #[serde(rename = "type")]
    pub policy_type: RoutingPolicyType,
    pub parameters: BTreeMap<String, String>,
}

impl RoutingPolicy {
    /// Creates a policy from key/value pairs.
    pub fn new<'a>(
        policy_type: RoutingPolicyType,
        parameters: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        Self {
            policy_type,
            parameters: parameters
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Weighted policy with the given weight.
    #[must_use]
    pub fn weighted(weight: i64) -> Self {
        Self::new(
            RoutingPolicyType::Weighted,
            [(ROUTING_POLICY_KEY_WEIGHT, weight.to_string().as_str())],
        )
    }

    /// Geolocation policy for the given location.
    #[must_use]
    pub fn geolocation(location: &str) -> Self {
        Self::new(
            RoutingPolicyType::GeoLocation,
            [(ROUTING_POLICY_KEY_LOCATION, location)],
        )
    }

    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}

impl fmt::Display for RoutingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.policy_type)?;
        for (k, v) in &self.parameters {
            write!(f, ",{k}={v}")?;
        }
        Ok(())
    }
}

/// All records of one type at one name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSet {
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub ttl: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignore_ttl: bool,
    pub records: Vec<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_policy: Option<RoutingPolicy>,
}

impl RecordSet {
    #[must_use]
    pub fn new(record_type: RecordType, ttl: i64, records: Vec<Record>) -> Self {
        Self {
            record_type,
            ttl,
            ignore_ttl: false,
            records,
            routing_policy: None,
        }
    }

    /// Creates a record set from plain values.
    pub fn from_values<S: AsRef<str>>(
        record_type: RecordType,
        ttl: i64,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        let records = values
            .into_iter()
            .map(|v| Record::new(v.as_ref()))
            .collect();
        Self::new(record_type, ttl, records)
    }

    #[must_use]
    pub fn with_routing_policy(mut self, policy: Option<RoutingPolicy>) -> Self {
        self.routing_policy = policy;
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn add(&mut self, record: Record) -> &mut Self {
        self.records.push(record);
        self
    }

    /// Values of all records in order.
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.value.as_str()).collect()
    }

    /// Human readable list of values for status messages.
    #[must_use]
    pub fn record_string(&self) -> String {
        if self.records.is_empty() {
            return "no records".to_string();
        }
        format!("[{}]", self.values().join(", "))
    }

    /// Compares values and TTL, ignoring order.
    ///
    /// TTLs are ignored for alias types or when either side sets `ignore_ttl`.
    #[must_use]
    pub fn match_set(&self, other: &RecordSet) -> bool {
        if self.records.len() != other.records.len() {
            return false;
        }
        if !self.record_type.is_alias()
            && !self.ignore_ttl
            && !other.ignore_ttl
            && self.ttl != other.ttl
        {
            return false;
        }
        if self.routing_policy != other.routing_policy {
            return false;
        }
        self.records
            .iter()
            .all(|r| other.records.iter().any(|t| t.value == r.value))
    }

    /// Computes the records to create, update and delete to get from `old` to `self`.
    ///
    /// Records present on both sides are updates only if the TTL differs.
    #[must_use]
    pub fn diff_to(&self, old: &RecordSet) -> (Vec<Record>, Vec<Record>, Vec<Record>) {
        let mut new = Vec::new();
        let mut update = Vec::new();
        for r in &self.records {
            if old.records.iter().any(|d| d.value == r.value) {
                if self.ttl != old.ttl {
                    update.push(r.clone());
                }
            } else {
                new.push(r.clone());
            }
        }
        let delete = old
            .records
            .iter()
            .filter(|d| !self.records.iter().any(|r| r.value == d.value))
            .cloned()
            .collect();
        (new, update, delete)
    }

    /// Reads a `"name=value"` attribute from a TXT record set.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<String> {
        if self.record_type != RecordType::Txt {
            return None;
        }
        let prefix = attr_key_prefix(name);
        self.records.iter().find_map(|r| {
            r.value
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix('"'))
                .map(str::to_string)
        })
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        let prefix = attr_key_prefix(name);
        let attr = format!("{prefix}{value}\"");
        match self.records.iter_mut().find(|r| r.value.starts_with(&prefix)) {
            Some(record) => record.value = attr,
            None => self.records.push(Record::new(attr)),
        }
    }

    pub fn delete_attr(&mut self, name: &str) {
        let prefix = attr_key_prefix(name);
        if let Some(pos) = self.records.iter().position(|r| r.value.starts_with(&prefix)) {
            self.records.remove(pos);
        }
    }
}

impl fmt::Display for RecordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.values().join(","))
    }
}

fn attr_key_prefix(name: &str) -> String {
    format!("\"{name}=")
}

/// A desired target of a DNS name before it is grouped into record sets.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Target {
    pub record_type: RecordType,
    pub value: String,
    pub ttl: i64,
    /// IP stack annotation (`ipv4`, `ipv6`, `dual-stack`), empty if unset
    pub ip_stack: String,
}

impl Target {
    pub fn new(record_type: RecordType, value: impl Into<String>, ttl: i64) -> Self {
        Self {
            record_type,
            value: value.into(),
            ttl,
            ip_stack: String::new(),
        }
    }

    #[must_use]
    pub fn with_ip_stack(mut self, ip_stack: &str) -> Self {
        self.ip_stack = ip_stack.to_string();
        self
    }

    #[must_use]
    pub fn as_record(&self) -> Record {
        Record::new(self.value.clone())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.record_type, self.value)
    }
}

/// Returns true if both lists hold the same targets, ignoring order.
#[must_use]
pub fn targets_differ(a: &[Target], b: &[Target]) -> bool {
    a.len() != b.len() || a.iter().any(|t| !b.contains(t))
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod records_tests;
