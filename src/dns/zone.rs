// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hosted zones exposed by a provider backend.

use super::{is_sub_domain, normalize_domain_name};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Zone id qualified by the provider type that owns it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneId {
    pub provider_type: String,
    pub id: String,
}

impl ZoneId {
    pub fn new(provider_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            provider_type: provider_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider_type, self.id)
    }
}

/// A zone served by a backend.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsHostedZone {
    pub zone_id: ZoneId,
    /// Backend specific key, often the domain with a trailing dot
    pub key: String,
    pub domain: String,
    /// Subdomains delegated elsewhere; names below them do not belong to this zone
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forwarded_domains: Vec<String>,
    #[serde(default)]
    pub is_private: bool,
}

impl DnsHostedZone {
    pub fn new(
        provider_type: &str,
        id: impl Into<String>,
        domain: &str,
        key: impl Into<String>,
        is_private: bool,
    ) -> Self {
        Self {
            zone_id: ZoneId::new(provider_type, id),
            key: key.into(),
            domain: normalize_domain_name(domain),
            forwarded_domains: Vec::new(),
            is_private,
        }
    }

    #[must_use]
    pub fn with_forwarded_domains(mut self, domains: Vec<String>) -> Self {
        self.forwarded_domains = domains.iter().map(|d| normalize_domain_name(d)).collect();
        self
    }

    /// Id without provider type prefix.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.zone_id.id
    }

    /// Length of the zone domain if `dns_name` belongs to this zone, else 0.
    ///
    /// The zone with the highest level wins when several zones match.
    #[must_use]
    pub fn match_level(&self, dns_name: &str) -> usize {
        let name = normalize_domain_name(dns_name);
        if self
            .forwarded_domains
            .iter()
            .any(|forwarded| is_sub_domain(&name, forwarded))
        {
            return 0;
        }
        if is_sub_domain(&name, &self.domain) {
            self.domain.len()
        } else {
            0
        }
    }
}

impl fmt::Display for DnsHostedZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.zone_id, self.domain)
    }
}

/// True if both lists contain the same zones (id, key and domain), ignoring order.
#[must_use]
pub fn are_zones_equivalent(a: &[DnsHostedZone], b: &[DnsHostedZone]) -> bool {
    a.len() == b.len()
        && b.iter().all(|i| {
            a.iter()
                .any(|t| i.zone_id == t.zone_id && i.key == t.key && i.domain == t.domain)
        })
}

/// Picks the zone with the longest matching domain.
#[must_use]
pub fn find_best_matching_zone<'a>(
    zones: &'a [DnsHostedZone],
    dns_name: &str,
) -> Option<&'a DnsHostedZone> {
    zones
        .iter()
        .map(|z| (z.match_level(dns_name), z))
        .filter(|(level, _)| *level > 0)
        .max_by_key(|(level, _)| *level)
        .map(|(_, z)| z)
}

#[cfg(test)]
#[path = "zone_tests.rs"]
mod zone_tests;
