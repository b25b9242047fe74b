// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Routing policies of Cloud DNS.
//!
//! Cloud DNS keeps all variants of a name and type in one record set whose
//! routing policy holds an item list. A weighted variant owns the item at the
//! index given by its set identifier; a geolocation variant owns the item of
//! its location. Changing one variant means rewriting the whole record set:
//! the current record set is deleted and the merged one added again.
//!
//! Weighted item lists must not have gaps. Unused indices below the highest
//! one in use are filled with zero weight placeholder items, which are
//! trimmed again from the end of the list.

use super::api::{CloudDnsApi, GeoItem, ResourceRecordSet, RrSetRoutingPolicy, WrrItem};
use crate::constants::GOOGLE_MAX_WRR_INDEX;
use crate::dns::records::{ROUTING_POLICY_KEY_LOCATION, ROUTING_POLICY_KEY_WEIGHT};
use crate::dns::{DnsSetName, RoutingPolicy, RoutingPolicyType};
use crate::dns_errors::{DnsError, ProviderError, Result};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Routing data of one variant.
#[derive(Clone, Debug, PartialEq)]
pub enum PolicyData {
    Weighted { index: usize, weight: i64 },
    Geo { location: String },
}

fn invalid(reason: impl Into<String>) -> DnsError {
    ProviderError::InvalidRoutingPolicy {
        reason: reason.into(),
    }
    .into()
}

/// Validates the routing policy of a variant and extracts its data.
///
/// # Errors
///
/// Returns an error if set identifier and policy do not come together, the
/// weighted index is out of range or a parameter is malformed.
pub fn extract_routing_policy(name: &DnsSetName, policy: Option<&RoutingPolicy>) -> Result<Option<PolicyData>> {
    let policy = match (name.has_set_identifier(), policy) {
        (false, None) => return Ok(None),
        (false, Some(_)) => return Err(invalid("missing set identifier")),
        (true, None) => return Err(invalid("missing routing policy")),
        (true, Some(policy)) => policy,
    };
    match policy.policy_type {
        RoutingPolicyType::Weighted => {
            check_parameter_keys(policy, ROUTING_POLICY_KEY_WEIGHT)?;
            let index = name
                .set_identifier
                .parse::<usize>()
                .ok()
                .filter(|i| *i <= GOOGLE_MAX_WRR_INDEX)
                .ok_or_else(|| {
                    invalid(format!(
                        "the set identifier must be a number >= 0 and <= {GOOGLE_MAX_WRR_INDEX}, but got: {}",
                        name.set_identifier
                    ))
                })?;
            let value = policy.parameter(ROUTING_POLICY_KEY_WEIGHT).unwrap_or_default();
            let weight = value.parse::<i64>().ok().filter(|w| *w >= 0).ok_or_else(|| {
                invalid(format!(
                    "invalid value for weight: {value} (only non-negative integers are allowed)"
                ))
            })?;
            Ok(Some(PolicyData::Weighted { index, weight }))
        }
        RoutingPolicyType::GeoLocation => {
            check_parameter_keys(policy, ROUTING_POLICY_KEY_LOCATION)?;
            let location = policy.parameter(ROUTING_POLICY_KEY_LOCATION).unwrap_or_default();
            if location.is_empty() {
                return Err(invalid("missing location parameter"));
            }
            Ok(Some(PolicyData::Geo {
                location: location.to_string(),
            }))
        }
    }
}

fn check_parameter_keys(policy: &RoutingPolicy, key: &str) -> Result<()> {
    if !policy.parameters.contains_key(key) {
        return Err(invalid(format!("missing parameter {key}")));
    }
    if let Some(extra) = policy.parameters.keys().find(|k| *k != key) {
        return Err(invalid(format!("unsupported parameter {extra}")));
    }
    Ok(())
}

/// Wraps the values of a plain record set into a routing policy record set.
#[must_use]
pub fn map_policy_record_set(rrs: ResourceRecordSet, data: Option<&PolicyData>) -> ResourceRecordSet {
    let policy = match data {
        None => return rrs,
        Some(PolicyData::Weighted { index, weight }) => {
            let mut items = vec![placeholder_item(&rrs.record_type); index + 1];
            items[*index] = WrrItem {
                rrdatas: rrs.rrdatas,
                weight: *weight as f64,
            };
            RrSetRoutingPolicy::Wrr(items)
        }
        Some(PolicyData::Geo { location }) => RrSetRoutingPolicy::Geo(vec![GeoItem {
            location: location.clone(),
            rrdatas: rrs.rrdatas,
        }]),
    };
    ResourceRecordSet {
        name: rrs.name,
        record_type: rrs.record_type,
        ttl: rrs.ttl,
        rrdatas: Vec::new(),
        routing_policy: Some(policy),
    }
}

/// Dummy value of placeholder items.
#[must_use]
pub fn rr_default_value(record_type: &str) -> String {
    match record_type {
        "TXT" => "\"__dummy__\"".to_string(),
        // documentation addresses
        "A" => "233.252.0.1".to_string(),
        "AAAA" => "2001:db8::1".to_string(),
        "CNAME" => "dummy.dummy.dummy.com.".to_string(),
        other => format!("{other}?"),
    }
}

#[must_use]
pub fn placeholder_item(record_type: &str) -> WrrItem {
    WrrItem {
        rrdatas: vec![rr_default_value(record_type)],
        weight: 0.0,
    }
}

#[must_use]
pub fn is_placeholder_item(record_type: &str, item: &WrrItem) -> bool {
    item.weight == 0.0 && item.rrdatas.len() == 1 && item.rrdatas[0] == rr_default_value(record_type)
}

/// Human readable item list for logs, placeholders omitted.
#[must_use]
pub fn describe_routing_policy(rrs: &ResourceRecordSet) -> String {
    let mut out = String::new();
    match &rrs.routing_policy {
        Some(RrSetRoutingPolicy::Wrr(items)) => {
            for (i, item) in items.iter().enumerate() {
                if !is_placeholder_item(&rrs.record_type, item) {
                    let _ = write!(out, "[{i}]{:.1}:{};", item.weight, item.rrdatas.join(","));
                }
            }
        }
        Some(RrSetRoutingPolicy::Geo(items)) => {
            for item in items {
                let _ = write!(out, "[{}]:{};", item.location, item.rrdatas.join(","));
            }
        }
        None => {}
    }
    out
}

#[derive(Clone, Debug, PartialEq)]
enum Slot {
    Unchanged,
    Deleted,
    Set(WrrItem),
}

/// Pending variant changes of one name and type.
#[derive(Debug)]
enum Pending {
    Wrr(Vec<Slot>),
    Geo(Vec<(String, Option<GeoItem>)>),
}

#[derive(Debug)]
struct PendingRecordSet {
    ttl: i64,
    pending: Pending,
}

/// Variant changes grouped by name and type.
#[derive(Debug, Default)]
pub struct RoutingPolicyChanges {
    changes: BTreeMap<(String, String), PendingRecordSet>,
}

impl RoutingPolicyChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Records the addition (`add`) or deletion of the single variant carried
    /// by `set`, as built by [`map_policy_record_set`].
    ///
    /// # Errors
    ///
    /// Returns an error if weighted and geolocation variants are mixed for
    /// one name and type.
    pub fn add_change(&mut self, set: &ResourceRecordSet, add: bool) -> Result<()> {
        let key = (set.name.clone(), set.record_type.clone());
        match &set.routing_policy {
            Some(RrSetRoutingPolicy::Wrr(items)) => {
                let Some(index) = items.len().checked_sub(1) else {
                    return Ok(());
                };
                let entry = self.changes.entry(key).or_insert_with(|| PendingRecordSet {
                    ttl: set.ttl,
                    pending: Pending::Wrr(Vec::new()),
                });
                let Pending::Wrr(slots) = &mut entry.pending else {
                    return Err(invalid(format!("mixed routing policies for {}", set.name)));
                };
                if slots.len() <= index {
                    slots.resize(index + 1, Slot::Unchanged);
                }
                slots[index] = if add {
                    entry.ttl = set.ttl;
                    Slot::Set(items[index].clone())
                } else {
                    Slot::Deleted
                };
            }
            Some(RrSetRoutingPolicy::Geo(items)) => {
                let entry = self.changes.entry(key).or_insert_with(|| PendingRecordSet {
                    ttl: set.ttl,
                    pending: Pending::Geo(Vec::new()),
                });
                let Pending::Geo(locations) = &mut entry.pending else {
                    return Err(invalid(format!("mixed routing policies for {}", set.name)));
                };
                if add {
                    entry.ttl = set.ttl;
                }
                for item in items {
                    locations.retain(|(l, _)| *l != item.location);
                    locations.push((item.location.clone(), add.then(|| item.clone())));
                }
            }
            None => {}
        }
        Ok(())
    }

    /// Merges the pending changes with the current record sets.
    ///
    /// Returns the current record sets to delete and the merged ones to add.
    ///
    /// # Errors
    ///
    /// Returns an error if a current record set cannot be read.
    pub async fn calc_deletions_and_additions(
        self,
        api: &dyn CloudDnsApi,
        project: &str,
        zone: &str,
    ) -> Result<(Vec<ResourceRecordSet>, Vec<ResourceRecordSet>)> {
        let mut deletions = Vec::new();
        let mut additions = Vec::new();
        for ((name, record_type), pending) in self.changes {
            let old = match api.get_resource_record_set(project, zone, &name, &record_type).await {
                Ok(old) => Some(old),
                Err(err) if err.is_not_found() => None,
                Err(err) => return Err(ProviderError::backend(err).into()),
            };
            let old_policy = old.as_ref().and_then(|o| o.routing_policy.clone());
            if let Some(old) = old {
                deletions.push(old);
            }

            let policy = match pending.pending {
                Pending::Wrr(slots) => {
                    let old_items = match old_policy {
                        Some(RrSetRoutingPolicy::Wrr(items)) => items,
                        _ => Vec::new(),
                    };
                    let items = merge_wrr_items(&record_type, slots, old_items);
                    (!items.is_empty()).then_some(RrSetRoutingPolicy::Wrr(items))
                }
                Pending::Geo(changes) => {
                    let mut items = match old_policy {
                        Some(RrSetRoutingPolicy::Geo(items)) => items,
                        _ => Vec::new(),
                    };
                    for (location, item) in changes {
                        items.retain(|i| i.location != location);
                        items.extend(item);
                    }
                    (!items.is_empty()).then_some(RrSetRoutingPolicy::Geo(items))
                }
            };
            if let Some(policy) = policy {
                additions.push(ResourceRecordSet {
                    name,
                    record_type,
                    ttl: pending.ttl,
                    rrdatas: Vec::new(),
                    routing_policy: Some(policy),
                });
            }
        }
        Ok((deletions, additions))
    }
}

/// Fills unchanged slots from `old`, trims empty and placeholder slots from
/// the end and replaces the remaining gaps with placeholders.
fn merge_wrr_items(record_type: &str, mut slots: Vec<Slot>, old: Vec<WrrItem>) -> Vec<WrrItem> {
    for (i, item) in old.into_iter().enumerate() {
        match slots.get_mut(i) {
            Some(slot @ Slot::Unchanged) => *slot = Slot::Set(item),
            Some(_) => {}
            None => slots.push(Slot::Set(item)),
        }
    }
    while let Some(last) = slots.last() {
        let trim = match last {
            Slot::Set(item) => is_placeholder_item(record_type, item),
            Slot::Unchanged | Slot::Deleted => true,
        };
        if !trim {
            break;
        }
        slots.pop();
    }
    slots
        .into_iter()
        .map(|slot| match slot {
            Slot::Set(item) => item,
            Slot::Unchanged | Slot::Deleted => placeholder_item(record_type),
        })
        .collect()
}

#[cfg(test)]
#[path = "routing_policy_tests.rs"]
mod routing_policy_tests;
