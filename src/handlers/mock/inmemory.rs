// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory zone store of the mock provider.

use crate::dns::{DnsHostedZone, DnsSetName, DnsSets, RecordSet, RecordType, ZoneId};
use crate::dns_errors::{DnsError, ProviderError, Result};
use crate::provider::{
    ChangeRequestUpdate, ChangeRequests, Metrics, REQUEST_TYPE_CREATE_RECORDS,
    REQUEST_TYPE_DELETE_RECORDS,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct ZoneData {
    zone: DnsHostedZone,
    dns_sets: DnsSets,
}

struct FailSimulation {
    zone_id: ZoneId,
    request: ChangeRequests,
    applied: usize,
}

impl FailSimulation {
    fn includes(&self, zone_id: &ZoneId, name: &DnsSetName, record_type: RecordType, update: &ChangeRequestUpdate) -> bool {
        &self.zone_id == zone_id
            && &self.request.name == name
            && self.request.updates.get(&record_type) == Some(update)
    }
}

#[derive(Default)]
struct InMemoryState {
    zones: BTreeMap<ZoneId, ZoneData>,
    fail_simulations: HashMap<String, FailSimulation>,
}

/// Zones and record sets of one mock account.
#[derive(Default)]
pub struct InMemory {
    support_routing_policy: bool,
    next_simulation: AtomicU64,
    state: Mutex<InMemoryState>,
}

impl InMemory {
    #[must_use]
    pub fn new(support_routing_policy: bool) -> Self {
        Self {
            support_routing_policy,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn get_zones(&self) -> Vec<DnsHostedZone> {
        self.lock().zones.values().map(|d| d.zone.clone()).collect()
    }

    #[must_use]
    pub fn find_hosted_zone(&self, zone_id: &ZoneId) -> Option<DnsHostedZone> {
        self.lock().zones.get(zone_id).map(|d| d.zone.clone())
    }

    /// Adds an empty zone. Returns false if the zone already exists.
    pub fn add_zone(&self, zone: DnsHostedZone) -> bool {
        let mut state = self.lock();
        if state.zones.contains_key(&zone.zone_id) {
            return false;
        }
        state.zones.insert(
            zone.zone_id.clone(),
            ZoneData {
                zone,
                dns_sets: DnsSets::new(),
            },
        );
        true
    }

    pub fn delete_zone(&self, zone_id: &ZoneId) {
        self.lock().zones.remove(zone_id);
    }

    /// Copy of the record sets of a zone.
    #[must_use]
    pub fn get_dns_sets(&self, zone_id: &ZoneId) -> Option<DnsSets> {
        self.lock().zones.get(zone_id).map(|d| d.dns_sets.clone())
    }

    /// Number of names and record sets in a zone.
    #[must_use]
    pub fn get_counts(&self, zone_id: &ZoneId) -> (usize, usize) {
        self.lock().zones.get(zone_id).map_or((0, 0), |d| {
            let record_sets = d.dns_sets.values().map(|set| set.sets.len()).sum();
            (d.dns_sets.len(), record_sets)
        })
    }

    #[must_use]
    pub fn get_record_set(&self, zone_id: &ZoneId, name: &DnsSetName, record_type: RecordType) -> Option<RecordSet> {
        self.lock()
            .zones
            .get(zone_id)
            .and_then(|d| d.dns_sets.record_set(name, record_type).cloned())
    }

    /// Applies one record type transition.
    ///
    /// # Errors
    ///
    /// Fails for unknown zones, matching fail simulations and routing
    /// policies when they are not supported.
    pub fn apply(
        &self,
        zone_id: &ZoneId,
        name: &DnsSetName,
        record_type: RecordType,
        update: &ChangeRequestUpdate,
        metrics: &dyn Metrics,
    ) -> Result<()> {
        let mut state = self.lock();
        let InMemoryState {
            zones,
            fail_simulations,
        } = &mut *state;
        let data = zones
            .get_mut(zone_id)
            .ok_or_else(|| DnsError::Generic(format!("zone {zone_id} not hosted by mock provider")))?;

        if let Some(simulation) = fail_simulations
            .values_mut()
            .find(|s| s.includes(zone_id, name, record_type, update))
        {
            simulation.applied += 1;
            return Err(ProviderError::backend("simulated failure").into());
        }

        if !self.support_routing_policy && (name.has_set_identifier() || update.has_routing_policy()) {
            return Err(ProviderError::backend(
                "in-memory provider does not support routing policies",
            )
            .into());
        }
        if let Some(old) = &update.old {
            data.dns_sets.remove_record_set(name, old.record_type);
            metrics.add_zone_requests(&zone_id.id, REQUEST_TYPE_DELETE_RECORDS, 1);
        }
        if let Some(new) = &update.new {
            data.dns_sets.add_record_set(name, new.clone());
            metrics.add_zone_requests(&zone_id.id, REQUEST_TYPE_CREATE_RECORDS, 1);
        }
        Ok(())
    }

    /// Makes every later apply of an update of `request` fail. Returns the simulation id.
    pub fn add_apply_fail_simulation(&self, zone_id: &ZoneId, request: ChangeRequests) -> String {
        let id = format!("sim-{}", self.next_simulation.fetch_add(1, Ordering::Relaxed));
        self.lock().fail_simulations.insert(
            id.clone(),
            FailSimulation {
                zone_id: zone_id.clone(),
                request,
                applied: 0,
            },
        );
        id
    }

    /// Number of applies rejected by a simulation.
    #[must_use]
    pub fn get_apply_fail_simulation_count(&self, id: &str) -> usize {
        self.lock().fail_simulations.get(id).map_or(0, |s| s.applied)
    }

    pub fn remove_apply_fail_simulation(&self, id: &str) -> bool {
        self.lock().fail_simulations.remove(id).is_some()
    }

    /// All zones and records as YAML.
    #[must_use]
    pub fn build_full_dump(&self) -> String {
        let state = self.lock();
        let dump: BTreeMap<String, ZoneDump> = state
            .zones
            .iter()
            .map(|(id, data)| (id.to_string(), ZoneDump::new(data)))
            .collect();
        serde_yaml::to_string(&dump).unwrap_or_else(|err| format!("error: {err}"))
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HostedZoneDump {
    provider_type: String,
    key: String,
    id: String,
    domain: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ZoneDump {
    hosted_zone: HostedZoneDump,
    dns_sets: BTreeMap<String, BTreeMap<RecordType, RecordSet>>,
}

impl ZoneDump {
    fn new(data: &ZoneData) -> Self {
        Self {
            hosted_zone: HostedZoneDump {
                provider_type: data.zone.zone_id.provider_type.clone(),
                key: data.zone.key.clone(),
                id: data.zone.zone_id.id.clone(),
                domain: data.zone.domain.clone(),
            },
            dns_sets: data
                .dns_sets
                .iter()
                .map(|(name, set)| (name.to_string(), set.sets.clone()))
                .collect(),
        }
    }
}

/// In-memory stores by mock account name.
///
/// Tests use it to inspect the records a mock handler holds.
#[derive(Default)]
pub struct InMemoryAccounts {
    accounts: Mutex<BTreeMap<String, Arc<InMemory>>>,
}

impl InMemoryAccounts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns an error if a store for the account already exists.
    pub fn add(&self, account: &str, mock: Arc<InMemory>) -> Result<()> {
        let mut accounts = self.lock();
        if accounts.contains_key(account) {
            return Err(DnsError::Generic(format!(
                "mock for account {account} already exists"
            )));
        }
        accounts.insert(account.to_string(), mock);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, account: &str) -> Option<Arc<InMemory>> {
        self.lock().get(account).cloned()
    }

    /// Store owning a zone id of the form `account:suffix`.
    #[must_use]
    pub fn get_by_zone_id(&self, zone_id: &ZoneId) -> Option<Arc<InMemory>> {
        let account = zone_id.id.split(':').next().unwrap_or_default();
        self.get(account)
    }

    /// Account names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn delete(&self, account: &str) {
        self.lock().remove(account);
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Arc<InMemory>>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "inmemory_tests.rs"]
mod inmemory_tests;
