// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory Cloud DNS used by the Google tests.

use super::api::{Change, CloudDnsApi, CloudDnsError, ManagedZone, ResourceRecordSet};
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

type RecordKey = (String, String);

/// Cloud DNS fake with atomic changes and scripted failures.
#[derive(Default)]
pub struct FakeCloudDns {
    pub project: String,
    pub zones: Mutex<Vec<ManagedZone>>,
    records: Mutex<BTreeMap<String, BTreeMap<RecordKey, ResourceRecordSet>>>,
    failures: Mutex<VecDeque<CloudDnsError>>,
    pub changes: Mutex<Vec<Change>>,
}

impl FakeCloudDns {
    pub fn new(project: &str) -> Self {
        Self {
            project: project.to_string(),
            ..Self::default()
        }
    }

    pub fn with_zone(self, name: &str, dns_name: &str) -> Self {
        self.zones.lock().unwrap().push(ManagedZone {
            name: name.to_string(),
            dns_name: dns_name.to_string(),
            private: false,
        });
        self
    }

    pub fn put(&self, zone: &str, rrs: ResourceRecordSet) {
        self.records
            .lock()
            .unwrap()
            .entry(zone.to_string())
            .or_default()
            .insert((rrs.name.clone(), rrs.record_type.clone()), rrs);
    }

    pub fn get(&self, zone: &str, name: &str, record_type: &str) -> Option<ResourceRecordSet> {
        self.records
            .lock()
            .unwrap()
            .get(zone)?
            .get(&(name.to_string(), record_type.to_string()))
            .cloned()
    }

    /// The next change call fails with `err` before looking at the change.
    pub fn fail_next(&self, err: CloudDnsError) {
        self.failures.lock().unwrap().push_back(err);
    }

    pub fn change_count(&self) -> usize {
        self.changes.lock().unwrap().len()
    }
}

#[async_trait]
impl CloudDnsApi for FakeCloudDns {
    fn project(&self) -> &str {
        &self.project
    }

    async fn list_managed_zones(&self, _project: &str) -> Result<Vec<ManagedZone>, CloudDnsError> {
        Ok(self.zones.lock().unwrap().clone())
    }

    async fn list_resource_record_sets(
        &self,
        _project: &str,
        zone: &str,
    ) -> Result<Vec<ResourceRecordSet>, CloudDnsError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(zone)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_resource_record_set(
        &self,
        _project: &str,
        zone: &str,
        name: &str,
        record_type: &str,
    ) -> Result<ResourceRecordSet, CloudDnsError> {
        self.get(zone, name, record_type)
            .ok_or_else(|| CloudDnsError::new(404, format!("The 'entity.change.deletions[{name}]' resource named '{name} ({record_type})' does not exist., notFound")))
    }

    async fn create_change(&self, _project: &str, zone: &str, change: &Change) -> Result<(), CloudDnsError> {
        self.changes.lock().unwrap().push(change.clone());
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        let mut all = self.records.lock().unwrap();
        let mut records = all.get(zone).cloned().unwrap_or_default();
        for deletion in &change.deletions {
            let key = (deletion.name.clone(), deletion.record_type.clone());
            match records.get(&key) {
                Some(current) if current == deletion => {
                    records.remove(&key);
                }
                Some(_) => {
                    return Err(CloudDnsError::new(
                        412,
                        format!("Precondition not met for 'entity.change.deletions[{}]', conditionNotMet", deletion.name),
                    ))
                }
                None => {
                    return Err(CloudDnsError::new(
                        404,
                        format!("The resource 'entity.change.deletions[{}]' does not exist, notFound", deletion.name),
                    ))
                }
            }
        }
        for addition in &change.additions {
            let key = (addition.name.clone(), addition.record_type.clone());
            if records.contains_key(&key) {
                return Err(CloudDnsError::new(
                    409,
                    format!("The resource 'entity.change.additions[{}]' already exists, alreadyExists", addition.name),
                ));
            }
            records.insert(key, addition.clone());
        }
        all.insert(zone.to_string(), records);
        Ok(())
    }
}
