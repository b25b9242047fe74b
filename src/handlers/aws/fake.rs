// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory Route53 used by the AWS tests.

use super::api::{
    Change, ChangeAction, HostedZone, ResourceRecordSet, Route53Api, Route53Error,
    INVALID_CHANGE_BATCH,
};
use crate::provider::rate_limiter::RateLimiter;
use crate::provider::Metrics;
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type RecordKey = (String, String, Option<String>);

fn key_of(rrs: &ResourceRecordSet) -> RecordKey {
    (rrs.name.clone(), rrs.record_type.clone(), rrs.set_identifier.clone())
}

/// Route53 fake with atomic change batches and scripted failures.
#[derive(Default)]
pub struct FakeRoute53 {
    pub zones: Mutex<Vec<HostedZone>>,
    records: Mutex<BTreeMap<String, BTreeMap<RecordKey, ResourceRecordSet>>>,
    failures: Mutex<VecDeque<Route53Error>>,
    pub batches: Mutex<Vec<Vec<Change>>>,
}

impl FakeRoute53 {
    pub fn with_zone(id: &str, name: &str) -> Self {
        let fake = Self::default();
        fake.zones.lock().unwrap().push(HostedZone {
            id: format!("/hostedzone/{id}"),
            name: name.to_string(),
            private_zone: false,
        });
        fake
    }

    pub fn put(&self, zone_id: &str, rrs: ResourceRecordSet) {
        self.records
            .lock()
            .unwrap()
            .entry(zone_id.to_string())
            .or_default()
            .insert(key_of(&rrs), rrs);
    }

    pub fn get(&self, zone_id: &str, name: &str, record_type: &str) -> Option<ResourceRecordSet> {
        self.records
            .lock()
            .unwrap()
            .get(zone_id)?
            .values()
            .find(|r| r.name == name && r.record_type == record_type)
            .cloned()
    }

    /// The next change call fails with `err` before looking at the batch.
    pub fn fail_next(&self, err: Route53Error) {
        self.failures.lock().unwrap().push_back(err);
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }
}

#[async_trait]
impl Route53Api for FakeRoute53 {
    async fn list_hosted_zones(&self) -> Result<Vec<HostedZone>, Route53Error> {
        Ok(self.zones.lock().unwrap().clone())
    }

    async fn list_resource_record_sets(
        &self,
        hosted_zone_id: &str,
    ) -> Result<Vec<ResourceRecordSet>, Route53Error> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(hosted_zone_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn change_resource_record_sets(
        &self,
        hosted_zone_id: &str,
        changes: &[Change],
    ) -> Result<(), Route53Error> {
        self.batches.lock().unwrap().push(changes.to_vec());
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        let mut all = self.records.lock().unwrap();
        let zone = all.entry(hosted_zone_id.to_string()).or_default();
        let mut problems = Vec::new();
        for change in changes {
            let rrs = &change.record_set;
            let exists = zone.contains_key(&key_of(rrs));
            match change.action {
                ChangeAction::Create if exists => problems.push(format!(
                    "Tried to create resource record set [name='{}', type='{}'] but it already exists",
                    rrs.name, rrs.record_type
                )),
                ChangeAction::Delete if !exists => problems.push(format!(
                    "Tried to delete resource record set [name='{}', type='{}'] but it was not found",
                    rrs.name, rrs.record_type
                )),
                _ => {}
            }
        }
        if !problems.is_empty() {
            return Err(Route53Error::new(
                "ChangeResourceRecordSets",
                INVALID_CHANGE_BATCH,
                format!("[{}]", problems.join(", ")),
            ));
        }
        for change in changes {
            let key = key_of(&change.record_set);
            match change.action {
                ChangeAction::Delete => {
                    zone.remove(&key);
                }
                ChangeAction::Create | ChangeAction::Upsert => {
                    zone.insert(key, change.record_set.clone());
                }
            }
        }
        Ok(())
    }
}

/// Counts request metrics per request type.
#[derive(Default)]
pub struct RecordingMetrics {
    requests: Mutex<BTreeMap<String, u64>>,
}

impl RecordingMetrics {
    pub fn count(&self, request_type: &str) -> u64 {
        self.requests.lock().unwrap().get(request_type).copied().unwrap_or_default()
    }
}

impl Metrics for RecordingMetrics {
    fn add_generic_requests(&self, request_type: &str, n: u64) {
        *self.requests.lock().unwrap().entry(request_type.to_string()).or_default() += n;
    }

    fn add_zone_requests(&self, _zone_id: &str, request_type: &str, n: u64) {
        self.add_generic_requests(request_type, n);
    }
}

/// Rate limiter that admits everything and counts the admissions.
#[derive(Default)]
pub struct CountingLimiter {
    accepted: AtomicUsize,
}

impl CountingLimiter {
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateLimiter for CountingLimiter {
    async fn accept(&self) {
        self.accepted.fetch_add(1, Ordering::SeqCst);
    }

    fn try_accept(&self) -> bool {
        self.accepted.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn qps(&self) -> Option<f64> {
        None
    }
}
