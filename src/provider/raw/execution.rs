// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Record level execution of change requests.
//!
//! For every record type of a DNS name the desired values are matched against
//! the records the backend currently holds:
//!
//! - a desired value without an existing record is created
//! - an existing record is updated only if its TTL or routing policy differs
//! - existing records of the same set identifier that are no longer desired are deleted
//!
//! Changes are submitted one record at a time. A failing record does not stop
//! the others; the caller only learns that not all records could be updated.

use super::{Executor, Record, RecordList};
use crate::dns::{quote, DnsHostedZone, DnsSetName, RecordSet, RecordType};
use crate::dns_errors::{ProviderError, Result};
use crate::provider::{ChangeRequestUpdate, ChangeRequests, LogSink};

/// Decides whether a backend can handle the routing policy of an update.
pub type RoutingPolicyChecker = fn(&DnsSetName, &ChangeRequestUpdate) -> Result<()>;

/// Rejects set identifiers and routing policies.
///
/// # Errors
///
/// Returns [`ProviderError::RoutingPolicyNotSupported`] if the name has a set
/// identifier or either side of the update carries a routing policy.
pub fn default_routing_policy_checker(name: &DnsSetName, update: &ChangeRequestUpdate) -> Result<()> {
    if name.has_set_identifier() || update.has_routing_policy() {
        return Err(ProviderError::RoutingPolicyNotSupported.into());
    }
    Ok(())
}

#[derive(Clone, Copy, Debug)]
enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "Addition",
            Operation::Update => "Update",
            Operation::Delete => "Deletion",
        }
    }
}

/// Result of matching desired values against existing records.
#[derive(Default)]
struct Matching {
    /// Existing records that need to be touched
    matched: RecordList,
    /// Desired values without existing record
    missing: RecordList,
    /// Existing records of the same set identifier that are not desired
    obsolete: RecordList,
}

/// Collects and submits the record changes of one DNS name in one zone.
pub struct Execution<'a> {
    log: &'a dyn LogSink,
    executor: &'a dyn Executor,
    zone: &'a DnsHostedZone,
    name: DnsSetName,
    checker: RoutingPolicyChecker,
    additions: RecordList,
    updates: RecordList,
    deletions: RecordList,
}

impl<'a> Execution<'a> {
    /// Creates an execution. Without `checker` routing policies are rejected.
    pub fn new(
        log: &'a dyn LogSink,
        executor: &'a dyn Executor,
        zone: &'a DnsHostedZone,
        name: DnsSetName,
        checker: Option<RoutingPolicyChecker>,
    ) -> Self {
        Self {
            log,
            executor,
            zone,
            name,
            checker: checker.unwrap_or(default_routing_policy_checker),
            additions: Vec::new(),
            updates: Vec::new(),
            deletions: Vec::new(),
        }
    }

    /// Runs the routing policy checker on an update.
    ///
    /// # Errors
    ///
    /// Returns the checker's error.
    pub fn check(&self, update: &ChangeRequestUpdate) -> Result<()> {
        (self.checker)(&self.name, update).inspect_err(|err| {
            self.log.warn(&format!(
                "warning: record set {}[{}]: {err}",
                self.name,
                self.zone.id()
            ));
        })
    }

    /// Classifies an update and collects the record changes it needs.
    ///
    /// # Errors
    ///
    /// Returns an error if the routing policy is not supported or the current
    /// records cannot be listed.
    pub async fn add_change(&mut self, update: &ChangeRequestUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        self.check(update)?;

        let before = self.pending();
        match (&update.old, &update.new) {
            (old, Some(new)) => {
                let verb = if old.is_some() { "update" } else { "create" };
                self.log.info(&format!(
                    "{verb} {} record set {}[{}]: {}({})",
                    new.record_type,
                    self.name,
                    self.zone.id(),
                    new.record_string(),
                    new.ttl
                ));
                let matching = self.match_records(new, true, true).await?;
                self.updates.extend(matching.matched);
                self.additions.extend(matching.missing);
                self.add_obsolete(matching.obsolete);
            }
            (Some(old), None) => {
                self.log.info(&format!(
                    "delete {} record set {}[{}]: {}",
                    old.record_type,
                    self.name,
                    self.zone.id(),
                    old.record_string()
                ));
                let matching = self.match_records(old, false, false).await?;
                self.deletions.extend(matching.matched);
                self.add_obsolete(matching.obsolete);
            }
            (None, None) => {}
        }
        if self.pending() == before {
            self.log.info("no changes required");
        }
        Ok(())
    }

    /// Matches the values of `rs` against the records of the backend.
    ///
    /// With `mod_only` a matched record is only returned if its TTL or routing
    /// policy differs from `rs`.
    async fn match_records(&self, rs: &RecordSet, mod_only: bool, build_missing: bool) -> Result<Matching> {
        let existing = self
            .executor
            .get_record_list(&self.name.dns_name, rs.record_type, self.zone)
            .await?;
        let mut consumed = vec![false; existing.len()];
        let mut result = Matching::default();

        for desired in &rs.records {
            let value = if rs.record_type == RecordType::Txt {
                quote(&desired.value)
            } else {
                desired.value.clone()
            };
            let found = existing
                .iter()
                .enumerate()
                .find(|(i, r)| !consumed[*i] && r.value() == value);
            match found {
                Some((i, old)) => {
                    consumed[i] = true;
                    if !mod_only || old.ttl() != rs.ttl || old.routing_policy() != rs.routing_policy {
                        let mut record = old.clone_box();
                        record.set_ttl(rs.ttl);
                        record.set_routing_policy(&self.name.set_identifier, rs.routing_policy.as_ref());
                        result.matched.push(record);
                    }
                }
                None if build_missing => {
                    let mut record = self.executor.new_record(
                        &self.name.dns_name,
                        rs.record_type,
                        &desired.value,
                        self.zone,
                        rs.ttl,
                    );
                    record.set_routing_policy(&self.name.set_identifier, rs.routing_policy.as_ref());
                    result.missing.push(record);
                }
                None => {}
            }
        }

        result.obsolete = existing
            .into_iter()
            .zip(consumed)
            .filter(|(r, consumed)| !consumed && r.set_identifier() == self.name.set_identifier)
            .map(|(r, _)| r)
            .collect();
        Ok(result)
    }

    fn add_obsolete(&mut self, obsolete: RecordList) {
        for record in obsolete {
            if !self.deletions.iter().any(|d| d.id() == record.id()) {
                self.deletions.push(record);
            }
        }
    }

    fn pending(&self) -> usize {
        self.additions.len() + self.updates.len() + self.deletions.len()
    }

    /// Records to create, update and delete, in submission order.
    #[must_use]
    pub fn planned(&self) -> (&[Box<dyn Record>], &[Box<dyn Record>], &[Box<dyn Record>]) {
        (&self.additions, &self.updates, &self.deletions)
    }

    /// Submits additions, then updates, then deletions.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::UpdateIncomplete`] if any record failed.
    pub async fn submit_changes(self) -> Result<()> {
        if self.pending() == 0 {
            return Ok(());
        }
        self.log
            .info(&format!("processing changes for zone {}", self.zone.id()));

        let mut succeeded = 0usize;
        let mut failed = 0usize;
        let batches = [
            (Operation::Create, &self.additions),
            (Operation::Update, &self.updates),
            (Operation::Delete, &self.deletions),
        ];
        for (operation, records) in batches {
            for record in records {
                self.log.info(&format!(
                    "desired change: {} {} {}: {} ({})",
                    operation.as_str(),
                    record.dns_name(),
                    record.record_type(),
                    record.value(),
                    record.ttl()
                ));
                let result = match operation {
                    Operation::Create => self.executor.create_record(record.as_ref(), self.zone).await,
                    Operation::Update => self.executor.update_record(record.as_ref(), self.zone).await,
                    Operation::Delete => self.executor.delete_record(record.as_ref(), self.zone).await,
                };
                match result {
                    Ok(()) => succeeded += 1,
                    Err(err) => {
                        failed += 1;
                        self.log.error(&format!(
                            "execution failed for {} {}: {err}",
                            record.record_type(),
                            record.dns_name()
                        ));
                    }
                }
            }
        }

        if succeeded > 0 {
            self.log.info(&format!(
                "succeeded updates for records in zone {}: {succeeded}",
                self.zone.id()
            ));
        }
        if failed > 0 {
            self.log.info(&format!(
                "failed updates for records in zone {}: {failed}",
                self.zone.id()
            ));
            return Err(ProviderError::UpdateIncomplete.into());
        }
        Ok(())
    }
}

/// Applies all updates of `requests` through `executor`.
///
/// Every update is checked against the routing policy checker before the
/// backend is contacted, so a rejected request has no side effects.
///
/// # Errors
///
/// Returns the first checker or listing error, or
/// [`ProviderError::UpdateIncomplete`] if any record failed.
pub async fn execute_requests(
    log: &dyn LogSink,
    executor: &dyn Executor,
    zone: &DnsHostedZone,
    requests: &ChangeRequests,
    checker: Option<RoutingPolicyChecker>,
) -> Result<()> {
    let mut execution = Execution::new(log, executor, zone, requests.name.clone(), checker);
    for update in requests.updates.values().filter(|u| !u.is_empty()) {
        execution.check(update)?;
    }
    for update in requests.updates.values() {
        execution.add_change(update).await?;
    }
    execution.submit_changes().await
}

#[cfg(test)]
#[path = "execution_tests.rs"]
mod execution_tests;
