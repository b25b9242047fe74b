// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provider abstraction.
//!
//! Every DNS backend implements [`DnsHandler`]. Handlers are built by the
//! [`registry::DnsHandlerRegistry`] from a [`DnsHandlerConfig`] and shared
//! between provider objects with identical credentials through
//! [`account::AccountMap`].
//!
//! # Modules
//!
//! - [`account`] - Reference-counted accounts with zone and query caches
//! - [`backoff`] - Failure tracking of zone listings
//! - [`checks`] - Pre-flight validation of provider properties
//! - [`handler_config`] - Handler construction input and property accessors
//! - [`rate_limiter`] - Token bucket limiting of outbound calls
//! - [`raw`] - Generic per-record diff-and-apply engine
//! - [`registry`] - Provider type registry
//! - [`validators`] - Property value validators

pub mod account;
pub mod backoff;
pub mod checks;
pub mod handler_config;
pub mod rate_limiter;
pub mod raw;
pub mod registry;
pub mod validators;

pub use handler_config::DnsHandlerConfig;

use crate::dns::query::{QueryDns, QueryDnsFactory};
use crate::dns::{DnsHostedZone, DnsSetName, DnsSets, RecordSet, RecordType, Target};
use crate::dns_errors::{DnsError, ProviderError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Secret key/value pairs of a provider.
pub type Properties = BTreeMap<String, String>;

pub const REQUEST_TYPE_LIST_ZONES: &str = "list_zones";
pub const REQUEST_TYPE_LIST_ZONES_PAGES: &str = "list_zones_pages";
pub const REQUEST_TYPE_LIST_RECORDS: &str = "list_records";
pub const REQUEST_TYPE_LIST_RECORDS_PAGES: &str = "list_records_pages";
pub const REQUEST_TYPE_UPDATE_RECORDS: &str = "update_records";
pub const REQUEST_TYPE_UPDATE_RECORDS_PAGES: &str = "update_records_pages";
pub const REQUEST_TYPE_CREATE_RECORDS: &str = "create_records";
pub const REQUEST_TYPE_DELETE_RECORDS: &str = "delete_records";
pub const REQUEST_TYPE_CACHED_GET_ZONES: &str = "cached_getzones";

/// Counts outbound backend requests.
pub trait Metrics: Send + Sync {
    fn add_generic_requests(&self, request_type: &str, n: u64);
    fn add_zone_requests(&self, zone_id: &str, request_type: &str, n: u64);
}

/// Metrics sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn add_generic_requests(&self, _request_type: &str, _n: u64) {}
    fn add_zone_requests(&self, _zone_id: &str, _request_type: &str, _n: u64) {}
}

/// Severity of an execution log line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Receives log lines emitted while executing change requests.
///
/// The remote server collects them to return them to the caller.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

/// Forwards execution logs to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingLogSink {
    provider: String,
}

impl TracingLogSink {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
        }
    }
}

impl LogSink for TracingLogSink {
    fn log(&self, level: LogLevel, message: &str) {
        let provider = self.provider.as_str();
        match level {
            LogLevel::Debug => debug!(provider, "{message}"),
            LogLevel::Info => info!(provider, "{message}"),
            LogLevel::Warn => warn!(provider, "{message}"),
            LogLevel::Error => error!(provider, "{message}"),
        }
    }
}

/// Receives the outcome of one change request.
pub trait DoneHandler: Send + Sync {
    fn set_invalid(&self, err: &DnsError);
    fn failed(&self, err: &DnsError);
    fn throttled(&self);
    fn succeeded(&self);
}

/// Transition of one record type: `old == None` creates, `new == None` deletes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeRequestUpdate {
    pub old: Option<RecordSet>,
    pub new: Option<RecordSet>,
}

impl ChangeRequestUpdate {
    #[must_use]
    pub fn create(new: RecordSet) -> Self {
        Self {
            old: None,
            new: Some(new),
        }
    }

    #[must_use]
    pub fn update(old: RecordSet, new: RecordSet) -> Self {
        Self {
            old: Some(old),
            new: Some(new),
        }
    }

    #[must_use]
    pub fn delete(old: RecordSet) -> Self {
        Self {
            old: Some(old),
            new: None,
        }
    }

    /// True if neither side holds records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.old.as_ref().is_none_or(RecordSet::is_empty)
            && self.new.as_ref().is_none_or(RecordSet::is_empty)
    }

    /// True if old or new carries a routing policy.
    #[must_use]
    pub fn has_routing_policy(&self) -> bool {
        self.old.as_ref().is_some_and(|rs| rs.routing_policy.is_some())
            || self.new.as_ref().is_some_and(|rs| rs.routing_policy.is_some())
    }
}

/// All transitions of one DNS name.
#[derive(Clone, Default)]
pub struct ChangeRequests {
    pub name: DnsSetName,
    pub updates: BTreeMap<RecordType, ChangeRequestUpdate>,
    pub done: Option<Arc<dyn DoneHandler>>,
}

impl fmt::Debug for ChangeRequests {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeRequests")
            .field("name", &self.name)
            .field("updates", &self.updates)
            .field("done", &self.done.is_some())
            .finish()
    }
}

impl ChangeRequests {
    #[must_use]
    pub fn new(name: DnsSetName) -> Self {
        Self {
            name,
            updates: BTreeMap::new(),
            done: None,
        }
    }

    #[must_use]
    pub fn with_done(mut self, done: Arc<dyn DoneHandler>) -> Self {
        self.done = Some(done);
        self
    }

    #[must_use]
    pub fn with_update(mut self, record_type: RecordType, update: ChangeRequestUpdate) -> Self {
        self.updates.insert(record_type, update);
        self
    }

    /// Reports the execution result to the done handler, if any.
    pub fn report(&self, result: &Result<()>) {
        let Some(done) = &self.done else {
            return;
        };
        match result {
            Ok(()) => done.succeeded(),
            Err(err) if err.is_throttling() => done.throttled(),
            Err(
                err @ (DnsError::Config(_)
                | DnsError::Validation(_)
                | DnsError::Provider(
                    ProviderError::RoutingPolicyNotSupported
                    | ProviderError::InvalidRoutingPolicy { .. },
                )),
            ) => done.set_invalid(err),
            Err(err) => done.failed(err),
        }
    }
}

impl fmt::Display for ChangeRequests {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChangeRequests(name: {}, types: [", self.name)?;
        for (i, t) in self.updates.keys().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{t}")?;
        }
        f.write_str("])")
    }
}

/// Contract every DNS backend implements.
#[async_trait]
pub trait DnsHandler: Send + Sync {
    /// Registered provider type of this handler.
    fn provider_type(&self) -> &str;

    /// Lists the hosted zones visible to the credentials.
    async fn get_zones(&self) -> Result<Vec<DnsHostedZone>>;

    /// Query path for names of `zone`.
    ///
    /// Backends with private zones or routing policies return their own
    /// authoritative query; others use the standard DNS query from `factory`.
    fn get_custom_query_dns_func(
        &self,
        zone: &DnsHostedZone,
        factory: &QueryDnsFactory,
    ) -> Result<Arc<dyn QueryDns>> {
        let _ = zone;
        Ok(factory())
    }

    /// Full record state of a zone.
    async fn get_zone_state(&self, zone: &DnsHostedZone) -> Result<DnsSets> {
        Err(DnsError::Generic(format!(
            "zone state of {} not supported by provider type {}",
            zone.zone_id,
            self.provider_type()
        )))
    }

    /// Applies the transitions of one DNS name.
    async fn execute_requests(
        &self,
        log: &dyn LogSink,
        zone: &DnsHostedZone,
        requests: &ChangeRequests,
    ) -> Result<()>;

    /// Rewrites generic targets into provider specific ones.
    fn map_targets(&self, dns_name: &str, targets: Vec<Target>) -> Vec<Target> {
        let _ = dns_name;
        targets
    }

    /// Frees backend resources.
    fn release(&self) {}
}

/// Builds handlers by provider type.
pub trait DnsHandlerFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the type is unknown or the handler cannot be built.
    fn create(&self, provider_type: &str, config: DnsHandlerConfig) -> Result<Arc<dyn DnsHandler>>;

    fn supports(&self, provider_type: &str) -> bool;

    /// Targets mapper registered for the provider type.
    fn targets_mapper(&self, provider_type: &str) -> Option<registry::TargetsMapper> {
        let _ = provider_type;
        None
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
