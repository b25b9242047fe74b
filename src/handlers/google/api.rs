// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cloud DNS API surface used by the Google backend.

use async_trait::async_trait;
use thiserror::Error;

/// Failure of a Cloud DNS call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("googleapi: Error {code}: {message}")]
pub struct CloudDnsError {
    /// HTTP status code
    pub code: u16,
    pub message: String,
}

impl CloudDnsError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code == 404
    }

    #[must_use]
    pub fn is_throttling(&self) -> bool {
        self.code == 429 || self.message.contains("rateLimitExceeded")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagedZone {
    /// Zone name, unique within the project
    pub name: String,
    /// Domain with trailing dot
    pub dns_name: String,
    pub private: bool,
}

/// One weighted round robin slot.
#[derive(Clone, Debug, PartialEq)]
pub struct WrrItem {
    pub rrdatas: Vec<String>,
    pub weight: f64,
}

/// One geolocation slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeoItem {
    pub location: String,
    pub rrdatas: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RrSetRoutingPolicy {
    Wrr(Vec<WrrItem>),
    Geo(Vec<GeoItem>),
}

/// A Cloud DNS record set. Either `rrdatas` or `routing_policy` is set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceRecordSet {
    pub name: String,
    pub record_type: String,
    pub ttl: i64,
    pub rrdatas: Vec<String>,
    pub routing_policy: Option<RrSetRoutingPolicy>,
}

/// Atomic change: deletions are applied before additions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Change {
    pub additions: Vec<ResourceRecordSet>,
    pub deletions: Vec<ResourceRecordSet>,
}

impl Change {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty()
    }
}

/// Cloud DNS calls of the Google backend.
#[async_trait]
pub trait CloudDnsApi: Send + Sync {
    /// Project the credentials belong to.
    fn project(&self) -> &str;

    async fn list_managed_zones(&self, project: &str) -> Result<Vec<ManagedZone>, CloudDnsError>;

    async fn list_resource_record_sets(
        &self,
        project: &str,
        zone: &str,
    ) -> Result<Vec<ResourceRecordSet>, CloudDnsError>;

    /// The record set of a name and type, a 404 error if there is none.
    async fn get_resource_record_set(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        record_type: &str,
    ) -> Result<ResourceRecordSet, CloudDnsError>;

    async fn create_change(&self, project: &str, zone: &str, change: &Change) -> Result<(), CloudDnsError>;
}
