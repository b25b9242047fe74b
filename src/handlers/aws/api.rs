// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Route53 API surface used by the AWS backend.
//!
//! Only the calls needed for zone listing and change batches are modelled.
//! Production code plugs in an SDK backed client, tests an in-memory fake.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Route53 record set types.
pub const RR_TYPE_A: &str = "A";
pub const RR_TYPE_AAAA: &str = "AAAA";
pub const RR_TYPE_CNAME: &str = "CNAME";
pub const RR_TYPE_TXT: &str = "TXT";
pub const RR_TYPE_NS: &str = "NS";

/// Error codes signalling rate limiting.
const THROTTLING_CODES: [&str; 2] = ["Throttling", "PriorRequestNotComplete"];

/// Error code of a rejected change batch.
pub const INVALID_CHANGE_BATCH: &str = "InvalidChangeBatch";

/// Failure of a Route53 call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed: {code}: {message}")]
pub struct Route53Error {
    pub operation: String,
    pub code: String,
    pub message: String,
}

impl Route53Error {
    pub fn new(operation: &str, code: &str, message: impl Into<String>) -> Self {
        Self {
            operation: operation.to_string(),
            code: code.to_string(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_throttling(&self) -> bool {
        THROTTLING_CODES.contains(&self.code.as_str())
    }

    #[must_use]
    pub fn is_invalid_change_batch(&self) -> bool {
        self.code == INVALID_CHANGE_BATCH
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostedZone {
    /// Full id, e.g. `/hostedzone/Z1234`
    pub id: String,
    /// Domain with trailing dot
    pub name: String,
    pub private_zone: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AliasTarget {
    pub dns_name: String,
    pub hosted_zone_id: String,
    pub evaluate_target_health: bool,
}

/// A Route53 resource record set including its routing fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceRecordSet {
    pub name: String,
    pub record_type: String,
    pub ttl: Option<i64>,
    pub values: Vec<String>,
    pub alias_target: Option<AliasTarget>,
    pub set_identifier: Option<String>,
    pub weight: Option<i64>,
    pub geo_location: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeAction {
    Create,
    Upsert,
    Delete,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeAction::Create => "CREATE",
            ChangeAction::Upsert => "UPSERT",
            ChangeAction::Delete => "DELETE",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Change {
    pub action: ChangeAction,
    pub record_set: ResourceRecordSet,
}

/// Route53 calls of the AWS backend.
#[async_trait]
pub trait Route53Api: Send + Sync {
    async fn list_hosted_zones(&self) -> Result<Vec<HostedZone>, Route53Error>;

    async fn list_resource_record_sets(
        &self,
        hosted_zone_id: &str,
    ) -> Result<Vec<ResourceRecordSet>, Route53Error>;

    /// Applies all changes atomically or none of them.
    async fn change_resource_record_sets(
        &self,
        hosted_zone_id: &str,
        changes: &[Change],
    ) -> Result<(), Route53Error>;
}
