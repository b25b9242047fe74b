// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Wire messages of the `remote.RemoteProvider` gRPC service.
//!
//! Field numbers and enum values are part of the protocol and must not change.
//! The client and server stubs are generated by `build.rs`.

#![allow(clippy::derive_partial_eq_without_eq)]

use std::collections::HashMap;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LoginRequest {
    #[prost(string, tag = "1")]
    pub namespace: String,
    #[prost(string, tag = "2")]
    pub client_id: String,
    #[prost(int32, tag = "3")]
    pub client_protocol_version: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LoginResponse {
    #[prost(string, tag = "1")]
    pub token: String,
    #[prost(int32, tag = "2")]
    pub server_protocol_version: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetZonesRequest {
    #[prost(string, tag = "1")]
    pub token: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Zones {
    #[prost(message, repeated, tag = "1")]
    pub zone: Vec<Zone>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Zone {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub provider_type: String,
    #[prost(string, tag = "3")]
    pub key: String,
    #[prost(string, tag = "4")]
    pub domain: String,
    #[prost(string, repeated, tag = "5")]
    pub forwarded_domain: Vec<String>,
    #[prost(bool, tag = "6")]
    pub private_zone: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetZoneStateRequest {
    #[prost(string, tag = "1")]
    pub token: String,
    #[prost(string, tag = "2")]
    pub zoneid: String,
}

/// Zone state keyed by `name` or `name#setIdentifier`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ZoneState {
    #[prost(map = "string, message", tag = "1")]
    pub dns_sets: HashMap<String, DnsSet>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DnsSet {
    #[prost(string, tag = "1")]
    pub dns_name: String,
    #[prost(string, tag = "2")]
    pub update_group: String,
    /// Record sets keyed by record type
    #[prost(map = "string, message", tag = "3")]
    pub records: HashMap<String, RecordSet>,
    #[prost(string, tag = "4")]
    pub set_identifier: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RecordSet {
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(int32, tag = "2")]
    pub ttl: i32,
    #[prost(message, repeated, tag = "3")]
    pub record: Vec<Record>,
    /// Only sent with protocol version 1 or later
    #[prost(message, optional, tag = "4")]
    pub routing_policy: Option<RoutingPolicy>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Record {
    #[prost(string, tag = "1")]
    pub value: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RoutingPolicy {
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(map = "string, string", tag = "2")]
    pub parameters: HashMap<String, String>,
}

/// One record type of a DNS set.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PartialDnsSet {
    #[prost(string, tag = "1")]
    pub dns_name: String,
    #[prost(string, tag = "2")]
    pub update_group: String,
    #[prost(string, tag = "3")]
    pub record_type: String,
    #[prost(message, optional, tag = "4")]
    pub record_set: Option<RecordSet>,
    #[prost(string, tag = "5")]
    pub set_identifier: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ChangeAction {
    Create = 0,
    Update = 1,
    Delete = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChangeRequest {
    #[prost(enumeration = "ChangeAction", tag = "1")]
    pub action: i32,
    #[prost(message, optional, tag = "2")]
    pub change: Option<PartialDnsSet>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExecuteRequest {
    #[prost(string, tag = "1")]
    pub token: String,
    #[prost(string, tag = "2")]
    pub zoneid: String,
    #[prost(message, repeated, tag = "3")]
    pub change_requests: Vec<ChangeRequest>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ChangeState {
    NotProcessed = 0,
    Succeeded = 1,
    Invalid = 2,
    Failed = 3,
    Throttled = 4,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChangeResponse {
    #[prost(enumeration = "ChangeState", tag = "1")]
    pub state: i32,
    #[prost(string, tag = "2")]
    pub error_message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum LogEntryLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LogEntry {
    /// Unix time in nanoseconds
    #[prost(int64, tag = "1")]
    pub timestamp: i64,
    #[prost(enumeration = "LogEntryLevel", tag = "2")]
    pub level: i32,
    #[prost(string, tag = "3")]
    pub message: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExecuteResponse {
    #[prost(message, repeated, tag = "1")]
    pub change_responses: Vec<ChangeResponse>,
    #[prost(message, repeated, tag = "2")]
    pub log_messages: Vec<LogEntry>,
}

include!(concat!(env!("OUT_DIR"), "/remote.RemoteProvider.rs"));
