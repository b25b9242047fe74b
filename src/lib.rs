// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # dnsman - DNS provider abstraction and remote provider protocol
//!
//! dnsman gives a DNS manager one interface over many hosted-zone backends.
//! A desired state of record sets is diffed against a zone and applied with
//! the fewest backend calls, and providers can be shared with managers in
//! other trust domains over an authenticated gRPC protocol.
//!
//! ## Modules
//!
//! - [`dns`] - Domain model: record sets, DNS sets, hosted zones, queries
//! - [`provider`] - Handler trait, registry, accounts, rate limiting and the
//!   generic diff-and-apply engine
//! - [`handlers`] - Backends (mock, PowerDNS, RFC 2136, AWS, Google, Alicloud)
//! - [`remote`] - Remote provider protocol server and client
//! - [`config`] - Global configuration
//! - [`metrics`] - Prometheus metrics
//! - [`dns_errors`] - Error types
//!
//! ## Example
//!
//! ```rust,no_run
//! use dnsman::dns::{DnsSetName, RecordSet, RecordType};
//! use dnsman::provider::{ChangeRequestUpdate, ChangeRequests};
//!
//! let requests = ChangeRequests::new(DnsSetName::new("www.example.org")).with_update(
//!     RecordType::A,
//!     ChangeRequestUpdate::create(RecordSet::from_values(RecordType::A, 300, ["1.2.3.4"])),
//! );
//! assert_eq!(requests.updates.len(), 1);
//! ```

pub mod config;
pub mod constants;
pub mod dns;
pub mod dns_errors;
pub mod handlers;
pub mod metrics;
pub mod provider;
pub mod remote;
