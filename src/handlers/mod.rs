// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provider backends.
//!
//! Backends registered by [`register_all`]:
//!
//! - [`mock`] - in-memory zones for tests and demos
//! - [`powerdns`] - PowerDNS HTTP API
//! - [`rfc2136`] - dynamic updates signed with TSIG
//! - [`remote`](crate::remote::client) - providers of another DNS manager
//!
//! The vendor engines in [`aws`], [`google`] and [`alicloud`] are built on
//! narrow API traits and are constructed with an injected client;
//! [`aws::register`] adds Route53 to a registry that way.

pub mod alicloud;
pub mod aws;
pub mod google;
pub mod mock;
pub mod powerdns;
pub mod rfc2136;

use crate::config::RateLimiterOptions;
use crate::constants::{RFC2136_DEFAULT_RATE_LIMIT_BURST, RFC2136_DEFAULT_RATE_LIMIT_QPS};
use crate::provider::registry::DnsHandlerRegistry;
use crate::provider::DnsHandler;
use crate::remote;
use mock::InMemoryAccounts;
use std::sync::Arc;

/// Registers all built-in provider types.
///
/// Mock stores are added to `accounts` so callers can inspect them.
pub fn register_all(registry: &mut DnsHandlerRegistry, accounts: Arc<InMemoryAccounts>) {
    registry.register(
        mock::PROVIDER_TYPE,
        Arc::new(move |config| {
            Ok(Arc::new(mock::MockHandler::new(config, Arc::clone(&accounts))?) as Arc<dyn DnsHandler>)
        }),
        Arc::new(mock::adapter()),
        None,
        None,
    );
    registry.register(
        powerdns::PROVIDER_TYPE,
        Arc::new(|config| Ok(Arc::new(powerdns::PowerDnsHandler::new(&config)?) as Arc<dyn DnsHandler>)),
        Arc::new(powerdns::adapter()),
        None,
        None,
    );
    registry.register(
        rfc2136::PROVIDER_TYPE,
        Arc::new(|config| Ok(Arc::new(rfc2136::Rfc2136Handler::new(&config)?) as Arc<dyn DnsHandler>)),
        Arc::new(rfc2136::adapter()),
        Some(RateLimiterOptions {
            enabled: true,
            qps: RFC2136_DEFAULT_RATE_LIMIT_QPS,
            burst: RFC2136_DEFAULT_RATE_LIMIT_BURST,
        }),
        None,
    );
    registry.register(
        remote::client::PROVIDER_TYPE,
        Arc::new(|config| {
            Ok(Arc::new(remote::client::RemoteHandler::new(&config)?) as Arc<dyn DnsHandler>)
        }),
        Arc::new(remote::client::adapter()),
        None,
        None,
    );
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
