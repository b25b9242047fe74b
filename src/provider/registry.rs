// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Registry of provider types.
//!
//! The registry is filled once at startup and read-only afterwards. It maps a
//! provider type to its handler constructor, its validation adapter, its
//! default rate limits and an optional targets mapper.

use super::checks::DnsHandlerAdapter;
use super::rate_limiter::{new_rate_limiter, select_rate_limits};
use super::{DnsHandler, DnsHandlerConfig, DnsHandlerFactory};
use crate::config::RateLimiterOptions;
use crate::dns::Target;
use crate::dns_errors::{ConfigError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Builds a handler from its configuration.
pub type DnsHandlerCreator =
    Arc<dyn Fn(DnsHandlerConfig) -> Result<Arc<dyn DnsHandler>> + Send + Sync>;

/// Rewrites generic targets of a DNS name into provider specific targets.
pub type TargetsMapper = Arc<dyn Fn(&str, Vec<Target>) -> Vec<Target> + Send + Sync>;

struct Registration {
    creator: DnsHandlerCreator,
    adapter: Arc<dyn DnsHandlerAdapter>,
    default_rate_limits: Option<RateLimiterOptions>,
    targets_mapper: Option<TargetsMapper>,
}

/// Provider type registry.
#[derive(Default)]
pub struct DnsHandlerRegistry {
    registrations: BTreeMap<String, Registration>,
}

impl DnsHandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider type.
    ///
    /// # Panics
    ///
    /// Panics if the provider type is already registered.
    pub fn register(
        &mut self,
        provider_type: &str,
        creator: DnsHandlerCreator,
        adapter: Arc<dyn DnsHandlerAdapter>,
        default_rate_limits: Option<RateLimiterOptions>,
        targets_mapper: Option<TargetsMapper>,
    ) {
        assert!(
            !self.registrations.contains_key(provider_type),
            "provider type {provider_type} already registered"
        );
        debug!(provider_type, "Registering DNS handler");
        self.registrations.insert(
            provider_type.to_string(),
            Registration {
                creator,
                adapter,
                default_rate_limits,
                targets_mapper,
            },
        );
    }

    /// Registered provider types in sorted order.
    #[must_use]
    pub fn provider_types(&self) -> Vec<&str> {
        self.registrations.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn get_dns_handler_adapter(&self, provider_type: &str) -> Option<Arc<dyn DnsHandlerAdapter>> {
        self.registrations
            .get(provider_type)
            .map(|r| Arc::clone(&r.adapter))
    }

    #[must_use]
    pub fn get_targets_mapper(&self, provider_type: &str) -> Option<TargetsMapper> {
        self.registrations
            .get(provider_type)
            .and_then(|r| r.targets_mapper.clone())
    }

    #[must_use]
    pub fn get_default_rate_limits(&self, provider_type: &str) -> Option<RateLimiterOptions> {
        self.registrations
            .get(provider_type)
            .and_then(|r| r.default_rate_limits.clone())
    }
}

impl DnsHandlerFactory for DnsHandlerRegistry {
    fn create(&self, provider_type: &str, mut config: DnsHandlerConfig) -> Result<Arc<dyn DnsHandler>> {
        let registration =
            self.registrations
                .get(provider_type)
                .ok_or_else(|| ConfigError::ProviderTypeNotFound {
                    provider_type: provider_type.to_string(),
                })?;
        let configured = config.global.configured_rate_limits(provider_type);
        let limits = select_rate_limits(
            configured.as_ref(),
            registration.default_rate_limits.as_ref(),
        );
        debug!(provider_type, ?limits, "Creating DNS handler");
        config.provider_type = provider_type.to_string();
        config.rate_limiter = new_rate_limiter(limits.as_ref())?;
        (registration.creator)(config)
    }

    fn supports(&self, provider_type: &str) -> bool {
        self.registrations.contains_key(provider_type)
    }

    fn targets_mapper(&self, provider_type: &str) -> Option<TargetsMapper> {
        self.get_targets_mapper(provider_type)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod registry_tests;
