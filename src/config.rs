// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Manager configuration.
//!
//! The configuration is loaded from a YAML file and describes the global
//! behaviour of the DNS manager: rate limits, cache lifetimes, remote access
//! and the providers the binary should serve.
//!
//! # Example
//!
//! ```yaml
//! defaultRateLimits:
//!   enabled: true
//!   qps: 10
//!   burst: 20
//! providerAdvancedOptions:
//!   aws-route53:
//!     batchSize: 50
//! remoteAccess:
//!   port: 7777
//!   serverSecretName: dnsman-remote-server
//! providers:
//!   - namespace: team-a
//!     name: mock
//!     providerType: mock-inmemory
//!     remoteAccess: true
//! ```

use crate::constants::{
    DEFAULT_DNS_CACHE_TTL_SECS, DEFAULT_NAMESERVER, DEFAULT_REMOTE_ACCESS_PORT,
    DEFAULT_ZONE_CACHE_TTL_SECS, HANDLER_LOCK_SPINNING_SECS, TOKEN_TTL_SECS,
};
use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Token bucket settings for outbound provider calls.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiterOptions {
    /// Disabled options produce an "always allow" limiter
    #[serde(default)]
    pub enabled: bool,
    /// Sustained queries per second
    pub qps: f64,
    /// Maximum burst size
    pub burst: u32,
}

/// Per provider type tuning.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limits: Option<RateLimiterOptions>,
    /// Maximum number of changes submitted in one batch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    /// Maximum number of retries for a failed batch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Zone ids that are never returned from zone listings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_zones: Vec<String>,
}

/// Cache lifetimes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default = "default_zone_cache_ttl_secs")]
    pub zone_cache_ttl_secs: u64,
    #[serde(default = "default_dns_cache_ttl_secs")]
    pub dns_cache_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            zone_cache_ttl_secs: DEFAULT_ZONE_CACHE_TTL_SECS,
            dns_cache_ttl_secs: DEFAULT_DNS_CACHE_TTL_SECS,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn zone_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.zone_cache_ttl_secs)
    }

    #[must_use]
    pub fn dns_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.dns_cache_ttl_secs)
    }
}

fn default_zone_cache_ttl_secs() -> u64 {
    DEFAULT_ZONE_CACHE_TTL_SECS
}

fn default_dns_cache_ttl_secs() -> u64 {
    DEFAULT_DNS_CACHE_TTL_SECS
}

fn default_nameservers() -> Vec<String> {
    vec![DEFAULT_NAMESERVER.to_string()]
}

fn default_remote_access_port() -> u16 {
    DEFAULT_REMOTE_ACCESS_PORT
}

fn default_token_ttl_secs() -> u64 {
    TOKEN_TTL_SECS
}

fn default_spinning_secs() -> u64 {
    HANDLER_LOCK_SPINNING_SECS
}

/// Settings of the remote access gRPC server.
///
/// The serving certificate is either read from files or, when
/// `server_secret_name` is set, watched in a `kubernetes.io/tls` secret.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAccessServerConfig {
    #[serde(default = "default_remote_access_port")]
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_secret_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_secret_namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_cert_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_key_file: Option<String>,
    /// CA used to verify client certificates
    pub server_ca_file: String,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    #[serde(default = "default_spinning_secs")]
    pub spinning_secs: u64,
}

impl RemoteAccessServerConfig {
    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    #[must_use]
    pub fn spinning(&self) -> Duration {
        Duration::from_secs(self.spinning_secs)
    }
}

/// A provider served by the binary.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDefinition {
    pub namespace: String,
    pub name: String,
    pub provider_type: String,
    /// Credentials and settings, usually the data of a secret
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Name of a secret in `namespace` whose data is merged into `properties`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_config: Option<serde_json::Value>,
    /// Exposes the provider through the remote access server
    #[serde(default)]
    pub remote_access: bool,
}

impl ProviderDefinition {
    /// Object key used for account reference counting.
    #[must_use]
    pub fn object_key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// JSON bytes of the provider config as used for the account fingerprint.
    ///
    /// The YAML document is decoded first, so formatting of the file does not
    /// reach the fingerprint.
    #[must_use]
    pub fn provider_config_bytes(&self) -> Option<Vec<u8>> {
        // A decoded JSON value always serializes
        self.provider_config
            .as_ref()
            .and_then(|config| serde_json::to_vec(config).ok())
    }
}

/// Global configuration of the DNS manager.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DnsManagerConfiguration {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provider_advanced_options: BTreeMap<String, AdvancedOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_rate_limits: Option<RateLimiterOptions>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default = "default_nameservers")]
    pub default_nameservers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_access: Option<RemoteAccessServerConfig>,
    /// Client id announced by remote provider clients
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_access_client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ProviderDefinition>,
}

impl Default for DnsManagerConfiguration {
    fn default() -> Self {
        Self {
            provider_advanced_options: BTreeMap::new(),
            default_rate_limits: None,
            cache: CacheConfig::default(),
            default_nameservers: default_nameservers(),
            remote_access: None,
            remote_access_client_id: None,
            providers: Vec::new(),
        }
    }
}

impl DnsManagerConfiguration {
    /// Parses a configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration document.
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("failed to parse DNS manager configuration")
    }

    /// Loads the configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration file {}", path.display()))?;
        Self::from_yaml(&text)
    }

    /// Advanced options for a provider type, defaulted when not configured.
    #[must_use]
    pub fn advanced_options(&self, provider_type: &str) -> AdvancedOptions {
        self.provider_advanced_options
            .get(provider_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Rate limits configured for a provider type, falling back to the global defaults.
    #[must_use]
    pub fn configured_rate_limits(&self, provider_type: &str) -> Option<RateLimiterOptions> {
        self.provider_advanced_options
            .get(provider_type)
            .and_then(|options| options.rate_limits.clone())
            .or_else(|| self.default_rate_limits.clone())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
