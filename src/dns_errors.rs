// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the DNS provider layer.
//!
//! This module provides specialized error types for:
//! - Provider configuration and property access (secrets and provider config)
//! - Pre-flight validation of provider inputs
//! - Backend execution failures, throttling and lock contention
//! - The remote provider protocol (tokens, namespaces, transport)
//!
//! All types are cheap to clone so that query results including their errors can be
//! kept in caches.

use thiserror::Error;

use crate::constants::{BUSY, INVALID_TOKEN};

/// Errors raised while reading provider properties or provider configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required property is missing
    ///
    /// `keys` holds the primary key followed by all accepted aliases.
    #[error("{} required in secret", quote_keys(.keys))]
    MissingProperty {
        /// Primary key and aliases
        keys: Vec<String>,
    },

    /// A property is present but its value is empty
    #[error("value for '{key}' in secret is empty")]
    EmptyProperty {
        /// The key with the empty value
        key: String,
    },

    /// A value is given both in the secret and in the provider config
    #[error("'{key}' defined in secret and provider config")]
    ConflictingProperty {
        /// The duplicated key
        key: String,
    },

    /// A property value cannot be parsed
    #[error("property '{key}' is invalid: {reason}")]
    InvalidProperty {
        /// The key of the invalid value
        key: String,
        /// What is wrong with the value
        reason: String,
    },

    /// The raw provider configuration cannot be used
    #[error("invalid provider config for provider type {provider_type}: {reason}")]
    InvalidProviderConfig {
        /// Provider type owning the configuration
        provider_type: String,
        /// What is wrong with it
        reason: String,
    },

    /// No factory is registered for the provider type
    #[error("provider type \"{provider_type}\" not found in registry")]
    ProviderTypeNotFound {
        /// The unknown provider type
        provider_type: String,
    },
}

fn quote_keys(keys: &[String]) -> String {
    keys.iter()
        .map(|k| format!("'{k}'"))
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Aggregated validation failure of provider inputs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("validation failed for provider type {provider_type}: {}", .problems.join(", "))]
pub struct ValidationError {
    /// Provider type being validated
    pub provider_type: String,
    /// All problems found, in check order
    pub problems: Vec<String>,
}

/// A transient backend error that should be retried with backoff.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("throttled: {message}")]
pub struct ThrottlingError {
    /// Message of the underlying backend error
    pub message: String,
}

impl ThrottlingError {
    /// Wrap a backend message as a throttling error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors raised while talking to a DNS backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The change request uses a set identifier or routing policy the backend cannot handle
    #[error("routing policy not supported")]
    RoutingPolicyNotSupported,

    /// The routing policy is malformed for this backend
    #[error("invalid routing policy: {reason}")]
    InvalidRoutingPolicy {
        /// What is wrong with the policy
        reason: String,
    },

    /// The backend rejected requests because of rate limiting
    #[error(transparent)]
    Throttled(#[from] ThrottlingError),

    /// Some records of a generic per-record execution failed
    #[error("could not update all dns entries")]
    UpdateIncomplete,

    /// Some changes of a batched execution failed
    #[error("{count} changes failed")]
    ChangesFailed {
        /// Number of failed changes
        count: usize,
    },

    /// A request to the backend failed
    #[error("{message}")]
    Backend {
        /// Backend error text
        message: String,
    },

    /// A DNS query failed
    #[error("DNS query for {name} ({record_type}) failed: {reason}")]
    Query {
        /// Queried name
        name: String,
        /// Queried record type
        record_type: String,
        /// Failure reason
        reason: String,
    },

    /// An operation did not finish in time
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        /// Operation name
        operation: String,
        /// Timeout in seconds
        seconds: u64,
    },

    /// The handler is used by another call
    #[error("{}", BUSY)]
    Busy,

    /// The hosted zone is unknown to the handler
    #[error("zone {zone} not found")]
    ZoneNotFound {
        /// Zone id
        zone: String,
    },
}

impl ProviderError {
    /// Create a backend error from any displayable message.
    #[must_use]
    pub fn backend(message: impl std::fmt::Display) -> Self {
        Self::Backend {
            message: message.to_string(),
        }
    }
}

/// Errors of the remote provider protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The token is unknown or expired
    #[error("{} for namespace {namespace}", INVALID_TOKEN)]
    InvalidToken {
        /// Namespace of the token
        namespace: String,
    },

    /// The namespace has no registered providers
    #[error("namespace {namespace} not found or no providers available")]
    NamespaceNotFound {
        /// Requested namespace
        namespace: String,
    },

    /// The client certificate does not allow access to the namespace
    #[error("client certificate common name {common_name:?} does not match namespace {namespace}")]
    NamespaceMismatch {
        /// Common name of the client certificate
        common_name: String,
        /// Requested namespace
        namespace: String,
    },

    /// No verified client certificate was presented
    #[error("missing client certificate")]
    MissingClientCertificate,

    /// TLS material could not be loaded
    #[error("TLS setup failed: {reason}")]
    Tls {
        /// Failure reason
        reason: String,
    },

    /// The gRPC transport failed
    #[error("remote transport failed: {reason}")]
    Transport {
        /// Failure reason
        reason: String,
    },

    /// The server returned an error status
    #[error("{message}")]
    Status {
        /// gRPC status code name
        code: String,
        /// Status message
        message: String,
    },

    /// A wire message could not be converted
    #[error("invalid wire message: {reason}")]
    InvalidMessage {
        /// Conversion problem
        reason: String,
    },
}

/// Composite error type for all DNS provider operations.
///
/// This is the main error type returned by handler, account and remote protocol
/// operations. It can represent any of the specific error types above.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
    /// Property or configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Pre-flight validation error
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Backend execution error
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Remote protocol error
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Generic error for operations that don't fit other categories
    #[error("{0}")]
    Generic(String),
}

impl DnsError {
    /// Returns true if this error is transient and the operation should be retried.
    ///
    /// Transient errors include throttling, lock contention, timeouts and transport failures.
    /// Configuration, validation and routing policy errors are permanent.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Provider(
                ProviderError::Throttled(_)
                | ProviderError::Busy
                | ProviderError::Timeout { .. }
                | ProviderError::Backend { .. }
                | ProviderError::Query { .. }
                | ProviderError::UpdateIncomplete
                | ProviderError::ChangesFailed { .. },
            )
            | Self::Remote(RemoteError::Transport { .. } | RemoteError::InvalidToken { .. })
            | Self::Generic(_) => true,

            Self::Config(_)
            | Self::Validation(_)
            | Self::Provider(
                ProviderError::RoutingPolicyNotSupported
                | ProviderError::InvalidRoutingPolicy { .. }
                | ProviderError::ZoneNotFound { .. },
            )
            | Self::Remote(
                RemoteError::NamespaceNotFound { .. }
                | RemoteError::NamespaceMismatch { .. }
                | RemoteError::MissingClientCertificate
                | RemoteError::Tls { .. }
                | RemoteError::Status { .. }
                | RemoteError::InvalidMessage { .. },
            ) => false,
        }
    }

    /// Returns true if this error signals throttling by the backend.
    #[must_use]
    pub fn is_throttling(&self) -> bool {
        matches!(self, Self::Provider(ProviderError::Throttled(_)))
    }

    /// Returns the status reason code for this error.
    ///
    /// This is used by callers reporting the error on provider or entry status.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::Config(ConfigError::MissingProperty { .. }) => "MissingProperty",
            Self::Config(ConfigError::EmptyProperty { .. }) => "EmptyProperty",
            Self::Config(ConfigError::ConflictingProperty { .. }) => "ConflictingProperty",
            Self::Config(ConfigError::InvalidProperty { .. }) => "InvalidProperty",
            Self::Config(ConfigError::InvalidProviderConfig { .. }) => "InvalidProviderConfig",
            Self::Config(ConfigError::ProviderTypeNotFound { .. }) => "ProviderTypeNotFound",

            Self::Validation(_) => "ValidationFailed",

            Self::Provider(ProviderError::RoutingPolicyNotSupported) => {
                "RoutingPolicyNotSupported"
            }
            Self::Provider(ProviderError::InvalidRoutingPolicy { .. }) => "InvalidRoutingPolicy",
            Self::Provider(ProviderError::Throttled(_)) => "Throttled",
            Self::Provider(ProviderError::UpdateIncomplete) => "UpdateIncomplete",
            Self::Provider(ProviderError::ChangesFailed { .. }) => "ChangesFailed",
            Self::Provider(ProviderError::Backend { .. }) => "BackendError",
            Self::Provider(ProviderError::Query { .. }) => "QueryFailed",
            Self::Provider(ProviderError::Timeout { .. }) => "Timeout",
            Self::Provider(ProviderError::Busy) => "Busy",
            Self::Provider(ProviderError::ZoneNotFound { .. }) => "ZoneNotFound",

            Self::Remote(RemoteError::InvalidToken { .. }) => "InvalidToken",
            Self::Remote(RemoteError::NamespaceNotFound { .. }) => "NamespaceNotFound",
            Self::Remote(RemoteError::NamespaceMismatch { .. }) => "NamespaceMismatch",
            Self::Remote(RemoteError::MissingClientCertificate) => "MissingClientCertificate",
            Self::Remote(RemoteError::Tls { .. }) => "TlsError",
            Self::Remote(RemoteError::Transport { .. }) => "TransportError",
            Self::Remote(RemoteError::Status { .. }) => "RemoteError",
            Self::Remote(RemoteError::InvalidMessage { .. }) => "InvalidMessage",

            Self::Generic(_) => "Error",
        }
    }
}

impl From<anyhow::Error> for DnsError {
    fn from(err: anyhow::Error) -> Self {
        Self::Generic(format!("{err:#}"))
    }
}

/// Result type used across the crate.
pub type Result<T, E = DnsError> = std::result::Result<T, E>;

/// Redact volatile parts of backend error messages.
///
/// Request ids and timestamps change on every call; keeping them would make an
/// identical failure look like a new error on every reconciliation.
#[must_use]
pub fn stable_error(message: &str) -> String {
    let mut result = redact_after(message, "RequestID: ", is_request_id_char);
    result = redact_after(&result, "request id: ", is_request_id_char);
    redact_timestamps(&result)
}

fn is_request_id_char(c: char) -> bool {
    c.is_ascii_hexdigit() || c == '-'
}

fn redact_after(message: &str, marker: &str, accept: fn(char) -> bool) -> String {
    let mut out = String::with_capacity(message.len());
    let mut rest = message;
    while let Some(pos) = rest.find(marker) {
        let start = pos + marker.len();
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let end = tail.find(|c: char| !accept(c)).unwrap_or(tail.len());
        if end > 0 {
            out.push_str("<redacted>");
        }
        rest = &tail[end..];
    }
    out.push_str(rest);
    out
}

/// Replace `YYYY-MM-DDTHH:MM:SS` style timestamps (with optional fraction and zone).
fn redact_timestamps(message: &str) -> String {
    let re = timestamp_regex();
    re.replace_all(message, "<redacted>").into_owned()
}

fn timestamp_regex() -> &'static regex::Regex {
    static RE: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
        regex::Regex::new(
            r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:?\d{2}( [A-Z]{2,5})?)?",
        )
        .expect("timestamp pattern must compile")
    });
    &RE
}

#[cfg(test)]
#[path = "dns_errors_tests.rs"]
mod dns_errors_tests;
