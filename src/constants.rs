// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the DNS manager.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// DNS Protocol Constants
// ============================================================================

/// Standard DNS port for queries and dynamic updates
pub const DNS_PORT: u16 = 53;

/// Default nameserver used by the standard DNS query when none is configured
pub const DEFAULT_NAMESERVER: &str = "8.8.8.8:53";

/// Timeout for a single standard DNS query (UDP or TCP)
pub const DNS_QUERY_TIMEOUT_SECS: u64 = 10;

/// TSIG fudge time in seconds (allowed clock skew for RFC 2136 updates)
pub const TSIG_FUDGE_TIME_SECS: u16 = 300;

// ============================================================================
// Cache Constants
// ============================================================================

/// Default lifetime of a cached zone list of an account
pub const DEFAULT_ZONE_CACHE_TTL_SECS: u64 = 300;

/// Default lifetime of a cached DNS query result
pub const DEFAULT_DNS_CACHE_TTL_SECS: u64 = 30;

// ============================================================================
// Backoff Constants
// ============================================================================

/// Minimum wait after a failed zone listing
pub const BACKOFF_MIN_SECS: u64 = 3;

/// Maximum wait after repeated failed zone listings (10 minutes)
pub const BACKOFF_MAX_SECS: u64 = 600;

// ============================================================================
// Provider Constants
// ============================================================================

/// Default rate limiter QPS of the RFC2136 provider type
pub const RFC2136_DEFAULT_RATE_LIMIT_QPS: f64 = 50.0;

/// Default rate limiter burst of the RFC2136 provider type
pub const RFC2136_DEFAULT_RATE_LIMIT_BURST: u32 = 10;

/// Timeout for listing zones on batched backends (AWS, Google)
pub const GET_ZONES_TIMEOUT_SECS: u64 = 60;

/// Timeout for executing change requests on batched backends (AWS, Google)
pub const EXECUTE_TIMEOUT_SECS: u64 = 300;

/// Default maximum number of changes per Route53 change batch
pub const DEFAULT_AWS_BATCH_SIZE: usize = 50;

/// TTL used by Google Cloud DNS when a record set carries none
pub const GOOGLE_DEFAULT_RECORD_TTL: i64 = 300;

/// Highest allowed index of a Google weighted round robin item (set identifier)
pub const GOOGLE_MAX_WRR_INDEX: usize = 4;

// ============================================================================
// Remote Protocol Constants
// ============================================================================

/// Protocol version without routing policy support
pub const PROTOCOL_VERSION_0: i32 = 0;

/// Protocol version supporting set identifiers and routing policies
pub const PROTOCOL_VERSION_1: i32 = 1;

/// Protocol version spoken by this implementation
pub const CURRENT_PROTOCOL_VERSION: i32 = PROTOCOL_VERSION_1;

/// Sentinel error text for unknown or expired tokens
pub const INVALID_TOKEN: &str = "InvalidToken";

/// Error text returned when a handler lock could not be acquired in time
pub const BUSY: &str = "busy";

/// Validity of an issued remote access token (2 hours)
pub const TOKEN_TTL_SECS: u64 = 2 * 60 * 60;

/// Time a remote call spins for a handler lock before giving up with "busy"
pub const HANDLER_LOCK_SPINNING_SECS: u64 = 15;

/// Sleep between two attempts to acquire a handler lock
pub const HANDLER_LOCK_SPIN_INTERVAL_MILLIS: u64 = 10;

/// Number of random bytes in a token
pub const TOKEN_RANDOM_BYTES: usize = 16;

/// Number of random bytes in a server id
pub const SERVER_ID_RANDOM_BYTES: usize = 8;

/// Default port of the remote access server
pub const DEFAULT_REMOTE_ACCESS_PORT: u16 = 7777;

/// Timeout for remote GetZones calls
pub const REMOTE_GET_ZONES_TIMEOUT_SECS: u64 = 60;

/// Timeout for remote GetZoneState and Execute calls
pub const REMOTE_EXECUTE_TIMEOUT_SECS: u64 = 300;

// ============================================================================
// Kubernetes Secret Keys
// ============================================================================

/// Certificate key in a `kubernetes.io/tls` secret
pub const TLS_CERT_KEY: &str = "tls.crt";

/// Private key in a `kubernetes.io/tls` secret
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

/// CA certificate key in a TLS secret
pub const TLS_CA_KEY: &str = "ca.crt";

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Path of the Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Path of the health endpoint
pub const HEALTHZ_PATH: &str = "/healthz";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of Tokio worker threads
pub const TOKIO_WORKER_THREADS: usize = 4;
