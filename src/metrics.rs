// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the DNS manager.
//!
//! This module provides metrics collection with the namespace prefix `dnsman_`.
//!
//! # Metrics Categories
//!
//! - **Provider Request Metrics** - Outbound backend calls by account and request type
//! - **Account Metrics** - Live accounts per provider type and their client counts
//! - **Remote Access Metrics** - Logins and requests served by the remote access server
//! - **Performance Metrics** - Duration of remote access requests
//!
//! # Example
//!
//! ```rust,no_run
//! use dnsman::metrics::{add_requests, gather_metrics};
//!
//! // Count one zone listing of an account
//! add_requests("mock-inmemory", "5f3a", "list_zones", 1, None);
//! let text = gather_metrics().unwrap();
//! ```

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "dnsman";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Provider Request Metrics
// ============================================================================

/// Total number of outbound requests not bound to a zone
///
/// Labels:
/// - `provider_type`: Registered provider type (e.g., `powerdns`)
/// - `account`: Account fingerprint
/// - `request_type`: Request category (e.g., `list_zones`)
pub static GENERIC_REQUESTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_provider_requests_total"),
        "Total number of provider requests by provider type, account and request type",
    );
    let counter = CounterVec::new(opts, &["provider_type", "account", "request_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of outbound requests against one hosted zone
///
/// Labels:
/// - `provider_type`: Registered provider type
/// - `account`: Account fingerprint
/// - `request_type`: Request category (e.g., `update_records`)
/// - `zone`: Hosted zone id
pub static ZONE_REQUESTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_provider_zone_requests_total"),
        "Total number of provider requests by provider type, account, request type and zone",
    );
    let counter = CounterVec::new(opts, &["provider_type", "account", "request_type", "zone"])
        .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Account Metrics
// ============================================================================

/// Accounts currently alive
///
/// Labels:
/// - `provider_type`: Registered provider type
/// - `account`: Account fingerprint
pub static ACCOUNTS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_accounts"),
        "Accounts currently shared by provider objects",
    );
    let gauge = GaugeVec::new(opts, &["provider_type", "account"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Number of provider objects using an account
///
/// Labels:
/// - `provider_type`: Registered provider type
/// - `account`: Account fingerprint
pub static ACCOUNT_CLIENTS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_account_clients"),
        "Number of provider objects using an account",
    );
    let gauge = GaugeVec::new(opts, &["provider_type", "account"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Remote Access Metrics
// ============================================================================

/// Total number of remote access logins
///
/// Labels:
/// - `namespace`: Namespace the client logged into
/// - `client`: Client id announced at login
/// - `result`: `success` or `failure`
pub static REMOTE_ACCESS_LOGINS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_remote_access_logins_total"),
        "Total number of remote access logins by namespace, client and result",
    );
    let counter = CounterVec::new(opts, &["namespace", "client", "result"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of authenticated remote access requests
///
/// Labels:
/// - `namespace`: Namespace of the token
/// - `client`: Client id of the token
/// - `request_type`: `get_zones`, `get_zone_state` or `execute`
/// - `zone`: Zone id, empty for zone listings
pub static REMOTE_ACCESS_REQUESTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_remote_access_requests_total"),
        "Total number of remote access requests by namespace, client, request type and zone",
    );
    let counter =
        CounterVec::new(opts, &["namespace", "client", "request_type", "zone"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of remote access requests in seconds
///
/// Labels:
/// - `request_type`: `get_zones`, `get_zone_state` or `execute`
pub static REMOTE_ACCESS_REQUEST_DURATION_SECONDS: LazyLock<HistogramVec> =
    LazyLock::new(|| {
        let opts = HistogramOpts::new(
            format!("{METRICS_NAMESPACE}_remote_access_request_duration_seconds"),
            "Duration of remote access requests in seconds by request type",
        )
        .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
        let histogram = HistogramVec::new(opts, &["request_type"]).unwrap();
        METRICS_REGISTRY
            .register(Box::new(histogram.clone()))
            .unwrap();
        histogram
    });

// ============================================================================
// Helper Functions
// ============================================================================

/// Record outbound provider requests
///
/// # Arguments
/// * `provider_type` - Provider type of the account
/// * `account` - Account fingerprint
/// * `request_type` - Request category
/// * `n` - Number of requests
/// * `zone` - Zone id if the requests targeted one zone
pub fn add_requests(provider_type: &str, account: &str, request_type: &str, n: u64, zone: Option<&str>) {
    #[allow(clippy::cast_precision_loss)]
    let n = n as f64;
    match zone {
        Some(zone) => ZONE_REQUESTS_TOTAL
            .with_label_values(&[provider_type, account, request_type, zone])
            .inc_by(n),
        None => GENERIC_REQUESTS_TOTAL
            .with_label_values(&[provider_type, account, request_type])
            .inc_by(n),
    }
}

/// Record the current client count of an account
///
/// # Arguments
/// * `provider_type` - Provider type of the account
/// * `account` - Account fingerprint
/// * `clients` - Number of provider objects using the account
pub fn report_account_providers(provider_type: &str, account: &str, clients: usize) {
    ACCOUNTS.with_label_values(&[provider_type, account]).set(1.0);
    #[allow(clippy::cast_precision_loss)]
    let clients = clients as f64;
    ACCOUNT_CLIENTS
        .with_label_values(&[provider_type, account])
        .set(clients);
}

/// Remove the series of a released account
pub fn delete_account(provider_type: &str, account: &str) {
    let _ = ACCOUNTS.remove_label_values(&[provider_type, account]);
    let _ = ACCOUNT_CLIENTS.remove_label_values(&[provider_type, account]);
}

/// Record a remote access login attempt
pub fn report_remote_access_logins(namespace: &str, client: &str, success: bool) {
    let result = if success { "success" } else { "failure" };
    REMOTE_ACCESS_LOGINS_TOTAL
        .with_label_values(&[namespace, client, result])
        .inc();
}

/// Record an authenticated remote access request
pub fn report_remote_access_requests(namespace: &str, client: &str, request_type: &str, zone: &str) {
    REMOTE_ACCESS_REQUESTS_TOTAL
        .with_label_values(&[namespace, client, request_type, zone])
        .inc();
}

/// Record the duration of a remote access request
pub fn record_remote_access_duration(request_type: &str, duration: Duration) {
    REMOTE_ACCESS_REQUEST_DURATION_SECONDS
        .with_label_values(&[request_type])
        .observe(duration.as_secs_f64());
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_requests_by_zone() {
        add_requests("metrics-test", "acc1", "list_zones", 2, None);
        add_requests("metrics-test", "acc1", "update_records", 3, Some("Z1"));

        let generic = GENERIC_REQUESTS_TOTAL.with_label_values(&["metrics-test", "acc1", "list_zones"]);
        assert!(generic.get() >= 2.0, "generic counter must be incremented by n");

        let zone = ZONE_REQUESTS_TOTAL.with_label_values(&["metrics-test", "acc1", "update_records", "Z1"]);
        assert!(zone.get() >= 3.0, "zone counter must be incremented by n");
    }

    #[test]
    fn test_account_gauges() {
        report_account_providers("metrics-gauge", "acc2", 3);
        assert_eq!(
            ACCOUNT_CLIENTS.with_label_values(&["metrics-gauge", "acc2"]).get(),
            3.0
        );

        delete_account("metrics-gauge", "acc2");
        let text = gather_metrics().unwrap();
        assert!(
            !text.contains("metrics-gauge"),
            "deleted account series must not be exported"
        );
    }

    #[test]
    fn test_remote_access_counters() {
        report_remote_access_logins("ns-metrics", "client-a", true);
        report_remote_access_logins("ns-metrics", "client-a", false);
        report_remote_access_requests("ns-metrics", "client-a", "execute", "Z9");
        record_remote_access_duration("execute", Duration::from_millis(20));

        assert!(
            REMOTE_ACCESS_LOGINS_TOTAL
                .with_label_values(&["ns-metrics", "client-a", "failure"])
                .get()
                >= 1.0
        );
        assert!(
            REMOTE_ACCESS_REQUEST_DURATION_SECONDS
                .with_label_values(&["execute"])
                .get_sample_count()
                > 0
        );
    }

    #[test]
    fn test_gather_metrics() {
        add_requests("gather-test", "acc", "list_zones", 1, None);

        let result = gather_metrics();
        assert!(result.is_ok(), "Gathering metrics should succeed");

        let metrics_text = result.unwrap();
        assert!(
            metrics_text.contains("dnsman_provider_requests_total"),
            "Metrics should contain the provider request counter"
        );
    }
}
