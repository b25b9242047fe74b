// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TTL cache for DNS query results.
//!
//! Entries live as long as the TTL reported by the answer, capped by the configured
//! default lifetime. Errors and empty answers are cached for the default lifetime.

use super::dnsset::DnsSetName;
use super::query::{QueryDns, QueryDnsResult};
use super::records::RecordType;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

struct CacheEntry {
    result: QueryDnsResult,
    expires_at: Instant,
}

/// Caches query results per (name, record type).
pub struct DnsCache {
    query: Arc<dyn QueryDns>,
    default_ttl: Duration,
    entries: Mutex<HashMap<(DnsSetName, RecordType), CacheEntry>>,
}

impl DnsCache {
    pub fn new(query: Arc<dyn QueryDns>, default_ttl: Duration) -> Self {
        Self {
            query,
            default_ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a fresh cached result or queries and caches a new one.
    pub async fn get(&self, set_name: &DnsSetName, record_type: RecordType) -> QueryDnsResult {
        let key = (set_name.clone(), record_type);
        let now = Instant::now();
        if let Some(entry) = self.lock().get(&key) {
            if entry.expires_at > now {
                return entry.result.clone();
            }
        }

        let result = self.query.query(set_name, record_type).await;
        let ttl = match &result {
            Ok(Some(rs)) if rs.ttl > 0 => {
                Duration::from_secs(rs.ttl.unsigned_abs()).min(self.default_ttl)
            }
            _ => self.default_ttl,
        };
        self.lock().insert(
            key,
            CacheEntry {
                result: result.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        result
    }

    /// Drops all entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of cached entries, including expired ones not yet replaced.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(DnsSetName, RecordType), CacheEntry>> {
        // A poisoned map only holds cached values; keep using it.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod cache_tests;
