// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Collects execution logs to return them to the remote caller.

use crate::remote::proto;
use crate::provider::{LogLevel, LogSink};
use chrono::Utc;
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Log sink handed to a handler while it executes remote change requests.
///
/// Every line is kept for the response and also written to the local log.
#[derive(Debug)]
pub struct LogCollector {
    namespace: String,
    client: String,
    entries: Mutex<Vec<proto::LogEntry>>,
}

impl LogCollector {
    #[must_use]
    pub fn new(namespace: &str, client: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            client: client.to_string(),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Collected entries in emission order.
    #[must_use]
    pub fn into_entries(self) -> Vec<proto::LogEntry> {
        self.entries
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn wire_level(level: LogLevel) -> proto::LogEntryLevel {
    match level {
        LogLevel::Debug => proto::LogEntryLevel::Debug,
        LogLevel::Info => proto::LogEntryLevel::Info,
        LogLevel::Warn => proto::LogEntryLevel::Warn,
        LogLevel::Error => proto::LogEntryLevel::Error,
    }
}

impl LogSink for LogCollector {
    fn log(&self, level: LogLevel, message: &str) {
        let (namespace, client) = (self.namespace.as_str(), self.client.as_str());
        match level {
            LogLevel::Debug => debug!(namespace, client, "{message}"),
            LogLevel::Info => info!(namespace, client, "{message}"),
            LogLevel::Warn => warn!(namespace, client, "{message}"),
            LogLevel::Error => error!(namespace, client, "{message}"),
        }
        let entry = proto::LogEntry {
            timestamp: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            level: wire_level(level) as i32,
            message: message.to_string(),
        };
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_in_order() {
        let collector = LogCollector::new("ns", "client-1");
        collector.info("first");
        collector.error("second");
        let entries = collector.into_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[0].level, proto::LogEntryLevel::Info as i32);
        assert_eq!(entries[1].level, proto::LogEntryLevel::Error as i32);
        assert!(entries[0].timestamp <= entries[1].timestamp, "timestamps must not go back");
        assert!(entries[0].timestamp > 0);
    }
}
