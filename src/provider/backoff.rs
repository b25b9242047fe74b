// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Health tracking with exponential backoff.
//!
//! An account records the outcome of each zone listing. After a failure the
//! caller should wait before trying again; the wait doubles with every
//! consecutive failure and is reset by the next success.
//!
//! # Retry Schedule
//!
//! With the defaults (3s minimum, 10m maximum) consecutive failures wait:
//!
//! 1. 3s
//! 2. 6s
//! 3. 12s
//! 4. 24s
//! 5. ...
//! 9. 10m (capped at max interval)

use crate::constants::{BACKOFF_MAX_SECS, BACKOFF_MIN_SECS};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: u32 = 2;

#[derive(Debug, Default)]
struct BackoffState {
    current: Duration,
    failures: u32,
    next_allowed: Option<Instant>,
}

/// Tracks consecutive failures of an operation.
#[derive(Debug)]
pub struct Backoff {
    min_interval: Duration,
    max_interval: Duration,
    state: Mutex<BackoffState>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(BACKOFF_MIN_SECS),
            Duration::from_secs(BACKOFF_MAX_SECS),
        )
    }
}

impl Backoff {
    #[must_use]
    pub fn new(min_interval: Duration, max_interval: Duration) -> Self {
        Self {
            min_interval,
            max_interval,
            state: Mutex::new(BackoffState::default()),
        }
    }

    /// Resets the backoff.
    pub fn succeeded(&self) {
        *self.lock() = BackoffState::default();
    }

    /// Records a failure and returns the wait before the next attempt.
    pub fn failed(&self) -> Duration {
        let mut state = self.lock();
        state.current = if state.current.is_zero() {
            self.min_interval
        } else {
            (state.current * BACKOFF_MULTIPLIER).min(self.max_interval)
        };
        state.failures += 1;
        state.next_allowed = Some(Instant::now() + state.current);
        state.current
    }

    /// True if the last attempt failed and its wait has not yet elapsed.
    #[must_use]
    pub fn is_backing_off(&self, now: Instant) -> bool {
        self.remaining(now).is_some()
    }

    /// Time left until the next attempt is allowed.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.lock()
            .next_allowed
            .filter(|next| *next > now)
            .map(|next| next - now)
    }

    /// Number of consecutive failures.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.lock().failures
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BackoffState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod backoff_tests;
