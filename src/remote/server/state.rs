// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per namespace state of the remote access server.
//!
//! A namespace holds the handlers of its providers, the tokens issued to its
//! clients and an index from zone id to the handler serving the zone. Each
//! handler has its own try-lock so that a slow provider never blocks the other
//! providers of the namespace.

use crate::constants::HANDLER_LOCK_SPIN_INTERVAL_MILLIS;
use crate::dns::{are_zones_equivalent, DnsHostedZone};
use crate::dns_errors::{ProviderError, RemoteError, Result};
use crate::provider::DnsHandler;
use arc_swap::ArcSwap;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;
use tracing::warn;

/// Non-reentrant lock acquired by spinning until a deadline.
#[derive(Debug, Default, Clone)]
pub struct HandlerLock(Arc<tokio::sync::Mutex<()>>);

impl HandlerLock {
    /// Tries to take the lock until `spinning` has elapsed.
    ///
    /// Returns `None` if the lock stayed taken; callers report "busy".
    pub async fn try_lock_spinning(&self, spinning: Duration) -> Option<OwnedMutexGuard<()>> {
        let deadline = Instant::now() + spinning;
        loop {
            if let Ok(guard) = Arc::clone(&self.0).try_lock_owned() {
                return Some(guard);
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(HANDLER_LOCK_SPIN_INTERVAL_MILLIS)).await;
        }
    }
}

/// A registered provider handler with its last known zones.
pub struct HandlerState {
    pub name: String,
    pub handler: Arc<dyn DnsHandler>,
    pub lock: HandlerLock,
    zones: ArcSwap<Vec<DnsHostedZone>>,
}

impl HandlerState {
    fn new(name: &str, handler: Arc<dyn DnsHandler>, lock: HandlerLock, zones: Vec<DnsHostedZone>) -> Self {
        Self {
            name: name.to_string(),
            handler,
            lock,
            zones: ArcSwap::from_pointee(zones),
        }
    }

    /// Zones of the last successful listing.
    #[must_use]
    pub fn cached_zones(&self) -> Arc<Vec<DnsHostedZone>> {
        self.zones.load_full()
    }

    /// Lists the zones of the handler under its lock.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Busy`] if the lock cannot be taken in time, or
    /// the listing error of the handler.
    pub async fn get_zones(&self, spinning: Duration) -> Result<Vec<DnsHostedZone>> {
        let _guard = self
            .lock
            .try_lock_spinning(spinning)
            .await
            .ok_or(ProviderError::Busy)?;
        let zones = self.handler.get_zones().await?;
        self.zones.store(Arc::new(zones.clone()));
        Ok(zones)
    }
}

/// A zone and the handler serving it.
#[derive(Clone)]
pub struct ZoneEntry {
    pub zone: DnsHostedZone,
    pub handler: Arc<HandlerState>,
}

/// A token issued by `login`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenInfo {
    pub client_id: String,
    pub valid_until: DateTime<Utc>,
    /// Protocol version negotiated at login
    pub protocol_version: i32,
}

#[derive(Default)]
struct Inner {
    handlers: BTreeMap<String, Arc<HandlerState>>,
    tokens: HashMap<String, TokenInfo>,
}

/// State of one namespace.
pub struct NamespaceState {
    name: String,
    inner: Mutex<Inner>,
    zones: ArcSwap<HashMap<String, ZoneEntry>>,
}

impl NamespaceState {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inner: Mutex::new(Inner::default()),
            zones: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True if no provider is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().handlers.is_empty()
    }

    /// Registers or replaces the handler of provider `name`.
    ///
    /// The zones are listed once without lock. Returns true if the handler is
    /// new or its zones changed.
    pub async fn update_handler(&self, name: &str, handler: Arc<dyn DnsHandler>) -> bool {
        let zones = match handler.get_zones().await {
            Ok(zones) => zones,
            Err(err) => {
                warn!(namespace = %self.name, provider = name, "Listing zones failed: {err}");
                Vec::new()
            }
        };

        let mut inner = self.lock();
        let modified = match inner.handlers.get(name) {
            Some(old) => {
                let changed = !are_zones_equivalent(&old.cached_zones(), &zones);
                let state = HandlerState::new(name, handler, old.lock.clone(), zones);
                inner.handlers.insert(name.to_string(), Arc::new(state));
                changed
            }
            None => {
                let state = HandlerState::new(name, handler, HandlerLock::default(), zones);
                inner.handlers.insert(name.to_string(), Arc::new(state));
                true
            }
        };
        self.refresh_zones(&inner);
        modified
    }

    /// Unregisters provider `name`. Returns true if it was registered.
    pub fn remove_handler(&self, name: &str) -> bool {
        let mut inner = self.lock();
        let removed = inner.handlers.remove(name).is_some();
        if removed {
            self.refresh_zones(&inner);
        }
        removed
    }

    /// Rebuilds the zone index from the cached zones of all handlers.
    fn refresh_zones(&self, inner: &Inner) {
        let mut index = HashMap::new();
        for state in inner.handlers.values() {
            for zone in state.cached_zones().iter() {
                index.insert(
                    zone.id().to_string(),
                    ZoneEntry {
                        zone: zone.clone(),
                        handler: Arc::clone(state),
                    },
                );
            }
        }
        self.zones.store(Arc::new(index));
    }

    /// Issues a token for `client_id` valid for `ttl` from `now`.
    ///
    /// The token has the form `namespace|client|validUntil|serverID|random`.
    pub fn generate_and_add_token(
        &self,
        ttl: Duration,
        random: &str,
        client_id: &str,
        server_id: &str,
        protocol_version: i32,
        now: DateTime<Utc>,
    ) -> String {
        let valid_until = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let token = format!(
            "{}|{}|{}|{}|{}",
            self.name,
            client_id,
            valid_until.to_rfc3339_opts(SecondsFormat::Secs, true),
            server_id,
            random
        );
        self.lock().tokens.insert(
            token.clone(),
            TokenInfo {
                client_id: client_id.to_string(),
                valid_until,
                protocol_version,
            },
        );
        token
    }

    /// Looks up a token. Unknown and expired tokens are invalid; expired ones are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidToken`].
    pub fn get_token(&self, token: &str, now: DateTime<Utc>) -> Result<TokenInfo, RemoteError> {
        let mut inner = self.lock();
        match inner.tokens.get(token) {
            Some(info) if info.valid_until > now => Ok(info.clone()),
            Some(_) => {
                inner.tokens.remove(token);
                Err(self.invalid_token())
            }
            None => Err(self.invalid_token()),
        }
    }

    fn invalid_token(&self) -> RemoteError {
        RemoteError::InvalidToken {
            namespace: self.name.clone(),
        }
    }

    /// Drops tokens expired at `now` and returns how many were dropped.
    pub fn cleanup_tokens(&self, now: DateTime<Utc>) -> usize {
        let mut inner = self.lock();
        let before = inner.tokens.len();
        inner.tokens.retain(|_, info| info.valid_until > now);
        before - inner.tokens.len()
    }

    /// Lists the zones of all handlers, each under its own lock.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Busy`] if any handler stays locked, or the
    /// first listing error.
    pub async fn get_all_zones(&self, spinning: Duration) -> Result<Vec<DnsHostedZone>> {
        let handlers: Vec<Arc<HandlerState>> = self.lock().handlers.values().cloned().collect();
        let mut all = Vec::new();
        for state in handlers {
            all.extend(state.get_zones(spinning).await?);
        }
        self.refresh_zones(&self.lock());
        Ok(all)
    }

    /// Finds the handler serving a zone.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::ZoneNotFound`] if no handler serves the zone.
    pub fn lookup_zone(&self, zone_id: &str) -> Result<ZoneEntry> {
        self.zones
            .load()
            .get(zone_id)
            .cloned()
            .ok_or_else(|| {
                ProviderError::ZoneNotFound {
                    zone: zone_id.to_string(),
                }
                .into()
            })
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod state_tests;
