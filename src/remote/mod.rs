// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Remote provider protocol.
//!
//! A DNS manager with direct access to a backend can expose its providers to
//! managers in other trust domains. The [`server`] serves the providers of a
//! namespace over gRPC with mutual TLS; the [`client`] is a [`DnsHandler`]
//! speaking that protocol, so a remote provider plugs into accounts and
//! caches like any other backend.
//!
//! [`DnsHandler`]: crate::provider::DnsHandler

pub mod client;
pub mod conversion;
pub mod proto;
pub mod server;
