// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS domain model.
//!
//! Value types shared by every provider backend:
//!
//! - [`records`] - record types, records, record sets and routing policies
//! - [`dnsset`] - record sets grouped by DNS name and set identifier
//! - [`zone`] - hosted zones exposed by a backend
//! - [`query`] - standard DNS queries against public nameservers
//! - [`cache`] - TTL cache for query results
//!
//! The free functions in this module normalize names and TXT values.

pub mod cache;
pub mod dnsset;
pub mod query;
pub mod records;
pub mod zone;

pub use dnsset::{DnsSet, DnsSetName, DnsSets};
pub use records::{Record, RecordSet, RecordType, RoutingPolicy, RoutingPolicyType, Target};
pub use zone::{are_zones_equivalent, DnsHostedZone, ZoneId};

/// Escaped form of a leading wildcard label as returned by some APIs
const ESCAPED_WILDCARD: &str = "\\052";

/// Normalizes a domain name: lower case, no trailing dot, unescaped wildcard.
///
/// # Example
///
/// ```
/// use dnsman::dns::normalize_domain_name;
///
/// assert_eq!(normalize_domain_name("\\052.Example.COM."), "*.example.com");
/// ```
#[must_use]
pub fn normalize_domain_name(name: &str) -> String {
    let name = name.strip_suffix('.').unwrap_or(name);
    let name = match name.strip_prefix(ESCAPED_WILDCARD) {
        Some(rest) => format!("*{rest}"),
        None => name.to_string(),
    };
    name.to_lowercase()
}

/// Appends a trailing dot unless one is present.
#[must_use]
pub fn ensure_trailing_dot(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}

/// Returns true if `name` equals `domain` or is a subdomain of it.
///
/// Both arguments are expected to be normalized.
#[must_use]
pub fn is_sub_domain(name: &str, domain: &str) -> bool {
    name == domain || name.ends_with(&format!(".{domain}"))
}

/// Quotes a TXT value with Go-style escaping.
#[must_use]
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Reverses [`quote`]. Returns `None` if `value` is not a valid quoted string.
#[must_use]
pub fn unquote(value: &str) -> Option<String> {
    let inner = value.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return None,
            '\\' => match chars.next()? {
                '"' => out.push('"'),
                '\\' => out.push('\\'),
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                't' => out.push('\t'),
                '\'' => out.push('\''),
                'x' => {
                    let hex: String = chars.by_ref().take(2).collect();
                    let code = u32::from_str_radix(&hex, 16).ok()?;
                    out.push(char::from_u32(code)?);
                }
                'u' => {
                    let hex: String = chars.by_ref().take(4).collect();
                    let code = u32::from_str_radix(&hex, 16).ok()?;
                    out.push(char::from_u32(code)?);
                }
                _ => return None,
            },
            c => out.push(c),
        }
    }
    Some(out)
}

/// Unquotes a TXT value if it is quoted, otherwise returns it unchanged.
#[must_use]
pub fn unquote_lenient(value: &str) -> String {
    unquote(value).unwrap_or_else(|| value.to_string())
}

/// Clamps a TTL into the `u32` range used on the wire by most DNS APIs.
#[must_use]
pub fn ttl_to_u32(ttl: i64) -> u32 {
    u32::try_from(ttl.max(0)).unwrap_or(u32::MAX)
}

/// Clamps a TTL into the `i32` range.
#[must_use]
pub fn ttl_to_i32(ttl: i64) -> i32 {
    i32::try_from(ttl.max(0)).unwrap_or(i32::MAX)
}
