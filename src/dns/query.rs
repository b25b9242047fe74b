// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Standard DNS queries.
//!
//! [`StandardQueryDns`] asks public (or configured) nameservers for the records of
//! a name. It is the default query path of every handler; backends with private
//! zones substitute their own [`QueryDns`] implementation.

use super::dnsset::DnsSetName;
use super::records::{Record, RecordSet, RecordType};
use super::{ensure_trailing_dot, normalize_domain_name};
use crate::constants::{DEFAULT_NAMESERVER, DNS_PORT, DNS_QUERY_TIMEOUT_SECS};
use crate::dns_errors::{DnsError, ProviderError};
use async_trait::async_trait;
use hickory_client::client::{Client, SyncClient};
use hickory_client::op::ResponseCode;
use hickory_client::rr::{DNSClass, Name, RData};
use hickory_client::tcp::TcpClientConnection;
use hickory_client::udp::UdpClientConnection;
use hickory_proto::xfer::DnsResponse;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::debug;

/// Result of a query: the record set (`None` if the name has no records) or an error.
pub type QueryDnsResult = Result<Option<RecordSet>, DnsError>;

/// Looks up the records of one name and type.
#[async_trait]
pub trait QueryDns: Send + Sync {
    async fn query(&self, set_name: &DnsSetName, record_type: RecordType) -> QueryDnsResult;
}

/// Builds the default query implementation on demand.
pub type QueryDnsFactory = Arc<dyn Fn() -> Arc<dyn QueryDns> + Send + Sync>;

/// Supplies the nameservers to query, as `host:port`.
pub trait NameserversProvider: Send + Sync {
    fn nameservers(&self) -> Vec<String>;
}

/// A fixed list of nameservers, usually from configuration.
#[derive(Clone, Debug)]
pub struct StaticNameservers {
    nameservers: Vec<String>,
}

impl StaticNameservers {
    #[must_use]
    pub fn new(nameservers: &[String]) -> Self {
        let nameservers = if nameservers.is_empty() {
            vec![DEFAULT_NAMESERVER.to_string()]
        } else {
            nameservers.iter().map(|ns| with_default_port(ns)).collect()
        };
        Self { nameservers }
    }
}

impl NameserversProvider for StaticNameservers {
    fn nameservers(&self) -> Vec<String> {
        self.nameservers.clone()
    }
}

/// Nameservers of `/etc/resolv.conf`, read once.
#[derive(Debug)]
pub struct SystemNameservers {
    path: PathBuf,
    defaults: Vec<String>,
    nameservers: OnceLock<Vec<String>>,
}

impl SystemNameservers {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, defaults: &[String]) -> Self {
        Self {
            path: path.into(),
            defaults: defaults.to_vec(),
            nameservers: OnceLock::new(),
        }
    }
}

impl NameserversProvider for SystemNameservers {
    fn nameservers(&self) -> Vec<String> {
        self.nameservers
            .get_or_init(|| {
                std::fs::read_to_string(&self.path)
                    .map(|text| parse_resolv_conf(&text))
                    .ok()
                    .filter(|servers| !servers.is_empty())
                    .unwrap_or_else(|| self.defaults.clone())
            })
            .clone()
    }
}

/// Extracts `nameserver` entries of a resolv.conf file.
#[must_use]
pub fn parse_resolv_conf(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some("nameserver"), Some(server)) => Some(with_default_port(server)),
                _ => None,
            }
        })
        .collect()
}

/// Appends port 53 to a host without port. IPv6 literals are bracketed.
#[must_use]
pub fn with_default_port(server: &str) -> String {
    if server.parse::<SocketAddr>().is_ok() {
        return server.to_string();
    }
    if server.parse::<std::net::Ipv6Addr>().is_ok() {
        return format!("[{server}]:{DNS_PORT}");
    }
    if server.rsplit_once(':').is_some_and(|(_, port)| port.parse::<u16>().is_ok()) {
        return server.to_string();
    }
    format!("{server}:{DNS_PORT}")
}

/// Queries nameservers over UDP, falling back to TCP on failure or truncation.
pub struct StandardQueryDns {
    nameservers: Arc<dyn NameserversProvider>,
    timeout: Duration,
}

impl StandardQueryDns {
    pub fn new(nameservers: Arc<dyn NameserversProvider>) -> Self {
        Self::with_timeout(nameservers, Duration::from_secs(DNS_QUERY_TIMEOUT_SECS))
    }

    pub fn with_timeout(nameservers: Arc<dyn NameserversProvider>, timeout: Duration) -> Self {
        Self {
            nameservers,
            timeout,
        }
    }

    /// Factory producing standard queries against the given nameservers.
    #[must_use]
    pub fn factory(nameservers: Arc<dyn NameserversProvider>) -> QueryDnsFactory {
        Arc::new(move || Arc::new(StandardQueryDns::new(nameservers.clone())) as Arc<dyn QueryDns>)
    }
}

fn query_error(set_name: &DnsSetName, record_type: RecordType, reason: impl ToString) -> DnsError {
    ProviderError::Query {
        name: set_name.dns_name.clone(),
        record_type: record_type.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

fn hickory_type(record_type: RecordType) -> Option<hickory_client::rr::RecordType> {
    use hickory_client::rr::RecordType as H;
    match record_type {
        RecordType::A => Some(H::A),
        RecordType::Aaaa => Some(H::AAAA),
        RecordType::Ns => Some(H::NS),
        RecordType::Cname => Some(H::CNAME),
        RecordType::Txt => Some(H::TXT),
        RecordType::AliasA | RecordType::AliasAaaa => None,
    }
}

/// Sends one query to one nameserver, retrying over TCP if UDP fails or truncates.
fn exchange(
    server: SocketAddr,
    fqdn: &Name,
    rtype: hickory_client::rr::RecordType,
    timeout: Duration,
) -> Result<DnsResponse, String> {
    let udp = UdpClientConnection::with_timeout(server, timeout)
        .map_err(|e| e.to_string())
        .and_then(|conn| {
            SyncClient::new(conn)
                .query(fqdn, DNSClass::IN, rtype)
                .map_err(|e| e.to_string())
        });
    match udp {
        Ok(response) if !response.truncated() => Ok(response),
        udp_result => {
            debug!(nameserver = %server, "retrying DNS query for {} over TCP", fqdn);
            let tcp = TcpClientConnection::with_timeout(server, timeout)
                .map_err(|e| e.to_string())
                .and_then(|conn| {
                    SyncClient::new(conn)
                        .query(fqdn, DNSClass::IN, rtype)
                        .map_err(|e| e.to_string())
                });
            match (udp_result, tcp) {
                (_, Ok(response)) => Ok(response),
                (Ok(_), Err(tcp_err)) => Err(tcp_err),
                (Err(udp_err), Err(tcp_err)) => Err(format!(
                    "DNS lookup: udp failed with {udp_err}, tcp failed with {tcp_err}"
                )),
            }
        }
    }
}

/// Converts the answers of a response into a record set with the minimum TTL.
fn records_from_response(
    response: &DnsResponse,
    record_type: RecordType,
) -> Result<RecordSet, String> {
    let mut rs = RecordSet::new(record_type, 0, Vec::new());
    for answer in response.answers() {
        let ttl = i64::from(answer.ttl());
        let values: Vec<String> = match (record_type, answer.data()) {
            (RecordType::A, Some(RData::A(ip))) => vec![ip.to_string()],
            (RecordType::Aaaa, Some(RData::AAAA(ip))) => vec![ip.to_string()],
            (RecordType::Ns, Some(RData::NS(ns))) => vec![ns.to_string()],
            (RecordType::Cname, Some(RData::CNAME(target))) => {
                vec![normalize_domain_name(&target.to_string())]
            }
            (RecordType::Txt, Some(RData::TXT(txt))) => txt
                .txt_data()
                .iter()
                .map(|data| String::from_utf8_lossy(data).into_owned())
                .collect(),
            (_, other) => {
                return Err(format!(
                    "unexpected record {:?} in answer for {record_type}",
                    other.map(RData::record_type)
                ))
            }
        };
        for value in values {
            if rs.records.is_empty() || ttl < rs.ttl {
                rs.ttl = ttl;
            }
            rs.add(Record::new(value));
        }
    }
    Ok(rs)
}

#[async_trait]
impl QueryDns for StandardQueryDns {
    async fn query(&self, set_name: &DnsSetName, record_type: RecordType) -> QueryDnsResult {
        if set_name.has_set_identifier() {
            return Err(query_error(
                set_name,
                record_type,
                "set identifier is not supported for DNS queries",
            ));
        }
        let Some(rtype) = hickory_type(record_type) else {
            return Err(query_error(set_name, record_type, "unsupported record type"));
        };
        let fqdn = Name::from_str(&ensure_trailing_dot(&set_name.dns_name))
            .map_err(|e| query_error(set_name, record_type, e))?;
        let nameservers = self.nameservers.nameservers();
        let timeout = self.timeout;

        let response = tokio::task::spawn_blocking(move || {
            let mut last: Result<DnsResponse, String> = Err("no nameservers configured".into());
            for ns in nameservers {
                let server = match ns.parse::<SocketAddr>() {
                    Ok(server) => server,
                    Err(e) => {
                        last = Err(format!("invalid nameserver {ns}: {e}"));
                        continue;
                    }
                };
                last = exchange(server, &fqdn, rtype, timeout);
                if matches!(&last, Ok(response) if response.response_code() == ResponseCode::NoError)
                {
                    break;
                }
            }
            last
        })
        .await
        .map_err(|e| query_error(set_name, record_type, e))?
        .map_err(|e| query_error(set_name, record_type, e))?;

        match response.response_code() {
            ResponseCode::NoError => {}
            ResponseCode::NXDomain => return Ok(None),
            code => {
                return Err(query_error(
                    set_name,
                    record_type,
                    format!("DNS lookup failed with rcode {code:?}"),
                ))
            }
        }
        let rs = records_from_response(&response, record_type)
            .map_err(|e| query_error(set_name, record_type, e))?;
        Ok((!rs.is_empty()).then_some(rs))
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod query_tests;
