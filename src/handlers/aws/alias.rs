// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Alias targets for AWS load balancers and CloudFront distributions.
//!
//! A CNAME to a hostname served from one of the canonical hosted zones below
//! is turned into an alias record, which may also live at a zone apex.

use super::api::{AliasTarget, ResourceRecordSet};
use crate::dns::{normalize_domain_name, Record, RecordSet, RecordType, Target};

/// Hostname suffix to canonical hosted zone id.
const CANONICAL_HOSTED_ZONES: &[(&str, &str)] = &[
    // classic and application load balancers
    ("us-east-1.elb.amazonaws.com", "Z35SXDOTRQ7X7K"),
    ("us-east-2.elb.amazonaws.com", "Z3AADJGX6KTTL2"),
    ("us-west-1.elb.amazonaws.com", "Z368ELLRRE2KJ0"),
    ("us-west-2.elb.amazonaws.com", "Z1H1FL5HABSF5"),
    ("ca-central-1.elb.amazonaws.com", "ZQSVJUPU6J1EY"),
    ("eu-west-1.elb.amazonaws.com", "Z32O12XQLNTSW2"),
    ("eu-west-2.elb.amazonaws.com", "ZHURV8PSTC4K8"),
    ("eu-west-3.elb.amazonaws.com", "Z3Q77PNBQS71R4"),
    ("eu-central-1.elb.amazonaws.com", "Z215JYRZR1TBD5"),
    ("eu-north-1.elb.amazonaws.com", "Z23TAZ7KCYCW6U"),
    ("ap-south-1.elb.amazonaws.com", "ZP97RAFLXTNZK"),
    ("ap-southeast-1.elb.amazonaws.com", "Z1LMS91P8CMLE5"),
    ("ap-southeast-2.elb.amazonaws.com", "Z1GM3OXH4ZPM65"),
    ("ap-northeast-1.elb.amazonaws.com", "Z14GRHDCWA56QT"),
    ("ap-northeast-2.elb.amazonaws.com", "ZWKZPGTI48KDX"),
    ("sa-east-1.elb.amazonaws.com", "Z2P70J7HTTTPLU"),
    // network load balancers
    ("elb.us-east-1.amazonaws.com", "Z26RNL4JYFTOTI"),
    ("elb.us-east-2.amazonaws.com", "ZLMOA37VPKANP"),
    ("elb.us-west-1.amazonaws.com", "Z24FKFUX50B4VW"),
    ("elb.us-west-2.amazonaws.com", "Z18D5FSROUN65G"),
    ("elb.eu-west-1.amazonaws.com", "Z2IFOLAFXWLO4F"),
    ("elb.eu-central-1.amazonaws.com", "Z3F0SRJ5LGBH90"),
    ("elb.ap-southeast-1.amazonaws.com", "ZKVM4W9LS7TM"),
    ("elb.ap-northeast-1.amazonaws.com", "Z31USIVHYNEOWT"),
    // CloudFront
    ("cloudfront.net", "Z2FDTNDATAQYW2"),
];

/// Canonical hosted zone serving `hostname`, if any.
///
/// The longest matching suffix wins.
#[must_use]
pub fn canonical_hosted_zone(hostname: &str) -> Option<&'static str> {
    let hostname = normalize_domain_name(hostname);
    CANONICAL_HOSTED_ZONES
        .iter()
        .filter(|(suffix, _)| {
            hostname == *suffix || hostname.ends_with(&format!(".{suffix}"))
        })
        .max_by_key(|(suffix, _)| suffix.len())
        .map(|(_, zone)| *zone)
}

/// Rewrites CNAME targets pointing at AWS load balancers into alias targets.
///
/// The IP stack annotation selects the alias types: `ipv6` yields only an
/// AAAA alias, `dual-stack` both, anything else an A alias.
#[must_use]
pub fn alias_target_mapper(_dns_name: &str, targets: Vec<Target>) -> Vec<Target> {
    let mut mapped = Vec::with_capacity(targets.len());
    for target in targets {
        if target.record_type != RecordType::Cname || canonical_hosted_zone(&target.value).is_none() {
            mapped.push(target);
            continue;
        }
        let value = normalize_domain_name(&target.value);
        let types: &[RecordType] = match target.ip_stack.as_str() {
            "ipv6" => &[RecordType::AliasAaaa],
            "dual-stack" => &[RecordType::AliasA, RecordType::AliasAaaa],
            _ => &[RecordType::AliasA],
        };
        for record_type in types {
            mapped.push(
                Target::new(*record_type, value.clone(), target.ttl).with_ip_stack(&target.ip_stack),
            );
        }
    }
    mapped
}

/// Alias target of an alias record set.
///
/// Returns `None` if the record set is no alias or its target is not served
/// by a canonical hosted zone.
#[must_use]
pub fn alias_target_for(rs: &RecordSet) -> Option<AliasTarget> {
    if !rs.record_type.is_alias() {
        return None;
    }
    let target = normalize_domain_name(&rs.records.first()?.value);
    let hosted_zone_id = canonical_hosted_zone(&target)?;
    Some(AliasTarget {
        dns_name: target,
        hosted_zone_id: hosted_zone_id.to_string(),
        evaluate_target_health: true,
    })
}

/// Record set of an alias resource record set, `None` for plain ones.
///
/// Alias records have no settable TTL.
#[must_use]
pub fn record_set_from_alias_target(rrs: &ResourceRecordSet) -> Option<RecordSet> {
    let alias = rrs.alias_target.as_ref()?;
    let record_type = match rrs.record_type.as_str() {
        super::api::RR_TYPE_A => RecordType::AliasA,
        super::api::RR_TYPE_AAAA => RecordType::AliasAaaa,
        _ => return None,
    };
    let mut rs = RecordSet::new(
        record_type,
        0,
        vec![Record::new(normalize_domain_name(&alias.dns_name))],
    );
    rs.ignore_ttl = true;
    Some(rs)
}

#[cfg(test)]
#[path = "alias_tests.rs"]
mod alias_tests;
