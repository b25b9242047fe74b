// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_canonical_hosted_zone() {
        assert_eq!(
            canonical_hosted_zone("my-lb-1234.us-east-1.elb.amazonaws.com"),
            Some("Z35SXDOTRQ7X7K")
        );
        assert_eq!(
            canonical_hosted_zone("net-lb-abc.elb.eu-central-1.amazonaws.com."),
            Some("Z3F0SRJ5LGBH90")
        );
        assert_eq!(canonical_hosted_zone("d111111abcdef8.CloudFront.net"), Some("Z2FDTNDATAQYW2"));
        assert_eq!(canonical_hosted_zone("www.example.com"), None);
        assert_eq!(canonical_hosted_zone("fakecloudfront.net"), None, "suffix must match a whole label");
    }

    #[test]
    fn test_alias_target_mapper() {
        let lb = "my-lb.eu-west-1.elb.amazonaws.com";
        let targets = vec![
            Target::new(RecordType::Cname, lb, 120),
            Target::new(RecordType::Cname, "other.example.org", 120),
            Target::new(RecordType::A, "1.2.3.4", 120),
        ];
        let mapped = alias_target_mapper("www.example.com", targets);
        assert_eq!(mapped.len(), 3);
        assert_eq!(mapped[0].record_type, RecordType::AliasA);
        assert_eq!(mapped[0].value, lb);
        assert_eq!(mapped[1].record_type, RecordType::Cname, "non AWS targets are kept");
        assert_eq!(mapped[2].record_type, RecordType::A);

        let dual = alias_target_mapper(
            "www.example.com",
            vec![Target::new(RecordType::Cname, lb, 120).with_ip_stack("dual-stack")],
        );
        let types: Vec<RecordType> = dual.iter().map(|t| t.record_type).collect();
        assert_eq!(types, vec![RecordType::AliasA, RecordType::AliasAaaa]);

        let v6 = alias_target_mapper(
            "www.example.com",
            vec![Target::new(RecordType::Cname, lb, 120).with_ip_stack("ipv6")],
        );
        assert_eq!(v6[0].record_type, RecordType::AliasAaaa);
    }

    #[test]
    fn test_record_set_from_alias_target() {
        let rrs = ResourceRecordSet {
            name: "apex.example.com.".to_string(),
            record_type: "AAAA".to_string(),
            alias_target: Some(AliasTarget {
                dns_name: "My-LB.eu-west-1.elb.amazonaws.com.".to_string(),
                hosted_zone_id: "Z32O12XQLNTSW2".to_string(),
                evaluate_target_health: true,
            }),
            ..ResourceRecordSet::default()
        };
        let rs = record_set_from_alias_target(&rrs).expect("alias record set");
        assert_eq!(rs.record_type, RecordType::AliasAaaa);
        assert!(rs.ignore_ttl);
        assert_eq!(rs.values(), vec!["my-lb.eu-west-1.elb.amazonaws.com"]);

        let plain = ResourceRecordSet {
            record_type: "A".to_string(),
            values: vec!["1.2.3.4".to_string()],
            ..ResourceRecordSet::default()
        };
        assert!(record_set_from_alias_target(&plain).is_none());
    }
}
