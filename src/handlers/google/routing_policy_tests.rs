// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::handlers::google::fake::FakeCloudDns;

    const ZONE: &str = "zone1";

    fn plain(name: &str, record_type: &str, rrdatas: &[&str]) -> ResourceRecordSet {
        ResourceRecordSet {
            name: name.to_string(),
            record_type: record_type.to_string(),
            ttl: 300,
            rrdatas: rrdatas.iter().map(ToString::to_string).collect(),
            routing_policy: None,
        }
    }

    fn weighted(name: &str, record_type: &str, index: usize, weight: i64, rrdatas: &[&str]) -> ResourceRecordSet {
        map_policy_record_set(
            plain(name, record_type, rrdatas),
            Some(&PolicyData::Weighted { index, weight }),
        )
    }

    fn item(rrdatas: &[&str], weight: f64) -> WrrItem {
        WrrItem {
            rrdatas: rrdatas.iter().map(ToString::to_string).collect(),
            weight,
        }
    }

    fn wrr_items(rrs: &ResourceRecordSet) -> Vec<WrrItem> {
        match &rrs.routing_policy {
            Some(RrSetRoutingPolicy::Wrr(items)) => items.clone(),
            other => panic!("expected weighted policy, got {other:?}"),
        }
    }

    fn stored(items: Vec<WrrItem>, name: &str, record_type: &str) -> ResourceRecordSet {
        ResourceRecordSet {
            name: name.to_string(),
            record_type: record_type.to_string(),
            ttl: 300,
            rrdatas: Vec::new(),
            routing_policy: Some(RrSetRoutingPolicy::Wrr(items)),
        }
    }

    #[test]
    fn test_extract_routing_policy() {
        let name = DnsSetName::with_set_identifier("w.example.org", "2");
        assert_eq!(
            extract_routing_policy(&name, Some(&RoutingPolicy::weighted(3))).unwrap(),
            Some(PolicyData::Weighted { index: 2, weight: 3 })
        );
        assert_eq!(extract_routing_policy(&DnsSetName::new("w.example.org"), None).unwrap(), None);

        let err = extract_routing_policy(
            &DnsSetName::with_set_identifier("w.example.org", "5"),
            Some(&RoutingPolicy::weighted(1)),
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be a number >= 0 and <= 4"), "got {err}");

        let missing_weight = RoutingPolicy::new(RoutingPolicyType::Weighted, []);
        let err = extract_routing_policy(&name, Some(&missing_weight)).unwrap_err();
        assert!(err.to_string().contains("missing parameter weight"), "got {err}");

        let negative = RoutingPolicy::new(RoutingPolicyType::Weighted, [("weight", "-2")]);
        assert!(extract_routing_policy(&name, Some(&negative)).is_err());

        assert!(
            extract_routing_policy(&DnsSetName::new("w.example.org"), Some(&RoutingPolicy::weighted(1))).is_err(),
            "policy without set identifier"
        );

        let geo = DnsSetName::with_set_identifier("g.example.org", "europe-west1");
        assert_eq!(
            extract_routing_policy(&geo, Some(&RoutingPolicy::geolocation("europe-west1"))).unwrap(),
            Some(PolicyData::Geo {
                location: "europe-west1".to_string()
            })
        );
    }

    #[test]
    fn test_map_policy_record_set_pads_with_placeholders() {
        let rrs = weighted("w.example.org.", "A", 2, 5, &["1.2.3.4"]);
        assert!(rrs.rrdatas.is_empty(), "values move into the item");
        let items = wrr_items(&rrs);
        assert_eq!(items.len(), 3);
        assert!(is_placeholder_item("A", &items[0]));
        assert!(is_placeholder_item("A", &items[1]));
        assert_eq!(items[2], item(&["1.2.3.4"], 5.0));
        assert_eq!(describe_routing_policy(&rrs), "[2]5.0:1.2.3.4;");
    }

    #[test]
    fn test_rr_default_value() {
        assert_eq!(rr_default_value("A"), "233.252.0.1");
        assert_eq!(rr_default_value("AAAA"), "2001:db8::1");
        assert_eq!(rr_default_value("CNAME"), "dummy.dummy.dummy.com.");
        assert_eq!(rr_default_value("TXT"), "\"__dummy__\"");
        assert_eq!(rr_default_value("MX"), "MX?");
    }

    #[tokio::test]
    async fn test_merge_replaces_only_the_changed_slot() {
        let api = FakeCloudDns::new("proj");
        let old = stored(
            vec![
                item(&["some-other.example.org."], 1.0),
                placeholder_item("CNAME"),
                item(&["some.example.org."], 1.0),
            ],
            "w2.example.org.",
            "CNAME",
        );
        api.put(ZONE, old.clone());

        let mut changes = RoutingPolicyChanges::default();
        changes
            .add_change(&weighted("w2.example.org.", "CNAME", 1, 2, &["new.example.org."]), true)
            .unwrap();
        let (deletions, additions) = changes.calc_deletions_and_additions(&api, "proj", ZONE).await.unwrap();

        assert_eq!(deletions, vec![old], "the whole old record set is deleted");
        assert_eq!(additions.len(), 1);
        assert_eq!(
            wrr_items(&additions[0]),
            vec![
                item(&["some-other.example.org."], 1.0),
                item(&["new.example.org."], 2.0),
                item(&["some.example.org."], 1.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_merge_trims_deleted_tail() {
        let api = FakeCloudDns::new("proj");
        api.put(
            ZONE,
            stored(
                vec![item(&["4.4.4.4"], 4.0), placeholder_item("A"), item(&["5.5.5.5"], 5.0)],
                "w1.example.org.",
                "A",
            ),
        );

        let mut changes = RoutingPolicyChanges::default();
        changes
            .add_change(&weighted("w1.example.org.", "A", 2, 5, &["5.5.5.5"]), false)
            .unwrap();
        let (_, additions) = changes.calc_deletions_and_additions(&api, "proj", ZONE).await.unwrap();
        assert_eq!(
            wrr_items(&additions[0]),
            vec![item(&["4.4.4.4"], 4.0)],
            "deleted last slot and the placeholder before it are trimmed"
        );
    }

    #[tokio::test]
    async fn test_merge_keeps_index_alignment_on_inner_deletion() {
        let api = FakeCloudDns::new("proj");
        api.put(
            ZONE,
            stored(vec![item(&["4.4.4.4"], 4.0), item(&["5.5.5.5"], 5.0)], "w1.example.org.", "A"),
        );

        let mut changes = RoutingPolicyChanges::default();
        changes
            .add_change(&weighted("w1.example.org.", "A", 0, 4, &["4.4.4.4"]), false)
            .unwrap();
        let (_, additions) = changes.calc_deletions_and_additions(&api, "proj", ZONE).await.unwrap();
        let items = wrr_items(&additions[0]);
        assert_eq!(items.len(), 2);
        assert!(is_placeholder_item("A", &items[0]), "deleted inner slot becomes a placeholder");
        assert_eq!(items[1], item(&["5.5.5.5"], 5.0));
    }

    #[tokio::test]
    async fn test_merge_deleting_last_variant_adds_nothing() {
        let api = FakeCloudDns::new("proj");
        api.put(ZONE, stored(vec![item(&["\"bla\""], 1.0)], "w3.example.org.", "TXT"));

        let mut changes = RoutingPolicyChanges::default();
        changes
            .add_change(&weighted("w3.example.org.", "TXT", 0, 1, &["\"bla\""]), false)
            .unwrap();
        let (deletions, additions) = changes.calc_deletions_and_additions(&api, "proj", ZONE).await.unwrap();
        assert_eq!(deletions.len(), 1);
        assert!(additions.is_empty());
    }

    #[tokio::test]
    async fn test_merge_without_current_record_set() {
        let api = FakeCloudDns::new("proj");
        let mut changes = RoutingPolicyChanges::default();
        changes
            .add_change(&weighted("w4.example.org.", "AAAA", 2, 1, &["cef::1"]), true)
            .unwrap();
        let (deletions, additions) = changes.calc_deletions_and_additions(&api, "proj", ZONE).await.unwrap();
        assert!(deletions.is_empty(), "404 means nothing to delete");
        let items = wrr_items(&additions[0]);
        assert_eq!(items.len(), 3);
        assert!(is_placeholder_item("AAAA", &items[0]));
        assert!(is_placeholder_item("AAAA", &items[1]));
        assert_eq!(items[2], item(&["cef::1"], 1.0));
    }

    #[tokio::test]
    async fn test_merge_geolocation_by_location() {
        let api = FakeCloudDns::new("proj");
        api.put(
            ZONE,
            ResourceRecordSet {
                name: "g.example.org.".to_string(),
                record_type: "A".to_string(),
                ttl: 300,
                rrdatas: Vec::new(),
                routing_policy: Some(RrSetRoutingPolicy::Geo(vec![GeoItem {
                    location: "europe-west1".to_string(),
                    rrdatas: vec!["1.1.1.1".to_string()],
                }])),
            },
        );

        let geo = |location: &str, value: &str| {
            map_policy_record_set(
                plain("g.example.org.", "A", &[value]),
                Some(&PolicyData::Geo {
                    location: location.to_string(),
                }),
            )
        };
        let mut changes = RoutingPolicyChanges::default();
        changes.add_change(&geo("us-east1", "2.2.2.2"), true).unwrap();
        changes.add_change(&geo("europe-west1", "3.3.3.3"), true).unwrap();
        let (_, additions) = changes.calc_deletions_and_additions(&api, "proj", ZONE).await.unwrap();
        let Some(RrSetRoutingPolicy::Geo(items)) = &additions[0].routing_policy else {
            panic!("expected geolocation policy");
        };
        let locations: Vec<(&str, &str)> = items
            .iter()
            .map(|i| (i.location.as_str(), i.rrdatas[0].as_str()))
            .collect();
        assert_eq!(locations, vec![("us-east1", "2.2.2.2"), ("europe-west1", "3.3.3.3")]);
    }

    #[test]
    fn test_mixed_policies_are_rejected() {
        let mut changes = RoutingPolicyChanges::default();
        changes
            .add_change(&weighted("m.example.org.", "A", 0, 1, &["1.1.1.1"]), true)
            .unwrap();
        let geo = map_policy_record_set(
            plain("m.example.org.", "A", &["2.2.2.2"]),
            Some(&PolicyData::Geo {
                location: "us-east1".to_string(),
            }),
        );
        assert!(changes.add_change(&geo, true).is_err());
    }
}
