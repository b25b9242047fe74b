// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::constants::PROTOCOL_VERSION_0;
    use crate::dns_errors::DnsError;

    fn sample_sets() -> DnsSets {
        let mut sets = DnsSets::new();
        sets.add_record_set(
            &DnsSetName::new("www.example.com"),
            RecordSet::from_values(RecordType::A, 300, ["1.1.1.1"]),
        );
        sets.add_record_set(
            &DnsSetName::new("www.example.com"),
            RecordSet::from_values(RecordType::Txt, 60, ["hello"]),
        );
        sets.add_record_set(
            &DnsSetName::with_set_identifier("lb.example.com", "eu"),
            RecordSet::from_values(RecordType::A, 120, ["2.2.2.2"])
                .with_routing_policy(Some(RoutingPolicy::weighted(10))),
        );
        sets
    }

    #[test]
    fn test_version_0_excludes_set_identifiers() {
        let remote = marshal_dns_sets(&sample_sets(), PROTOCOL_VERSION_0);
        assert_eq!(remote.len(), 1, "only the plain name may be sent to version 0 peers");
        assert!(remote.contains_key("www.example.com"));
        assert!(remote.values().all(|s| s.set_identifier.is_empty()));
    }

    #[test]
    fn test_version_1_includes_all_and_round_trips() {
        let sets = sample_sets();
        let remote = marshal_dns_sets(&sets, PROTOCOL_VERSION_1);
        assert_eq!(remote.len(), 2);
        let lb = &remote["lb.example.com#eu"];
        assert_eq!(lb.set_identifier, "eu");
        let policy = lb.records["A"].routing_policy.as_ref().expect("policy must be sent");
        assert_eq!(policy.r#type, "weighted");
        assert_eq!(policy.parameters["weight"], "10");

        let back = unmarshal_dns_sets(remote).unwrap();
        assert_eq!(back, sets, "version 1 round trip must reproduce the zone state");
    }

    #[test]
    fn test_marshal_record_set_clamps_ttl() {
        let rs = RecordSet::from_values(RecordType::A, i64::from(i32::MAX) + 10, ["1.1.1.1"]);
        assert_eq!(marshal_record_set(&rs, PROTOCOL_VERSION_1).ttl, i32::MAX);
    }

    #[test]
    fn test_unknown_record_type_rejected() {
        let rs = proto::RecordSet {
            r#type: "MX".into(),
            ..proto::RecordSet::default()
        };
        let err = unmarshal_record_set(rs).unwrap_err();
        assert!(err.to_string().contains("unknown record type"), "got {err}");
    }

    #[test]
    fn test_change_request_actions() {
        let name = DnsSetName::new("www.example.com");
        let old = RecordSet::from_values(RecordType::A, 300, ["1.1.1.1"]);
        let new = RecordSet::from_values(RecordType::A, 300, ["2.2.2.2"]);

        let create = marshal_change_request(
            &name,
            "",
            RecordType::A,
            &ChangeRequestUpdate::create(new.clone()),
            PROTOCOL_VERSION_1,
        )
        .unwrap();
        assert_eq!(create.action, proto::ChangeAction::Create as i32);

        let update = marshal_change_request(
            &name,
            "g1",
            RecordType::A,
            &ChangeRequestUpdate::update(old.clone(), new.clone()),
            PROTOCOL_VERSION_1,
        )
        .unwrap();
        assert_eq!(update.action, proto::ChangeAction::Update as i32);
        let change = update.change.as_ref().unwrap();
        assert_eq!(change.update_group, "g1");
        assert_eq!(change.record_set.as_ref().unwrap().record[0].value, "2.2.2.2");

        let delete = marshal_change_request(
            &name,
            "",
            RecordType::A,
            &ChangeRequestUpdate::delete(old.clone()),
            PROTOCOL_VERSION_1,
        )
        .unwrap();
        assert_eq!(delete.action, proto::ChangeAction::Delete as i32);
        assert_eq!(
            delete.change.unwrap().record_set.unwrap().record[0].value,
            "1.1.1.1",
            "deletions carry the old record set"
        );
    }

    #[test]
    fn test_version_0_rejects_routing_policy_changes() {
        let name = DnsSetName::with_set_identifier("lb.example.com", "eu");
        let rs = RecordSet::from_values(RecordType::A, 300, ["1.1.1.1"]);
        let err = marshal_change_request(
            &name,
            "",
            RecordType::A,
            &ChangeRequestUpdate::create(rs),
            PROTOCOL_VERSION_0,
        )
        .unwrap_err();
        assert_eq!(err, DnsError::Provider(ProviderError::RoutingPolicyNotSupported));
    }

    #[test]
    fn test_unmarshal_update_takes_old_from_state() {
        let state = sample_sets();
        let new = RecordSet::from_values(RecordType::A, 300, ["9.9.9.9"]);
        let remote = marshal_change_request(
            &DnsSetName::new("www.example.com"),
            "",
            RecordType::A,
            &ChangeRequestUpdate::update(RecordSet::from_values(RecordType::A, 1, ["x"]), new.clone()),
            PROTOCOL_VERSION_1,
        )
        .unwrap();

        let (name, record_type, update) = unmarshal_change_request(remote.clone(), Some(&state)).unwrap();
        assert_eq!(name, DnsSetName::new("www.example.com"));
        assert_eq!(record_type, RecordType::A);
        assert_eq!(update.old.unwrap().values(), vec!["1.1.1.1"], "old comes from the zone state");
        assert_eq!(update.new, Some(new));

        let (_, _, update) = unmarshal_change_request(remote, None).unwrap();
        assert!(update.old.is_none(), "unknown names are created");
    }

    #[test]
    fn test_unmarshal_invalid_action() {
        let remote = proto::ChangeRequest {
            action: 7,
            change: None,
        };
        let err = unmarshal_change_request(remote, None).unwrap_err();
        assert_eq!(err.to_string(), "invalid wire message: invalid action: 7");
    }
}
