// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::dns::RoutingPolicy;
    use crate::provider::NoopMetrics;

    fn zone() -> DnsHostedZone {
        DnsHostedZone::new("mock-inmemory", "acc:example.com", "example.com", "", false)
    }

    fn a_set(values: &[&str]) -> RecordSet {
        RecordSet::from_values(RecordType::A, 300, values.iter().copied())
    }

    #[test]
    fn test_add_zone_once() {
        let mem = InMemory::new(false);
        assert!(mem.add_zone(zone()), "first add must succeed");
        assert!(!mem.add_zone(zone()), "second add of the same zone must be rejected");
        assert_eq!(mem.get_zones().len(), 1);
        assert!(mem.find_hosted_zone(&zone().zone_id).is_some());

        mem.delete_zone(&zone().zone_id);
        assert!(mem.get_zones().is_empty(), "zone must be gone after delete");
    }

    #[test]
    fn test_apply_create_update_delete() {
        let mem = InMemory::new(false);
        mem.add_zone(zone());
        let id = zone().zone_id;
        let name = DnsSetName::new("WWW.example.com.");

        mem.apply(&id, &name, RecordType::A, &ChangeRequestUpdate::create(a_set(&["1.1.1.1"])), &NoopMetrics)
            .unwrap();
        let stored = mem
            .get_record_set(&id, &DnsSetName::new("www.example.com"), RecordType::A)
            .unwrap();
        assert_eq!(stored.values(), vec!["1.1.1.1"], "name must be stored normalized");

        let update = ChangeRequestUpdate::update(a_set(&["1.1.1.1"]), a_set(&["2.2.2.2", "3.3.3.3"]));
        mem.apply(&id, &name, RecordType::A, &update, &NoopMetrics).unwrap();
        assert_eq!(mem.get_counts(&id), (1, 1));
        assert_eq!(
            mem.get_record_set(&id, &name, RecordType::A).unwrap().len(),
            2
        );

        mem.apply(&id, &name, RecordType::A, &ChangeRequestUpdate::delete(a_set(&["2.2.2.2", "3.3.3.3"])), &NoopMetrics)
            .unwrap();
        assert_eq!(mem.get_counts(&id), (0, 0), "deleting the last set drops the name");
    }

    #[test]
    fn test_apply_unknown_zone() {
        let mem = InMemory::new(false);
        let err = mem
            .apply(
                &zone().zone_id,
                &DnsSetName::new("a.example.com"),
                RecordType::A,
                &ChangeRequestUpdate::create(a_set(&["1.1.1.1"])),
                &NoopMetrics,
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "zone mock-inmemory:acc:example.com not hosted by mock provider");
    }

    #[test]
    fn test_routing_policy_support() {
        let id = zone().zone_id;
        let name = DnsSetName::with_set_identifier("a.example.com", "eu");
        let update = ChangeRequestUpdate::create(
            a_set(&["1.1.1.1"]).with_routing_policy(Some(RoutingPolicy::weighted(10))),
        );

        let plain = InMemory::new(false);
        plain.add_zone(zone());
        let err = plain
            .apply(&id, &name, RecordType::A, &update, &NoopMetrics)
            .unwrap_err();
        assert_eq!(err.to_string(), "in-memory provider does not support routing policies");

        let routing = InMemory::new(true);
        routing.add_zone(zone());
        routing.apply(&id, &name, RecordType::A, &update, &NoopMetrics).unwrap();
        let stored = routing.get_record_set(&id, &name, RecordType::A).unwrap();
        assert_eq!(stored.routing_policy, Some(RoutingPolicy::weighted(10)));
    }

    #[test]
    fn test_apply_fail_simulation() {
        let mem = InMemory::new(false);
        mem.add_zone(zone());
        let id = zone().zone_id;
        let name = DnsSetName::new("a.example.com");
        let update = ChangeRequestUpdate::create(a_set(&["1.1.1.1"]));
        let request = ChangeRequests::new(name.clone()).with_update(RecordType::A, update.clone());

        let sim = mem.add_apply_fail_simulation(&id, request);
        let err = mem.apply(&id, &name, RecordType::A, &update, &NoopMetrics).unwrap_err();
        assert_eq!(err.to_string(), "simulated failure");
        assert!(mem.apply(&id, &name, RecordType::A, &update, &NoopMetrics).is_err());
        assert_eq!(mem.get_apply_fail_simulation_count(&sim), 2);

        let other = ChangeRequestUpdate::create(a_set(&["9.9.9.9"]));
        mem.apply(&id, &name, RecordType::A, &other, &NoopMetrics)
            .expect("a different update must not match the simulation");

        assert!(mem.remove_apply_fail_simulation(&sim));
        assert!(!mem.remove_apply_fail_simulation(&sim), "second removal finds nothing");
        mem.apply(&id, &name, RecordType::A, &update, &NoopMetrics).unwrap();
    }

    #[test]
    fn test_full_dump() {
        let mem = InMemory::new(false);
        mem.add_zone(zone());
        mem.apply(
            &zone().zone_id,
            &DnsSetName::new("a.example.com"),
            RecordType::A,
            &ChangeRequestUpdate::create(a_set(&["1.1.1.1"])),
            &NoopMetrics,
        )
        .unwrap();
        let dump = mem.build_full_dump();
        assert!(dump.contains("mock-inmemory:acc:example.com"), "dump: {dump}");
        assert!(dump.contains("a.example.com"), "dump: {dump}");
        assert!(dump.contains("1.1.1.1"), "dump: {dump}");
    }

    #[test]
    fn test_accounts_registry() {
        let accounts = InMemoryAccounts::new();
        accounts.add("b", Arc::new(InMemory::new(false))).unwrap();
        accounts.add("a", Arc::new(InMemory::new(false))).unwrap();
        let err = accounts.add("a", Arc::new(InMemory::new(false))).unwrap_err();
        assert_eq!(err.to_string(), "mock for account a already exists");
        assert_eq!(accounts.names(), vec!["a", "b"], "names must be sorted");

        let by_zone = accounts.get_by_zone_id(&ZoneId::new("mock-inmemory", "a:example.com"));
        assert!(by_zone.is_some_and(|m| Arc::ptr_eq(&m, &accounts.get("a").unwrap())));

        accounts.delete("a");
        assert!(accounts.get("a").is_none());
    }
}
