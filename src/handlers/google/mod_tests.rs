// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::{AdvancedOptions, DnsManagerConfiguration};
    use crate::dns_errors::DnsError;
    use crate::handlers::google::api::WrrItem;
    use crate::handlers::google::fake::FakeCloudDns;
    use crate::provider::{ChangeRequestUpdate, Properties, TracingLogSink};

    const PROJECT: &str = "my-project";

    fn handler(fake: &Arc<FakeCloudDns>, blocked: &[&str]) -> GoogleHandler {
        let mut global = DnsManagerConfiguration::default();
        global.provider_advanced_options.insert(
            PROVIDER_TYPE.to_string(),
            AdvancedOptions {
                blocked_zones: blocked.iter().map(ToString::to_string).collect(),
                ..AdvancedOptions::default()
            },
        );
        let config = DnsHandlerConfig::new(PROVIDER_TYPE, Properties::new()).with_global(Arc::new(global));
        GoogleHandler::new(&config, Arc::clone(fake) as Arc<dyn CloudDnsApi>)
    }

    fn zone() -> DnsHostedZone {
        DnsHostedZone::new(PROVIDER_TYPE, "my-project/zone1", "example.org", "", false)
    }

    #[test]
    fn test_split_zone_id() {
        assert_eq!(split_zone_id("proj/zone").unwrap(), ("proj", "zone"));
        assert!(split_zone_id("zone").is_err());
    }

    #[tokio::test]
    async fn test_get_zones_with_forwarded_domains() {
        let fake = Arc::new(
            FakeCloudDns::new(PROJECT)
                .with_zone("zone1", "example.org.")
                .with_zone("zone2", "blocked.org."),
        );
        fake.put(
            "zone1",
            ResourceRecordSet {
                name: "example.org.".to_string(),
                record_type: "NS".to_string(),
                ttl: 3600,
                rrdatas: vec!["ns-cloud-a1.googledomains.com.".to_string()],
                routing_policy: None,
            },
        );
        fake.put(
            "zone1",
            ResourceRecordSet {
                name: "sub.example.org.".to_string(),
                record_type: "NS".to_string(),
                ttl: 3600,
                rrdatas: vec!["ns1.other.net.".to_string()],
                routing_policy: None,
            },
        );

        let h = handler(&fake, &["my-project/zone2"]);
        let zones = h.get_zones().await.unwrap();
        assert_eq!(zones.len(), 1, "blocked zone must be skipped");
        assert_eq!(zones[0].id(), "my-project/zone1");
        assert_eq!(zones[0].domain, "example.org");
        assert_eq!(zones[0].forwarded_domains, vec!["sub.example.org"]);
    }

    #[tokio::test]
    async fn test_execute_and_read_state() {
        let fake = Arc::new(FakeCloudDns::new(PROJECT));
        let h = handler(&fake, &[]);
        let log = TracingLogSink::new("google");

        let plain = ChangeRequests::new(DnsSetName::new("www.example.org"))
            .with_update(
                RecordType::A,
                ChangeRequestUpdate::create(RecordSet::from_values(RecordType::A, 120, ["1.2.3.4"])),
            )
            .with_update(
                RecordType::Txt,
                ChangeRequestUpdate::create(RecordSet::from_values(RecordType::Txt, 120, ["hello"])),
            );
        h.execute_requests(&log, &zone(), &plain).await.unwrap();

        for (index, value) in [("0", "10.0.0.1"), ("1", "10.0.0.2")] {
            let weighted = ChangeRequests::new(DnsSetName::with_set_identifier("w.example.org", index)).with_update(
                RecordType::A,
                ChangeRequestUpdate::create(
                    RecordSet::from_values(RecordType::A, 60, [value])
                        .with_routing_policy(Some(RoutingPolicy::weighted(2))),
                ),
            );
            h.execute_requests(&log, &zone(), &weighted).await.unwrap();
        }

        let state = h.get_zone_state(&zone()).await.unwrap();
        let txt = state
            .record_set(&DnsSetName::new("www.example.org"), RecordType::Txt)
            .expect("TXT record set");
        assert_eq!(txt.values(), vec!["hello"], "TXT values are unquoted");
        let second = state
            .record_set(&DnsSetName::with_set_identifier("w.example.org", "1"), RecordType::A)
            .expect("second weighted variant");
        assert_eq!(second.values(), vec!["10.0.0.2"]);
        assert_eq!(second.routing_policy, Some(RoutingPolicy::weighted(2)));
        assert!(
            state
                .record_set(&DnsSetName::with_set_identifier("w.example.org", "0"), RecordType::A)
                .is_some(),
            "first variant survives the merge"
        );
    }

    #[tokio::test]
    async fn test_invalid_requests_are_not_submitted() {
        let fake = Arc::new(FakeCloudDns::new(PROJECT));
        let h = handler(&fake, &[]);
        let requests = ChangeRequests::new(DnsSetName::with_set_identifier("w.example.org", "7")).with_update(
            RecordType::A,
            ChangeRequestUpdate::create(
                RecordSet::from_values(RecordType::A, 60, ["1.1.1.1"])
                    .with_routing_policy(Some(RoutingPolicy::weighted(1))),
            ),
        );
        let err = h
            .execute_requests(&TracingLogSink::new("google"), &zone(), &requests)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to execute change requests"), "got {err}");
        assert_eq!(fake.change_count(), 0);
    }

    #[tokio::test]
    async fn test_custom_query_for_set_identifiers() {
        let fake = Arc::new(FakeCloudDns::new(PROJECT));
        fake.put(
            "zone1",
            ResourceRecordSet {
                name: "w.example.org.".to_string(),
                record_type: "A".to_string(),
                ttl: 60,
                rrdatas: Vec::new(),
                routing_policy: Some(RrSetRoutingPolicy::Wrr(vec![
                    routing_policy::placeholder_item("A"),
                    WrrItem {
                        rrdatas: vec!["5.5.5.5".to_string()],
                        weight: 5.0,
                    },
                ])),
            },
        );
        let h = handler(&fake, &[]);

        struct NoQuery;
        #[async_trait]
        impl QueryDns for NoQuery {
            async fn query(&self, _set_name: &DnsSetName, _record_type: RecordType) -> QueryDnsResult {
                Err(DnsError::Generic("standard query must not be used".to_string()))
            }
        }
        let factory: QueryDnsFactory = Arc::new(|| Arc::new(NoQuery) as Arc<dyn QueryDns>);
        let query = h.get_custom_query_dns_func(&zone(), &factory).unwrap();

        let rs = query
            .query(&DnsSetName::with_set_identifier("w.example.org", "1"), RecordType::A)
            .await
            .unwrap()
            .expect("weighted variant");
        assert_eq!(rs.values(), vec!["5.5.5.5"]);
        assert_eq!(rs.routing_policy, Some(RoutingPolicy::weighted(5)));

        let placeholder = query
            .query(&DnsSetName::with_set_identifier("w.example.org", "0"), RecordType::A)
            .await
            .unwrap();
        assert!(placeholder.is_none(), "placeholders are not variants");

        assert!(query
            .query(&DnsSetName::new("plain.example.org"), RecordType::A)
            .await
            .is_err());
    }
}
