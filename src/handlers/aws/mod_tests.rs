// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::{AdvancedOptions, DnsManagerConfiguration};
    use crate::dns::RoutingPolicy;
    use crate::handlers::aws::fake::{CountingLimiter, FakeRoute53, RecordingMetrics};
    use crate::provider::{ChangeRequestUpdate, Properties, TracingLogSink};

    fn handler(fake: &Arc<FakeRoute53>, batch_size: Option<usize>, blocked: &[&str]) -> AwsHandler {
        let mut global = DnsManagerConfiguration::default();
        global.provider_advanced_options.insert(
            PROVIDER_TYPE.to_string(),
            AdvancedOptions {
                batch_size,
                blocked_zones: blocked.iter().map(ToString::to_string).collect(),
                ..AdvancedOptions::default()
            },
        );
        let config = DnsHandlerConfig::new(PROVIDER_TYPE, Properties::new()).with_global(Arc::new(global));
        AwsHandler::new(&config, Arc::clone(fake) as Arc<dyn Route53Api>)
    }

    fn zone() -> DnsHostedZone {
        DnsHostedZone::new(PROVIDER_TYPE, "Z1", "example.com", "/hostedzone/Z1", false)
    }

    #[tokio::test]
    async fn test_get_zones() {
        let fake = Arc::new(FakeRoute53::with_zone("Z1", "Example.com."));
        fake.zones.lock().unwrap().push(api::HostedZone {
            id: "/hostedzone/Z2".to_string(),
            name: "blocked.org.".to_string(),
            private_zone: true,
        });
        let h = handler(&fake, None, &["Z2"]);
        let zones = h.get_zones().await.unwrap();
        assert_eq!(zones.len(), 1, "blocked zone must be skipped");
        assert_eq!(zones[0].id(), "Z1", "id is the last path segment");
        assert_eq!(zones[0].key, "/hostedzone/Z1");
        assert_eq!(zones[0].domain, "example.com");
        assert!(!zones[0].is_private);
    }

    #[tokio::test]
    async fn test_execute_and_read_state() {
        let fake = Arc::new(FakeRoute53::default());
        let h = handler(&fake, Some(10), &[]);
        let log = TracingLogSink::new("aws");

        let requests = ChangeRequests::new(DnsSetName::new("www.example.com"))
            .with_update(
                RecordType::A,
                ChangeRequestUpdate::create(RecordSet::from_values(RecordType::A, 120, ["1.2.3.4", "5.6.7.8"])),
            )
            .with_update(
                RecordType::Txt,
                ChangeRequestUpdate::create(RecordSet::from_values(RecordType::Txt, 120, ["owner=me"])),
            );
        h.execute_requests(&log, &zone(), &requests).await.unwrap();

        let weighted = ChangeRequests::new(DnsSetName::with_set_identifier("w.example.com", "blue"))
            .with_update(
                RecordType::AliasA,
                ChangeRequestUpdate::create(
                    RecordSet::from_values(RecordType::AliasA, 0, ["lb-1.us-west-2.elb.amazonaws.com"])
                        .with_routing_policy(Some(RoutingPolicy::weighted(5))),
                ),
            );
        h.execute_requests(&log, &zone(), &weighted).await.unwrap();

        let state = h.get_zone_state(&zone()).await.unwrap();
        let a = state
            .record_set(&DnsSetName::new("www.example.com"), RecordType::A)
            .expect("A record set");
        assert_eq!(a.values(), vec!["1.2.3.4", "5.6.7.8"]);
        assert_eq!(a.ttl, 120);
        let txt = state
            .record_set(&DnsSetName::new("www.example.com"), RecordType::Txt)
            .expect("TXT record set");
        assert_eq!(txt.values(), vec!["owner=me"], "TXT values are unquoted");

        let alias = state
            .record_set(&DnsSetName::with_set_identifier("w.example.com", "blue"), RecordType::AliasA)
            .expect("alias record set");
        assert_eq!(alias.values(), vec!["lb-1.us-west-2.elb.amazonaws.com"]);
        assert_eq!(alias.routing_policy, Some(RoutingPolicy::weighted(5)));
    }

    #[tokio::test]
    async fn test_update_uses_upsert() {
        let fake = Arc::new(FakeRoute53::default());
        let h = handler(&fake, None, &[]);
        let log = TracingLogSink::new("aws");
        let name = DnsSetName::new("app.example.com");

        let create = ChangeRequests::new(name.clone()).with_update(
            RecordType::A,
            ChangeRequestUpdate::create(RecordSet::from_values(RecordType::A, 60, ["1.1.1.1"])),
        );
        h.execute_requests(&log, &zone(), &create).await.unwrap();

        let update = ChangeRequests::new(name.clone()).with_update(
            RecordType::A,
            ChangeRequestUpdate::update(
                RecordSet::from_values(RecordType::A, 60, ["1.1.1.1"]),
                RecordSet::from_values(RecordType::A, 60, ["2.2.2.2"]),
            ),
        );
        h.execute_requests(&log, &zone(), &update).await.unwrap();
        let stored = fake.get("Z1", "app.example.com.", "A").unwrap();
        assert_eq!(stored.values, vec!["2.2.2.2"]);

        let batches = fake.batches.lock().unwrap();
        assert_eq!(batches.last().unwrap()[0].action, api::ChangeAction::Upsert);
    }

    #[tokio::test]
    async fn test_invalid_policy_is_not_submitted() {
        let fake = Arc::new(FakeRoute53::default());
        let h = handler(&fake, None, &[]);
        let requests = ChangeRequests::new(DnsSetName::new("x.example.com")).with_update(
            RecordType::A,
            ChangeRequestUpdate::create(
                RecordSet::from_values(RecordType::A, 60, ["1.1.1.1"])
                    .with_routing_policy(Some(RoutingPolicy::weighted(1))),
            ),
        );
        let err = h
            .execute_requests(&TracingLogSink::new("aws"), &zone(), &requests)
            .await
            .unwrap_err();
        assert!(matches!(err, DnsError::Provider(ProviderError::InvalidRoutingPolicy { .. })), "got {err}");
        assert!(fake.batch_sizes().is_empty(), "nothing must be sent");
    }

    #[tokio::test]
    async fn test_custom_query_reads_set_identifiers_from_api() {
        let fake = Arc::new(FakeRoute53::default());
        let h = handler(&fake, None, &[]);
        let requests = ChangeRequests::new(DnsSetName::with_set_identifier("geo.example.com", "eu")).with_update(
            RecordType::A,
            ChangeRequestUpdate::create(
                RecordSet::from_values(RecordType::A, 60, ["3.3.3.3"])
                    .with_routing_policy(Some(RoutingPolicy::geolocation("Europe"))),
            ),
        );
        h.execute_requests(&TracingLogSink::new("aws"), &zone(), &requests)
            .await
            .unwrap();

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
            .query(&DnsSetName::with_set_identifier("geo.example.com", "eu"), RecordType::A)
            .await
            .unwrap()
            .expect("record set");
        assert_eq!(rs.values(), vec!["3.3.3.3"]);
        assert_eq!(rs.routing_policy, Some(RoutingPolicy::geolocation("Europe")));

        let err = query
            .query(&DnsSetName::new("plain.example.com"), RecordType::A)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("standard query"), "plain names use the standard query");
    }

    #[tokio::test]
    async fn test_custom_query_is_throttled_and_counted() {
        let fake = Arc::new(FakeRoute53::default());
        let metrics = Arc::new(RecordingMetrics::default());
        let limiter = Arc::new(CountingLimiter::default());
        let mut config = DnsHandlerConfig::new(PROVIDER_TYPE, Properties::new())
            .with_metrics(Arc::clone(&metrics) as Arc<dyn Metrics>);
        config.rate_limiter = Arc::clone(&limiter) as Arc<dyn RateLimiter>;
        let h = AwsHandler::new(&config, Arc::clone(&fake) as Arc<dyn Route53Api>);

        let private = DnsHostedZone::new(PROVIDER_TYPE, "Z1", "example.com", "/hostedzone/Z1", true);
        let factory: QueryDnsFactory = Arc::new(|| Arc::new(NoopQuery) as Arc<dyn QueryDns>);
        let query = h.get_custom_query_dns_func(&private, &factory).unwrap();
        let found = query
            .query(&DnsSetName::new("missing.example.com"), RecordType::A)
            .await
            .unwrap();
        assert!(found.is_none());
        assert_eq!(metrics.count(REQUEST_TYPE_LIST_RECORDS), 1, "private zones are read from the API");
        assert_eq!(limiter.accepted(), 1, "the API read waits for the rate limiter");
    }

    struct NoopQuery;

    #[async_trait]
    impl QueryDns for NoopQuery {
        async fn query(&self, _set_name: &DnsSetName, _record_type: RecordType) -> QueryDnsResult {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_register_with_alias_targets_mapper() {
        use crate::provider::DnsHandlerFactory;

        let fake = Arc::new(FakeRoute53::with_zone("Z1", "example.com."));
        let mut registry = DnsHandlerRegistry::new();
        register(&mut registry, Arc::clone(&fake) as Arc<dyn Route53Api>);
        assert!(registry.supports(PROVIDER_TYPE));

        let handler = registry
            .create(PROVIDER_TYPE, DnsHandlerConfig::new(PROVIDER_TYPE, Properties::new()))
            .unwrap();
        assert_eq!(handler.get_zones().await.unwrap().len(), 1, "handler uses the injected client");

        let mapper = registry.get_targets_mapper(PROVIDER_TYPE).expect("alias mapper registered");
        let mapped = mapper(
            "www.example.com",
            vec![Target::new(RecordType::Cname, "my-lb-123.eu-west-1.elb.amazonaws.com", 60)],
        );
        assert_eq!(mapped[0].record_type, RecordType::AliasA);
    }

    #[test]
    fn test_map_targets() {
        let fake = Arc::new(FakeRoute53::default());
        let h = handler(&fake, None, &[]);
        let mapped = h.map_targets(
            "www.example.com",
            vec![Target::new(RecordType::Cname, "a.cloudfront.net", 60)],
        );
        assert_eq!(mapped[0].record_type, RecordType::AliasA);
    }
}
