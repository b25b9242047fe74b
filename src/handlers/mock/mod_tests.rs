// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::dns::query::StandardQueryDns;
    use crate::dns::query::StaticNameservers;
    use crate::dns::RecordSet;
    use crate::provider::checks::DnsHandlerAdapter;
    use crate::provider::{ChangeRequestUpdate, Properties, TracingLogSink};
    use serde_json::json;

    fn config(value: serde_json::Value) -> DnsHandlerConfig {
        DnsHandlerConfig::new(PROVIDER_TYPE, Properties::new()).with_provider_config(Some(value))
    }

    fn handler(accounts: &Arc<InMemoryAccounts>, extra: serde_json::Value) -> MockHandler {
        let mut value = json!({
            "account": "acc",
            "zones": [
                {"zoneSuffix": "", "dnsName": "example.com"},
                {"zoneSuffix": "z2:private", "dnsName": "internal.example.com"},
                {"zoneSuffix": "skip", "dnsName": ""}
            ]
        });
        if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        MockHandler::new(config(value), Arc::clone(accounts)).unwrap()
    }

    fn create(name: &str, values: &[&str]) -> ChangeRequests {
        ChangeRequests::new(DnsSetName::new(name)).with_update(
            RecordType::A,
            ChangeRequestUpdate::create(RecordSet::from_values(RecordType::A, 300, values.iter().copied())),
        )
    }

    #[tokio::test]
    async fn test_zones_from_config() {
        let accounts = Arc::new(InMemoryAccounts::new());
        let h = handler(&accounts, json!({}));
        let zones = h.get_zones().await.unwrap();
        assert_eq!(zones.len(), 2, "zones without dnsName are skipped");

        let public = zones.iter().find(|z| z.domain == "example.com").unwrap();
        assert_eq!(public.id(), "acc:example.com");
        assert!(!public.is_private);

        let private = zones.iter().find(|z| z.domain == "internal.example.com").unwrap();
        assert_eq!(private.id(), "acc:z2:privateinternal.example.com");
        assert!(private.is_private, "suffix with :private marks the zone private");
        assert!(accounts.get("acc").is_some(), "store must be registered");
    }

    #[tokio::test]
    async fn test_duplicate_account_rejected() {
        let accounts = Arc::new(InMemoryAccounts::new());
        let first = handler(&accounts, json!({}));
        let err = MockHandler::new(config(json!({"account": "acc"})), Arc::clone(&accounts))
            .err()
            .unwrap();
        assert!(err.to_string().contains("already exists"), "got {err}");

        first.release();
        assert!(accounts.get("acc").is_none(), "release must unregister the store");
        MockHandler::new(config(json!({"account": "acc"})), accounts).unwrap();
    }

    #[test]
    fn test_malformed_config() {
        let err = MockHandler::new(config(json!({"zones": "nope"})), Arc::new(InMemoryAccounts::new()))
            .err()
            .unwrap();
        assert!(
            err.to_string().starts_with("unmarshal mock providerConfig failed with"),
            "got {err}"
        );
    }

    #[tokio::test]
    async fn test_fail_get_zones() {
        let accounts = Arc::new(InMemoryAccounts::new());
        let h = handler(&accounts, json!({"failGetZones": true}));
        let err = h.get_zones().await.unwrap_err();
        assert_eq!(err.to_string(), "forced error by mockConfig.FailGetZones");
    }

    #[tokio::test]
    async fn test_execute_and_query() {
        let accounts = Arc::new(InMemoryAccounts::new());
        let h = handler(&accounts, json!({}));
        let zone = h.get_zones().await.unwrap().into_iter().find(|z| !z.is_private).unwrap();
        let log = TracingLogSink::new(PROVIDER_TYPE);

        h.execute_requests(&log, &zone, &create("www.example.com", &["1.1.1.1"]))
            .await
            .unwrap();

        let factory = StandardQueryDns::factory(Arc::new(StaticNameservers::new(&[])));
        let query = h.get_custom_query_dns_func(&zone, &factory).unwrap();
        let rs = query
            .query(&DnsSetName::new("WWW.example.com."), RecordType::A)
            .await
            .unwrap()
            .expect("record set must be found");
        assert_eq!(rs.values(), vec!["1.1.1.1"]);
        assert!(query
            .query(&DnsSetName::new("other.example.com"), RecordType::A)
            .await
            .unwrap()
            .is_none());

        let state = h.get_zone_state(&zone).await.unwrap();
        assert_eq!(state.len(), 1);
    }

    #[tokio::test]
    async fn test_fail_delete_entry() {
        let accounts = Arc::new(InMemoryAccounts::new());
        let h = handler(&accounts, json!({"failDeleteEntry": true}));
        let zone = h.get_zones().await.unwrap().into_iter().find(|z| !z.is_private).unwrap();
        let log = TracingLogSink::new(PROVIDER_TYPE);
        h.execute_requests(&log, &zone, &create("www.example.com", &["1.1.1.1"]))
            .await
            .unwrap();

        let delete = ChangeRequests::new(DnsSetName::new("www.example.com")).with_update(
            RecordType::A,
            ChangeRequestUpdate::delete(RecordSet::from_values(RecordType::A, 300, ["1.1.1.1"])),
        );
        let err = h.execute_requests(&log, &zone, &delete).await.unwrap_err();
        assert_eq!(err, DnsError::Provider(ProviderError::ChangesFailed { count: 1 }));
        assert_eq!(h.in_memory().get_counts(&zone.zone_id), (1, 1), "record must survive");
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency() {
        let accounts = Arc::new(InMemoryAccounts::new());
        let h = handler(&accounts, json!({"latencyMillis": 250}));
        let zone = h.get_zones().await.unwrap().into_iter().find(|z| !z.is_private).unwrap();
        let log = TracingLogSink::new(PROVIDER_TYPE);

        let start = tokio::time::Instant::now();
        h.execute_requests(&log, &zone, &create("a.example.com", &["1.1.1.1"]))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(250), "latency must be applied");
    }

    #[test]
    fn test_adapter_validates_provider_config() {
        let adapter = adapter();
        assert_eq!(adapter.provider_type(), PROVIDER_TYPE);
        adapter
            .validate_credentials_and_provider_config(&Properties::new(), Some(&json!({"account": "x"})))
            .unwrap();
        let err = adapter
            .validate_credentials_and_provider_config(&Properties::new(), Some(&json!({"zones": 1})))
            .unwrap_err();
        assert!(err.to_string().contains("invalid provider config"), "got {err}");
    }
}
