// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::constants::{PROTOCOL_VERSION_0, PROTOCOL_VERSION_1};
    use crate::dns::{DnsSetName, RecordSet, RecordType, RoutingPolicy, ZoneId};
    use crate::handlers::mock::{InMemoryAccounts, MockHandler};
    use crate::provider::{ChangeRequestUpdate, DnsHandlerConfig, Properties};
    use crate::remote::conversion::marshal_change_request;
    use crate::remote::server::tls::{AllowAllNamespaces, ClientCertAuthorizer};
    use serde_json::{json, Value};

    const ZONE_ID: &str = "acc:example.com";

    fn mock(accounts: &Arc<InMemoryAccounts>, extra: Value) -> Arc<dyn DnsHandler> {
        let mut config = json!({
            "account": "acc",
            "supportRoutingPolicy": true,
            "zones": [{"zoneSuffix": "", "dnsName": "example.com"}]
        });
        if let (Some(base), Some(extra)) = (config.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        let config = DnsHandlerConfig::new("mock-inmemory", Properties::new()).with_provider_config(Some(config));
        Arc::new(MockHandler::new(config, Arc::clone(accounts)).unwrap())
    }

    async fn server_with_mock(extra: Value) -> (RemoteAccessServer, Arc<InMemoryAccounts>) {
        let accounts = Arc::new(InMemoryAccounts::new());
        let server = RemoteAccessServer::new(Arc::new(AllowAllNamespaces)).with_spinning(Duration::from_millis(50));
        server
            .provider_updated_event("team-a", "mock", true, mock(&accounts, extra))
            .await;
        (server, accounts)
    }

    fn login(server: &RemoteAccessServer, version: i32) -> String {
        server
            .do_login(
                &proto::LoginRequest {
                    namespace: "team-a".to_string(),
                    client_id: "client-1".to_string(),
                    client_protocol_version: version,
                },
                None,
            )
            .unwrap()
            .token
    }

    fn change(name: &DnsSetName, update: &ChangeRequestUpdate, version: i32) -> proto::ChangeRequest {
        marshal_change_request(name, "", RecordType::A, update, version).unwrap()
    }

    fn a_record(values: &[&str]) -> RecordSet {
        RecordSet::from_values(RecordType::A, 300, values.iter().copied())
    }

    fn stored(accounts: &InMemoryAccounts, name: &DnsSetName) -> Option<RecordSet> {
        accounts
            .get("acc")
            .unwrap()
            .get_record_set(&ZoneId::new("mock-inmemory", ZONE_ID), name, RecordType::A)
    }

    #[test]
    fn test_to_status() {
        let invalid: DnsError = RemoteError::InvalidToken {
            namespace: "ns".to_string(),
        }
        .into();
        let status = to_status(&invalid);
        assert_eq!(status.code(), tonic::Code::Unauthenticated);
        assert!(status.message().contains("InvalidToken"), "marker must survive");

        assert_eq!(to_status(&ProviderError::Busy.into()).code(), tonic::Code::Unavailable);
        assert_eq!(to_status(&ProviderError::Busy.into()).message(), "busy");
        assert_eq!(
            to_status(&RemoteError::MissingClientCertificate.into()).code(),
            tonic::Code::PermissionDenied
        );
        assert_eq!(
            to_status(&ProviderError::ZoneNotFound { zone: "z".into() }.into()).code(),
            tonic::Code::NotFound
        );
        assert_eq!(to_status(&DnsError::Generic("x".into())).code(), tonic::Code::Internal);
    }

    #[tokio::test]
    async fn test_login() {
        let (server, _accounts) = server_with_mock(json!({})).await;
        let response = server
            .do_login(
                &proto::LoginRequest {
                    namespace: "team-a".to_string(),
                    client_id: "client-1".to_string(),
                    client_protocol_version: 7,
                },
                None,
            )
            .unwrap();
        assert_eq!(response.server_protocol_version, CURRENT_PROTOCOL_VERSION);
        assert!(response.token.starts_with("team-a|client-1|"), "got {}", response.token);
        assert!(response.token.contains(server.server_id()));

        let err = server
            .do_login(
                &proto::LoginRequest {
                    namespace: "team-b".to_string(),
                    client_id: "client-1".to_string(),
                    client_protocol_version: 1,
                },
                None,
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "namespace team-b not found or no providers available");
    }

    #[tokio::test]
    async fn test_login_requires_client_certificate() {
        let accounts = Arc::new(InMemoryAccounts::new());
        let server = RemoteAccessServer::new(Arc::new(ClientCertAuthorizer));
        server
            .provider_updated_event("team-a", "mock", true, mock(&accounts, json!({})))
            .await;
        let err = server
            .do_login(
                &proto::LoginRequest {
                    namespace: "team-a".to_string(),
                    client_id: "c".to_string(),
                    client_protocol_version: 1,
                },
                None,
            )
            .unwrap_err();
        assert_eq!(err, DnsError::Remote(RemoteError::MissingClientCertificate));
    }

    #[tokio::test]
    async fn test_provider_events() {
        let (server, accounts) = server_with_mock(json!({})).await;
        let token = login(&server, PROTOCOL_VERSION_1);
        let zones = server
            .do_get_zones(&proto::GetZonesRequest { token: token.clone() })
            .await
            .unwrap();
        assert_eq!(zones.zone.len(), 1);
        assert_eq!(zones.zone[0].id, ZONE_ID);
        assert_eq!(zones.zone[0].provider_type, "mock-inmemory");

        let handler: Arc<dyn DnsHandler> = Arc::new(
            MockHandler::new(
                DnsHandlerConfig::new("mock-inmemory", Properties::new())
                    .with_provider_config(Some(json!({"account": "other"}))),
                Arc::clone(&accounts),
            )
            .unwrap(),
        );
        server.provider_updated_event("team-a", "mock", false, handler).await;
        let err = server
            .do_get_zones(&proto::GetZonesRequest { token })
            .await
            .unwrap_err();
        assert!(
            matches!(err, DnsError::Remote(RemoteError::NamespaceNotFound { .. })),
            "namespace without providers is unknown, got {err}"
        );
    }

    #[tokio::test]
    async fn test_invalid_token() {
        let (server, _accounts) = server_with_mock(json!({})).await;
        let err = server
            .do_get_zones(&proto::GetZonesRequest {
                token: "team-a|forged".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(to_status(&err).code(), tonic::Code::Unauthenticated);

        let token = login(&server, PROTOCOL_VERSION_1);
        assert_eq!(server.cleanup_tokens(Utc::now()), 0);
        assert_eq!(server.cleanup_tokens(Utc::now() + chrono::Duration::days(1)), 1);
        let err = server
            .do_get_zones(&proto::GetZonesRequest { token })
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("InvalidToken"), "got {err}");
    }

    #[tokio::test]
    async fn test_execute_and_zone_state() {
        let (server, accounts) = server_with_mock(json!({})).await;
        let token = login(&server, PROTOCOL_VERSION_1);
        let name = DnsSetName::new("www.example.com");

        let response = server
            .do_execute(proto::ExecuteRequest {
                token: token.clone(),
                zoneid: ZONE_ID.to_string(),
                change_requests: vec![change(&name, &ChangeRequestUpdate::create(a_record(&["1.1.1.1"])), 1)],
            })
            .await
            .unwrap();
        assert_eq!(response.change_responses.len(), 1);
        assert_eq!(response.change_responses[0].state, ChangeState::Succeeded as i32);
        assert!(!response.log_messages.is_empty(), "handler logs are returned");
        assert_eq!(stored(&accounts, &name).unwrap().values(), vec!["1.1.1.1"]);

        let update = ChangeRequestUpdate::update(a_record(&["1.1.1.1"]), a_record(&["2.2.2.2"]));
        let response = server
            .do_execute(proto::ExecuteRequest {
                token: token.clone(),
                zoneid: ZONE_ID.to_string(),
                change_requests: vec![change(&name, &update, 1)],
            })
            .await
            .unwrap();
        assert_eq!(response.change_responses[0].state, ChangeState::Succeeded as i32);
        assert_eq!(stored(&accounts, &name).unwrap().values(), vec!["2.2.2.2"]);

        let state = server
            .do_get_zone_state(&proto::GetZoneStateRequest {
                token,
                zoneid: ZONE_ID.to_string(),
            })
            .await
            .unwrap();
        let set = state.dns_sets.get("www.example.com").expect("set must be marshaled");
        assert_eq!(set.records["A"].record[0].value, "2.2.2.2");
    }

    #[tokio::test]
    async fn test_execute_per_change_states() {
        let (server, accounts) = server_with_mock(json!({"failDeleteEntry": true})).await;
        let token = login(&server, PROTOCOL_VERSION_1);
        let keep = DnsSetName::new("keep.example.com");
        let added = DnsSetName::new("new.example.com");

        server
            .do_execute(proto::ExecuteRequest {
                token: token.clone(),
                zoneid: ZONE_ID.to_string(),
                change_requests: vec![change(&keep, &ChangeRequestUpdate::create(a_record(&["1.1.1.1"])), 1)],
            })
            .await
            .unwrap();

        let mut broken = change(&added, &ChangeRequestUpdate::create(a_record(&["3.3.3.3"])), 1);
        broken.action = 42;
        let response = server
            .do_execute(proto::ExecuteRequest {
                token,
                zoneid: ZONE_ID.to_string(),
                change_requests: vec![
                    change(&keep, &ChangeRequestUpdate::delete(a_record(&["1.1.1.1"])), 1),
                    change(&added, &ChangeRequestUpdate::create(a_record(&["2.2.2.2"])), 1),
                    broken,
                ],
            })
            .await
            .unwrap();
        let states: Vec<i32> = response.change_responses.iter().map(|r| r.state).collect();
        assert_eq!(
            states,
            vec![
                ChangeState::Failed as i32,
                ChangeState::Succeeded as i32,
                ChangeState::Invalid as i32
            ]
        );
        assert_eq!(response.change_responses[0].error_message, "1 changes failed");
        assert!(response.change_responses[2].error_message.contains("invalid action: 42"));
        assert!(stored(&accounts, &keep).is_some(), "failed delete keeps the record");
        assert!(stored(&accounts, &added).is_some());
    }

    #[tokio::test]
    async fn test_zone_state_hides_routing_policies_from_version_0() {
        let (server, _accounts) = server_with_mock(json!({})).await;
        let token = login(&server, PROTOCOL_VERSION_1);
        let weighted = DnsSetName::with_set_identifier("lb.example.com", "blue");
        let rs = a_record(&["1.1.1.1"]).with_routing_policy(Some(RoutingPolicy::weighted(10)));
        server
            .do_execute(proto::ExecuteRequest {
                token,
                zoneid: ZONE_ID.to_string(),
                change_requests: vec![change(&weighted, &ChangeRequestUpdate::create(rs), 1)],
            })
            .await
            .unwrap();

        let request = |token: String| proto::GetZoneStateRequest {
            token,
            zoneid: ZONE_ID.to_string(),
        };
        let v1 = server.do_get_zone_state(&request(login(&server, PROTOCOL_VERSION_1))).await.unwrap();
        assert_eq!(v1.dns_sets.len(), 1);
        let v0 = server.do_get_zone_state(&request(login(&server, PROTOCOL_VERSION_0))).await.unwrap();
        assert!(v0.dns_sets.is_empty(), "version 0 clients never see set identifiers");
    }

    #[tokio::test]
    async fn test_busy_handler() {
        let (server, _accounts) = server_with_mock(json!({})).await;
        let token = login(&server, PROTOCOL_VERSION_1);
        let state = server.namespace("team-a").unwrap();
        let entry = state.lookup_zone(ZONE_ID).unwrap();
        let _guard = entry.handler.lock.try_lock_spinning(Duration::ZERO).await.unwrap();

        let err = server
            .do_execute(proto::ExecuteRequest {
                token,
                zoneid: ZONE_ID.to_string(),
                change_requests: Vec::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err, DnsError::Provider(ProviderError::Busy));
        assert_eq!(to_status(&err).code(), tonic::Code::Unavailable);
    }
}
