// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::provider::handler_config::DnsHandlerConfig;
    use crate::provider::{DnsHandlerFactory, Properties};

    fn registry() -> (DnsHandlerRegistry, Arc<InMemoryAccounts>) {
        let accounts = Arc::new(InMemoryAccounts::new());
        let mut registry = DnsHandlerRegistry::new();
        register_all(&mut registry, Arc::clone(&accounts));
        (registry, accounts)
    }

    #[test]
    fn test_register_all_provider_types() {
        let (registry, _) = registry();
        for provider_type in ["mock-inmemory", "powerdns", "remote", "rfc2136"] {
            assert!(registry.supports(provider_type), "{provider_type} must be registered");
            let adapter = registry
                .get_dns_handler_adapter(provider_type)
                .expect("adapter registered");
            assert_eq!(adapter.provider_type(), provider_type);
        }
        assert!(!registry.supports("aws-route53"), "vendor engines need an injected client");
    }

    #[test]
    fn test_rfc2136_has_default_rate_limits() {
        let (registry, _) = registry();
        let limits = registry.get_default_rate_limits("rfc2136").expect("default limits");
        assert!(limits.enabled);
        assert_eq!(limits.qps, RFC2136_DEFAULT_RATE_LIMIT_QPS);
        assert_eq!(limits.burst, RFC2136_DEFAULT_RATE_LIMIT_BURST);
        assert!(registry.get_default_rate_limits("powerdns").is_none());
    }

    #[test]
    fn test_mock_handler_registers_account() {
        let (registry, accounts) = registry();
        let config = DnsHandlerConfig::new(mock::PROVIDER_TYPE, Properties::new()).with_provider_config(Some(
            serde_json::json!({
                "account": "acc1",
                "zones": [{"zoneSuffix": "example.org"}]
            }),
        ));
        let handler = registry.create(mock::PROVIDER_TYPE, config).unwrap();
        assert_eq!(handler.provider_type(), mock::PROVIDER_TYPE);
        assert!(accounts.get("acc1").is_some(), "mock store is shared with the caller");
    }

    #[test]
    fn test_powerdns_requires_server() {
        let (registry, _) = registry();
        let config = DnsHandlerConfig::new(powerdns::PROVIDER_TYPE, Properties::new());
        assert!(registry.create(powerdns::PROVIDER_TYPE, config).is_err());
    }
}
