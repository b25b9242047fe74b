// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use serde::Deserialize;

    fn config(pairs: &[(&str, &str)]) -> DnsHandlerConfig {
        let properties = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        DnsHandlerConfig::new("test", properties)
    }

    #[test]
    fn test_required_property_with_alias_and_trim() {
        let c = config(&[("server", "  10.0.0.1 ")]);
        assert_eq!(
            c.get_required_property("Server", &["server"]).unwrap(),
            "10.0.0.1",
            "alias value must be found and trimmed"
        );
    }

    #[test]
    fn test_required_property_missing_and_empty() {
        let c = config(&[("Zone", "   ")]);
        assert_eq!(
            c.get_required_property("Server", &["server"]).unwrap_err(),
            ConfigError::MissingProperty {
                keys: vec!["Server".into(), "server".into()]
            }
        );
        assert_eq!(
            c.get_required_property("Server", &["server"]).unwrap_err().to_string(),
            "'Server' or 'server' required in secret"
        );
        assert_eq!(
            c.get_required_property("Zone", &[]).unwrap_err(),
            ConfigError::EmptyProperty { key: "Zone".into() }
        );
        assert_eq!(c.get_property("Zone", &[]), None, "blank optional value counts as missing");
    }

    #[test]
    fn test_defaulted_accessors() {
        let c = config(&[("Port", "5353"), ("Insecure", "true"), ("Bad", "x")]);
        assert_eq!(c.get_defaulted_property("Algo", "hmac-sha256", &[]), "hmac-sha256");
        assert_eq!(c.get_defaulted_int_property("Port", 53, &[]).unwrap(), 5353);
        assert_eq!(c.get_defaulted_int_property("Other", 53, &[]).unwrap(), 53);
        assert!(c.get_defaulted_int_property("Bad", 1, &[]).is_err());
        assert!(c.get_defaulted_bool_property("Insecure", false, &[]).unwrap());
        assert!(!c.get_defaulted_bool_property("Missing", false, &[]).unwrap());
        assert!(c.get_required_bool_property("Bad", &[]).is_err());
        assert_eq!(c.get_required_int_property("Port", &[]).unwrap(), 5353);
    }

    #[test]
    fn test_fill_required_property() {
        let c = config(&[("Region", "eu-west-1")]);

        let mut target = None;
        c.fill_required_property(&mut target, "Region", &[]).unwrap();
        assert_eq!(target.as_deref(), Some("eu-west-1"));

        let mut from_config = Some("us-east-1".to_string());
        assert_eq!(
            c.fill_required_property(&mut from_config, "Region", &[]).unwrap_err(),
            ConfigError::ConflictingProperty { key: "Region".into() },
            "a value in provider config and secret must conflict"
        );

        let mut missing = None;
        assert!(c.fill_required_property(&mut missing, "Project", &[]).is_err());
    }

    #[test]
    fn test_fill_default_property() {
        let c = config(&[]);
        let mut target = None;
        c.fill_default_property(&mut target, "default", "Key", &[]).unwrap();
        assert_eq!(target.as_deref(), Some("default"));

        let mut empty_default = None;
        c.fill_default_property(&mut empty_default, "", "Key", &[]).unwrap();
        assert_eq!(empty_default, None);

        let mut set = Some("x".to_string());
        c.fill_default_property(&mut set, "default", "Key", &[]).unwrap();
        assert_eq!(set.as_deref(), Some("x"), "value from provider config is kept");
    }

    #[test]
    fn test_fill_bool_property() {
        let c = config(&[("Flag", "false")]);
        let mut flag = None;
        c.fill_default_bool_property(&mut flag, true, "Flag", &[]).unwrap();
        assert_eq!(flag, Some(false));
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct SampleConfig {
        account: String,
    }

    #[test]
    fn test_provider_config_as() {
        let c = config(&[]).with_provider_config(Some(serde_json::json!({"account": "a1"})));
        let parsed: SampleConfig = c.provider_config_as().unwrap();
        assert_eq!(parsed.account, "a1");

        let missing = config(&[]);
        assert!(matches!(
            missing.provider_config_as::<SampleConfig>(),
            Err(ConfigError::InvalidProviderConfig { .. })
        ));

        let malformed = config(&[]).with_provider_config(Some(serde_json::json!({"account": 5})));
        assert!(malformed.provider_config_as::<SampleConfig>().is_err());
    }

    #[test]
    fn test_blocked_zones() {
        let mut global = crate::config::DnsManagerConfiguration::default();
        global.provider_advanced_options.insert(
            "test".into(),
            crate::config::AdvancedOptions {
                blocked_zones: vec!["Z1".into()],
                ..Default::default()
            },
        );
        let c = config(&[]).with_global(Arc::new(global));
        assert!(c.is_blocked_zone("Z1"));
        assert!(!c.is_blocked_zone("Z2"));
    }
}
