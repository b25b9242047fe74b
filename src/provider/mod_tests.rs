// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::dns::RoutingPolicy;
    use crate::dns_errors::{ConfigError, ThrottlingError};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDone(Mutex<Vec<String>>);

    impl DoneHandler for RecordingDone {
        fn set_invalid(&self, err: &DnsError) {
            self.0.lock().unwrap().push(format!("invalid: {err}"));
        }
        fn failed(&self, err: &DnsError) {
            self.0.lock().unwrap().push(format!("failed: {err}"));
        }
        fn throttled(&self) {
            self.0.lock().unwrap().push("throttled".into());
        }
        fn succeeded(&self) {
            self.0.lock().unwrap().push("succeeded".into());
        }
    }

    fn a_set(values: &[&str]) -> RecordSet {
        RecordSet::from_values(RecordType::A, 300, values.iter().copied())
    }

    #[test]
    fn test_change_request_update_kinds() {
        assert!(ChangeRequestUpdate::default().is_empty());
        assert!(ChangeRequestUpdate::create(a_set(&[])).is_empty());
        assert!(!ChangeRequestUpdate::create(a_set(&["1.1.1.1"])).is_empty());

        let weighted = a_set(&["1.1.1.1"]).with_routing_policy(Some(RoutingPolicy::weighted(10)));
        assert!(ChangeRequestUpdate::delete(weighted).has_routing_policy());
        assert!(!ChangeRequestUpdate::update(a_set(&["1.1.1.1"]), a_set(&["2.2.2.2"])).has_routing_policy());
    }

    #[test]
    fn test_report_maps_errors_to_done_states() {
        let done = Arc::new(RecordingDone::default());
        let requests = ChangeRequests::new(DnsSetName::new("a.example.com")).with_done(done.clone());

        requests.report(&Ok(()));
        requests.report(&Err(ProviderError::Throttled(ThrottlingError::new("slow down")).into()));
        requests.report(&Err(ProviderError::RoutingPolicyNotSupported.into()));
        requests.report(&Err(ConfigError::EmptyProperty { key: "k".into() }.into()));
        requests.report(&Err(ProviderError::backend("boom").into()));

        assert_eq!(
            *done.0.lock().unwrap(),
            vec![
                "succeeded".to_string(),
                "throttled".to_string(),
                "invalid: routing policy not supported".to_string(),
                "invalid: value for 'k' in secret is empty".to_string(),
                "failed: boom".to_string(),
            ]
        );
    }

    #[test]
    fn test_report_without_done_handler_is_noop() {
        let requests = ChangeRequests::new(DnsSetName::new("a.example.com"));
        requests.report(&Err(ProviderError::backend("boom").into()));
    }

    #[test]
    fn test_change_requests_display() {
        let requests = ChangeRequests::new(DnsSetName::with_set_identifier("a.example.com", "eu"))
            .with_update(RecordType::A, ChangeRequestUpdate::create(a_set(&["1.1.1.1"])))
            .with_update(RecordType::Txt, ChangeRequestUpdate::default());
        assert_eq!(
            requests.to_string(),
            "ChangeRequests(name: a.example.com#eu, types: [TXT, A])"
        );
    }

    #[test]
    fn test_log_sink_helpers() {
        struct Collect(Mutex<Vec<(LogLevel, String)>>);
        impl LogSink for Collect {
            fn log(&self, level: LogLevel, message: &str) {
                self.0.lock().unwrap().push((level, message.to_string()));
            }
        }
        let sink = Collect(Mutex::new(Vec::new()));
        sink.info("hello");
        sink.error("bad");
        assert_eq!(
            *sink.0.lock().unwrap(),
            vec![(LogLevel::Info, "hello".to_string()), (LogLevel::Error, "bad".to_string())]
        );
        TracingLogSink::new("mock").warn("only logged");
    }
}
