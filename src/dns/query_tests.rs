// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::io::Write;

    #[test]
    fn test_with_default_port() {
        assert_eq!(with_default_port("10.0.0.1"), "10.0.0.1:53");
        assert_eq!(with_default_port("10.0.0.1:5353"), "10.0.0.1:5353");
        assert_eq!(with_default_port("::1"), "[::1]:53");
        assert_eq!(with_default_port("[::1]:53"), "[::1]:53");
        assert_eq!(with_default_port("ns.example.com"), "ns.example.com:53");
        assert_eq!(with_default_port("ns.example.com:54"), "ns.example.com:54");
    }

    #[test]
    fn test_parse_resolv_conf() {
        let text = "# comment\nsearch svc.cluster.local\nnameserver 10.96.0.10\nnameserver 2001:db8::1\noptions ndots:5\n";
        assert_eq!(
            parse_resolv_conf(text),
            vec!["10.96.0.10:53".to_string(), "[2001:db8::1]:53".to_string()]
        );
    }

    #[test]
    fn test_static_nameservers_default() {
        let ns = StaticNameservers::new(&[]);
        assert_eq!(ns.nameservers(), vec!["8.8.8.8:53".to_string()]);

        let ns = StaticNameservers::new(&["1.1.1.1".to_string()]);
        assert_eq!(ns.nameservers(), vec!["1.1.1.1:53".to_string()]);
    }

    #[test]
    fn test_system_nameservers_reads_file_once() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "nameserver 192.0.2.1").unwrap();
        let provider = SystemNameservers::new(file.path(), &["8.8.8.8:53".to_string()]);
        assert_eq!(provider.nameservers(), vec!["192.0.2.1:53".to_string()]);

        writeln!(file, "nameserver 192.0.2.2").unwrap();
        assert_eq!(
            provider.nameservers().len(),
            1,
            "nameservers must be cached after the first read"
        );
    }

    #[test]
    fn test_system_nameservers_fallback() {
        let provider = SystemNameservers::new("/nonexistent/resolv.conf", &["9.9.9.9:53".to_string()]);
        assert_eq!(provider.nameservers(), vec!["9.9.9.9:53".to_string()]);
    }

    #[tokio::test]
    async fn test_query_rejects_set_identifier() {
        let query = StandardQueryDns::new(Arc::new(StaticNameservers::new(&[])));
        let err = query
            .query(
                &DnsSetName::with_set_identifier("a.example.com", "1"),
                RecordType::A,
            )
            .await
            .unwrap_err();
        assert!(
            err.to_string().contains("set identifier is not supported"),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn test_query_rejects_alias_types() {
        let query = StandardQueryDns::new(Arc::new(StaticNameservers::new(&[])));
        let err = query
            .query(&DnsSetName::new("a.example.com"), RecordType::AliasA)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported record type"));
    }

    #[tokio::test]
    async fn test_query_unreachable_nameserver_fails() {
        let nameservers = StaticNameservers::new(&["127.0.0.1:1".to_string()]);
        let query = StandardQueryDns::with_timeout(Arc::new(nameservers), Duration::from_millis(200));
        let result = query
            .query(&DnsSetName::new("a.example.com"), RecordType::A)
            .await;
        assert!(result.is_err(), "closed port must produce an error");
    }
}
