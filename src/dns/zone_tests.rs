// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;

    fn zone(id: &str, domain: &str) -> DnsHostedZone {
        DnsHostedZone::new("mock-inmemory", id, domain, format!("{domain}."), false)
    }

    #[test]
    fn test_zone_id_display() {
        assert_eq!(
            ZoneId::new("aws-route53", "Z123").to_string(),
            "aws-route53:Z123"
        );
    }

    #[test]
    fn test_match_level() {
        let z = zone("z1", "Example.com.");
        assert_eq!(z.domain, "example.com");
        assert_eq!(z.match_level("a.example.com"), "example.com".len());
        assert_eq!(z.match_level("example.com."), "example.com".len());
        assert_eq!(z.match_level("a.other.com"), 0);
        assert_eq!(z.match_level("badexample.com"), 0, "suffix must be a label boundary");
    }

    #[test]
    fn test_match_level_excludes_forwarded_domains() {
        let z = zone("z1", "example.com").with_forwarded_domains(vec!["sub.example.com".into()]);
        assert_eq!(z.match_level("a.sub.example.com"), 0);
        assert_eq!(z.match_level("a.example.com"), 11);
    }

    #[test]
    fn test_best_matching_zone_is_longest() {
        let zones = vec![zone("z1", "example.com"), zone("z2", "sub.example.com")];
        let best = find_best_matching_zone(&zones, "a.sub.example.com").unwrap();
        assert_eq!(best.id(), "z2");
        assert!(find_best_matching_zone(&zones, "other.org").is_none());
    }

    #[test]
    fn test_zones_equivalent() {
        let a = vec![zone("z1", "example.com"), zone("z2", "example.org")];
        let b = vec![zone("z2", "example.org"), zone("z1", "example.com")];
        assert!(are_zones_equivalent(&a, &b), "order must not matter");

        let c = vec![zone("z1", "example.com"), zone("z3", "example.org")];
        assert!(!are_zones_equivalent(&a, &c));
        assert!(!are_zones_equivalent(&a, &a[..1]));

        let mut private = a.clone();
        private[0].is_private = true;
        assert!(
            are_zones_equivalent(&a, &private),
            "only id, key and domain are compared"
        );
    }
}
