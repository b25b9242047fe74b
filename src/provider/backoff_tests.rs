// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;

    #[tokio::test(start_paused = true)]
    async fn test_failures_double_until_max() {
        let backoff = Backoff::default();
        assert!(!backoff.is_backing_off(Instant::now()), "fresh tracker must not back off");

        let waits: Vec<u64> = (0..10).map(|_| backoff.failed().as_secs()).collect();
        assert_eq!(waits, vec![3, 6, 12, 24, 48, 96, 192, 384, 600, 600]);
        assert_eq!(backoff.failures(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backing_off_expires() {
        let backoff = Backoff::new(Duration::from_secs(3), Duration::from_secs(600));
        backoff.failed();
        assert!(backoff.is_backing_off(Instant::now()));
        assert_eq!(backoff.remaining(Instant::now()), Some(Duration::from_secs(3)));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(!backoff.is_backing_off(Instant::now()), "wait must be over after 3s");
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets() {
        let backoff = Backoff::default();
        backoff.failed();
        backoff.failed();
        backoff.succeeded();
        assert!(!backoff.is_backing_off(Instant::now()));
        assert_eq!(backoff.failures(), 0);
        assert_eq!(backoff.failed(), Duration::from_secs(3), "wait restarts at minimum");
    }
}
