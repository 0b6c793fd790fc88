//! Timestamp utilities

use chrono::{DateTime, NaiveDate, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current calendar date in UTC
pub fn today_utc() -> NaiveDate {
    now().date_naive()
}

/// Convert seconds to duration
pub fn secs_to_duration(secs: u64) -> std::time::Duration {
    std::time::Duration::from_secs(secs)
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // After 2000-01-01 00:00:00 UTC
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_today_matches_now() {
        let today = today_utc();
        let stamp = now();
        // Could cross midnight between the two calls, allow one day
        let diff = (stamp.date_naive() - today).num_days();
        assert!((0..=1).contains(&diff));
    }

    #[test]
    fn test_secs_to_duration() {
        assert_eq!(secs_to_duration(5), Duration::from_secs(5));
        assert_eq!(secs_to_duration(0), Duration::ZERO);
    }

    #[test]
    fn test_millis_to_duration() {
        assert_eq!(millis_to_duration(1000), Duration::from_secs(1));
        assert_eq!(millis_to_duration(100).as_millis(), 100);
    }
}
