//! Staleness policy — when may a cached value be reused without asking
//! the provider again.

use std::time::Duration;

use extmetrics_core::ExternalMetricValue;

/// A record is fresh iff it is valid and no older than `max_age` at `now`.
///
/// A zero `max_age` makes every record stale.
pub fn is_fresh(record: &ExternalMetricValue, max_age: Duration, now: i64) -> bool {
    if !record.valid || max_age.is_zero() {
        return false;
    }
    let max_age = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
    now.saturating_sub(record.timestamp) <= max_age
}

#[cfg(test)]
mod tests {
    use super::*;
    use extmetrics_core::{Labels, ObjectReference};

    fn record(valid: bool, timestamp: i64) -> ExternalMetricValue {
        let mut record = ExternalMetricValue::new(
            "requests",
            Labels::new(),
            ObjectReference {
                name: "api".to_string(),
                namespace: "default".to_string(),
                uid: "uid-1".to_string(),
            },
            timestamp,
        );
        record.valid = valid;
        record
    }

    #[test]
    fn boundary_age_is_fresh() {
        let max_age = Duration::from_secs(120);
        let now = 10_000;
        assert!(is_fresh(&record(true, now - 120), max_age, now));
        assert!(!is_fresh(&record(true, now - 121), max_age, now));
    }

    #[test]
    fn invalid_record_is_never_fresh() {
        assert!(!is_fresh(&record(false, 10_000), Duration::from_secs(120), 10_000));
    }

    #[test]
    fn zero_max_age_is_never_fresh() {
        assert!(!is_fresh(&record(true, 10_000), Duration::ZERO, 10_000));
    }

    #[test]
    fn timestamp_ahead_of_clock_is_fresh() {
        assert!(is_fresh(&record(true, 10_050), Duration::from_secs(10), 10_000));
    }
}
