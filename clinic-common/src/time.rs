//! Timestamp utilities

use chrono::DateTime;

/// Wall time from `from` until `to`, zero if `to` is not in the future
pub fn duration_until<Tz: chrono::TimeZone>(from: &DateTime<Tz>, to: &DateTime<Tz>) -> std::time::Duration {
    (to.clone() - from.clone()).to_std().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    #[test]
    fn test_duration_until_future_and_past() {
        let a = Utc.with_ymd_and_hms(2025, 3, 2, 2, 50, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 3, 2, 3, 0, 0).unwrap();
        assert_eq!(duration_until(&a, &b), Duration::from_secs(600));
        assert_eq!(duration_until(&b, &a), Duration::ZERO);
    }
}
