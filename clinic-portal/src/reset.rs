//! Daily reset
//!
//! At a fixed local wall-clock time the store drops its collection and the
//! mirror. A portal that was not running at the trigger catches up on start.

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use clinic_common::time::duration_until;
use std::sync::Arc;
use tracing::{debug, info};

use crate::store::ScheduleStore;
use crate::task::TaskHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetPolicy {
    trigger: NaiveTime,
}

impl ResetPolicy {
    pub fn new(trigger: NaiveTime) -> Self {
        Self { trigger }
    }

    pub fn trigger(&self) -> NaiveTime {
        self.trigger
    }

    /// Trigger instant on the calendar day of `now`
    pub fn trigger_on<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let naive = now.date_naive().and_time(self.trigger);
        let tz = now.timezone();
        // Inside a DST gap there is no such local time; step past the gap
        tz.from_local_datetime(&naive)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(naive + chrono::Duration::hours(1))).earliest())
            .unwrap_or_else(|| tz.from_utc_datetime(&naive))
    }

    /// Due when today's trigger has passed and no reset happened since
    pub fn is_due<Tz: TimeZone>(&self, now: &DateTime<Tz>, last_reset: Option<DateTime<Utc>>) -> bool {
        let today = self.trigger_on(now);
        if *now < today {
            return false;
        }
        let today = today.with_timezone(&Utc);
        last_reset.map_or(true, |at| at < today)
    }

    /// First trigger strictly after `now`
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let today = self.trigger_on(now);
        if today > *now {
            return today;
        }
        let tomorrow = now.clone() + chrono::Duration::days(1);
        self.trigger_on(&tomorrow)
    }
}

/// Reset now if a trigger passed while nobody was watching.
///
/// The recorded watermark is the missed trigger instant, so records created
/// after it stay visible. Returns true if the store was reset.
pub async fn run_startup_check<Tz: TimeZone>(
    store: &ScheduleStore,
    policy: &ResetPolicy,
    now: DateTime<Tz>,
) -> bool {
    let last_reset = store.last_reset().await;
    if policy.is_due(&now, last_reset) {
        info!(
            "Missed daily reset at {} (last reset {:?}), resetting now",
            policy.trigger(),
            last_reset
        );
        store.reset(policy.trigger_on(&now).with_timezone(&Utc)).await;
        true
    } else {
        debug!("No catch-up reset needed");
        false
    }
}

/// Reset at every local trigger until the handle is dropped
pub fn spawn_daily_reset(store: Arc<ScheduleStore>, policy: ResetPolicy) -> TaskHandle {
    TaskHandle::spawn("daily-reset", move |token| async move {
        loop {
            let now = Local::now();
            let next = policy.next_after(&now);
            let wait = duration_until(&now, &next);
            info!("Next daily reset at {} (in {:?})", next, wait);

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(wait) => {
                    store.reset(next.with_timezone(&Utc)).await;
                }
            }
        }
        debug!("Daily reset timer stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ResetPolicy {
        ResetPolicy::new(NaiveTime::from_hms_opt(3, 0, 0).unwrap())
    }

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, d, h, m, 0).unwrap()
    }

    #[test]
    fn test_not_due_before_trigger() {
        assert!(!policy().is_due(&at(2, 2, 59), None));
    }

    #[test]
    fn test_due_after_trigger_without_reset_today() {
        assert!(policy().is_due(&at(2, 3, 10), None));
        assert!(policy().is_due(&at(2, 3, 10), Some(at(1, 3, 0))));
        assert!(policy().is_due(&at(2, 3, 0), Some(at(1, 9, 0))));
    }

    #[test]
    fn test_not_due_when_already_reset_today() {
        assert!(!policy().is_due(&at(2, 14, 0), Some(at(2, 3, 0))));
        assert!(!policy().is_due(&at(2, 14, 0), Some(at(2, 8, 30))));
    }

    #[test]
    fn test_next_after() {
        assert_eq!(policy().next_after(&at(2, 1, 0)), at(2, 3, 0));
        assert_eq!(policy().next_after(&at(2, 3, 0)), at(3, 3, 0));
        assert_eq!(policy().next_after(&at(2, 22, 0)), at(3, 3, 0));
    }
}
