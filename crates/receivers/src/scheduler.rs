//! Scheduler receiver: fires a [`crate::TriggerEvent`] at each instant a
//! 5-field cron expression (`minute hour day-of-month month
//! day-of-week`) matches, optionally evaluated against an IANA
//! timezone rather than UTC.
//!
//! `source_id` on the emitted event is the cron expression itself,
//! `event_type` is always `schedule_due`, `provider_id` is
//! `scheduler`. A receiver refuses to start on a parse error rather
//! than silently never firing. Fires missed while the process was down
//! are not replayed — this is an at-most-once source, per spec.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;

use crate::error::ReceiverError;
use crate::{Emit, Receiver, TriggerEvent};

/// A parsed 5-field cron expression, evaluated in `tz` (default UTC).
#[derive(Debug, Clone)]
pub struct CronSchedule {
    minutes: HashSet<u32>,
    hours: HashSet<u32>,
    days_of_month: HashSet<u32>,
    months: HashSet<u32>,
    days_of_week: HashSet<u32>,
    tz: Tz,
    expression: String,
}

impl CronSchedule {
    /// Parses a standard 5-field cron expression. `timezone` is an IANA
    /// name (e.g. `"Europe/Moscow"`); `None` means UTC.
    pub fn parse(expression: &str, timezone: Option<&str>) -> Result<Self, ReceiverError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ReceiverError::Config(format!(
                "cron expression {expression:?} must have 5 fields (minute hour dom month dow), found {}",
                fields.len()
            )));
        }

        let tz = match timezone {
            Some(name) => name.parse::<Tz>().map_err(|_| ReceiverError::Config(format!("unknown timezone {name:?}")))?,
            None => Tz::UTC,
        };

        Ok(Self {
            minutes: parse_field(fields[0], 0, 59)?,
            hours: parse_field(fields[1], 0, 23)?,
            days_of_month: parse_field(fields[2], 1, 31)?,
            months: parse_field(fields[3], 1, 12)?,
            days_of_week: parse_field(fields[4], 0, 6)?,
            tz,
            expression: expression.to_string(),
        })
    }

    fn matches(&self, when: &DateTime<Tz>) -> bool {
        self.minutes.contains(&when.minute())
            && self.hours.contains(&when.hour())
            && self.months.contains(&when.month())
            && self.days_of_month.contains(&when.day())
            && self.days_of_week.contains(&(when.weekday().num_days_from_sunday()))
    }

    /// The next instant strictly after `after` (UTC) that this schedule
    /// matches, searched minute-by-minute up to two years out. `None`
    /// means no match was found in that horizon (an unsatisfiable
    /// expression, e.g. `* * 30 2 *`).
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&self.tz);
        let mut candidate = (local + ChronoDuration::minutes(1))
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))?;

        let horizon = local + ChronoDuration::days(366 * 2);
        while candidate < horizon {
            if self.matches(&candidate) {
                return Some(candidate.with_timezone(&Utc));
            }
            candidate += ChronoDuration::minutes(1);
        }
        None
    }
}

fn parse_field(raw: &str, min: u32, max: u32) -> Result<HashSet<u32>, ReceiverError> {
    let mut values = HashSet::new();
    for part in raw.split(',') {
        let (range_part, step) = match part.split_once('/') {
            Some((r, s)) => (r, s.parse::<u32>().map_err(|_| ReceiverError::Config(format!("bad step in {raw:?}")))?),
            None => (part, 1),
        };
        let (lo, hi) = if range_part == "*" {
            (min, max)
        } else if let Some((a, b)) = range_part.split_once('-') {
            let a: u32 = a.parse().map_err(|_| ReceiverError::Config(format!("bad range in {raw:?}")))?;
            let b: u32 = b.parse().map_err(|_| ReceiverError::Config(format!("bad range in {raw:?}")))?;
            (a, b)
        } else {
            let v: u32 = range_part.parse().map_err(|_| ReceiverError::Config(format!("bad value in {raw:?}")))?;
            (v, v)
        };
        if lo > hi || hi > max || lo < min || step == 0 {
            return Err(ReceiverError::Config(format!("field {raw:?} out of range [{min}, {max}]")));
        }
        let mut v = lo;
        while v <= hi {
            values.insert(v);
            v += step;
        }
    }
    if values.is_empty() {
        return Err(ReceiverError::Config(format!("field {raw:?} matched no values")));
    }
    Ok(values)
}

/// One running schedule, identified by its own cron expression.
pub struct SchedulerReceiver {
    schedule: CronSchedule,
}

impl SchedulerReceiver {
    pub fn new(schedule: CronSchedule) -> Self {
        Self { schedule }
    }
}

#[async_trait]
impl Receiver for SchedulerReceiver {
    async fn start(&self, cancellation: CancellationToken, emit: Arc<dyn Emit>) -> Result<(), ReceiverError> {
        loop {
            let now = Utc::now();
            let Some(next) = self.schedule.next_after(now) else {
                return Err(ReceiverError::Config(format!(
                    "cron expression {:?} never matches within the search horizon",
                    self.schedule.expression
                )));
            };
            let wait = (next - now).to_std().unwrap_or_default();

            tokio::select! {
                _ = cancellation.cancelled() => return Ok(()),
                _ = tokio::time::sleep(wait) => {}
            }

            let event = TriggerEvent {
                id: uuid_like_id(),
                source_id: self.schedule.expression.clone(),
                provider_id: "scheduler".to_string(),
                event_type: "schedule_due".to_string(),
                data: serde_json::Value::Null,
                emitted_at: Utc::now(),
            };
            emit.emit(event).await?;
        }
    }
}

fn uuid_like_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    #[test]
    fn every_minute_matches_every_minute() {
        let schedule = CronSchedule::parse("* * * * *", None).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 12, 30, 0).unwrap();
        let next = schedule.next_after(after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 12, 31, 0).unwrap());
    }

    #[test]
    fn hourly_on_the_hour() {
        let schedule = CronSchedule::parse("0 * * * *", None).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 12, 5, 0).unwrap();
        let next = schedule.next_after(after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 13, 0, 0).unwrap());
    }

    #[test]
    fn step_values_are_honored() {
        let schedule = CronSchedule::parse("*/15 * * * *", None).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 12, 1, 0).unwrap();
        let next = schedule.next_after(after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 12, 15, 0).unwrap());
    }

    #[test]
    fn unsatisfiable_expression_returns_none() {
        let schedule = CronSchedule::parse("0 0 30 2 *", None).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(schedule.next_after(after).is_none());
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        assert!(CronSchedule::parse("* * *", None).is_err());
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        assert!(CronSchedule::parse("* * * * *", Some("Not/AZone")).is_err());
    }

    #[tokio::test]
    async fn start_emits_on_cancellation_boundary() {
        use crate::test_support::RecordingEmitter;
        let schedule = CronSchedule::parse("* * * * *", None).unwrap();
        let receiver = SchedulerReceiver::new(schedule);
        let emitter = Arc::new(RecordingEmitter::default());
        let token = CancellationToken::new();
        token.cancel();
        let result = receiver.start(token, emitter).await;
        assert!(result.is_ok());
    }
}
