//! Cron-like periodic orchestrator with one-second resolution.
//!
//! Schedule expressions are either six cron fields
//! (`sec min hour dom month dow`) or the `@every Ns|Nm|Nh` shorthand. Every
//! field supports `*`, steps (`*/5`), ranges (`1-5`), and lists (`1,15,45`).
//! All six fields are ANDed against the UTC wall clock.

use crate::application::jobs::{Job, JobRunner};
use crate::domain::errors::ValidationError;
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
enum Field {
    Any,
    Values(BTreeSet<u32>),
}

impl Field {
    fn matches(&self, value: u32) -> bool {
        match self {
            Field::Any => true,
            Field::Values(values) => values.contains(&value),
        }
    }
}

fn parse_field(input: &str, min: u32, max: u32) -> Result<Field, ValidationError> {
    if input == "*" {
        return Ok(Field::Any);
    }

    let mut values = BTreeSet::new();
    for part in input.split(',') {
        let (range_part, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step.parse().map_err(|_| invalid(input))?;
                if step == 0 {
                    return Err(invalid(input));
                }
                (range, step)
            }
            None => (part, 1),
        };

        let (start, end) = if range_part == "*" {
            (min, max)
        } else if let Some((a, b)) = range_part.split_once('-') {
            (
                a.parse().map_err(|_| invalid(input))?,
                b.parse().map_err(|_| invalid(input))?,
            )
        } else {
            let value: u32 = range_part.parse().map_err(|_| invalid(input))?;
            // A bare value with a step ("5/15") walks up from the value.
            if step > 1 {
                (value, max)
            } else {
                (value, value)
            }
        };

        if start < min || end > max || start > end {
            return Err(invalid(input));
        }
        let mut value = start;
        while value <= end {
            values.insert(value);
            value += step;
        }
    }
    Ok(Field::Values(values))
}

fn invalid(expr: &str) -> ValidationError {
    ValidationError::Invalid {
        reason: format!("invalid schedule field: {}", expr),
    }
}

/// A parsed schedule: fixed interval or six-field cron.
#[derive(Debug, Clone, PartialEq)]
pub enum Schedule {
    Every(Duration),
    Cron {
        second: Field,
        minute: Field,
        hour: Field,
        day_of_month: Field,
        month: Field,
        day_of_week: Field,
    },
}

impl Schedule {
    pub fn parse(expression: &str) -> Result<Self, ValidationError> {
        let expression = expression.trim();

        if let Some(interval) = expression.strip_prefix("@every ") {
            let interval = interval.trim();
            let (digits, unit) = interval.split_at(
                interval
                    .find(|c: char| !c.is_ascii_digit())
                    .ok_or_else(|| invalid(expression))?,
            );
            let amount: u64 = digits.parse().map_err(|_| invalid(expression))?;
            if amount == 0 {
                return Err(invalid(expression));
            }
            let duration = match unit {
                "s" => Duration::from_secs(amount),
                "m" => Duration::from_secs(amount * 60),
                "h" => Duration::from_secs(amount * 3600),
                _ => return Err(invalid(expression)),
            };
            return Ok(Schedule::Every(duration));
        }

        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(ValidationError::Invalid {
                reason: format!(
                    "schedule needs 6 fields (sec min hour dom month dow), got {}",
                    fields.len()
                ),
            });
        }
        Ok(Schedule::Cron {
            second: parse_field(fields[0], 0, 59)?,
            minute: parse_field(fields[1], 0, 59)?,
            hour: parse_field(fields[2], 0, 23)?,
            day_of_month: parse_field(fields[3], 1, 31)?,
            month: parse_field(fields[4], 1, 12)?,
            day_of_week: parse_field(fields[5], 0, 6)?,
        })
    }

    /// Whether the schedule fires at `now` (cron) or at `elapsed` whole
    /// seconds since start (interval).
    pub fn is_due(&self, now: DateTime<Utc>, elapsed_seconds: u64) -> bool {
        match self {
            Schedule::Every(interval) => {
                let secs = interval.as_secs().max(1);
                elapsed_seconds > 0 && elapsed_seconds % secs == 0
            }
            Schedule::Cron {
                second,
                minute,
                hour,
                day_of_month,
                month,
                day_of_week,
            } => {
                second.matches(now.second())
                    && minute.matches(now.minute())
                    && hour.matches(now.hour())
                    && day_of_month.matches(now.day())
                    && month.matches(now.month())
                    && day_of_week.matches(now.weekday().num_days_from_sunday())
            }
        }
    }
}

/// The periodic orchestrator: ticks once a second, fires every due job on
/// its own task, and drains in-flight jobs on shutdown.
pub struct Scheduler {
    entries: Vec<(Schedule, Arc<dyn Job>)>,
    runner: Arc<JobRunner>,
    grace_period: Duration,
}

impl Scheduler {
    pub fn new(runner: Arc<JobRunner>, grace_period: Duration) -> Self {
        Self {
            entries: Vec::new(),
            runner,
            grace_period,
        }
    }

    pub fn register(
        &mut self,
        expression: &str,
        job: Arc<dyn Job>,
    ) -> Result<(), ValidationError> {
        let schedule = Schedule::parse(expression)?;
        info!(job = job.name(), %expression, "job registered");
        self.entries.push((schedule, job));
        Ok(())
    }

    /// Run until the shutdown signal flips, then wait up to the grace period
    /// for in-flight jobs.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut in_flight: JoinSet<()> = JoinSet::new();
        let mut elapsed_seconds: u64 = 0;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    elapsed_seconds += 1;
                    let now = Utc::now();
                    for (schedule, job) in &self.entries {
                        if schedule.is_due(now, elapsed_seconds) {
                            let runner = self.runner.clone();
                            let job = job.clone();
                            in_flight.spawn(async move {
                                runner.run_job(job).await;
                            });
                        }
                    }
                    // Reap completed firings so the set stays small.
                    while in_flight.try_join_next().is_some() {}
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(
            in_flight = in_flight.len(),
            "scheduler stopping, draining in-flight jobs"
        );
        let drain = async {
            while in_flight.join_next().await.is_some() {}
        };
        if tokio::time::timeout(self.grace_period, drain).await.is_err() {
            warn!("grace period expired with jobs still running, abandoning them");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::TimeZone;

    #[test]
    fn test_every_shorthand() {
        assert_eq!(
            Schedule::parse("@every 30s").unwrap(),
            Schedule::Every(Duration::from_secs(30))
        );
        assert_eq!(
            Schedule::parse("@every 5m").unwrap(),
            Schedule::Every(Duration::from_secs(300))
        );
        assert_eq!(
            Schedule::parse("@every 6h").unwrap(),
            Schedule::Every(Duration::from_secs(21600))
        );
        assert!(Schedule::parse("@every 5x").is_err());
        assert!(Schedule::parse("@every 0s").is_err());
    }

    #[test]
    fn test_interval_due_points() {
        let schedule = Schedule::parse("@every 30s").unwrap();
        let now = Utc::now();
        assert!(!schedule.is_due(now, 0));
        assert!(!schedule.is_due(now, 29));
        assert!(schedule.is_due(now, 30));
        assert!(schedule.is_due(now, 60));
    }

    #[test]
    fn test_cron_field_parsing() {
        assert!(Schedule::parse("0 */5 * * * *").is_ok());
        assert!(Schedule::parse("0 30 5 * * *").is_ok());
        assert!(Schedule::parse("0,30 * * * * 1-5").is_ok());
        // Five fields is classic cron, not this scheduler.
        assert!(Schedule::parse("* * * * *").is_err());
        assert!(Schedule::parse("99 * * * * *").is_err());
        assert!(Schedule::parse("* * 5-2 * * *").is_err());
    }

    #[test]
    fn test_cron_matching() {
        // Tuesday 2026-01-20 05:30:00 UTC.
        let at = Utc.with_ymd_and_hms(2026, 1, 20, 5, 30, 0).unwrap();
        assert!(Schedule::parse("0 30 5 * * *").unwrap().is_due(at, 1));
        assert!(Schedule::parse("* * * * * 2").unwrap().is_due(at, 1));
        assert!(!Schedule::parse("0 30 5 * * 0").unwrap().is_due(at, 1));
        assert!(!Schedule::parse("1 30 5 * * *").unwrap().is_due(at, 1));
    }

    #[test]
    fn test_cron_step_fields() {
        let every_15s = Schedule::parse("*/15 * * * * *").unwrap();
        for second in [0u32, 15, 30, 45] {
            let at = Utc.with_ymd_and_hms(2026, 1, 20, 5, 30, second).unwrap();
            assert!(every_15s.is_due(at, 1), "second {}", second);
        }
        let at = Utc.with_ymd_and_hms(2026, 1, 20, 5, 30, 7).unwrap();
        assert!(!every_15s.is_due(at, 1));
    }

    struct TickJob {
        ticks: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl Job for TickJob {
        fn name(&self) -> &'static str {
            "tick"
        }

        async fn run(&self) -> Result<()> {
            self.ticks
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_scheduler_fires_and_shuts_down() {
        use crate::application::locks::LockManager;
        use crate::domain::errors::StoreKind;
        use crate::infrastructure::persistence::database::Store;
        use crate::infrastructure::persistence::repositories::LockRepository;

        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("locks.db"), StoreKind::Locks)
            .await
            .unwrap();
        let locks = Arc::new(LockManager::new(LockRepository::new(store)));
        let runner = Arc::new(JobRunner::new(locks));

        let job = Arc::new(TickJob {
            ticks: std::sync::atomic::AtomicU32::new(0),
        });
        let mut scheduler = Scheduler::new(runner, Duration::from_secs(2));
        scheduler.register("@every 1s", job.clone()).unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let ticks = job.ticks.load(std::sync::atomic::Ordering::SeqCst);
        assert!(ticks >= 1, "expected at least one firing, got {}", ticks);
    }

    #[tokio::test]
    async fn test_unknown_expression_is_rejected_at_registration() {
        use crate::application::locks::LockManager;
        use crate::domain::errors::StoreKind;
        use crate::infrastructure::persistence::database::Store;
        use crate::infrastructure::persistence::repositories::LockRepository;

        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("locks.db"), StoreKind::Locks)
            .await
            .unwrap();
        let locks = Arc::new(LockManager::new(LockRepository::new(store)));
        let mut scheduler = Scheduler::new(
            Arc::new(JobRunner::new(locks)),
            Duration::from_secs(1),
        );

        let job = Arc::new(TickJob {
            ticks: std::sync::atomic::AtomicU32::new(0),
        });
        assert!(scheduler.register("whenever", job).is_err());
    }
}
