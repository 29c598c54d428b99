//! Triggers that invoke a job on a schedule
//!
//! - `CronTrigger`: cron expression evaluated in a configured timezone
//! - `RunOnceTrigger`: a single immediate run, for platform-driven invocations
//!
//! Both stop when the cancellation token fires. A run already in progress is
//! always allowed to finish.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tokio_util::sync::CancellationToken;

/// Upper bound on a single sleep, so wall-clock jumps are noticed within a minute
const POLL_INTERVAL_SECS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
  #[error("Invalid cron expression '{expr}': {reason}")]
  InvalidCron { expr: String, reason: String },

  #[error("Invalid timezone: {0}")]
  InvalidTimezone(String),

  #[error("No upcoming scheduled time for '{0}'")]
  NoUpcomingFire(String),
}

/// Something a trigger can run
#[async_trait]
pub trait ScheduledJob: Send + Sync {
  fn name(&self) -> &'static str;

  async fn run_scheduled(&self);
}

/// Something that invokes a job on a schedule
#[async_trait]
pub trait Trigger: Send + Sync {
  async fn drive(&self, job: Arc<dyn ScheduledJob>, cancel: CancellationToken);
}

/// Parse a standard five-field cron expression
pub fn parse_cron(expr: &str) -> Result<Schedule, ScheduleError> {
  let invalid = |reason: &str| ScheduleError::InvalidCron {
    expr: expr.to_string(),
    reason: reason.to_string(),
  };

  let fields: Vec<&str> = expr.split_whitespace().collect();
  let [minute, hour, day_of_month, month, day_of_week] = fields.as_slice() else {
    return Err(invalid("expected five fields"));
  };
  let day_of_week = convert_day_of_week(day_of_week).map_err(|reason| invalid(&reason))?;

  // The cron crate expects 6 fields (with seconds), but we use 5-field format
  let full_expr = format!(
    "0 {} {} {} {} {}",
    minute, hour, day_of_month, month, day_of_week
  );

  full_expr
    .parse::<Schedule>()
    .map_err(|e| invalid(&e.to_string()))
}

/// Rewrite numeric days from standard cron (0 or 7 = Sunday, 1 = Monday) into
/// the cron crate's numbering (1 = Sunday, 2 = Monday). Numeric items, ranges
/// and steps expand to an explicit list; day names pass through untouched.
fn convert_day_of_week(field: &str) -> Result<String, String> {
  if field == "*" || field == "?" {
    return Ok(field.to_string());
  }

  let mut days = BTreeSet::new();
  let mut named = Vec::new();

  for item in field.split(',') {
    if item.chars().any(|c| c.is_ascii_alphabetic()) {
      named.push(item.to_string());
      continue;
    }

    let (range, step) = match item.split_once('/') {
      Some((range, step)) => {
        let step = step
          .parse::<usize>()
          .ok()
          .filter(|s| *s > 0)
          .ok_or_else(|| format!("invalid day-of-week step '{}'", step))?;
        (range, step)
      }
      None => (item, 1),
    };

    let (start, end) = match range.split_once('-') {
      _ if range == "*" => (0, 6),
      Some((start, end)) => (parse_day(start)?, parse_day(end)?),
      // `n/step` runs from n to the end of the week
      None if step > 1 => (parse_day(range)?, 7),
      None => {
        let day = parse_day(range)?;
        (day, day)
      }
    };
    if start > end {
      return Err(format!("day-of-week range '{}' runs backwards", range));
    }

    for day in (start..=end).step_by(step) {
      days.insert(day % 7 + 1);
    }
  }

  Ok(
    days
      .iter()
      .map(|d| d.to_string())
      .chain(named)
      .collect::<Vec<_>>()
      .join(","),
  )
}

fn parse_day(raw: &str) -> Result<u32, String> {
  raw
    .parse::<u32>()
    .ok()
    .filter(|d| *d <= 7)
    .ok_or_else(|| format!("day-of-week '{}' must be between 0 and 7", raw))
}

/// ---------------------------------------------------------------------------
/// Cron Trigger
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CronTrigger {
  expr: String,
  schedule: Schedule,
  timezone: Tz,
}

impl CronTrigger {
  pub fn new(expr: &str, timezone: &str) -> Result<Self, ScheduleError> {
    let schedule = parse_cron(expr)?;
    let timezone: Tz = timezone
      .parse()
      .map_err(|_| ScheduleError::InvalidTimezone(timezone.to_string()))?;

    let trigger = Self {
      expr: expr.to_string(),
      schedule,
      timezone,
    };

    // Reject expressions that can never fire (e.g. Feb 30th)
    trigger
      .next_fire_after(Utc::now())
      .ok_or_else(|| ScheduleError::NoUpcomingFire(expr.to_string()))?;

    Ok(trigger)
  }

  /// Next fire instant strictly after `after`, in UTC
  pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let after_local = after.with_timezone(&self.timezone);
    self
      .schedule
      .after(&after_local)
      .next()
      .map(|next| next.with_timezone(&Utc))
  }
}

#[async_trait]
impl Trigger for CronTrigger {
  async fn drive(&self, job: Arc<dyn ScheduledJob>, cancel: CancellationToken) {
    let mut next = match self.next_fire_after(Utc::now()) {
      Some(next) => next,
      None => {
        tracing::error!(expr = %self.expr, "Schedule has no upcoming fire time");
        return;
      }
    };
    tracing::info!(
      job = job.name(),
      expr = %self.expr,
      timezone = %self.timezone,
      next_run = %next.to_rfc3339(),
      "Scheduler started"
    );

    loop {
      let now = Utc::now();

      if now >= next {
        tracing::info!(job = job.name(), scheduled_for = %next.to_rfc3339(), "Running scheduled job");
        job.run_scheduled().await;

        next = match self.next_fire_after(Utc::now()) {
          Some(next) => next,
          None => {
            tracing::warn!(expr = %self.expr, "Schedule exhausted, stopping");
            return;
          }
        };
        tracing::info!(job = job.name(), next_run = %next.to_rfc3339(), "Next run scheduled");
        continue;
      }

      let wait = (next - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
        .min(Duration::from_secs(POLL_INTERVAL_SECS));

      tokio::select! {
        _ = cancel.cancelled() => {
          tracing::info!(job = job.name(), "Scheduler stopped");
          return;
        }
        _ = tokio::time::sleep(wait) => {}
      }
    }
  }
}

/// ---------------------------------------------------------------------------
/// Run-Once Trigger
/// ---------------------------------------------------------------------------

/// Runs the job a single time, right away
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOnceTrigger;

#[async_trait]
impl Trigger for RunOnceTrigger {
  async fn drive(&self, job: Arc<dyn ScheduledJob>, cancel: CancellationToken) {
    if cancel.is_cancelled() {
      tracing::info!(job = job.name(), "Cancelled before run");
      return;
    }
    tracing::info!(job = job.name(), "Running job once");
    job.run_scheduled().await;
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
