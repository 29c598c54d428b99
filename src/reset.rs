//! Weekly gym time reset
//!
//! A linear pipeline run once per trigger fire:
//! - fetch every user record
//! - stage a reset for each user with positive weekly gym time
//! - commit the staged resets as one atomic batch
//! - report the outcome
//!
//! A fetch failure or an empty collection ends the run early with no result.

use crate::models::{ResetReport, StagedReset, UserRecord};
use crate::scheduler::ScheduledJob;
use crate::store::UserStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Stage a reset for every record whose weekly gym time (missing counts as
/// zero) is above zero. All staged resets share the same `now`.
pub fn stage_resets(users: &[UserRecord], now: DateTime<Utc>) -> Vec<StagedReset> {
  users
    .iter()
    .filter(|user| user.needs_reset())
    .map(|user| StagedReset {
      user_id: user.id.clone(),
      reset_at: now,
    })
    .collect()
}

pub struct WeeklyResetJob {
  store: Arc<dyn UserStore>,
  // Held for the whole run so overlapping invocations on this instance back off
  running: Mutex<()>,
}

impl WeeklyResetJob {
  pub fn new(store: Arc<dyn UserStore>) -> Self {
    Self {
      store,
      running: Mutex::new(()),
    }
  }

  /// Run the reset with the timestamp captured now
  pub async fn run(&self) -> Option<ResetReport> {
    self.run_at(Utc::now()).await
  }

  pub async fn run_at(&self, now: DateTime<Utc>) -> Option<ResetReport> {
    let Ok(_guard) = self.running.try_lock() else {
      tracing::warn!("Weekly gym time reset already in progress, skipping this invocation");
      return None;
    };

    tracing::info!(backend = self.store.backend(), "Weekly gym time reset started");

    let users = match self.store.fetch_users().await {
      Ok(users) => users,
      Err(e) => {
        tracing::error!(error = %e, "Error fetching users collection");
        return None;
      }
    };
    tracing::info!(count = users.len(), "Found user documents to process");

    if users.is_empty() {
      tracing::info!("No user documents found, skipping reset");
      return None;
    }

    let staged = stage_resets(&users, now);

    if staged.is_empty() {
      tracing::info!("No users had positive weeklyGymTime, no updates committed");
      tracing::info!("Weekly gym time reset finished successfully");
      return Some(ResetReport::reset(0));
    }

    match self.store.commit_resets(&staged).await {
      Ok(()) => {
        tracing::info!(users_reset = staged.len(), "Reset weeklyGymTime");
        tracing::info!("Weekly gym time reset finished successfully");
        Some(ResetReport::reset(staged.len()))
      }
      Err(e) => {
        tracing::error!(error = %e, "Error committing batch update for weekly gym time reset");
        Some(ResetReport::failed(e.to_string()))
      }
    }
  }
}

#[async_trait]
impl ScheduledJob for WeeklyResetJob {
  fn name(&self) -> &'static str {
    "weekly-gym-time-reset"
  }

  async fn run_scheduled(&self) {
    match self.run().await {
      Some(report) => tracing::info!(result = %report.to_json(), "Reset run complete"),
      None => tracing::info!("Reset run ended without a result"),
    }
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
