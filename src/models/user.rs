use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user document as the reset job sees it.
///
/// Only the two fields the job touches are modelled; everything else on the
/// document is owned by the application and left alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
  pub id: String,
  pub weekly_gym_time: Option<f64>,
  pub last_weekly_reset_date: Option<DateTime<Utc>>,
}

impl UserRecord {
  /// Current weekly gym time, with a missing value counted as zero
  pub fn current_weekly_gym_time(&self) -> f64 {
    self.weekly_gym_time.unwrap_or(0.0)
  }

  pub fn needs_reset(&self) -> bool {
    self.current_weekly_gym_time() > 0.0
  }
}

/// An update computed during the filter pass but not yet sent to the store.
/// Applying it sets `weeklyGymTime = 0` and `lastWeeklyResetDate = reset_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedReset {
  pub user_id: String,
  pub reset_at: DateTime<Utc>,
}
