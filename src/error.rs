use crate::config::ConfigError;
use crate::scheduler::ScheduleError;

/// Errors that stop the service before the first run
#[derive(Debug, thiserror::Error)]
pub enum AppError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("Failed to initialize database: {0}")]
  Database(#[from] sqlx::Error),

  #[error(transparent)]
  Schedule(#[from] ScheduleError),
}
