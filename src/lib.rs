pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod reset;
pub mod scheduler;
pub mod store;

#[cfg(test)]
mod test_utils;

use config::{AppConfig, StoreConfig};
use error::AppError;
use reset::WeeklyResetJob;
use scheduler::{CronTrigger, RunOnceTrigger, Trigger};
use std::sync::Arc;
use store::{FirestoreUserStore, SqliteUserStore, UserStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  // Ignore the error if a subscriber is already installed
  let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Build the store once; the job receives it by injection
async fn build_store(config: &StoreConfig) -> Result<Arc<dyn UserStore>, AppError> {
  match config {
    StoreConfig::Sqlite { database_url } => {
      let pool = db::initialize_db(database_url).await?;
      Ok(Arc::new(SqliteUserStore::new(pool)))
    }
    StoreConfig::Firestore(firestore) => {
      tracing::info!(
        project_id = %firestore.project_id,
        collection = %firestore.collection,
        "Using Firestore user store"
      );
      Ok(Arc::new(FirestoreUserStore::new(firestore.clone())))
    }
  }
}

pub async fn run() -> Result<(), AppError> {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();
  init_tracing();

  let config = AppConfig::from_env()?;

  // Validate the schedule before touching the store
  let trigger: Box<dyn Trigger> = if config.run_once {
    Box::new(RunOnceTrigger)
  } else {
    Box::new(CronTrigger::new(&config.schedule, &config.timezone)?)
  };

  let store = build_store(&config.store).await?;
  let job = Arc::new(WeeklyResetJob::new(store));

  let cancel = CancellationToken::new();
  tokio::spawn({
    let cancel = cancel.clone();
    async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Shutdown requested");
        cancel.cancel();
      }
    }
  });

  trigger.drive(job, cancel).await;
  Ok(())
}
