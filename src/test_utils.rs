//! Test utilities and helpers for unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - Seed and lookup helpers for the users table
//! - An in-memory user store with failure injection
//! - Time helpers

use crate::db::DbPool;
use crate::models::{StagedReset, UserRecord};
use crate::store::{StoreError, UserStore};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> DbPool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: DbPool) {
  pool.close().await;
}

/// Seed the users table with `(id, weekly_gym_time)` pairs
pub async fn seed_test_users(pool: &DbPool, users: &[(&str, Option<f64>)]) {
  for (id, weekly_gym_time) in users {
    sqlx::query("INSERT INTO users (id, weekly_gym_time) VALUES (?1, ?2)")
      .bind(*id)
      .bind(*weekly_gym_time)
      .execute(pool)
      .await
      .expect("Failed to seed test user");
  }
}

pub async fn load_test_user(pool: &DbPool, id: &str) -> UserRecord {
  sqlx::query_as::<_, UserRecord>(
    "SELECT id, weekly_gym_time, last_weekly_reset_date FROM users WHERE id = ?1",
  )
  .bind(id)
  .fetch_one(pool)
  .await
  .expect("Failed to load test user")
}

/// ---------------------------------------------------------------------------
/// Mock Store
/// ---------------------------------------------------------------------------

/// In-memory user store that counts calls and can be told to fail.
/// A failed commit leaves every record untouched.
#[derive(Default)]
pub struct MockUserStore {
  users: Mutex<Vec<UserRecord>>,
  fetch_error: Mutex<Option<String>>,
  commit_error: Mutex<Option<String>>,
  fetch_calls: AtomicUsize,
  commit_calls: AtomicUsize,
}

impl MockUserStore {
  pub fn with_users(users: Vec<UserRecord>) -> Self {
    Self {
      users: Mutex::new(users),
      ..Default::default()
    }
  }

  pub fn fail_fetch(&self, message: &str) {
    *self.fetch_error.lock().unwrap() = Some(message.to_string());
  }

  pub fn fail_commit(&self, message: &str) {
    *self.commit_error.lock().unwrap() = Some(message.to_string());
  }

  pub fn users(&self) -> Vec<UserRecord> {
    self.users.lock().unwrap().clone()
  }

  pub fn fetch_calls(&self) -> usize {
    self.fetch_calls.load(Ordering::SeqCst)
  }

  pub fn commit_calls(&self) -> usize {
    self.commit_calls.load(Ordering::SeqCst)
  }
}

fn unavailable(message: &str) -> StoreError {
  StoreError::Api {
    status: 503,
    message: message.to_string(),
  }
}

#[async_trait]
impl UserStore for MockUserStore {
  fn backend(&self) -> &'static str {
    "mock"
  }

  async fn fetch_users(&self) -> Result<Vec<UserRecord>, StoreError> {
    self.fetch_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(message) = self.fetch_error.lock().unwrap().as_deref() {
      return Err(unavailable(message));
    }
    Ok(self.users())
  }

  async fn commit_resets(&self, resets: &[StagedReset]) -> Result<(), StoreError> {
    self.commit_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(message) = self.commit_error.lock().unwrap().as_deref() {
      return Err(unavailable(message));
    }

    let mut users = self.users.lock().unwrap();
    if let Some(missing) = resets
      .iter()
      .find(|r| !users.iter().any(|u| u.id == r.user_id))
    {
      return Err(StoreError::MissingDocument(missing.user_id.clone()));
    }

    for reset in resets {
      if let Some(user) = users.iter_mut().find(|u| u.id == reset.user_id) {
        user.weekly_gym_time = Some(0.0);
        user.last_weekly_reset_date = Some(reset.reset_at);
      }
    }
    Ok(())
  }
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

pub fn mock_user(id: &str, weekly_gym_time: Option<f64>) -> UserRecord {
  UserRecord {
    id: id.to_string(),
    weekly_gym_time,
    last_weekly_reset_date: None,
  }
}

/// ---------------------------------------------------------------------------
/// Time Helpers
/// ---------------------------------------------------------------------------

/// Monday 2026-10-19 00:00:00 UTC, a regular fire instant of the weekly schedule
pub fn fixed_reset_time() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap()
}

/// Create a DateTime N days ago from now
pub fn datetime_days_ago(days: i64) -> DateTime<Utc> {
  Utc::now() - Duration::days(days)
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_users_table() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> =
      sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name = 'users'")
        .fetch_all(&pool)
        .await
        .expect("Failed to query tables");

    assert_eq!(tables.len(), 1);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_seed_users_returns_correct_count() {
    let pool = setup_test_db().await;

    seed_test_users(&pool, &[("a", Some(1.0)), ("b", None)]).await;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
      .fetch_one(&pool)
      .await
      .expect("Failed to count users");
    assert_eq!(count, 2);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_mock_store_rejects_batch_with_missing_document() {
    let store = MockUserStore::with_users(vec![mock_user("a", Some(4.0))]);
    let now = fixed_reset_time();

    let result = store
      .commit_resets(&[
        StagedReset {
          user_id: "a".to_string(),
          reset_at: now,
        },
        StagedReset {
          user_id: "ghost".to_string(),
          reset_at: now,
        },
      ])
      .await;

    assert!(result.is_err());
    assert_eq!(store.users()[0].weekly_gym_time, Some(4.0));
  }
}
