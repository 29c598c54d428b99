//! Document store surface consumed by the reset job
//!
//! The job only ever needs two operations:
//! - read every user document in the collection
//! - apply a set of staged resets as one atomic batch
//!
//! Adapters live in the submodules; the job holds an `Arc<dyn UserStore>`
//! built once at startup.

pub mod firestore;
pub mod sqlite;

use crate::models::{StagedReset, UserRecord};
use async_trait::async_trait;

pub use firestore::FirestoreUserStore;
pub use sqlite::SqliteUserStore;

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("HTTP request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("Store API error ({status}): {message}")]
  Api { status: u16, message: String },

  #[error("Failed to decode document: {0}")]
  Decode(String),

  #[error("No document to update: {0}")]
  MissingDocument(String),
}

/// ---------------------------------------------------------------------------
/// Store Trait
/// ---------------------------------------------------------------------------

#[async_trait]
pub trait UserStore: Send + Sync {
  /// Short backend name for log lines
  fn backend(&self) -> &'static str;

  /// Fetch the full set of user records
  async fn fetch_users(&self) -> Result<Vec<UserRecord>, StoreError>;

  /// Apply every staged reset in a single all-or-nothing write.
  /// A reset aimed at a document that no longer exists fails the whole batch.
  async fn commit_resets(&self, resets: &[StagedReset]) -> Result<(), StoreError>;
}
