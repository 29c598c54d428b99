use super::{StoreError, UserStore};
use crate::db::DbPool;
use crate::models::{StagedReset, UserRecord};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};

/// SQLite does not enforce column types, so both fields are read through a
/// type check and anything unusable comes back NULL instead of failing the fetch
const SELECT_USERS: &str = r#"
  SELECT
    id,
    CASE WHEN typeof(weekly_gym_time) IN ('integer', 'real')
      THEN CAST(weekly_gym_time AS REAL) END AS weekly_gym_time,
    CASE WHEN typeof(last_weekly_reset_date) = 'text'
      THEN last_weekly_reset_date END AS last_weekly_reset_date
  FROM users
  ORDER BY id
"#;

#[derive(sqlx::FromRow)]
struct UserRow {
  id: String,
  weekly_gym_time: Option<f64>,
  last_weekly_reset_date: Option<String>,
}

impl From<UserRow> for UserRecord {
  fn from(row: UserRow) -> Self {
    Self {
      id: row.id,
      weekly_gym_time: row.weekly_gym_time,
      last_weekly_reset_date: row.last_weekly_reset_date.as_deref().and_then(parse_timestamp),
    }
  }
}

/// Accepts RFC 3339 (what sqlx writes) and SQLite's own `YYYY-MM-DD HH:MM:SS`
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Some(dt.with_timezone(&Utc));
  }
  ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    .map(|naive| naive.and_utc())
}

/// User store backed by the local `users` table
pub struct SqliteUserStore {
  db: DbPool,
}

impl SqliteUserStore {
  pub fn new(db: DbPool) -> Self {
    Self { db }
  }
}

#[async_trait]
impl UserStore for SqliteUserStore {
  fn backend(&self) -> &'static str {
    "sqlite"
  }

  async fn fetch_users(&self) -> Result<Vec<UserRecord>, StoreError> {
    let rows = sqlx::query_as::<_, UserRow>(SELECT_USERS)
      .fetch_all(&self.db)
      .await?;

    Ok(rows.into_iter().map(UserRecord::from).collect())
  }

  async fn commit_resets(&self, resets: &[StagedReset]) -> Result<(), StoreError> {
    let mut tx = self.db.begin().await?;

    for reset in resets {
      let result = sqlx::query(
        r#"
        UPDATE users
        SET weekly_gym_time = 0, last_weekly_reset_date = ?1
        WHERE id = ?2
        "#,
      )
      .bind(reset.reset_at)
      .bind(&reset.user_id)
      .execute(&mut *tx)
      .await?;

      // Dropping the transaction rolls back every update staged so far
      if result.rows_affected() == 0 {
        return Err(StoreError::MissingDocument(reset.user_id.clone()));
      }
    }

    tx.commit().await?;
    Ok(())
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
