use super::{StoreError, UserStore};
use crate::config::FirestoreConfig;
use crate::models::{StagedReset, UserRecord};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// ---------------------------------------------------------------------------
/// Configuration Constants
/// ---------------------------------------------------------------------------

const LIST_PAGE_SIZE: u32 = 300;
const WEEKLY_GYM_TIME_FIELD: &str = "weeklyGymTime";
const LAST_RESET_FIELD: &str = "lastWeeklyResetDate";

/// ---------------------------------------------------------------------------
/// REST Data Structures
/// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
  #[serde(default)]
  documents: Vec<FirestoreDocument>,
  next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
  name: String,
  #[serde(default)]
  fields: Map<String, Value>,
}

impl FirestoreDocument {
  fn into_user_record(self) -> Result<UserRecord, StoreError> {
    let id = self
      .name
      .rsplit('/')
      .next()
      .filter(|id| !id.is_empty())
      .ok_or_else(|| StoreError::Decode(format!("Bad document name: {}", self.name)))?
      .to_string();

    Ok(UserRecord {
      id,
      weekly_gym_time: self.fields.get(WEEKLY_GYM_TIME_FIELD).and_then(numeric_value),
      last_weekly_reset_date: self.fields.get(LAST_RESET_FIELD).and_then(timestamp_value),
    })
  }
}

/// Numbers arrive as `{"integerValue": "5"}` or `{"doubleValue": 5.5}`.
/// Anything else (null, strings, maps) reads as absent, so unlike a JS
/// `value || 0` check a numeric string such as `"12"` is not reset.
fn numeric_value(value: &Value) -> Option<f64> {
  if let Some(raw) = value.get("integerValue") {
    return match raw {
      Value::String(s) => s.parse::<i64>().ok().map(|n| n as f64),
      other => other.as_i64().map(|n| n as f64),
    };
  }
  value.get("doubleValue").and_then(Value::as_f64)
}

fn timestamp_value(value: &Value) -> Option<DateTime<Utc>> {
  value
    .get("timestampValue")
    .and_then(Value::as_str)
    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    .map(|dt| dt.with_timezone(&Utc))
}

/// ---------------------------------------------------------------------------
/// Firestore Store
/// ---------------------------------------------------------------------------

/// User store backed by the Firestore REST API
pub struct FirestoreUserStore {
  client: Client,
  config: FirestoreConfig,
}

impl FirestoreUserStore {
  pub fn new(config: FirestoreConfig) -> Self {
    Self {
      client: Client::new(),
      config,
    }
  }

  fn database_path(&self) -> String {
    format!("projects/{}/databases/(default)/documents", self.config.project_id)
  }

  fn document_name(&self, user_id: &str) -> String {
    format!("{}/{}/{}", self.database_path(), self.config.collection, user_id)
  }

  fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
    match &self.config.access_token {
      Some(token) => request.header("Authorization", format!("Bearer {}", token)),
      None => request,
    }
  }

  /// Build the body of a `documents:commit` call. Each write only touches
  /// the two reset fields and requires the document to still exist.
  fn commit_body(&self, resets: &[StagedReset]) -> Value {
    let writes: Vec<Value> = resets
      .iter()
      .map(|reset| {
        json!({
          "update": {
            "name": self.document_name(&reset.user_id),
            "fields": {
              WEEKLY_GYM_TIME_FIELD: { "integerValue": "0" },
              LAST_RESET_FIELD: {
                "timestampValue": reset.reset_at.to_rfc3339_opts(SecondsFormat::Micros, true)
              }
            }
          },
          "updateMask": { "fieldPaths": [WEEKLY_GYM_TIME_FIELD, LAST_RESET_FIELD] },
          "currentDocument": { "exists": true }
        })
      })
      .collect();

    json!({ "writes": writes })
  }
}

async fn api_error(response: reqwest::Response) -> StoreError {
  let status = response.status();
  let message = response.text().await.unwrap_or_default();

  if status == StatusCode::NOT_FOUND {
    return StoreError::MissingDocument(message);
  }

  StoreError::Api {
    status: status.as_u16(),
    message,
  }
}

#[async_trait]
impl UserStore for FirestoreUserStore {
  fn backend(&self) -> &'static str {
    "firestore"
  }

  async fn fetch_users(&self) -> Result<Vec<UserRecord>, StoreError> {
    let url = format!(
      "{}/{}/{}",
      self.config.api_base,
      self.database_path(),
      self.config.collection
    );

    let mut users = Vec::new();
    let mut page_token: Option<String> = None;

    // Follow page tokens until the whole collection has been read
    loop {
      let mut request = self
        .client
        .get(&url)
        .query(&[("pageSize", LIST_PAGE_SIZE.to_string())]);
      if let Some(token) = &page_token {
        request = request.query(&[("pageToken", token)]);
      }

      let response = self.authorize(request).send().await?;
      if !response.status().is_success() {
        return Err(api_error(response).await);
      }

      let response_text = response.text().await?;
      let page: ListDocumentsResponse = serde_json::from_str(&response_text)
        .map_err(|e| StoreError::Decode(format!("Failed to parse documents: {}", e)))?;

      for document in page.documents {
        users.push(document.into_user_record()?);
      }

      match page.next_page_token.filter(|t| !t.is_empty()) {
        Some(token) => page_token = Some(token),
        None => break,
      }
    }

    Ok(users)
  }

  async fn commit_resets(&self, resets: &[StagedReset]) -> Result<(), StoreError> {
    let url = format!("{}/{}:commit", self.config.api_base, self.database_path());

    let request = self.client.post(&url).json(&self.commit_body(resets));
    let response = self.authorize(request).send().await?;

    if !response.status().is_success() {
      return Err(api_error(response).await);
    }

    Ok(())
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
