use serde::{Deserialize, Serialize};

/// Outcome of a reset run that reached the commit phase.
///
/// Serializes to `{"success":true,"usersReset":n}` on success and
/// `{"success":false,"error":"..."}` on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetReport {
  pub success: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub users_reset: Option<usize>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl ResetReport {
  pub fn reset(count: usize) -> Self {
    Self {
      success: true,
      users_reset: Some(count),
      error: None,
    }
  }

  pub fn failed(message: impl Into<String>) -> Self {
    Self {
      success: false,
      users_reset: None,
      error: Some(message.into()),
    }
  }

  pub fn to_json(&self) -> String {
    serde_json::to_string(self).unwrap_or_default()
  }
}
