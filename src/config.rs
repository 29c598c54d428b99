use std::env;
use url::Url;

/// ---------------------------------------------------------------------------
/// Configuration Constants
/// ---------------------------------------------------------------------------

const DEFAULT_DATABASE_URL: &str = "sqlite://gym-reset.db?mode=rwc";
const DEFAULT_FIRESTORE_API_BASE: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_USERS_COLLECTION: &str = "users";

/// 00:00 every Monday
pub const DEFAULT_RESET_SCHEDULE: &str = "0 0 * * 1";
pub const DEFAULT_RESET_TIMEZONE: &str = "UTC";

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Missing configuration: {0}")]
  MissingConfig(String),

  #[error("Invalid value '{value}' for {key}: {reason}")]
  Invalid {
    key: String,
    value: String,
    reason: String,
  },
}

/// ---------------------------------------------------------------------------
/// Config Structures
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirestoreConfig {
  pub project_id: String,
  pub api_base: String,
  pub access_token: Option<String>,
  pub collection: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
  Sqlite { database_url: String },
  Firestore(FirestoreConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
  pub store: StoreConfig,
  pub schedule: String,
  pub timezone: String,
  pub run_once: bool,
}

impl AppConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    let backend = env_or("STORE_BACKEND", "sqlite");
    let store = match backend.to_ascii_lowercase().as_str() {
      "sqlite" => StoreConfig::Sqlite {
        database_url: env_or("DATABASE_URL", DEFAULT_DATABASE_URL),
      },
      "firestore" => StoreConfig::Firestore(FirestoreConfig::from_env()?),
      _ => {
        return Err(ConfigError::Invalid {
          key: "STORE_BACKEND".into(),
          value: backend,
          reason: "expected 'sqlite' or 'firestore'".into(),
        })
      }
    };

    Ok(Self {
      store,
      schedule: env_or("RESET_SCHEDULE", DEFAULT_RESET_SCHEDULE),
      timezone: env_or("RESET_TIMEZONE", DEFAULT_RESET_TIMEZONE),
      run_once: parse_bool("RESET_RUN_ONCE", false)?,
    })
  }
}

impl FirestoreConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    let project_id = non_empty("FIRESTORE_PROJECT_ID")
      .or_else(|| non_empty("GOOGLE_CLOUD_PROJECT"))
      .ok_or_else(|| ConfigError::MissingConfig("FIRESTORE_PROJECT_ID".into()))?;

    // The emulator speaks plain HTTP and ignores credentials
    let (source_key, source_value, api_base) = match non_empty("FIRESTORE_EMULATOR_HOST") {
      Some(host) => {
        let base = format!("http://{}/v1", host);
        ("FIRESTORE_EMULATOR_HOST", host, base)
      }
      None => {
        let base = env_or("FIRESTORE_API_BASE", DEFAULT_FIRESTORE_API_BASE);
        ("FIRESTORE_API_BASE", base.clone(), base)
      }
    };

    Url::parse(&api_base).map_err(|e| ConfigError::Invalid {
      key: source_key.into(),
      value: source_value,
      reason: e.to_string(),
    })?;

    Ok(Self {
      project_id,
      api_base: api_base.trim_end_matches('/').to_string(),
      access_token: non_empty("FIRESTORE_ACCESS_TOKEN"),
      collection: env_or("USERS_COLLECTION", DEFAULT_USERS_COLLECTION),
    })
  }
}

/// ---------------------------------------------------------------------------
/// Env Helpers
/// ---------------------------------------------------------------------------

fn non_empty(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|v| v.trim().to_string())
    .filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
  non_empty(key).unwrap_or_else(|| default.to_string())
}

fn parse_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
  match non_empty(key) {
    None => Ok(default),
    Some(value) => match value.to_ascii_lowercase().as_str() {
      "1" | "true" | "yes" | "on" => Ok(true),
      "0" | "false" | "no" | "off" => Ok(false),
      _ => Err(ConfigError::Invalid {
        key: key.into(),
        value,
        reason: "expected a boolean".into(),
      }),
    },
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
