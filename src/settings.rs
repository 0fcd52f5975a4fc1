use serde_json::{json, Map as JsonMap, Value as JsonValue};
use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
  time::Duration,
};
use thiserror::Error;

pub const SETTINGS_STORE_FILE: &str = "desk-settings.json";

pub const KEY_API_BASE: &str = "apiBase";
pub const KEY_TOKEN_STORAGE_KEY: &str = "tokenStorageKey";
pub const KEY_REQUIRE_EMAIL_CONFIRMATION: &str = "requireEmailConfirmation";
pub const KEY_EXPIRY_SWEEP_SECONDS: &str = "expirySweepSeconds";
pub const KEY_ROUTE_SIGNOUT: &str = "routes.signout";
pub const KEY_ROUTE_SIGNIN_REDIRECT: &str = "routes.signinRedirect";
pub const KEY_ROUTE_SIGNOUT_REDIRECT: &str = "routes.signoutRedirect";

const DEFAULT_API_BASE: &str = "http://localhost/baile/v2.0/";
const DEFAULT_EXPIRY_SWEEP_SECONDS: u64 = 10 * 60;

#[derive(Debug, Error)]
pub enum SettingsError {
  #[error("settings file is unreadable")]
  Io(#[from] std::io::Error),
  #[error("settings file is not a json object")]
  Json(#[from] serde_json::Error),
}

fn defaults() -> HashMap<String, JsonValue> {
  HashMap::from([
    (KEY_API_BASE.to_string(), json!(DEFAULT_API_BASE)),
    (KEY_TOKEN_STORAGE_KEY.to_string(), json!("token")),
    (KEY_REQUIRE_EMAIL_CONFIRMATION.to_string(), json!(true)),
    (KEY_EXPIRY_SWEEP_SECONDS.to_string(), json!(DEFAULT_EXPIRY_SWEEP_SECONDS)),
    (KEY_ROUTE_SIGNOUT.to_string(), json!("/signout")),
    (KEY_ROUTE_SIGNIN_REDIRECT.to_string(), json!("/desk/library")),
    (KEY_ROUTE_SIGNOUT_REDIRECT.to_string(), json!("/")),
  ])
}

/// Endpoint paths are appended to the base, so it must end with `/`.
pub fn with_trailing_slash(base: String) -> String {
  if base.ends_with('/') {
    base
  } else {
    format!("{base}/")
  }
}

/// JSON-file backed settings. Unset keys fall back to the built-in defaults.
#[derive(Clone, Debug)]
pub struct SettingsStore {
  path: Option<PathBuf>,
  values: Arc<Mutex<JsonMap<String, JsonValue>>>,
}

impl SettingsStore {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
    let path = path.as_ref().to_path_buf();
    let values = match std::fs::read_to_string(&path) {
      Ok(text) if text.trim().is_empty() => JsonMap::new(),
      Ok(text) => serde_json::from_str::<JsonMap<String, JsonValue>>(&text)?,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => JsonMap::new(),
      Err(e) => return Err(e.into()),
    };
    Ok(Self {
      path: Some(path),
      values: Arc::new(Mutex::new(values)),
    })
  }

  /// Settings that are never written to disk.
  pub fn in_memory() -> Self {
    Self {
      path: None,
      values: Arc::new(Mutex::new(JsonMap::new())),
    }
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, JsonMap<String, JsonValue>> {
    self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  pub fn get(&self, key: &str) -> Option<JsonValue> {
    if let Some(value) = self.lock().get(key) {
      return Some(value.clone());
    }
    defaults().remove(key)
  }

  pub fn get_u64(&self, key: &str, fallback: u64) -> u64 {
    self.get(key).and_then(|v| v.as_u64()).unwrap_or(fallback)
  }

  pub fn get_bool(&self, key: &str, fallback: bool) -> bool {
    self.get(key).and_then(|v| v.as_bool()).unwrap_or(fallback)
  }

  pub fn get_string(&self, key: &str) -> Option<String> {
    let v = self.get(key)?;
    let s = v.as_str()?.trim();
    if s.is_empty() {
      None
    } else {
      Some(s.to_string())
    }
  }

  pub fn set(&self, key: &str, value: impl Into<JsonValue>) -> Result<(), SettingsError> {
    let snapshot = {
      let mut guard = self.lock();
      guard.insert(key.to_string(), value.into());
      guard.clone()
    };
    self.save(&snapshot)
  }

  pub fn remove(&self, key: &str) -> Result<(), SettingsError> {
    let snapshot = {
      let mut guard = self.lock();
      guard.remove(key);
      guard.clone()
    };
    self.save(&snapshot)
  }

  /// Every known key with its effective value, stored values taking precedence.
  pub fn effective(&self) -> JsonMap<String, JsonValue> {
    let mut out: JsonMap<String, JsonValue> = defaults().into_iter().collect();
    for (k, v) in self.lock().iter() {
      out.insert(k.clone(), v.clone());
    }
    out
  }

  fn save(&self, values: &JsonMap<String, JsonValue>) -> Result<(), SettingsError> {
    let Some(path) = &self.path else {
      return Ok(());
    };
    let text = serde_json::to_string_pretty(values)?;
    std::fs::write(path, text)?;
    Ok(())
  }

  pub fn api_base(&self) -> String {
    with_trailing_slash(
      self
        .get_string(KEY_API_BASE)
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
    )
  }

  pub fn token_storage_key(&self) -> String {
    self
      .get_string(KEY_TOKEN_STORAGE_KEY)
      .unwrap_or_else(|| "token".to_string())
  }

  pub fn require_email_confirmation(&self) -> bool {
    self.get_bool(KEY_REQUIRE_EMAIL_CONFIRMATION, true)
  }

  pub fn expiry_sweep_interval(&self) -> Duration {
    let seconds = self.get_u64(KEY_EXPIRY_SWEEP_SECONDS, DEFAULT_EXPIRY_SWEEP_SECONDS);
    Duration::from_secs(seconds.max(1))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_apply_when_nothing_stored() {
    let settings = SettingsStore::in_memory();
    assert_eq!(settings.token_storage_key(), "token");
    assert!(settings.require_email_confirmation());
    assert_eq!(settings.expiry_sweep_interval(), Duration::from_secs(600));
    assert_eq!(
      settings.get_string(KEY_ROUTE_SIGNIN_REDIRECT).as_deref(),
      Some("/desk/library")
    );
  }

  #[test]
  fn api_base_always_ends_with_slash() {
    let settings = SettingsStore::in_memory();
    settings.set(KEY_API_BASE, "https://dev.example.com/api").unwrap();
    assert_eq!(settings.api_base(), "https://dev.example.com/api/");
  }

  #[test]
  fn set_persists_to_file_and_reopens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(SETTINGS_STORE_FILE);

    let settings = SettingsStore::open(&path).unwrap();
    settings.set(KEY_REQUIRE_EMAIL_CONFIRMATION, false).unwrap();
    settings.set(KEY_EXPIRY_SWEEP_SECONDS, 30).unwrap();

    let reopened = SettingsStore::open(&path).unwrap();
    assert!(!reopened.require_email_confirmation());
    assert_eq!(reopened.expiry_sweep_interval(), Duration::from_secs(30));

    reopened.remove(KEY_EXPIRY_SWEEP_SECONDS).unwrap();
    let again = SettingsStore::open(&path).unwrap();
    assert_eq!(again.expiry_sweep_interval(), Duration::from_secs(600));
  }

  #[test]
  fn open_rejects_non_object_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(SETTINGS_STORE_FILE);
    std::fs::write(&path, "[1, 2]").unwrap();
    assert!(matches!(SettingsStore::open(&path), Err(SettingsError::Json(_))));
  }

  #[test]
  fn blank_strings_read_as_unset() {
    let settings = SettingsStore::in_memory();
    settings.set(KEY_TOKEN_STORAGE_KEY, "   ").unwrap();
    assert_eq!(settings.get_string(KEY_TOKEN_STORAGE_KEY), None);
    assert_eq!(settings.token_storage_key(), "token");
  }
}
