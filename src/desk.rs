use crate::notifications::{NotificationLevel, Notifier};
use crate::redact::redact_secrets;
use crate::session::{token_is_live, Clock, SystemClock};
use crate::state::TokenStore;
use crate::types::{
  EmailConfirmationRequest, EmailOnly, PasswordChangeRequest, PasswordResetCompletion,
  SignInCredentials, SignUpProfile, TokenResponse, User, UserStats,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

const HTTP_ERRORS_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum DeskError {
  #[error("network error")]
  Network(#[from] reqwest::Error),
  #[error("invalid json")]
  Json(#[from] serde_json::Error),
  #[error("{message}")]
  Http { status: u16, message: String },
}

impl DeskError {
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Http { status, .. } => Some(*status),
      Self::Network(e) => e.status().map(|s| s.as_u16()),
      Self::Json(_) => None,
    }
  }

  /// Text safe to show to a user: never carries credentials.
  pub fn user_message(&self) -> String {
    match self {
      Self::Http { message, .. } => message.clone(),
      Self::Network(e) => redact_secrets(&e.to_string()).into_owned(),
      Self::Json(_) => "Unexpected response from the server".to_string(),
    }
  }
}

/// A failed HTTP exchange, published on the global error stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpFailure {
  pub status: u16,
  pub path: String,
}

impl HttpFailure {
  pub fn is_unauthorized(&self) -> bool {
    self.status == 401
  }
}

/// The identity endpoints the session core talks to.
#[async_trait]
pub trait IdentityApi: Send + Sync + fmt::Debug {
  async fn sign_in(&self, credentials: &SignInCredentials) -> Result<TokenResponse, DeskError>;
  async fn sign_up(&self, profile: &SignUpProfile) -> Result<User, DeskError>;
  async fn me(&self) -> Result<User, DeskError>;
  async fn me_stats(&self, scope: Option<&str>) -> Result<UserStats, DeskError>;
  async fn confirm_email(&self, request: &EmailConfirmationRequest) -> Result<(), DeskError>;
  async fn change_password(&self, request: &PasswordChangeRequest) -> Result<(), DeskError>;
  async fn remind_username(&self, email: &str) -> Result<(), DeskError>;
  async fn reset_password(&self, email: &str) -> Result<(), DeskError>;
  async fn complete_password_reset(
    &self,
    request: &PasswordResetCompletion,
  ) -> Result<(), DeskError>;

  /// Every HTTP failure seen by this client, whichever call produced it.
  fn http_errors(&self) -> broadcast::Receiver<HttpFailure>;
}

fn build_headers(access_token: Option<&str>) -> HeaderMap {
  let mut headers = HeaderMap::new();
  headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
  if let Some(token) = access_token {
    if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
      headers.insert(AUTHORIZATION, value);
    }
  }
  headers
}

/// Pulls a human readable message out of an error body: `error.message`, then `message`, then
/// the raw text, then a generic fallback.
pub(crate) fn parse_error_message(status: u16, body: &str) -> String {
  let from_json = serde_json::from_str::<Value>(body).ok().and_then(|json| {
    let root = json.get("error").filter(|v| v.is_object()).unwrap_or(&json);
    root
      .get("message")
      .and_then(|m| m.as_str())
      .map(str::trim)
      .filter(|m| !m.is_empty())
      .map(str::to_string)
  });

  let message = from_json.unwrap_or_else(|| {
    let text = body.trim();
    if text.is_empty() || text.starts_with('{') || text.starts_with('[') {
      format!("Server error ({status})")
    } else {
      text.to_string()
    }
  });

  redact_secrets(&message).into_owned()
}

pub struct DeskApiClient {
  http: reqwest::Client,
  base_url: String,
  tokens: Arc<dyn TokenStore>,
  notifier: Arc<dyn Notifier>,
  errors: broadcast::Sender<HttpFailure>,
}

impl fmt::Debug for DeskApiClient {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DeskApiClient")
      .field("base_url", &self.base_url)
      .finish_non_exhaustive()
  }
}

impl DeskApiClient {
  pub fn new(
    base_url: impl Into<String>,
    tokens: Arc<dyn TokenStore>,
    notifier: Arc<dyn Notifier>,
  ) -> Result<Self, DeskError> {
    let http = reqwest::Client::builder().build()?;
    Ok(Self::with_client(http, base_url, tokens, notifier))
  }

  pub fn with_client(
    http: reqwest::Client,
    base_url: impl Into<String>,
    tokens: Arc<dyn TokenStore>,
    notifier: Arc<dyn Notifier>,
  ) -> Self {
    let (errors, _) = broadcast::channel(HTTP_ERRORS_CAPACITY);
    Self {
      http,
      base_url: base_url.into(),
      tokens,
      notifier,
      errors,
    }
  }

  /// Only a live token is attached; an expired one is left for the session layer to clean up.
  fn access_token(&self) -> Option<String> {
    let now = SystemClock.now_unix();
    match self.tokens.get() {
      Ok(token) => token
        .filter(|t| token_is_live(t, now))
        .map(|t| t.access_token),
      Err(e) => {
        tracing::debug!(error = %e, "Sending request without a token");
        None
      }
    }
  }

  async fn request(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
    quiet: bool,
  ) -> Result<String, DeskError> {
    let result = self.execute(method, path, body).await;
    if let Err(e) = &result {
      tracing::debug!(path, status = ?e.status(), "Request failed");
      if !quiet {
        self
          .notifier
          .notify(NotificationLevel::Danger, &e.user_message());
      }
    }
    result
  }

  async fn execute(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
  ) -> Result<String, DeskError> {
    let url = format!("{}{}", self.base_url, path);
    let mut req = self
      .http
      .request(method, url)
      .headers(build_headers(self.access_token().as_deref()));
    if let Some(body) = body {
      req = req.json(&body);
    }

    let res = req.send().await?;
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
      let status = status.as_u16();
      // Nobody listening is fine.
      let _ = self.errors.send(HttpFailure {
        status,
        path: path.to_string(),
      });
      return Err(DeskError::Http {
        status,
        message: parse_error_message(status, &text),
      });
    }

    Ok(text)
  }

  async fn get_json<T: DeserializeOwned>(&self, path: &str, quiet: bool) -> Result<T, DeskError> {
    let text = self.request(Method::GET, path, None, quiet).await?;
    Ok(serde_json::from_str(&text)?)
  }

  async fn post<B: Serialize + ?Sized>(
    &self,
    path: &str,
    body: &B,
    quiet: bool,
  ) -> Result<String, DeskError> {
    let body = serde_json::to_value(body)?;
    self.request(Method::POST, path, Some(body), quiet).await
  }

  async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
    &self,
    path: &str,
    body: &B,
    quiet: bool,
  ) -> Result<T, DeskError> {
    let text = self.post(path, body, quiet).await?;
    Ok(serde_json::from_str(&text)?)
  }
}

#[async_trait]
impl IdentityApi for DeskApiClient {
  async fn sign_in(&self, credentials: &SignInCredentials) -> Result<TokenResponse, DeskError> {
    // Callers render sign-in failures inline, so no notification here.
    self.post_json("signin", credentials, true).await
  }

  async fn sign_up(&self, profile: &SignUpProfile) -> Result<User, DeskError> {
    self.post_json("signup", profile, false).await
  }

  async fn me(&self) -> Result<User, DeskError> {
    self.get_json("me", true).await
  }

  async fn me_stats(&self, scope: Option<&str>) -> Result<UserStats, DeskError> {
    let path = match scope {
      Some(scope) => format!("me/stats?scope={}", urlencoding::encode(scope)),
      None => "me/stats".to_string(),
    };
    self.get_json(&path, false).await
  }

  async fn confirm_email(&self, request: &EmailConfirmationRequest) -> Result<(), DeskError> {
    self.post("emailconfirmation", request, true).await.map(|_| ())
  }

  async fn change_password(&self, request: &PasswordChangeRequest) -> Result<(), DeskError> {
    self.post("me/password", request, false).await.map(|_| ())
  }

  async fn remind_username(&self, email: &str) -> Result<(), DeskError> {
    self
      .post("me/username/remind", &EmailOnly { email }, false)
      .await
      .map(|_| ())
  }

  async fn reset_password(&self, email: &str) -> Result<(), DeskError> {
    self
      .post("me/password/reset", &EmailOnly { email }, false)
      .await
      .map(|_| ())
  }

  async fn complete_password_reset(
    &self,
    request: &PasswordResetCompletion,
  ) -> Result<(), DeskError> {
    self
      .post("me/password/resetcomplete", request, false)
      .await
      .map(|_| ())
  }

  fn http_errors(&self) -> broadcast::Receiver<HttpFailure> {
    self.errors.subscribe()
  }
}
