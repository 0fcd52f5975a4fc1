use super::expiry_sweep::spawn_expiry_sweep;
use super::policy::{compute_expires_at, should_sweep_sign_out, token_is_live, Clock};
use super::watchers::{spawn_session_cleared_watcher, spawn_unauthorized_watcher};
use super::SessionError;
use crate::desk::IdentityApi;
use crate::navigation::{Navigator, Route};
use crate::notifications::{
    sign_up_message, NotificationLevel, Notifier, MSG_CHECK_EMAIL, MSG_EMAIL_CONFIRMED,
    MSG_PASSWORD_RESET_DONE, MSG_PASSWORD_UPDATED,
};
use crate::state::{EventBus, SessionEvent, TokenStore};
use crate::types::{
    CredentialToken, EmailConfirmationRequest, PasswordChangeRequest, PasswordResetCompletion,
    SessionState, SignInCredentials, SignUpProfile, User, UserStats,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Collaborators the session manager drives. All of them are shared, process-wide services.
#[derive(Debug, Clone)]
pub struct SessionDeps {
    pub api: Arc<dyn IdentityApi>,
    pub tokens: Arc<dyn TokenStore>,
    pub notifier: Arc<dyn Notifier>,
    pub navigator: Arc<dyn Navigator>,
    pub events: EventBus,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub require_email_confirmation: bool,
    pub expiry_sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            require_email_confirmation: true,
            expiry_sweep_interval: Duration::from_secs(10 * 60),
        }
    }
}

/// Owner of the credential token and the current-user snapshot.
///
/// The current user is published on a `watch` channel, so every subscriber sees the latest
/// value immediately. `is_authenticated` is derived from that value and never stored separately.
#[derive(Debug)]
pub struct SessionManager {
    deps: SessionDeps,
    config: SessionConfig,
    user_tx: watch::Sender<Option<User>>,
    resolved: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl SessionManager {
    /// Builds a manager without background tasks and without resolving the session.
    pub fn new(deps: SessionDeps, config: SessionConfig) -> Arc<Self> {
        let (user_tx, _) = watch::channel(None);
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            deps,
            config,
            user_tx,
            resolved: AtomicBool::new(false),
            shutdown,
        })
    }

    /// Builds the manager, starts the expiry sweep and both watchers, then resolves the session
    /// from whatever token is stored.
    pub async fn start(deps: SessionDeps, config: SessionConfig) -> Arc<Self> {
        let manager = Self::new(deps, config);
        manager.spawn_background_tasks();

        match manager.refresh_session(true).await {
            Ok(user) => tracing::info!(user_id = %user.id, "Session restored"),
            Err(SessionError::NoSession) => tracing::debug!("No stored session"),
            Err(e) => tracing::info!(error = %e, "Stored session rejected"),
        }
        manager
    }

    fn spawn_background_tasks(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        spawn_expiry_sweep(
            weak.clone(),
            self.config.expiry_sweep_interval,
            self.shutdown.subscribe(),
        );
        spawn_unauthorized_watcher(weak, self.deps.api.http_errors(), self.shutdown.subscribe());
        spawn_session_cleared_watcher(
            self.deps.navigator.clone(),
            self.deps.events.subscribe(),
            self.shutdown.subscribe(),
        );
    }

    /// Stops the background tasks. The session itself is left untouched.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.user_tx.subscribe()
    }

    pub fn current_user(&self) -> Option<User> {
        self.user_tx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_tx.borrow().is_some()
    }

    pub fn state(&self) -> SessionState {
        if !self.resolved.load(Ordering::Acquire) {
            SessionState::Unknown
        } else if self.is_authenticated() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        }
    }

    fn stored_token(&self) -> Option<CredentialToken> {
        match self.deps.tokens.get() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Token store unreadable; treating session as absent");
                None
            }
        }
    }

    /// The stored access token, if it has not expired.
    pub fn token(&self) -> Option<String> {
        let now = self.deps.clock.now_unix();
        self.stored_token()
            .filter(|t| token_is_live(t, now))
            .map(|t| t.access_token)
    }

    /// Expiry of the stored token in epoch seconds, if it is still live.
    pub fn token_expires_at(&self) -> Option<i64> {
        let now = self.deps.clock.now_unix();
        self.stored_token()
            .filter(|t| token_is_live(t, now))
            .map(|t| t.expires_at)
    }

    /// Re-resolves the current user from the stored token.
    ///
    /// Concurrent calls are allowed; each completion compares against the snapshot current at
    /// the moment it resolves, so the last one to finish wins.
    pub async fn refresh_session(&self, initial: bool) -> Result<User, SessionError> {
        let now = self.deps.clock.now_unix();
        let live = self.stored_token().filter(|t| token_is_live(t, now));
        if live.is_none() {
            self.clean_session_state(!initial);
            return Err(SessionError::NoSession);
        }

        match self.deps.api.me().await {
            Ok(user) => {
                self.apply_fetched_user(user.clone());
                Ok(user)
            }
            Err(e) => {
                tracing::debug!(error = %e, initial, "Identity check failed");
                self.clean_session_state(!initial);
                Err(SessionError::Transport(e))
            }
        }
    }

    fn apply_fetched_user(&self, user: User) {
        let mut had_user = false;
        let changed = self.user_tx.send_if_modified(|current| {
            if current.as_ref() == Some(&user) {
                return false;
            }
            had_user = current.is_some();
            *current = Some(user);
            true
        });
        self.resolved.store(true, Ordering::Release);

        if changed && had_user {
            tracing::info!("Identity changed; prompting for sign-in");
            self.deps.navigator.navigate(Route::SignInRedirect);
        }
    }

    pub fn clean_session_state(&self, emit_event: bool) {
        self.user_tx.send_replace(None);
        self.resolved.store(true, Ordering::Release);
        if let Err(e) = self.deps.tokens.clear() {
            tracing::warn!(error = %e, "Failed to clear stored token");
        }
        if emit_event {
            self.deps.events.emit(SessionEvent::SessionCleared);
        }
    }

    pub fn sign_out(&self) {
        tracing::info!("Signing out");
        self.clean_session_state(true);
    }

    /// Exchanges credentials for a token and stores it. The current user is not touched; call
    /// [`SessionManager::refresh_session`] afterwards.
    pub async fn sign_in(
        &self,
        credentials: &SignInCredentials,
    ) -> Result<CredentialToken, SessionError> {
        let response = self
            .deps
            .api
            .sign_in(credentials)
            .await
            .map_err(SessionError::Auth)?;

        let issued_at = self.deps.clock.now_unix();
        let token = CredentialToken {
            access_token: response.access_token,
            expires_at: compute_expires_at(issued_at, response.expires_in),
            token_type: response.token_type,
        };
        self.deps.tokens.set(&token)?;
        tracing::info!(expires_at = token.expires_at, "Signed in");
        Ok(token)
    }

    pub async fn sign_up(&self, profile: &SignUpProfile) -> Result<User, SessionError> {
        let user = self
            .deps
            .api
            .sign_up(profile)
            .await
            .map_err(SessionError::Auth)?;
        self.deps.notifier.notify(
            NotificationLevel::Info,
            sign_up_message(self.config.require_email_confirmation),
        );
        Ok(user)
    }

    pub async fn confirm_email(&self, request: &EmailConfirmationRequest) -> Result<(), SessionError> {
        self.deps
            .api
            .confirm_email(request)
            .await
            .map_err(SessionError::Auth)?;
        self.deps
            .notifier
            .notify(NotificationLevel::Success, MSG_EMAIL_CONFIRMED);
        Ok(())
    }

    pub async fn change_password(&self, request: &PasswordChangeRequest) -> Result<(), SessionError> {
        self.deps
            .api
            .change_password(request)
            .await
            .map_err(SessionError::Auth)?;
        self.deps
            .notifier
            .notify(NotificationLevel::Info, MSG_PASSWORD_UPDATED);
        Ok(())
    }

    /// Backed by a deprecated endpoint that is due to be dropped.
    pub async fn request_username_reminder(&self, email: &str) -> Result<(), SessionError> {
        self.deps
            .api
            .remind_username(email)
            .await
            .map_err(SessionError::Auth)?;
        self.deps
            .notifier
            .notify(NotificationLevel::Info, MSG_CHECK_EMAIL);
        Ok(())
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), SessionError> {
        self.deps
            .api
            .reset_password(email)
            .await
            .map_err(SessionError::Auth)?;
        self.deps
            .notifier
            .notify(NotificationLevel::Info, MSG_CHECK_EMAIL);
        Ok(())
    }

    pub async fn confirm_password_reset(
        &self,
        request: &PasswordResetCompletion,
    ) -> Result<(), SessionError> {
        self.deps
            .api
            .complete_password_reset(request)
            .await
            .map_err(SessionError::Auth)?;
        self.deps
            .notifier
            .notify(NotificationLevel::Info, MSG_PASSWORD_RESET_DONE);
        Ok(())
    }

    pub async fn stats(&self, scope: Option<&str>) -> Result<UserStats, SessionError> {
        self.deps
            .api
            .me_stats(scope)
            .await
            .map_err(SessionError::Transport)
    }

    /// One expiry-sweep tick: asks for the sign-out route when the stored token has lapsed.
    /// Never mutates session state itself.
    pub fn check_token_expiry(&self) -> bool {
        let now = self.deps.clock.now_unix();
        let token = self.stored_token();
        let lapsed = should_sweep_sign_out(token.as_ref(), now);
        if lapsed {
            tracing::info!("Stored token has expired; requesting sign-out");
            self.deps.navigator.navigate(Route::SignOut);
        }
        lapsed
    }
}
