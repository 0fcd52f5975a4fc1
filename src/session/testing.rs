use super::{Clock, SessionConfig, SessionDeps, SessionManager};
use crate::desk::{DeskError, HttpFailure, IdentityApi};
use crate::navigation::{ChannelNavigator, Route};
use crate::notifications::testing::RecordingNotifier;
use crate::state::{EventBus, MemoryTokenStore, SessionEvent};
use crate::types::{
    CredentialToken, EmailConfirmationRequest, PasswordChangeRequest, PasswordResetCompletion,
    SignInCredentials, SignUpProfile, TokenResponse, User, UserRole, UserStats,
};
use async_trait::async_trait;
use serde_json::Map as JsonMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, oneshot};

pub(crate) const NOW: i64 = 1_700_000_000;

#[derive(Debug)]
pub(crate) struct FixedClock(AtomicI64);

impl FixedClock {
    pub(crate) fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_unix(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

pub(crate) fn user(id: &str, first_name: &str) -> User {
    User {
        id: id.to_string(),
        first_name: first_name.to_string(),
        last_name: "B".to_string(),
        email: "a@b.com".to_string(),
        role: UserRole::User,
        extra: JsonMap::new(),
    }
}

pub(crate) fn token(expires_at: i64) -> CredentialToken {
    CredentialToken {
        access_token: "abc".to_string(),
        expires_at,
        token_type: None,
    }
}

fn http_error(status: u16) -> DeskError {
    DeskError::Http {
        status,
        message: format!("Server error ({status})"),
    }
}

pub(crate) enum MeReply {
    Now(Result<User, u16>),
    Later(oneshot::Receiver<Result<User, u16>>),
}

impl std::fmt::Debug for MeReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Now(reply) => f.debug_tuple("Now").field(reply).finish(),
            Self::Later(_) => f.write_str("Later"),
        }
    }
}

/// Scripted identity backend. `me` replies are consumed in order; an empty script answers 401.
#[derive(Debug)]
pub(crate) struct FakeApi {
    me_replies: Mutex<VecDeque<MeReply>>,
    me_calls: AtomicUsize,
    me_calls_tx: mpsc::UnboundedSender<()>,
    sign_in_reply: Mutex<Option<Result<TokenResponse, u16>>>,
    fail_with: Mutex<Option<u16>>,
    errors: broadcast::Sender<HttpFailure>,
}

impl FakeApi {
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<()>) {
        let (me_calls_tx, me_calls_rx) = mpsc::unbounded_channel();
        let (errors, _) = broadcast::channel(16);
        let api = Arc::new(Self {
            me_replies: Mutex::new(VecDeque::new()),
            me_calls: AtomicUsize::new(0),
            me_calls_tx,
            sign_in_reply: Mutex::new(None),
            fail_with: Mutex::new(None),
            errors,
        });
        (api, me_calls_rx)
    }

    pub(crate) fn push_me(&self, reply: MeReply) {
        self.me_replies.lock().unwrap().push_back(reply);
    }

    pub(crate) fn push_me_user(&self, user: User) {
        self.push_me(MeReply::Now(Ok(user)));
    }

    pub(crate) fn me_calls(&self) -> usize {
        self.me_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn set_sign_in(&self, reply: Result<TokenResponse, u16>) {
        *self.sign_in_reply.lock().unwrap() = Some(reply);
    }

    /// Makes every non-`me` call fail with `status`.
    pub(crate) fn fail_with(&self, status: u16) {
        *self.fail_with.lock().unwrap() = Some(status);
    }

    pub(crate) fn publish_failure(&self, status: u16, path: &str) {
        let _ = self.errors.send(HttpFailure {
            status,
            path: path.to_string(),
        });
    }

    fn outcome(&self) -> Result<(), DeskError> {
        match *self.fail_with.lock().unwrap() {
            Some(status) => Err(http_error(status)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IdentityApi for FakeApi {
    async fn sign_in(&self, _credentials: &SignInCredentials) -> Result<TokenResponse, DeskError> {
        let reply = self.sign_in_reply.lock().unwrap().clone();
        match reply {
            Some(Ok(response)) => Ok(response),
            Some(Err(status)) => Err(http_error(status)),
            None => Err(http_error(401)),
        }
    }

    async fn sign_up(&self, profile: &SignUpProfile) -> Result<User, DeskError> {
        self.outcome()?;
        Ok(user("new", &profile.first_name))
    }

    async fn me(&self) -> Result<User, DeskError> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.me_calls_tx.send(());
        let next = self.me_replies.lock().unwrap().pop_front();
        let reply = match next {
            Some(MeReply::Now(reply)) => reply,
            Some(MeReply::Later(rx)) => rx.await.unwrap_or(Err(500)),
            None => Err(401),
        };
        reply.map_err(http_error)
    }

    async fn me_stats(&self, _scope: Option<&str>) -> Result<UserStats, DeskError> {
        self.outcome()?;
        Ok(UserStats {
            tables_count: 2,
            ..UserStats::default()
        })
    }

    async fn confirm_email(&self, _request: &EmailConfirmationRequest) -> Result<(), DeskError> {
        self.outcome()
    }

    async fn change_password(&self, _request: &PasswordChangeRequest) -> Result<(), DeskError> {
        self.outcome()
    }

    async fn remind_username(&self, _email: &str) -> Result<(), DeskError> {
        self.outcome()
    }

    async fn reset_password(&self, _email: &str) -> Result<(), DeskError> {
        self.outcome()
    }

    async fn complete_password_reset(
        &self,
        _request: &PasswordResetCompletion,
    ) -> Result<(), DeskError> {
        self.outcome()
    }

    fn http_errors(&self) -> broadcast::Receiver<HttpFailure> {
        self.errors.subscribe()
    }
}

pub(crate) struct Harness {
    pub(crate) api: Arc<FakeApi>,
    pub(crate) me_calls: mpsc::UnboundedReceiver<()>,
    pub(crate) tokens: MemoryTokenStore,
    pub(crate) notifier: RecordingNotifier,
    pub(crate) routes: mpsc::UnboundedReceiver<Route>,
    pub(crate) events: broadcast::Receiver<SessionEvent>,
    pub(crate) clock: Arc<FixedClock>,
    deps: SessionDeps,
}

impl Harness {
    pub(crate) fn new(stored: Option<CredentialToken>) -> Self {
        let (api, me_calls) = FakeApi::new();
        let tokens = match stored {
            Some(token) => MemoryTokenStore::with_token(token),
            None => MemoryTokenStore::new(),
        };
        let notifier = RecordingNotifier::default();
        let (navigator, routes) = ChannelNavigator::new();
        let bus = EventBus::new();
        let events = bus.subscribe();
        let clock = Arc::new(FixedClock(AtomicI64::new(NOW)));

        let deps = SessionDeps {
            api: api.clone(),
            tokens: Arc::new(tokens.clone()),
            notifier: Arc::new(notifier.clone()),
            navigator: Arc::new(navigator),
            events: bus,
            clock: clock.clone(),
        };

        Self {
            api,
            me_calls,
            tokens,
            notifier,
            routes,
            events,
            clock,
            deps,
        }
    }

    pub(crate) fn manager(&self, config: SessionConfig) -> Arc<SessionManager> {
        SessionManager::new(self.deps.clone(), config)
    }

    pub(crate) async fn start(&self, config: SessionConfig) -> Arc<SessionManager> {
        SessionManager::start(self.deps.clone(), config).await
    }
}
