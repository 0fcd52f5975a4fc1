use crate::types::CredentialToken;

/// Subtracted from the server-advertised lifetime so the client gives up first.
pub(crate) const EXPIRY_SAFETY_MARGIN_SECONDS: i64 = 60 * 60;

pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now_unix(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        time::OffsetDateTime::now_utc().unix_timestamp()
    }
}

pub(crate) fn compute_expires_at(issued_at: i64, expires_in: i64) -> i64 {
    issued_at
        .saturating_add(expires_in)
        .saturating_sub(EXPIRY_SAFETY_MARGIN_SECONDS)
}

/// A token can be presented to the identity endpoint only while strictly before its expiry.
pub(crate) fn token_is_live(token: &CredentialToken, now: i64) -> bool {
    token.expires_at > now
}

/// The background sweep only reacts once the expiry instant has been passed.
pub(crate) fn token_has_lapsed(token: &CredentialToken, now: i64) -> bool {
    token.expires_at < now
}

pub(crate) fn should_sweep_sign_out(token: Option<&CredentialToken>, now: i64) -> bool {
    token.is_some_and(|t| token_has_lapsed(t, now))
}
