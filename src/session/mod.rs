mod expiry_sweep;
mod manager;
mod policy;
mod watchers;

#[cfg(test)]
pub(crate) mod testing;

pub use manager::{SessionConfig, SessionDeps, SessionManager};
pub use policy::{Clock, SystemClock};
pub(crate) use policy::token_is_live;

use crate::desk::DeskError;
use crate::state::TokenStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// No live token is stored. Drives the unauthenticated transition; not a user-facing error.
    #[error("no active session")]
    NoSession,
    #[error("identity request failed: {0}")]
    Transport(#[source] DeskError),
    #[error("{0}")]
    Auth(#[source] DeskError),
    #[error(transparent)]
    Store(#[from] TokenStoreError),
}

impl SessionError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) | Self::Auth(e) => e.status(),
            Self::NoSession | Self::Store(_) => None,
        }
    }
}
