use super::SessionManager;
use crate::desk::HttpFailure;
use crate::navigation::{Navigator, Route};
use crate::state::SessionEvent;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;

/// Re-validates the session whenever any request comes back 401 while we think we are signed in.
///
/// Failures are handled one at a time, so the 401 produced by the re-validation itself arrives
/// after the session has already been cleaned up and is ignored.
pub(crate) fn spawn_unauthorized_watcher(
    manager: Weak<SessionManager>,
    mut failures: broadcast::Receiver<HttpFailure>,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        loop {
            let failure = tokio::select! {
                received = failures.recv() => match received {
                    Ok(failure) => failure,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "HTTP error stream lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown.changed() => break,
            };

            if !failure.is_unauthorized() {
                continue;
            }
            let Some(manager) = manager.upgrade() else {
                break;
            };
            if !manager.is_authenticated() {
                continue;
            }

            tracing::info!(path = %failure.path, "Request unauthorized; re-validating session");
            if let Err(e) = manager.refresh_session(false).await {
                tracing::info!(error = %e, "Session invalidated by server");
            }
        }
        tracing::debug!("Unauthorized watcher stopped");
    });
}

/// Sends the user to the signed-out landing route after every `SessionCleared` event.
pub(crate) fn spawn_session_cleared_watcher(
    navigator: Arc<dyn Navigator>,
    mut events: broadcast::Receiver<SessionEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(SessionEvent::SessionCleared) => navigator.navigate(Route::SignOutRedirect),
                    Ok(SessionEvent::Other(_)) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event bus lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown.changed() => break,
            }
        }
        tracing::debug!("Session-cleared watcher stopped");
    });
}
