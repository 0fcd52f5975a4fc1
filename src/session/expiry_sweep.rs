use super::SessionManager;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Periodically checks the stored token and asks for the sign-out route once it has lapsed.
///
/// The first check happens one full interval after start. The task ends on shutdown or when the
/// manager is dropped.
pub(crate) fn spawn_expiry_sweep(
    manager: Weak<SessionManager>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(manager) = manager.upgrade() else { break; };
                    manager.check_token_expiry();
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::debug!("Expiry sweep stopped");
    });
}
