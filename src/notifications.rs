use serde::{Deserialize, Serialize};
use std::fmt;

pub const MSG_SIGNUP_CHECK_MAIL: &str = "Please, check your mail for activation link";
pub const MSG_SIGNUP_DONE: &str = "Successfully signed up";
pub const MSG_EMAIL_CONFIRMED: &str = "Email successfully confirmed";
pub const MSG_PASSWORD_UPDATED: &str = "Your password has been updated successfully.";
pub const MSG_CHECK_EMAIL: &str = "Please, check your email for details";
pub const MSG_PASSWORD_RESET_DONE: &str = "Your password has been updated successfully. Please Log in with your new credentials. Redirecting to login page...";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Success,
    Danger,
}

/// Fire-and-forget sink for user-facing messages.
pub trait Notifier: Send + Sync + fmt::Debug {
    fn notify(&self, level: NotificationLevel, text: &str);
}

/// Surfaces notifications through the log, which is the only UI a headless client has.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: NotificationLevel, text: &str) {
        match level {
            NotificationLevel::Info | NotificationLevel::Success => {
                tracing::info!(target: "desk::notify", ?level, "{text}")
            }
            NotificationLevel::Danger => tracing::error!(target: "desk::notify", "{text}"),
        }
    }
}

pub(crate) fn sign_up_message(require_email_confirmation: bool) -> &'static str {
    if require_email_confirmation {
        MSG_SIGNUP_CHECK_MAIL
    } else {
        MSG_SIGNUP_DONE
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingNotifier {
        seen: Arc<Mutex<Vec<(NotificationLevel, String)>>>,
    }

    impl RecordingNotifier {
        pub(crate) fn seen(&self) -> Vec<(NotificationLevel, String)> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, level: NotificationLevel, text: &str) {
            self.seen.lock().unwrap().push((level, text.to_string()));
        }
    }
}
