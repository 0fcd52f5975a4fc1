use crate::settings::{
    SettingsStore, KEY_ROUTE_SIGNIN_REDIRECT, KEY_ROUTE_SIGNOUT, KEY_ROUTE_SIGNOUT_REDIRECT,
};
use std::fmt;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SignOut,
    SignInRedirect,
    SignOutRedirect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    pub signout: String,
    pub signin_redirect: String,
    pub signout_redirect: String,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            signout: "/signout".to_string(),
            signin_redirect: "/desk/library".to_string(),
            signout_redirect: "/".to_string(),
        }
    }
}

impl RouteTable {
    pub fn from_settings(settings: &SettingsStore) -> Self {
        let fallback = Self::default();
        Self {
            signout: settings
                .get_string(KEY_ROUTE_SIGNOUT)
                .unwrap_or(fallback.signout),
            signin_redirect: settings
                .get_string(KEY_ROUTE_SIGNIN_REDIRECT)
                .unwrap_or(fallback.signin_redirect),
            signout_redirect: settings
                .get_string(KEY_ROUTE_SIGNOUT_REDIRECT)
                .unwrap_or(fallback.signout_redirect),
        }
    }

    pub fn path(&self, route: Route) -> &str {
        match route {
            Route::SignOut => &self.signout,
            Route::SignInRedirect => &self.signin_redirect,
            Route::SignOutRedirect => &self.signout_redirect,
        }
    }
}

/// Receiver of "navigate to route" side effects.
pub trait Navigator: Send + Sync + fmt::Debug {
    fn navigate(&self, route: Route);
}

/// Forwards every navigation to whoever owns the receiving half.
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<Route>,
}

impl ChannelNavigator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Route>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Navigator for ChannelNavigator {
    fn navigate(&self, route: Route) {
        if self.tx.send(route).is_err() {
            tracing::debug!(?route, "Navigation dropped; no receiver");
        }
    }
}
