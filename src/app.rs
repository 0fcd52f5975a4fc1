use crate::cli::{Cli, Command, ConfigCommand, PasswordCommand, SignInArgs, SignUpArgs};
use crate::desk::DeskApiClient;
use crate::navigation::{ChannelNavigator, Route, RouteTable};
use crate::notifications::{LogNotifier, Notifier};
use crate::session::{SessionConfig, SessionDeps, SessionManager, SystemClock};
use crate::settings::{with_trailing_slash, SettingsStore};
use crate::state::{EventBus, KeyringTokenStore, MemoryTokenStore, TokenStore};
use crate::types::{
  EmailConfirmationRequest, PasswordChangeRequest, PasswordResetCompletion, SessionState,
  SignInCredentials, SignUpProfile,
};
use clap::Parser;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::mpsc;

const REDIRECT_WAIT: Duration = Duration::from_millis(500);

pub async fn run() -> anyhow::Result<()> {
  let cli = Cli::parse();
  crate::telemetry::init(cli.log_json)?;

  let settings = SettingsStore::open(&cli.settings)?;
  if let Command::Config(command) = &cli.command {
    return run_config(&settings, command);
  }

  let tokens: Arc<dyn TokenStore> = if cli.ephemeral {
    Arc::new(MemoryTokenStore::new())
  } else {
    let store = KeyringTokenStore::new(settings.token_storage_key());
    if !store.is_available() {
      tracing::warn!("OS keychain is unavailable; the session will not outlive this process");
    }
    Arc::new(store)
  };

  let api_base = match cli.api_base.clone() {
    Some(base) => with_trailing_slash(base),
    None => settings.api_base(),
  };
  tracing::debug!(%api_base, "Using identity service");

  let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
  let api = DeskApiClient::new(api_base, tokens.clone(), notifier.clone())?;
  let (navigator, routes) = ChannelNavigator::new();

  let deps = SessionDeps {
    api: Arc::new(api),
    tokens,
    notifier,
    navigator: Arc::new(navigator),
    events: EventBus::new(),
    clock: Arc::new(SystemClock),
  };
  let config = SessionConfig {
    require_email_confirmation: settings.require_email_confirmation(),
    expiry_sweep_interval: settings.expiry_sweep_interval(),
  };

  let manager = SessionManager::start(deps, config).await;
  let route_table = RouteTable::from_settings(&settings);
  let result = dispatch(&manager, cli.command, routes, &route_table).await;
  manager.shutdown();
  result
}

async fn dispatch(
  manager: &Arc<SessionManager>,
  command: Command,
  mut routes: mpsc::UnboundedReceiver<Route>,
  route_table: &RouteTable,
) -> anyhow::Result<()> {
  match command {
    Command::Signin(args) => sign_in(manager, args).await?,
    Command::Signup(args) => sign_up(manager, args).await?,
    Command::ConfirmEmail {
      org_id,
      user_id,
      activation_code,
    } => {
      let request = EmailConfirmationRequest {
        org_id,
        user_id,
        activation_code,
      };
      manager.confirm_email(&request).await?;
    }
    Command::Whoami => whoami(manager)?,
    Command::Stats { scope } => {
      let stats = manager.stats(scope.as_deref()).await?;
      println!("{}", serde_json::to_string_pretty(&stats)?);
    }
    Command::Signout => {
      if let Some(route) = sign_out(manager, &mut routes).await {
        tracing::debug!(path = route_table.path(route), "Navigation requested");
      }
    }
    Command::Password(PasswordCommand::Change {
      password,
      new_password,
    }) => {
      let request = PasswordChangeRequest {
        password,
        new_password,
      };
      manager.change_password(&request).await?;
    }
    Command::Password(PasswordCommand::Reset { email }) => {
      manager.request_password_reset(&email).await?;
    }
    Command::Password(PasswordCommand::Complete {
      email,
      secret_code,
      new_password,
    }) => {
      let request = PasswordResetCompletion {
        email,
        secret_code,
        new_password,
      };
      manager.confirm_password_reset(&request).await?;
    }
    Command::RemindUsername { email } => manager.request_username_reminder(&email).await?,
    Command::Watch => return watch(manager, routes, route_table).await,
    Command::Config(_) => {}
  }
  Ok(())
}

/// Signs out and waits briefly for the redirect the session-cleared watcher issues.
async fn sign_out(
  manager: &SessionManager,
  routes: &mut mpsc::UnboundedReceiver<Route>,
) -> Option<Route> {
  manager.sign_out();
  tokio::time::timeout(REDIRECT_WAIT, routes.recv())
    .await
    .ok()
    .flatten()
}

async fn sign_in(manager: &SessionManager, args: SignInArgs) -> anyhow::Result<()> {
  let credentials = SignInCredentials {
    username: args.username,
    email: args.email,
    password: args.password,
  };
  manager.sign_in(&credentials).await?;
  let user = manager.refresh_session(false).await?;
  println!("Signed in as {}", user.display_name());
  Ok(())
}

async fn sign_up(manager: &SessionManager, args: SignUpArgs) -> anyhow::Result<()> {
  let profile = SignUpProfile {
    first_name: args.first_name,
    last_name: args.last_name,
    username: args.username,
    email: args.email,
    password: args.password,
  };
  let user = manager.sign_up(&profile).await?;
  println!("Created account {}", user.id);
  Ok(())
}

fn whoami(manager: &SessionManager) -> anyhow::Result<()> {
  let Some(user) = manager.current_user() else {
    println!("Not signed in");
    return Ok(());
  };
  println!("{}", serde_json::to_string_pretty(&user)?);
  if let Some(expires_at) = manager.token_expires_at() {
    let formatted = OffsetDateTime::from_unix_timestamp(expires_at)?.format(&Rfc3339)?;
    println!("Session valid until {formatted}");
  }
  Ok(())
}

async fn watch(
  manager: &Arc<SessionManager>,
  mut routes: mpsc::UnboundedReceiver<Route>,
  route_table: &RouteTable,
) -> anyhow::Result<()> {
  let mut users = manager.subscribe();
  match manager.state() {
    SessionState::Authenticated => tracing::info!("Watching signed-in session; Ctrl-C to stop"),
    _ => tracing::info!("Watching without a session; Ctrl-C to stop"),
  }

  let ctrl_c = tokio::signal::ctrl_c();
  tokio::pin!(ctrl_c);

  loop {
    tokio::select! {
      route = routes.recv() => {
        let Some(route) = route else { break };
        println!("navigate {}", route_table.path(route));
        if route == Route::SignOut {
          manager.sign_out();
        }
      }
      changed = users.changed() => {
        if changed.is_err() {
          break;
        }
        let user = users.borrow_and_update().clone();
        match user {
          Some(user) => tracing::info!(user_id = %user.id, "Signed in as {}", user.display_name()),
          None => tracing::info!("Signed out"),
        }
      }
      signal = &mut ctrl_c => {
        signal?;
        tracing::info!("Stopping");
        break;
      }
    }
  }
  Ok(())
}

fn run_config(settings: &SettingsStore, command: &ConfigCommand) -> anyhow::Result<()> {
  match command {
    ConfigCommand::Show => {
      println!("{}", serde_json::to_string_pretty(&settings.effective())?);
    }
    ConfigCommand::Set { key, value } => {
      settings.set(key, parse_setting_value(value))?;
      tracing::info!(key = %key, "Setting stored");
    }
    ConfigCommand::Unset { key } => {
      settings.remove(key)?;
      tracing::info!(key = %key, "Setting removed");
    }
  }
  Ok(())
}

fn parse_setting_value(raw: &str) -> JsonValue {
  serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
}
