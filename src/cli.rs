use crate::settings::SETTINGS_STORE_FILE;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Settings file
    #[arg(long, env = "DESK_SETTINGS", default_value = SETTINGS_STORE_FILE)]
    pub settings: PathBuf,

    /// API base URL, overriding the `apiBase` setting
    #[arg(long, env = "DESK_API_BASE")]
    pub api_base: Option<String>,

    /// Keep the token in process memory instead of the OS keychain
    #[arg(long, env = "DESK_EPHEMERAL", default_value_t = false)]
    pub ephemeral: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "DESK_LOG_JSON", default_value_t = false)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Sign in with a username or an email address
    Signin(SignInArgs),
    /// Register a new account
    Signup(SignUpArgs),
    /// Confirm an email address with the activation code from the welcome mail
    ConfirmEmail {
        #[arg(long)]
        org_id: String,
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        activation_code: String,
    },
    /// Show the signed-in user
    Whoami,
    /// Show usage counters for the signed-in user
    Stats {
        /// Restrict counters to a scope, e.g. a team id
        #[arg(long)]
        scope: Option<String>,
    },
    /// Forget the stored session
    Signout,
    #[command(subcommand)]
    Password(PasswordCommand),
    /// Mail the username belonging to an email address
    RemindUsername {
        #[arg(long)]
        email: String,
    },
    /// Keep the session alive and print navigations until Ctrl-C
    Watch,
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Clone, Debug, Args)]
pub struct SignInArgs {
    #[arg(long, conflicts_with = "email", required_unless_present = "email")]
    pub username: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long, env = "DESK_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Clone, Debug, Args)]
pub struct SignUpArgs {
    #[arg(long)]
    pub first_name: String,

    #[arg(long)]
    pub last_name: String,

    #[arg(long)]
    pub username: String,

    #[arg(long)]
    pub email: String,

    #[arg(long, env = "DESK_PASSWORD", hide_env_values = true)]
    pub password: String,
}

/// Password management
#[derive(Clone, Debug, Subcommand)]
pub enum PasswordCommand {
    /// Change the password of the signed-in user
    Change {
        #[arg(long, env = "DESK_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, env = "DESK_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },
    /// Request a password reset code by email
    Reset {
        #[arg(long)]
        email: String,
    },
    /// Set a new password with the code from the reset mail
    Complete {
        #[arg(long)]
        email: String,
        #[arg(long)]
        secret_code: String,
        #[arg(long, env = "DESK_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },
}

/// Inspect or change the settings file
#[derive(Clone, Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print every setting with its effective value
    Show,
    /// Store a value; JSON literals are kept typed, anything else is stored as a string
    Set { key: String, value: String },
    /// Drop a stored value so the default applies again
    Unset { key: String },
}
