//! CLI definitions for autologin.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Autologin CLI.
#[derive(Parser)]
#[command(name = "autologin")]
#[command(about = "Automated website login with an encrypted credential vault")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: ~/.autologin/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Master password for the credential vault
    #[arg(
        long,
        global = true,
        env = "AUTOLOGIN_MASTER_PASSWORD",
        hide_env_values = true
    )]
    pub master_password: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Store credentials for a site
    Add {
        /// Login page URL
        url: String,

        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,

        /// Mark the site as using a third-party OAuth sign-in
        #[arg(long)]
        oauth: bool,

        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Remove stored credentials
    Remove {
        url: String,
    },

    /// List stored sites
    List {
        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Log in to a site using stored credentials
    Login {
        /// Login page URL
        url: String,

        /// Strategy override (form, oauth, manual)
        #[arg(long)]
        strategy: Option<String>,

        /// Ask how to proceed even when no OAuth option is detected
        #[arg(long)]
        ask: bool,

        /// When the attempt parks on a CAPTCHA or 2FA challenge, keep
        /// the browser open and wait for manual completion
        #[arg(long)]
        wait: bool,
    },

    /// Check a login page for a third-party OAuth option without
    /// launching a browser
    Precheck {
        url: String,
    },

    /// Configuration inspection and editing
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Set one value in the configuration file (dotted key, e.g.
    /// browser.headless)
    Set { key: String, value: String },
}
