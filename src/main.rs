//! Autologin - automated website login.
//!
//! Main entry point for the autologin CLI.

mod cli;

use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use autologin_config::{Config, ConfigLoader};
use autologin_engine::{
    LoginEngine, LoginRequest, OauthChoice, OauthPrechecker, StatusEvent, StrategyKind,
};
use autologin_store::CredentialStore;

use cli::{Cli, Commands, ConfigAction};

fn autologin_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".autologin")
}

fn default_config_path() -> PathBuf {
    autologin_dir().join("config.toml")
}

/// Initialize tracing with both console and file output.
///
/// Log files are written with daily rotation; the filter comes from
/// RUST_LOG when set, otherwise from the configured level.
fn init_tracing(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = config.log.resolved_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("autologin")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the writer guard alive for the program duration.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.level.clone()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = ConfigLoader::load_or_default(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    if let Err(e) = init_tracing(&config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match cli.command {
        Commands::Add {
            url,
            username,
            password,
            oauth,
            notes,
        } => {
            let mut store = open_store(&config, cli.master_password.as_deref())?;
            store.add(&url, &username, &password, oauth, &notes)?;
            println!("Stored credentials for {url}");
        }

        Commands::Remove { url } => {
            let mut store = open_store(&config, cli.master_password.as_deref())?;
            if store.remove(&url)? {
                println!("Removed {url}");
            } else {
                println!("No credentials stored for {url}");
            }
        }

        Commands::List { format } => {
            let store = open_store(&config, cli.master_password.as_deref())?;
            list_sites(&store, &format)?;
        }

        Commands::Login {
            url,
            strategy,
            ask,
            wait,
        } => {
            run_login(&config, cli.master_password.as_deref(), &url, strategy, ask, wait).await?;
        }

        Commands::Precheck { url } => {
            let prechecker = OauthPrechecker::new(config.oauth.clone());
            if prechecker.check_url(&url).await {
                println!("{} sign-in detected on {url}", config.oauth.provider);
            } else {
                println!("No {} sign-in detected on {url}", config.oauth.provider);
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", toml::to_string_pretty(&config)?);
            }
            ConfigAction::Set { key, value } => {
                set_config_value(&config_path, &key, &value)?;
                println!("Set {key} in {}", config_path.display());
            }
        },
    }

    Ok(())
}

fn open_store(config: &Config, master_password: Option<&str>) -> anyhow::Result<CredentialStore> {
    let Some(password) = master_password else {
        bail!("A master password is required (--master-password or AUTOLOGIN_MASTER_PASSWORD)");
    };
    let data_dir = config.storage.resolved_data_dir();
    CredentialStore::open(&data_dir, Some(password))
        .with_context(|| format!("Failed to open the credential store in {}", data_dir.display()))
}

fn list_sites(store: &CredentialStore, format: &str) -> anyhow::Result<()> {
    let entries = store.list();

    if format == "json" {
        let items: Vec<_> = entries
            .iter()
            .map(|(url, creds)| {
                serde_json::json!({
                    "url": url,
                    "username": creds.username,
                    "oauth_login": creds.oauth_login,
                    "last_login": creds.last_login,
                    "last_login_success": creds.last_login_success,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No stored credentials");
        return Ok(());
    }
    for (url, creds) in entries {
        let oauth = if creds.oauth_login { " (oauth)" } else { "" };
        println!("{url}  {}{oauth}", creds.username);
    }
    Ok(())
}

async fn run_login(
    config: &Config,
    master_password: Option<&str>,
    url: &str,
    strategy: Option<String>,
    ask: bool,
    wait: bool,
) -> anyhow::Result<()> {
    let mut store = open_store(config, master_password)?;
    let creds = store
        .get(url)
        .cloned()
        .with_context(|| format!("No credentials stored for {url}; run `autologin add` first"))?;

    let mut request = LoginRequest::new(url, &creds.username, &creds.password);
    request.force_prompt = ask;
    if let Some(name) = strategy {
        request = request.with_strategy(parse_strategy(&name)?);
    } else if creds.oauth_login {
        request = request.with_strategy(StrategyKind::Oauth);
    }

    let timeout = config.login.user_action_timeout_secs;
    let mut engine =
        LoginEngine::new(config.clone()).with_oauth_prompt(Box::new(prompt_choice));

    let outcome = engine.attempt_login(&request, &print_event).await?;

    let mut success = outcome.succeeded();
    if outcome.requires_user_action && wait {
        println!("Waiting for you to finish in the browser (up to {timeout}s)...");
        if engine.wait_for_user_action(timeout).await? {
            println!("Login completed");
            success = true;
        } else {
            println!("Timed out waiting for manual completion");
        }
    }
    engine.close_session().await;

    if let Err(e) = store.record_login_result(url, success) {
        warn!("Failed to record the login result: {}", e);
    }

    if !success && outcome.event.success.is_some() {
        bail!("Login failed: {}", outcome.event.message);
    }
    Ok(())
}

fn parse_strategy(name: &str) -> anyhow::Result<StrategyKind> {
    match name.to_lowercase().as_str() {
        "form" => Ok(StrategyKind::Form),
        "oauth" => Ok(StrategyKind::Oauth),
        "manual" => Ok(StrategyKind::Manual),
        other => bail!("Unknown strategy {other:?} (expected form, oauth or manual)"),
    }
}

fn print_event(event: StatusEvent) {
    let stage = serde_json::to_string(&event.stage).unwrap_or_default();
    println!("[{}] {}", stage.trim_matches('"'), event.message);
}

/// Interactive answer to the OAuth-or-not question.
fn prompt_choice(url: &str) -> OauthChoice {
    println!("{url} offers a third-party sign-in.");
    println!("  [a] automated OAuth flow  [m] open in the system browser  [c] cancel");
    print!("> ");
    let _ = std::io::stdout().flush();

    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return OauthChoice::Cancel;
    }
    match line.trim().to_lowercase().as_str() {
        "a" | "automated" => OauthChoice::Automated,
        "m" | "manual" => OauthChoice::Manual,
        _ => OauthChoice::Cancel,
    }
}

/// Write one dotted-key value into the configuration file, creating
/// it if needed.
fn set_config_value(path: &Path, key: &str, raw: &str) -> anyhow::Result<()> {
    let content = if path.exists() {
        std::fs::read_to_string(path)?
    } else {
        String::new()
    };
    let mut doc: toml::Table = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let mut segments: Vec<&str> = key.split('.').collect();
    let leaf = segments.pop().filter(|s| !s.is_empty()).context("Empty configuration key")?;

    let mut table = &mut doc;
    for segment in segments {
        table = table
            .entry(segment.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()))
            .as_table_mut()
            .with_context(|| format!("{segment} is not a table"))?;
    }
    table.insert(leaf.to_string(), parse_toml_value(raw));

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(&doc)?)?;
    Ok(())
}

fn parse_toml_value(raw: &str) -> toml::Value {
    if let Ok(b) = raw.parse::<bool>() {
        return toml::Value::Boolean(b);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return toml::Value::Integer(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return toml::Value::Float(f);
    }
    toml::Value::String(raw.to_string())
}
