//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::loader::ConfigLoader;

/// Tilde-expand a user-supplied path so `~/foo` in the config file
/// resolves under the home directory instead of a literal `~`.
fn expand_tilde(path: &Path) -> PathBuf {
    PathBuf::from(ConfigLoader::expand_path(&path.to_string_lossy()))
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub login: LoginConfig,

    #[serde(default)]
    pub detector: DetectorConfig,

    #[serde(default)]
    pub oauth: OAuthConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Apply `AUTOLOGIN_*` environment variable overrides on top of the
    /// loaded file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(kind) = std::env::var("AUTOLOGIN_BROWSER") {
            self.browser.kind = kind;
        }
        if let Ok(headless) = std::env::var("AUTOLOGIN_HEADLESS") {
            self.browser.headless = matches!(headless.to_lowercase().as_str(), "true" | "yes" | "1");
        }
        if let Ok(level) = std::env::var("AUTOLOGIN_LOG_LEVEL") {
            self.log.level = level;
        }
        if let Ok(dir) = std::env::var("AUTOLOGIN_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }
        if let Ok(delay) = std::env::var("AUTOLOGIN_POST_LOGIN_DELAY") {
            self.login.post_login_delay_secs = delay.parse().unwrap_or(default_post_login_delay());
        }
    }
}

/// Browser launch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Browser family to launch. Only chromium-family browsers are
    /// supported by the CDP driver.
    #[serde(default = "default_browser_kind")]
    pub kind: String,

    #[serde(default)]
    pub headless: bool,

    /// Chrome remote debugging port.
    #[serde(default = "default_debug_port")]
    pub debug_port: u16,

    /// Profile directory for the automation browser.
    /// Default: ~/.autologin/browser-profile
    #[serde(default)]
    pub profile_dir: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            kind: default_browser_kind(),
            headless: false,
            debug_port: default_debug_port(),
            profile_dir: None,
        }
    }
}

impl BrowserConfig {
    /// Profile directory, tilde-expanded, falling back to the default
    /// location.
    pub fn resolved_profile_dir(&self) -> PathBuf {
        self.profile_dir
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".autologin")
                    .join("browser-profile")
            })
    }
}

fn default_browser_kind() -> String {
    "chromium".to_string()
}

fn default_debug_port() -> u16 {
    9222
}

/// Login flow tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginConfig {
    /// Seconds to keep the browser open after a successful login
    /// before tearing the session down.
    #[serde(default = "default_post_login_delay")]
    pub post_login_delay_secs: f64,

    /// Default timeout for the shared user-action wait (CAPTCHA, 2FA,
    /// OAuth popups).
    #[serde(default = "default_user_action_timeout")]
    pub user_action_timeout_secs: u64,

    /// Timeout for page load-state waits. Overruns are tolerated: the
    /// page may still be usable.
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            post_login_delay_secs: default_post_login_delay(),
            user_action_timeout_secs: default_user_action_timeout(),
            load_timeout_ms: default_load_timeout_ms(),
        }
    }
}

fn default_post_login_delay() -> f64 {
    5.0
}

fn default_user_action_timeout() -> u64 {
    300
}

fn default_load_timeout_ms() -> u64 {
    10_000
}

/// Form detector confidence thresholds. Empirical defaults; tune per
/// deployment rather than in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Minimum score gap between the top two candidates before the
    /// result counts as unambiguous.
    #[serde(default = "default_ambiguity_margin")]
    pub ambiguity_margin: f64,

    /// Minimum absolute score for a confident detection.
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            ambiguity_margin: default_ambiguity_margin(),
            confidence_floor: default_confidence_floor(),
        }
    }
}

fn default_ambiguity_margin() -> f64 {
    1.0
}

fn default_confidence_floor() -> f64 {
    2.5
}

/// Third-party OAuth provider to detect and drive. Defaults describe
/// Google sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Provider token matched in text, classes and data attributes.
    #[serde(default = "default_provider_name")]
    pub provider: String,

    /// Canonical authorization path fragment for the strict precheck.
    #[serde(default = "default_auth_path")]
    pub auth_path: String,

    /// Origin the provider's sign-in form lives on.
    #[serde(default = "default_account_domain")]
    pub account_domain: String,

    /// Domains a successful login may land on besides the original
    /// site.
    #[serde(default = "default_service_domains")]
    pub service_domains: Vec<String>,

    /// URL path fragments indicating a provider-side 2FA challenge.
    #[serde(default = "default_two_factor_markers")]
    pub two_factor_markers: Vec<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            provider: default_provider_name(),
            auth_path: default_auth_path(),
            account_domain: default_account_domain(),
            service_domains: default_service_domains(),
            two_factor_markers: default_two_factor_markers(),
        }
    }
}

fn default_provider_name() -> String {
    "google".to_string()
}

fn default_auth_path() -> String {
    "accounts.google.com/o/oauth2".to_string()
}

fn default_account_domain() -> String {
    "accounts.google.com".to_string()
}

fn default_service_domains() -> Vec<String> {
    [
        "accounts.google.com",
        "myaccount.google.com",
        "mail.google.com",
        "drive.google.com",
        "docs.google.com",
        "calendar.google.com",
    ]
    .iter()
    .map(|d| d.to_string())
    .collect()
}

fn default_two_factor_markers() -> Vec<String> {
    vec!["challenge/pwd".to_string(), "challenge/ipp".to_string()]
}

/// Credential storage location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the encrypted credential blob and salt file.
    /// Default: ~/.autologin
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".autologin")
            })
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file directory. Default: ~/.autologin/logs
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl LogConfig {
    /// Log directory, tilde-expanded, falling back to the default
    /// location.
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.as_deref().map(expand_tilde).unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".autologin")
                .join("logs")
        })
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.browser.kind, "chromium");
        assert_eq!(config.browser.debug_port, 9222);
        assert!(!config.browser.headless);
        assert_eq!(config.detector.ambiguity_margin, 1.0);
        assert_eq!(config.detector.confidence_floor, 2.5);
        assert_eq!(config.login.user_action_timeout_secs, 300);
    }

    #[test]
    fn test_default_oauth_provider_is_google() {
        let oauth = OAuthConfig::default();
        assert_eq!(oauth.provider, "google");
        assert!(oauth.auth_path.contains("accounts.google.com"));
        assert!(oauth.two_factor_markers.contains(&"challenge/pwd".to_string()));
    }

    #[test]
    fn test_profile_dir_fallback() {
        let browser = BrowserConfig::default();
        let dir = browser.resolved_profile_dir();
        assert!(dir.ends_with(".autologin/browser-profile"));
    }

    #[test]
    fn test_tilde_paths_are_expanded() {
        let browser = BrowserConfig {
            profile_dir: Some(PathBuf::from("~/custom-profile")),
            ..BrowserConfig::default()
        };
        let dir = browser.resolved_profile_dir();
        assert!(!dir.to_string_lossy().starts_with('~'));
        assert!(dir.ends_with("custom-profile"));

        let storage = StorageConfig {
            data_dir: Some(PathBuf::from("~/custom-data")),
        };
        assert!(!storage.resolved_data_dir().to_string_lossy().starts_with('~'));

        let log = LogConfig {
            dir: Some(PathBuf::from("~/custom-logs")),
            ..LogConfig::default()
        };
        assert!(!log.resolved_dir().to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_log_dir_fallback() {
        let log = LogConfig::default();
        assert!(log.resolved_dir().ends_with(".autologin/logs"));
    }

    #[test]
    fn test_env_override_headless() {
        let mut config = Config::default();
        // SAFETY: test-local env mutation.
        unsafe { std::env::set_var("AUTOLOGIN_HEADLESS", "true") };
        config.apply_env_overrides();
        unsafe { std::env::remove_var("AUTOLOGIN_HEADLESS") };
        assert!(config.browser.headless);
    }
}
