//! Configuration loader.

use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::schema::Config;

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(path)?;
        let mut config = Self::load_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a file, falling back to defaults when
    /// the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            let mut config = Config::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let mut result = content.to_string();
        let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/.autologin`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_config() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config.browser.debug_port, 9222);
    }

    #[test]
    fn test_expand_path() {
        let expanded = ConfigLoader::expand_path("~/.autologin");
        assert!(!expanded.starts_with('~'));
    }

    #[test]
    fn test_load_basic_config() {
        let content = r#"
            [browser]
            kind = "chromium"
            headless = true
            debug_port = 9333
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert!(config.browser.headless);
        assert_eq!(config.browser.debug_port, 9333);
    }

    #[test]
    fn test_load_full_config() {
        let content = r#"
            [login]
            post_login_delay_secs = 2.5
            user_action_timeout_secs = 120

            [detector]
            ambiguity_margin = 0.5
            confidence_floor = 3.0

            [oauth]
            provider = "acme"
            auth_path = "auth.acme.example/oauth2"
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.login.post_login_delay_secs, 2.5);
        assert_eq!(config.detector.confidence_floor, 3.0);
        assert_eq!(config.oauth.provider, "acme");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[browser]\nheadless = true").unwrap();
        let config = ConfigLoader::load(file.path()).unwrap();
        assert!(config.browser.headless);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = ConfigLoader::load_or_default(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.browser.kind, "chromium");
    }

    #[test]
    fn test_env_var_not_set() {
        let result = ConfigLoader::load_str("[log]\nlevel = \"${AUTOLOGIN_TEST_MISSING_VAR}\"");
        assert!(matches!(result, Err(ConfigError::EnvVarNotSet(_))));
    }
}
