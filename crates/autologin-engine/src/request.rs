//! Login attempt input.

use serde::{Deserialize, Serialize};

/// Which login procedure to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Form,
    Oauth,
    Manual,
}

/// One login attempt. Immutable for the duration of the attempt.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub url: String,
    pub username: String,
    pub password: String,
    /// Explicit strategy selection; skips dispatch inference.
    pub strategy: Option<StrategyKind>,
    /// Forbid silent strategy inference: the caller must be asked
    /// even when no OAuth option was detected.
    pub force_prompt: bool,
}

impl LoginRequest {
    pub fn new(url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
            strategy: None,
            force_prompt: false,
        }
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = Some(strategy);
        self
    }
}

/// The caller's answer when a site offers a third-party OAuth login
/// and no explicit strategy was supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OauthChoice {
    /// Continue with the automated OAuth flow.
    Automated,
    /// Hand off to the system browser.
    Manual,
    /// Abort the attempt.
    Cancel,
}

/// Callback asking the caller to choose how to proceed. The argument
/// is the target URL.
pub type OauthPrompt = Box<dyn Fn(&str) -> OauthChoice + Send + Sync>;
