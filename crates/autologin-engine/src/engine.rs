//! Attempt orchestration: strategy dispatch, session lifecycle, the
//! post-login delay, and the shared user-action wait.

use std::time::Duration;

use tracing::{debug, info, warn};

use autologin_browser::{BrowserError, BrowserOptions, SessionHandle};
use autologin_config::Config;

use crate::error::EngineError;
use crate::precheck::OauthPrechecker;
use crate::request::{LoginRequest, OauthChoice, OauthPrompt, StrategyKind};
use crate::status::{LoginOutcome, Stage, StatusEvent, StatusSink};
use crate::strategy;
use crate::strategy::form::FormStrategy;
use crate::strategy::oauth::OauthStrategy;

/// Page titles that count as a completed login during the user-action
/// wait.
const SUCCESS_TITLE_MARKERS: &[&str] = &["success", "welcome"];

/// Runs login attempts. Owns at most one browser session, reused
/// across attempts until [`LoginEngine::close_session`].
pub struct LoginEngine {
    config: Config,
    prechecker: OauthPrechecker,
    prompt: Option<OauthPrompt>,
    session: Option<SessionHandle>,
}

impl LoginEngine {
    pub fn new(config: Config) -> Self {
        let prechecker = OauthPrechecker::new(config.oauth.clone());
        Self {
            config,
            prechecker,
            prompt: None,
            session: None,
        }
    }

    /// Install the callback consulted when a site offers an OAuth
    /// login and the request did not pick a strategy.
    pub fn with_oauth_prompt(mut self, prompt: OauthPrompt) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    #[cfg(test)]
    pub(crate) fn inject_session(&mut self, session: SessionHandle) {
        self.session = Some(session);
    }

    /// Run one login attempt end to end. Progress events stream
    /// through `emit`; the terminal event is both emitted and returned
    /// inside the outcome.
    pub async fn attempt_login(
        &mut self,
        request: &LoginRequest,
        emit: StatusSink<'_>,
    ) -> Result<LoginOutcome, EngineError> {
        let strategy = match self.choose_strategy(request).await {
            Ok(s) => s,
            Err(outcome) => {
                emit(outcome.event.clone());
                return Ok(outcome);
            }
        };
        info!("Running {:?} strategy for {}", strategy, request.url);

        let outcome = match strategy {
            StrategyKind::Manual => strategy::manual::run(request),
            StrategyKind::Form => {
                let strat = FormStrategy::new(&self.config.detector, self.config.login.clone());
                let session = self.ensure_session().await?;
                strat.run(session.active_page(), request, emit).await
            }
            StrategyKind::Oauth => {
                let strat =
                    OauthStrategy::new(self.config.oauth.clone(), self.config.login.clone());
                let session = self.ensure_session().await?;
                strat.run(session, request, emit).await
            }
        };

        self.finish_attempt(outcome, emit).await
    }

    /// Pick the strategy for a request. An `Err` carries a terminal
    /// outcome that ends the attempt before any browser work.
    async fn choose_strategy(&self, request: &LoginRequest) -> Result<StrategyKind, LoginOutcome> {
        if let Some(explicit) = request.strategy {
            return Ok(explicit);
        }

        let oauth_detected = self.prechecker.check_url(&request.url).await;
        if !oauth_detected && !request.force_prompt {
            return Ok(StrategyKind::Form);
        }

        let Some(prompt) = &self.prompt else {
            let event = StatusEvent::terminal(
                &request.url,
                Stage::PromptMissing,
                Some(false),
                "Site offers an OAuth login but no prompt callback is installed",
            );
            return Err(LoginOutcome::from_event(event));
        };

        match prompt(&request.url) {
            OauthChoice::Automated if oauth_detected => Ok(StrategyKind::Oauth),
            OauthChoice::Automated => Ok(StrategyKind::Form),
            OauthChoice::Manual => Ok(StrategyKind::Manual),
            OauthChoice::Cancel => {
                let event = StatusEvent::terminal(
                    &request.url,
                    Stage::UserCancelled,
                    Some(false),
                    "Login attempt cancelled",
                );
                Err(LoginOutcome::from_event(event))
            }
        }
    }

    /// Apply the post-login delay, then publish the terminal event.
    async fn finish_attempt(
        &self,
        outcome: LoginOutcome,
        emit: StatusSink<'_>,
    ) -> Result<LoginOutcome, EngineError> {
        let delay = self.config.login.post_login_delay_secs;
        if outcome.succeeded() && delay > 0.0 && self.session.is_some() {
            emit(StatusEvent::progress(
                &outcome.event.url,
                Stage::PostLoginDelay,
                format!("Keeping the session open for {delay}s"),
            ));
            tokio::time::sleep(Duration::from_secs_f64(delay)).await;
        }

        emit(outcome.event.clone());
        Ok(outcome)
    }

    /// Block until the user has resolved whatever parked the attempt
    /// (CAPTCHA, 2FA, ambiguous form). Completion is inferred from a
    /// URL change or a success-looking title; `Ok(false)` means the
    /// timeout elapsed first.
    pub async fn wait_for_user_action(&self, timeout_secs: u64) -> Result<bool, EngineError> {
        let Some(session) = &self.session else {
            warn!("No session to watch for user action");
            return Ok(false);
        };
        let page = session.active_page();

        let start_url = page.url().await.unwrap_or_default();
        let started = tokio::time::Instant::now();
        debug!("Waiting up to {}s for user action at {}", timeout_secs, start_url);

        loop {
            if started.elapsed() >= Duration::from_secs(timeout_secs) {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_secs(1)).await;

            let url = page.url().await.unwrap_or_default();
            if !url.is_empty() && url != start_url {
                info!("User action detected: page moved to {}", url);
                return Ok(true);
            }

            let title = page.title().await.unwrap_or_default().to_lowercase();
            if SUCCESS_TITLE_MARKERS.iter().any(|m| title.contains(m)) {
                info!("User action detected: title reads {:?}", title);
                return Ok(true);
            }
        }
    }

    /// Tear down the browser session, if any. Safe to call twice.
    pub async fn close_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
    }

    async fn ensure_session(&mut self) -> Result<&mut SessionHandle, EngineError> {
        if self.session.is_none() {
            let options = BrowserOptions {
                debug_port: self.config.browser.debug_port,
                headless: self.config.browser.headless,
                profile_dir: self.config.browser.resolved_profile_dir(),
            };
            let session = SessionHandle::launch(&options).await?;
            self.session = Some(session);
        }
        match self.session.as_mut() {
            Some(session) => Ok(session),
            None => Err(EngineError::Browser(BrowserError::NotConnected)),
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
