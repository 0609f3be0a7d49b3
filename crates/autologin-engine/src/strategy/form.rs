//! Native form login: detect, fill, submit, verify.

use std::time::Duration;

use tracing::{debug, warn};

use autologin_browser::{ElementId, PageDriver};
use autologin_config::{DetectorConfig, LoginConfig};

use crate::detector::FormDetector;
use crate::request::LoginRequest;
use crate::status::{LoginOutcome, Stage, StatusEvent, StatusSink};
use crate::strategy::{error_outcome, host_of};

/// Visible CAPTCHA widgets and containers.
const CAPTCHA_SELECTORS: &str = "iframe[src*='recaptcha'], iframe[src*='hcaptcha'], \
     .g-recaptcha, .h-captcha, #captcha, [class*='captcha']";

/// One-time-code inputs shown for a second factor.
const TWO_FACTOR_SELECTORS: &str = "input[autocomplete='one-time-code'], \
     input[name*='otp'], input[id*='otp'], input[name*='2fa'], input[name*='totp']";

/// Body phrases that mean the site rejected the credentials.
const FAILURE_PHRASES: &[&str] = &[
    "incorrect password",
    "invalid username",
    "invalid email",
    "invalid credentials",
    "login failed",
    "authentication failed",
];

/// URL fragments that mean we are still on a login page.
const LOGIN_URL_MARKERS: &[&str] = &["login", "signin", "sign-in", "log-in"];

pub(crate) struct FormStrategy {
    detector: FormDetector,
    login: LoginConfig,
}

impl FormStrategy {
    pub(crate) fn new(detector: &DetectorConfig, login: LoginConfig) -> Self {
        Self {
            detector: FormDetector::new(detector),
            login,
        }
    }

    pub(crate) async fn run(
        &self,
        page: &dyn PageDriver,
        request: &LoginRequest,
        emit: StatusSink<'_>,
    ) -> LoginOutcome {
        emit(StatusEvent::progress(&request.url, Stage::Navigating, "Opening login page"));
        if let Err(e) = page.goto(&request.url).await {
            return error_outcome(&request.url, format!("Navigation failed: {e}"));
        }
        if let Err(e) = page.wait_for_load(self.login.load_timeout_ms).await {
            // The page may still be usable.
            warn!("Load wait did not settle: {}", e);
        }

        emit(StatusEvent::progress(&request.url, Stage::DetectingForm, "Looking for a login form"));
        let detection = match self.detector.detect(page).await {
            Ok(d) => d,
            Err(e) => return error_outcome(&request.url, format!("Form detection failed: {e}")),
        };

        if detection.ambiguous {
            let event = StatusEvent::terminal(
                &request.url,
                Stage::AmbiguousForm,
                Some(false),
                "Could not confidently identify the login form",
            )
            .with_candidates(detection.summaries());
            return LoginOutcome::from_event(event);
        }

        // Ambiguity check guarantees both fields are present here.
        let (Some(username_field), Some(password_field)) =
            (detection.username_field, detection.password_field)
        else {
            return error_outcome(&request.url, "Detection returned no usable field pair");
        };

        emit(StatusEvent::progress(&request.url, Stage::FillingForm, "Filling credentials"));
        if let Err(e) = page.fill(username_field, &request.username).await {
            return error_outcome(&request.url, format!("Failed to fill username field: {e}"));
        }
        if let Err(e) = page.fill(password_field, &request.password).await {
            return error_outcome(&request.url, format!("Failed to fill password field: {e}"));
        }

        emit(StatusEvent::progress(&request.url, Stage::Submitting, "Submitting the form"));
        if let Err(e) = page.press(password_field, "Enter").await {
            debug!("Enter submit failed ({}), trying a submit control", e);
            if let Err(e) = self.click_submit(page, detection.form).await {
                return error_outcome(&request.url, format!("Could not submit the form: {e}"));
            }
        }
        tokio::time::sleep(Duration::from_millis(1000)).await;

        if captcha_present(page).await {
            let event = StatusEvent::terminal(
                &request.url,
                Stage::CaptchaDetected,
                Some(false),
                "CAPTCHA challenge detected; manual completion required",
            );
            return LoginOutcome::from_event(event);
        }

        if two_factor_present(page).await {
            let event = StatusEvent::terminal(
                &request.url,
                Stage::TwoFactorDetected,
                Some(false),
                "Two-factor prompt detected; manual completion required",
            );
            return LoginOutcome::from_event(event);
        }

        emit(StatusEvent::progress(&request.url, Stage::WaitingForNavigation, "Waiting for the site to respond"));
        if let Err(e) = page.wait_for_load(self.login.load_timeout_ms).await {
            warn!("Post-submit load wait did not settle: {}", e);
        }

        let final_url = page.url().await.unwrap_or_else(|_| request.url.clone());
        if check_login_success(page, &request.url).await {
            LoginOutcome::from_event(StatusEvent::terminal(
                &final_url,
                Stage::Success,
                Some(true),
                "Login succeeded",
            ))
        } else {
            LoginOutcome::from_event(StatusEvent::terminal(
                &final_url,
                Stage::Error,
                Some(false),
                "Login appears to have failed",
            ))
        }
    }

    async fn click_submit(
        &self,
        page: &dyn PageDriver,
        form: Option<ElementId>,
    ) -> Result<(), autologin_browser::BrowserError> {
        let selector = "input[type='submit'], button[type='submit'], button";
        let controls = match form {
            Some(form) => page.query_selector_all_within(form, selector).await?,
            None => page.query_selector_all(selector).await?,
        };
        let Some(control) = controls.into_iter().next() else {
            return Err(autologin_browser::BrowserError::ElementNotFound(
                "submit control".to_string(),
            ));
        };
        page.click(control).await
    }
}

/// Heuristic login verdict after submission.
///
/// Landing on a different domain is a success; still sitting on a
/// login-looking URL or a page carrying a rejection phrase is a
/// failure; anything else counts as success.
pub(crate) async fn check_login_success(page: &dyn PageDriver, original_url: &str) -> bool {
    let current = page.url().await.unwrap_or_default();

    if let (Some(original_host), Some(current_host)) = (host_of(original_url), host_of(&current)) {
        if original_host != current_host {
            debug!("Domain changed {} -> {}: treating as success", original_host, current_host);
            return true;
        }
    }

    let lowered = current.to_lowercase();
    if LOGIN_URL_MARKERS.iter().any(|m| lowered.contains(m)) {
        return false;
    }

    let content = page.content().await.unwrap_or_default().to_lowercase();
    if FAILURE_PHRASES.iter().any(|p| content.contains(p)) {
        return false;
    }

    true
}

/// Failure-tolerant: a DOM error here means "no CAPTCHA seen".
async fn captcha_present(page: &dyn PageDriver) -> bool {
    any_visible(page, CAPTCHA_SELECTORS).await
}

async fn two_factor_present(page: &dyn PageDriver) -> bool {
    any_visible(page, TWO_FACTOR_SELECTORS).await
}

async fn any_visible(page: &dyn PageDriver, selector: &str) -> bool {
    let elements = match page.query_selector_all(selector).await {
        Ok(els) => els,
        Err(e) => {
            warn!("Detection query failed: {}", e);
            return false;
        }
    };
    for el in elements {
        if page.is_visible(el).await.unwrap_or(false) {
            return true;
        }
    }
    false
}

#[cfg(test)]
#[path = "form_tests.rs"]
mod tests;
