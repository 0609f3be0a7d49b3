//! Delegated OAuth login: find the provider button, survive overlays,
//! follow the popup or same-tab handoff, and drive the provider's own
//! sign-in form.

use std::time::Duration;

use tracing::{debug, warn};

use autologin_browser::{BrowserError, ElementId, PageDriver, SessionHandle};
use autologin_config::{LoginConfig, OAuthConfig};

use crate::precheck::DESKTOP_USER_AGENT;
use crate::request::LoginRequest;
use crate::status::{LoginOutcome, Stage, StatusEvent, StatusSink};
use crate::strategy::{error_outcome, host_of};

/// Attribute planted by the XPath locator pass so the match can be
/// retrieved as an element handle.
const LOCATOR_MARK: &str = "data-autologin-target";

/// Elements that commonly sit over a sign-in button and swallow the
/// click.
const OVERLAY_SELECTORS: &str =
    "div[id$='-overlay'], [class*='modal-backdrop'], [class*='overlay'], [class*='consent']";

const OVERLAY_POLL: Duration = Duration::from_millis(200);
const OVERLAY_TIMEOUT: Duration = Duration::from_secs(5);
const POPUP_TIMEOUT_MS: u64 = 5_000;

pub(crate) struct OauthStrategy {
    oauth: OAuthConfig,
    login: LoginConfig,
}

impl OauthStrategy {
    pub(crate) fn new(oauth: OAuthConfig, login: LoginConfig) -> Self {
        Self { oauth, login }
    }

    pub(crate) async fn run(
        &self,
        session: &mut SessionHandle,
        request: &LoginRequest,
        emit: StatusSink<'_>,
    ) -> LoginOutcome {
        // Phase 1 runs on the original page; the borrow ends before a
        // popup can be adopted.
        let popup = {
            let page = session.active_page();

            emit(StatusEvent::progress(&request.url, Stage::Navigating, "Opening login page"));
            if let Err(e) = page.goto(&request.url).await {
                return error_outcome(&request.url, format!("Navigation failed: {e}"));
            }
            if let Err(e) = page.wait_for_load(self.login.load_timeout_ms).await {
                warn!("Load wait did not settle: {}", e);
            }

            emit(StatusEvent::progress(
                &request.url,
                Stage::DetectingOauth,
                format!("Looking for the {} sign-in button", self.oauth.provider),
            ));
            let button = match self.locate_button(page).await {
                Ok(Some(el)) => el,
                Ok(None) => {
                    return error_outcome(
                        &request.url,
                        format!("No {} sign-in button found", self.oauth.provider),
                    );
                }
                Err(e) => {
                    return error_outcome(&request.url, format!("Button search failed: {e}"));
                }
            };

            emit(StatusEvent::progress(&request.url, Stage::ClickingOauth, "Clicking the sign-in button"));
            self.clear_overlays(page).await;
            if let Err(e) = self.click_with_fallback(page, button).await {
                return error_outcome(&request.url, format!("Could not click the sign-in button: {e}"));
            }

            self.settle_after_click(page).await
        };

        if let Some(popup) = popup {
            if let Err(e) = popup.wait_for_load(self.login.load_timeout_ms).await {
                warn!("Popup load wait did not settle: {}", e);
            }
            session.adopt_popup(popup);
        }

        let page = session.active_page();
        self.drive_provider_form(page, request, emit).await
    }

    /// Five escalating locator passes, retried once after a delay
    /// with a spoofed user agent and reload.
    async fn locate_button(
        &self,
        page: &dyn PageDriver,
    ) -> Result<Option<ElementId>, BrowserError> {
        for attempt in 0..2 {
            if let Some(el) = self.locate_once(page).await? {
                return Ok(Some(el));
            }
            if attempt == 0 {
                debug!("Sign-in button not found, retrying after reload");
                tokio::time::sleep(Duration::from_secs(2)).await;
                if let Err(e) = page.set_user_agent(DESKTOP_USER_AGENT).await {
                    warn!("User agent override failed: {}", e);
                }
                if let Err(e) = page.reload().await {
                    warn!("Reload failed: {}", e);
                }
                if let Err(e) = page.wait_for_load(self.login.load_timeout_ms).await {
                    warn!("Reload wait did not settle: {}", e);
                }
            }
        }
        Ok(None)
    }

    async fn locate_once(&self, page: &dyn PageDriver) -> Result<Option<ElementId>, BrowserError> {
        // Pass 1: fixed selectors.
        for selector in self.fixed_selectors() {
            for el in page.query_selector_all(&selector).await? {
                if page.is_visible(el).await? {
                    debug!("Sign-in button matched selector {}", selector);
                    return Ok(Some(el));
                }
            }
        }

        // Pass 2: case-insensitive XPath text search. The matched
        // node is marked with an attribute so it can be re-queried as
        // a handle.
        match page.evaluate(&self.xpath_mark_script()).await {
            Ok(found) if found.as_bool() == Some(true) => {
                if let Some(el) = page.query_selector(&format!("[{LOCATOR_MARK}]")).await? {
                    debug!("Sign-in button matched via XPath text search");
                    return Ok(Some(el));
                }
            }
            Ok(_) => {}
            Err(e) => warn!("XPath locator pass failed: {}", e),
        }

        // Pass 3: broad clickable scan on the main document.
        if let Some(el) = self.scan_clickables(page, None).await? {
            return Ok(Some(el));
        }

        // Pass 4: the same scan inside each same-origin frame.
        for frame in page.frame_documents().await? {
            if let Some(el) = self.scan_clickables(page, Some(frame)).await? {
                debug!("Sign-in button found inside a frame");
                return Ok(Some(el));
            }
        }

        Ok(None)
    }

    fn fixed_selectors(&self) -> Vec<String> {
        let p = self.oauth.provider.to_lowercase();
        vec![
            format!("a[href*='{}']", self.oauth.account_domain),
            format!("[data-provider*='{p}']"),
            format!("[data-auth*='{p}']"),
            format!("[class*='{p}-sign-in']"),
            format!("[class*='{p}-login']"),
            format!("[class*='btn-{p}']"),
            format!("[class*='{p}-auth']"),
            format!("[aria-label*='{p}']"),
        ]
    }

    fn xpath_mark_script(&self) -> String {
        let p = self.oauth.provider.to_lowercase();
        format!(
            "(function() {{ \
                const xpath = \"//*[self::button or self::a or self::div or self::span]\
[contains(translate(normalize-space(.), 'ABCDEFGHIJKLMNOPQRSTUVWXYZ', 'abcdefghijklmnopqrstuvwxyz'), '{p}')]\"; \
                const hit = document.evaluate(xpath, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue; \
                if (!hit) return false; \
                hit.setAttribute('{LOCATOR_MARK}', '1'); \
                return true; \
            }})()"
        )
    }

    async fn scan_clickables(
        &self,
        page: &dyn PageDriver,
        frame: Option<ElementId>,
    ) -> Result<Option<ElementId>, BrowserError> {
        let provider = self.oauth.provider.to_lowercase();
        let selector = "button, a, div, span";
        let elements = match frame {
            Some(frame) => page.query_selector_all_within(frame, selector).await?,
            None => page.query_selector_all(selector).await?,
        };

        for el in elements {
            if !page.is_visible(el).await.unwrap_or(false) {
                continue;
            }
            let mut haystack = page.inner_text(el).await.unwrap_or_default();
            for attr in ["aria-label", "title"] {
                if let Ok(Some(value)) = page.attr(el, attr).await {
                    haystack.push(' ');
                    haystack.push_str(&value);
                }
            }
            if haystack.to_lowercase().contains(&provider) {
                return Ok(Some(el));
            }
        }
        Ok(None)
    }

    /// Hide anything visibly sitting over the page until nothing
    /// intercepting remains or the timeout elapses.
    async fn clear_overlays(&self, page: &dyn PageDriver) {
        let start = tokio::time::Instant::now();
        loop {
            let mut hid_any = false;
            match page.query_selector_all(OVERLAY_SELECTORS).await {
                Ok(overlays) => {
                    for overlay in overlays {
                        if page.is_visible(overlay).await.unwrap_or(false) {
                            if let Err(e) = page.hide_element(overlay).await {
                                warn!("Failed to hide overlay: {}", e);
                            } else {
                                hid_any = true;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!("Overlay query failed: {}", e);
                    return;
                }
            }

            if !hid_any || start.elapsed() > OVERLAY_TIMEOUT {
                return;
            }
            tokio::time::sleep(OVERLAY_POLL).await;
        }
    }

    /// Native click, then scripted click, the whole sequence retried
    /// once.
    async fn click_with_fallback(
        &self,
        page: &dyn PageDriver,
        button: ElementId,
    ) -> Result<(), BrowserError> {
        let mut last_err = None;
        for _ in 0..2 {
            match page.click(button).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!("Native click failed ({}), trying scripted click", e);
                    last_err = Some(e);
                }
            }
            match page.js_click(button).await {
                Ok(()) => return Ok(()),
                Err(e) => last_err = Some(e),
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        Err(last_err.unwrap_or(BrowserError::ActionFailed("click failed".to_string())))
    }

    /// Race a popup appearing against the same-page navigation
    /// settling; whichever resolves first wins.
    async fn settle_after_click(&self, page: &dyn PageDriver) -> Option<Box<dyn PageDriver>> {
        let popup_wait = page.wait_for_popup(POPUP_TIMEOUT_MS);
        let nav_wait = async {
            // Give a popup a head start; an already-idle page would
            // otherwise win the race instantly.
            tokio::time::sleep(Duration::from_millis(1500)).await;
            if let Err(e) = page.wait_for_load(self.login.load_timeout_ms).await {
                warn!("Post-click load wait did not settle: {}", e);
            }
        };

        tokio::select! {
            popup = popup_wait => popup.unwrap_or_default(),
            _ = nav_wait => None,
        }
    }

    async fn drive_provider_form(
        &self,
        page: &dyn PageDriver,
        request: &LoginRequest,
        emit: StatusSink<'_>,
    ) -> LoginOutcome {
        if let Err(e) = page.wait_for_load(self.login.load_timeout_ms).await {
            warn!("Provider page load wait did not settle: {}", e);
        }

        let current = page.url().await.unwrap_or_default();
        if !self.on_provider_origin(&current) {
            // Already authorized, or the site handled the round trip
            // itself. Jump straight to the verdict.
            return self.finish(page, request, emit).await;
        }

        emit(StatusEvent::progress(
            &current,
            Stage::FillingProviderForm,
            format!("Signing in at {}", self.oauth.account_domain),
        ));

        // Identifier step.
        if let Ok(Some(email)) = page
            .query_selector("input[type='email'], input[name='identifier']")
            .await
        {
            if let Err(e) = page.fill(email, &request.username).await {
                return error_outcome(&current, format!("Failed to fill provider identifier: {e}"));
            }
            let _ = page.press(email, "Enter").await;
            let _ = page.wait_for_load(self.login.load_timeout_ms).await;
            tokio::time::sleep(Duration::from_millis(1000)).await;
        }

        if let Some(outcome) = self.two_factor_outcome(page).await {
            return outcome;
        }

        // Password step; the field can take a moment to render.
        let password_field = self
            .wait_for_selector(page, "input[type='password'], input[name='Passwd']", 5_000)
            .await;
        let Some(password_field) = password_field else {
            let url = page.url().await.unwrap_or(current);
            return error_outcome(&url, "Provider password field never appeared");
        };
        if let Err(e) = page.fill(password_field, &request.password).await {
            let url = page.url().await.unwrap_or(current);
            return error_outcome(&url, format!("Failed to fill provider password: {e}"));
        }
        let _ = page.press(password_field, "Enter").await;
        let _ = page.wait_for_load(self.login.load_timeout_ms).await;
        tokio::time::sleep(Duration::from_millis(1000)).await;

        if let Some(outcome) = self.two_factor_outcome(page).await {
            return outcome;
        }

        // Provider-reported credential errors land in the assertive
        // live region.
        if let Ok(Some(error_region)) = page.query_selector("[aria-live='assertive']").await {
            let text = page.inner_text(error_region).await.unwrap_or_default();
            if !text.trim().is_empty() {
                let url = page.url().await.unwrap_or_default();
                return error_outcome(&url, format!("Provider rejected the sign-in: {}", text.trim()));
            }
        }

        let url = page.url().await.unwrap_or_default();
        emit(StatusEvent::progress(
            &url,
            Stage::WaitingForProvider,
            "Waiting for the provider to redirect back",
        ));
        self.wait_until_off_provider(page).await;

        self.finish(page, request, emit).await
    }

    /// Terminal parking event when the provider raised a second
    /// factor. Resolution happens through the shared user-action wait.
    async fn two_factor_outcome(&self, page: &dyn PageDriver) -> Option<LoginOutcome> {
        let url = page.url().await.unwrap_or_default();
        let lowered = url.to_lowercase();
        if self
            .oauth
            .two_factor_markers
            .iter()
            .any(|m| lowered.contains(&m.to_lowercase()))
        {
            let event = StatusEvent::terminal(
                &url,
                Stage::WaitingForTwoFactor,
                Some(false),
                "Provider requested a second factor; complete it manually",
            );
            return Some(LoginOutcome::from_event(event));
        }
        None
    }

    async fn wait_for_selector(
        &self,
        page: &dyn PageDriver,
        selector: &str,
        timeout_ms: u64,
    ) -> Option<ElementId> {
        let start = tokio::time::Instant::now();
        loop {
            if let Ok(Some(el)) = page.query_selector(selector).await {
                return Some(el);
            }
            if start.elapsed() > Duration::from_millis(timeout_ms) {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    async fn wait_until_off_provider(&self, page: &dyn PageDriver) {
        let start = tokio::time::Instant::now();
        while start.elapsed() < Duration::from_secs(15) {
            let url = page.url().await.unwrap_or_default();
            if !self.on_provider_origin(&url) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    fn on_provider_origin(&self, url: &str) -> bool {
        host_of(url).is_some_and(|h| h == self.oauth.account_domain.to_lowercase())
    }

    async fn finish(
        &self,
        page: &dyn PageDriver,
        request: &LoginRequest,
        _emit: StatusSink<'_>,
    ) -> LoginOutcome {
        let current = page.url().await.unwrap_or_default();
        if oauth_login_succeeded(&current, &request.url, &self.oauth) {
            LoginOutcome::from_event(StatusEvent::terminal(
                &current,
                Stage::Success,
                Some(true),
                "OAuth login succeeded",
            ))
        } else {
            LoginOutcome::from_event(StatusEvent::terminal(
                &current,
                Stage::Error,
                Some(false),
                "OAuth flow did not leave the provider sign-in page",
            ))
        }
    }
}

/// Verdict after the OAuth round trip: still parked on the provider's
/// sign-in origin means failure; landing back on the original site, a
/// known provider service, or anywhere else means success.
fn oauth_login_succeeded(current: &str, original: &str, config: &OAuthConfig) -> bool {
    let Some(current_host) = host_of(current) else {
        return false;
    };
    if current_host == config.account_domain.to_lowercase() {
        return false;
    }
    if host_of(original).is_some_and(|o| o == current_host) {
        return true;
    }
    if config.service_domains.iter().any(|d| {
        let d = d.to_lowercase();
        current_host == d || current_host.ends_with(&format!(".{d}"))
    }) {
        return true;
    }
    true
}

#[cfg(test)]
#[path = "oauth_tests.rs"]
mod tests;
