//! Static OAuth prechecker.
//!
//! Decides from raw HTML whether a login page offers a third-party
//! OAuth sign-in, without launching a browser. Detection is layered
//! most-specific first and short-circuits on the first hit.

use std::time::Duration;

use scraper::{Html, Selector};
use tracing::{debug, warn};

use autologin_config::OAuthConfig;

/// User agent sent with precheck requests. Some login pages serve a
/// degraded page to unknown clients.
pub(crate) const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Heuristic detector for a provider's OAuth login option.
pub struct OauthPrechecker {
    config: OAuthConfig,
    client: reqwest::Client,
}

impl OauthPrechecker {
    pub fn new(config: OAuthConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(DESKTOP_USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    /// Fetch a page and run detection on its HTML. Never errors:
    /// network failures and non-200 responses mean "no OAuth
    /// detected".
    pub async fn check_url(&self, url: &str) -> bool {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Precheck fetch failed for {}: {}", url, e);
                return false;
            }
        };

        if !response.status().is_success() {
            warn!("Precheck got HTTP {} for {}", response.status(), url);
            return false;
        }

        match response.text().await {
            Ok(html) => self.detect_in_html(&html),
            Err(e) => {
                warn!("Precheck body read failed for {}: {}", url, e);
                false
            }
        }
    }

    /// Pure detection over an HTML string. Idempotent and
    /// side-effect-free.
    pub fn detect_in_html(&self, html: &str) -> bool {
        let doc = Html::parse_document(html);

        if self.detect_strict(&doc) {
            debug!("OAuth detected via authorization URL");
            return true;
        }
        if self.detect_lexical(&doc) {
            debug!("OAuth detected via sign-in phrase");
            return true;
        }
        if self.detect_structural(&doc) {
            debug!("OAuth detected via class/data attributes");
            return true;
        }
        false
    }

    /// Layer 1: anchor href or form action containing the provider's
    /// canonical authorization path.
    fn detect_strict(&self, doc: &Html) -> bool {
        let auth_path = self.config.auth_path.to_lowercase();

        let anchors = Selector::parse("a[href]").expect("static selector");
        for el in doc.select(&anchors) {
            if let Some(href) = el.value().attr("href") {
                if href.to_lowercase().contains(&auth_path) {
                    return true;
                }
            }
        }

        let forms = Selector::parse("form[action]").expect("static selector");
        for el in doc.select(&forms) {
            if let Some(action) = el.value().attr("action") {
                if action.to_lowercase().contains(&auth_path) {
                    return true;
                }
            }
        }

        false
    }

    /// Layer 2: visible text, aria-label or title matching a sign-in
    /// phrase for the provider.
    fn detect_lexical(&self, doc: &Html) -> bool {
        let phrases = self.sign_in_phrases();
        let clickables = Selector::parse("button, a, div, span").expect("static selector");

        for el in doc.select(&clickables) {
            let mut haystacks: Vec<String> = Vec::new();

            let text: String = el.text().collect::<Vec<_>>().join(" ");
            if !text.trim().is_empty() {
                haystacks.push(text);
            }
            for attr in ["aria-label", "title"] {
                if let Some(value) = el.value().attr(attr) {
                    haystacks.push(value.to_string());
                }
            }

            for haystack in &haystacks {
                let normalized = normalize(haystack);
                if phrases.iter().any(|p| normalized.contains(p)) {
                    return true;
                }
            }
        }

        false
    }

    /// Layer 3: class tokens or data-provider/data-auth attributes
    /// carrying the provider token.
    fn detect_structural(&self, doc: &Html) -> bool {
        let provider = self.config.provider.to_lowercase();
        let class_patterns = [
            format!("{}-sign-in", provider),
            format!("{}-login", provider),
            format!("btn-{}", provider),
            format!("{}-auth", provider),
            format!("{}_oauth", provider),
        ];

        let all = Selector::parse("*").expect("static selector");
        for el in doc.select(&all) {
            if let Some(classes) = el.value().attr("class") {
                let classes = classes.to_lowercase();
                if class_patterns.iter().any(|p| classes.contains(p)) {
                    return true;
                }
                // The provider name alone must be a whole class token.
                if classes.split_whitespace().any(|token| token == provider) {
                    return true;
                }
            }

            for attr in ["data-provider", "data-auth"] {
                if let Some(value) = el.value().attr(attr) {
                    if value.to_lowercase().contains(&provider) {
                        return true;
                    }
                }
            }
        }

        false
    }

    fn sign_in_phrases(&self) -> Vec<String> {
        let p = self.config.provider.to_lowercase();
        vec![
            format!("sign in with {}", p),
            format!("sign in using {}", p),
            format!("continue with {}", p),
            format!("login with {}", p),
            format!("log in with {}", p),
            format!("{} sign in", p),
            format!("{} login", p),
        ]
    }
}

/// Lowercase and collapse runs of whitespace, so markup line breaks
/// inside a button do not defeat phrase matching.
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
