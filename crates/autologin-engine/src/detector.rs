//! Login-form detection.
//!
//! Enumerates candidate (username, password) field pairs on a live
//! page, scores them, and either commits to a confident pair or
//! signals ambiguity with the ranked candidate list. False positives
//! are worse than asking the user, so unusual markup is reported as
//! ambiguous rather than guessed at.

use tracing::debug;

use autologin_browser::{BrowserError, ElementId, PageDriver};
use autologin_config::DetectorConfig;

use crate::status::CandidateSummary;

/// One scored (username-field, password-field) pairing. Handles are
/// only valid until the page navigates.
#[derive(Debug, Clone)]
pub struct FormCandidate {
    pub username_field: ElementId,
    pub password_field: ElementId,
    pub form: Option<ElementId>,
    pub score: f64,
    /// Human-readable field descriptors for manual override UIs.
    pub username_desc: String,
    pub password_desc: String,
}

#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub username_field: Option<ElementId>,
    pub password_field: Option<ElementId>,
    pub form: Option<ElementId>,
    pub score: f64,
    pub ambiguous: bool,
    /// All candidates, ranked by descending score.
    pub candidates: Vec<FormCandidate>,
}

impl DetectionResult {
    pub fn summaries(&self) -> Vec<CandidateSummary> {
        self.candidates
            .iter()
            .map(|c| CandidateSummary {
                username: c.username_desc.clone(),
                password: c.password_desc.clone(),
                score: c.score,
            })
            .collect()
    }

    fn ambiguous_without_pair(
        username_field: Option<ElementId>,
        password_field: Option<ElementId>,
    ) -> Self {
        Self {
            username_field,
            password_field,
            form: None,
            score: 0.0,
            ambiguous: true,
            candidates: Vec::new(),
        }
    }
}

/// A text or email input, with everything scoring needs.
struct FieldInfo {
    el: ElementId,
    /// Index in the enclosing scope's input order.
    position: usize,
    input_type: String,
    /// Lowercased name + id + placeholder + label text.
    tokens: String,
    descriptor: String,
}

pub struct FormDetector {
    margin: f64,
    floor: f64,
}

impl FormDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            margin: config.ambiguity_margin,
            floor: config.confidence_floor,
        }
    }

    pub async fn detect(&self, page: &dyn PageDriver) -> Result<DetectionResult, BrowserError> {
        let forms = page.query_selector_all("form").await?;
        let mut candidates: Vec<FormCandidate> = Vec::new();

        if forms.is_empty() {
            // Page-wide fallback: no form-relative ordering to measure,
            // so every pair gets the proximity bonus.
            let (usernames, passwords) = self.collect_fields(page, None).await?;
            if usernames.is_empty() || passwords.is_empty() {
                // Password-only steps land here too; one side present
                // is still worth surfacing for manual override.
                return Ok(DetectionResult::ambiguous_without_pair(
                    usernames.first().map(|f| f.el),
                    passwords.first().map(|f| f.el),
                ));
            }
            for u in &usernames {
                for p in &passwords {
                    candidates.push(FormCandidate {
                        username_field: u.el,
                        password_field: p.el,
                        form: None,
                        score: score_pair(u, p, true, false),
                        username_desc: u.descriptor.clone(),
                        password_desc: p.descriptor.clone(),
                    });
                }
            }
        } else {
            for form in forms {
                let (usernames, passwords) = self.collect_fields(page, Some(form)).await?;
                if usernames.is_empty() || passwords.is_empty() {
                    continue;
                }
                let has_submit = form_has_submit(page, form).await?;
                for u in &usernames {
                    for p in &passwords {
                        let proximity = u.position.abs_diff(p.position) <= 2;
                        candidates.push(FormCandidate {
                            username_field: u.el,
                            password_field: p.el,
                            form: Some(form),
                            score: score_pair(u, p, proximity, has_submit),
                            username_desc: u.descriptor.clone(),
                            password_desc: p.descriptor.clone(),
                        });
                    }
                }
            }

            if candidates.is_empty() {
                let (usernames, passwords) = self.collect_fields(page, None).await?;
                return Ok(DetectionResult::ambiguous_without_pair(
                    usernames.first().map(|f| f.el),
                    passwords.first().map(|f| f.el),
                ));
            }
        }

        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let best = &candidates[0];
        let runner_up_gap = candidates
            .get(1)
            .map(|second| best.score - second.score);
        let ambiguous = best.score < self.floor
            || runner_up_gap.is_some_and(|gap| gap < self.margin);

        debug!(
            "Form detection: {} candidate(s), best score {:.1}, ambiguous={}",
            candidates.len(),
            best.score,
            ambiguous
        );

        Ok(DetectionResult {
            username_field: Some(best.username_field),
            password_field: Some(best.password_field),
            form: best.form,
            score: best.score,
            ambiguous,
            candidates,
        })
    }

    /// Visible text/email inputs and password inputs in a scope, in
    /// input order.
    async fn collect_fields(
        &self,
        page: &dyn PageDriver,
        scope: Option<ElementId>,
    ) -> Result<(Vec<FieldInfo>, Vec<FieldInfo>), BrowserError> {
        let inputs = match scope {
            Some(scope) => page.query_selector_all_within(scope, "input").await?,
            None => page.query_selector_all("input").await?,
        };

        let mut usernames = Vec::new();
        let mut passwords = Vec::new();

        for (position, el) in inputs.iter().enumerate() {
            let input_type = page
                .attr(*el, "type")
                .await?
                .unwrap_or_default()
                .to_lowercase();

            let is_username = matches!(input_type.as_str(), "" | "text" | "email");
            let is_password = input_type == "password";
            if !is_username && !is_password {
                continue;
            }
            if !page.is_visible(*el).await? {
                continue;
            }

            let mut tokens = String::new();
            let mut descriptor = String::new();
            for attr in ["name", "id", "placeholder"] {
                if let Some(value) = page.attr(*el, attr).await? {
                    if descriptor.is_empty() {
                        descriptor = value.clone();
                    }
                    tokens.push_str(&value.to_lowercase());
                    tokens.push(' ');
                }
            }
            let label = page.label_text(*el).await?;
            if !label.is_empty() {
                tokens.push_str(&label.to_lowercase());
            }
            if descriptor.is_empty() {
                descriptor = if is_password {
                    "password input".to_string()
                } else {
                    format!("{} input", if input_type.is_empty() { "text" } else { &input_type })
                };
            }

            let info = FieldInfo {
                el: *el,
                position,
                input_type,
                tokens,
                descriptor,
            };
            if is_password {
                passwords.push(info);
            } else {
                usernames.push(info);
            }
        }

        Ok((usernames, passwords))
    }
}

/// Scoring table. Username descriptors: +2 "user", +2 "email", +1.5
/// type=email. Password: +2 "pass", +2 type=password. Either: +0.5
/// "login". +1.0 proximity, +0.5 submit control.
fn score_pair(u: &FieldInfo, p: &FieldInfo, proximity: bool, has_submit: bool) -> f64 {
    let mut score = 0.0;
    if u.tokens.contains("user") {
        score += 2.0;
    }
    if u.tokens.contains("email") {
        score += 2.0;
    }
    if u.input_type == "email" {
        score += 1.5;
    }
    if p.tokens.contains("pass") {
        score += 2.0;
    }
    if p.input_type == "password" {
        score += 2.0;
    }
    if u.tokens.contains("login") || p.tokens.contains("login") {
        score += 0.5;
    }
    if proximity {
        score += 1.0;
    }
    if has_submit {
        score += 0.5;
    }
    score
}

async fn form_has_submit(page: &dyn PageDriver, form: ElementId) -> Result<bool, BrowserError> {
    if !page
        .query_selector_all_within(form, "input[type='submit']")
        .await?
        .is_empty()
    {
        return Ok(true);
    }
    // A <button> without an explicit type submits its form.
    for button in page.query_selector_all_within(form, "button").await? {
        match page.attr(button, "type").await?.as_deref() {
            None | Some("submit") => return Ok(true),
            _ => {}
        }
    }
    Ok(false)
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;
