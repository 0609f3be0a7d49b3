//! The status-event protocol streamed to callers during an attempt.
//!
//! Events for one attempt are emitted strictly in stage order. Every
//! in-progress event carries `success: None`; only the final event of
//! an attempt sets `Some(_)`.

use serde::{Deserialize, Serialize};

/// Phase of a login attempt. Closed vocabulary, shared by all three
/// strategies plus the dispatcher terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Navigating,
    DetectingForm,
    FillingForm,
    Submitting,
    CaptchaDetected,
    TwoFactorDetected,
    AmbiguousForm,
    WaitingForNavigation,
    DetectingOauth,
    ClickingOauth,
    FillingProviderForm,
    WaitingForTwoFactor,
    WaitingForProvider,
    ManualLogin,
    PromptMissing,
    UserCancelled,
    PostLoginDelay,
    Success,
    Error,
}

/// One ranked detection candidate, in caller-displayable form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub username: String,
    pub password: String,
    pub score: f64,
}

/// Uniform progress/result record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub url: String,
    pub stage: Stage,
    /// `None` while in progress; set only on the terminal event.
    pub success: Option<bool>,
    pub message: String,
    /// Ranked form candidates, present on `ambiguous_form` events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<CandidateSummary>>,
}

impl StatusEvent {
    pub fn progress(url: &str, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            stage,
            success: None,
            message: message.into(),
            candidates: None,
        }
    }

    pub fn terminal(url: &str, stage: Stage, success: Option<bool>, message: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            stage,
            success,
            message: message.into(),
            candidates: None,
        }
    }

    pub fn with_candidates(mut self, candidates: Vec<CandidateSummary>) -> Self {
        self.candidates = Some(candidates);
        self
    }
}

/// Final result of an attempt.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub event: StatusEvent,
    /// True when a human has to step in before the login can finish.
    pub requires_user_action: bool,
}

impl LoginOutcome {
    /// Derive the user-action flag from the terminal stage.
    pub fn from_event(event: StatusEvent) -> Self {
        let requires_user_action = matches!(
            event.stage,
            Stage::CaptchaDetected
                | Stage::TwoFactorDetected
                | Stage::WaitingForTwoFactor
                | Stage::AmbiguousForm
                | Stage::ManualLogin
        );
        Self {
            event,
            requires_user_action,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.event.success == Some(true)
    }
}

/// Callback receiving status events as the attempt progresses.
pub type StatusSink<'a> = &'a (dyn Fn(StatusEvent) + Send + Sync);
