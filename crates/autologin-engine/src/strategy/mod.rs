//! The three login procedures behind one contract: each consumes a
//! request, emits progress events, and returns a terminal outcome.
//! The dispatcher in `engine.rs` knows nothing about their internals.

pub(crate) mod form;
pub(crate) mod manual;
pub(crate) mod oauth;

use url::Url;

use crate::status::{LoginOutcome, Stage, StatusEvent};

/// Lowercased host of a URL, if it parses.
pub(crate) fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// Terminal failure outcome with `stage = error`.
pub(crate) fn error_outcome(url: &str, message: impl Into<String>) -> LoginOutcome {
    LoginOutcome::from_event(StatusEvent::terminal(url, Stage::Error, Some(false), message))
}
