//! # Autologin Engine
//!
//! Drives a browser session through an unknown login page. Three
//! interchangeable strategies (form fill, OAuth popup, manual handoff)
//! run behind one status-event protocol; a static prechecker decides
//! whether OAuth handling is needed before a browser is ever launched.

mod detector;
mod engine;
mod error;
mod precheck;
mod request;
mod status;
mod strategy;

#[cfg(test)]
pub(crate) mod testing;

pub use detector::{DetectionResult, FormCandidate, FormDetector};
pub use engine::LoginEngine;
pub use error::EngineError;
pub use precheck::OauthPrechecker;
pub use request::{LoginRequest, OauthChoice, OauthPrompt, StrategyKind};
pub use status::{CandidateSummary, LoginOutcome, Stage, StatusEvent, StatusSink};
