//! Engine errors.
//!
//! Most failures inside a login attempt are converted into terminal
//! status events rather than surfaced here; this enum covers what is
//! genuinely fatal for the attempt (session launch, lost browser).

use thiserror::Error;

use autologin_browser::BrowserError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),
}
