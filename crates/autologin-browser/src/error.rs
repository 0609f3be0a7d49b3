//! Browser-level errors.

use thiserror::Error;

use crate::cdp::CdpError;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Action failed: {0}")]
    ActionFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Browser not connected")]
    NotConnected,

    #[error("No Chromium-based browser found. Install Google Chrome or Chromium.")]
    BrowserNotFound,

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),
}

impl From<CdpError> for BrowserError {
    fn from(e: CdpError) -> Self {
        match e {
            CdpError::ConnectionFailed(msg) => BrowserError::ConnectionFailed(msg),
            CdpError::BrowserNotAvailable(msg) => BrowserError::ConnectionFailed(msg),
            CdpError::NavigationFailed(msg) => BrowserError::NavigationFailed(msg),
            CdpError::JavaScript(msg) => BrowserError::ActionFailed(format!("JS error: {}", msg)),
            CdpError::Timeout(msg) => BrowserError::Timeout(msg),
            CdpError::SessionClosed => BrowserError::NotConnected,
            _ => BrowserError::ActionFailed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cdp_timeout_maps_to_timeout() {
        let err: BrowserError = CdpError::Timeout("load".to_string()).into();
        assert!(matches!(err, BrowserError::Timeout(_)));
    }

    #[test]
    fn session_closed_maps_to_not_connected() {
        let err: BrowserError = CdpError::SessionClosed.into();
        assert!(matches!(err, BrowserError::NotConnected));
    }
}
