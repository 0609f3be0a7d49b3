//! Manual handoff: open the system browser and let the human drive.

use tracing::info;

use crate::request::LoginRequest;
use crate::status::{LoginOutcome, Stage, StatusEvent};
use crate::strategy::error_outcome;

pub(crate) fn run(request: &LoginRequest) -> LoginOutcome {
    match open::that(&request.url) {
        Ok(()) => {
            info!("Opened {} in the system browser", request.url);
            LoginOutcome::from_event(StatusEvent::terminal(
                &request.url,
                Stage::ManualLogin,
                None,
                "Opened in the system browser; complete the login manually",
            ))
        }
        Err(e) => error_outcome(&request.url, format!("Could not open the system browser: {e}")),
    }
}
