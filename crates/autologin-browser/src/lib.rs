//! # Autologin Browser
//!
//! Chromium control for login automation: launches a browser with a
//! persistent profile, speaks the DevTools protocol over WebSocket,
//! and exposes pages behind the [`PageDriver`] trait so the login
//! engine never touches the wire protocol directly.

pub mod cdp;
mod driver;
mod error;
mod launcher;
mod page;
mod session;

pub use driver::{ElementId, PageDriver};
pub use error::BrowserError;
pub use launcher::{find_chromium, BrowserOptions};
pub use page::CdpPage;
pub use session::SessionHandle;
