//! DevTools protocol plumbing: WebSocket client, per-page sessions,
//! and the wire message types.

mod client;
mod error;
mod protocol;
mod session;

pub use client::CdpClient;
pub use error::CdpError;
pub use protocol::{BrowserVersion, PageInfo, TargetInfo};
pub use session::PageSession;
