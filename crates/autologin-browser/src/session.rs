//! Lifecycle of one automation browser session.

use std::sync::Arc;

use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::cdp::CdpClient;
use crate::driver::PageDriver;
use crate::error::BrowserError;
use crate::launcher::{self, BrowserOptions};
use crate::page::CdpPage;

/// A running browser session: the process (if we launched it), the
/// protocol connection, and the page currently being driven.
///
/// The active page starts as the tab opened at launch and is only
/// replaced when a popup is adopted via [`SessionHandle::adopt_popup`].
pub struct SessionHandle {
    client: Option<Arc<CdpClient>>,
    process: Option<Child>,
    page: Box<dyn PageDriver>,
    /// Targets this session opened, oldest first. Closed individually
    /// on teardown so an attached browser keeps its other tabs.
    opened_targets: Vec<String>,
}

impl SessionHandle {
    /// Launch a browser (or connect to one already on the debug port)
    /// and open a fresh tab.
    pub async fn launch(options: &BrowserOptions) -> Result<Self, BrowserError> {
        let process = if launcher::is_browser_running(options).await {
            info!("Browser already running on port {}", options.debug_port);
            None
        } else {
            Some(launcher::launch(options).await?)
        };

        let client = Arc::new(CdpClient::connect(&options.endpoint()).await?);
        let session = client.new_page(None).await?;
        let page = CdpPage::new(client.clone(), session).await?;
        let opened_targets = page.target_id().map(String::from).into_iter().collect();

        Ok(Self {
            client: Some(client),
            process,
            page: Box::new(page),
            opened_targets,
        })
    }

    /// Build a session around an existing page driver. Used to drive
    /// the engine against scripted pages.
    pub fn from_page(page: Box<dyn PageDriver>) -> Self {
        Self {
            client: None,
            process: None,
            page,
            opened_targets: Vec::new(),
        }
    }

    pub fn active_page(&self) -> &dyn PageDriver {
        self.page.as_ref()
    }

    /// Make a popup the active page. All subsequent driving happens
    /// in the popup; the original tab stays open behind it.
    pub fn adopt_popup(&mut self, popup: Box<dyn PageDriver>) {
        debug!("Adopting popup as active page");
        if let Some(target) = popup.target_id() {
            self.opened_targets.push(target.to_string());
        }
        self.page = popup;
    }

    /// Tear the session down: close the tabs this session opened,
    /// then exit the browser only if we launched it. An attached
    /// browser keeps running. Each step is best-effort; calling twice
    /// is harmless.
    pub async fn close(&mut self) {
        if let Some(client) = self.client.take() {
            for target in self.opened_targets.drain(..) {
                if let Err(e) = client.close_page(&target).await {
                    debug!("Page close returned: {}", e);
                }
            }
            if self.process.is_some() {
                if let Err(e) = client.close_browser().await {
                    // Expected when the browser already exited.
                    debug!("Browser close returned: {}", e);
                }
            }
        }

        if let Some(mut child) = self.process.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill browser process: {}", e);
            }
            let _ = child.wait().await;
        }
    }
}
