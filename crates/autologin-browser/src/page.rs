//! [`PageDriver`] implementation over a DevTools page session.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::cdp::{CdpClient, PageSession};
use crate::driver::{ElementId, PageDriver};
use crate::error::BrowserError;

const POPUP_POLL_MS: u64 = 200;

/// A live page driven over the DevTools protocol.
pub struct CdpPage {
    client: Arc<CdpClient>,
    session: Arc<PageSession>,
    /// Targets that existed when this page was created. A popup is a
    /// page target that appears later and is not one of these.
    known_targets: HashSet<String>,
}

impl CdpPage {
    /// Wrap an attached session. Snapshots the current target set so
    /// popups opened later can be told apart from pre-existing tabs.
    pub async fn new(client: Arc<CdpClient>, session: PageSession) -> Result<Self, BrowserError> {
        let known_targets = client
            .get_targets()
            .await?
            .into_iter()
            .map(|t| t.target_id)
            .collect();

        Ok(Self {
            client,
            session: Arc::new(session),
            known_targets,
        })
    }

}

#[async_trait]
impl PageDriver for CdpPage {
    fn target_id(&self) -> Option<&str> {
        Some(self.session.target_id())
    }

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.session.navigate(url).await?;
        Ok(())
    }

    async fn wait_for_load(&self, timeout_ms: u64) -> Result<(), BrowserError> {
        self.session.wait_for_load(timeout_ms).await?;
        Ok(())
    }

    async fn reload(&self) -> Result<(), BrowserError> {
        self.session.reload().await?;
        Ok(())
    }

    async fn url(&self) -> Result<String, BrowserError> {
        Ok(self.session.get_url().await?)
    }

    async fn title(&self) -> Result<String, BrowserError> {
        Ok(self.session.get_title().await?)
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.session.get_content().await?)
    }

    async fn set_user_agent(&self, user_agent: &str) -> Result<(), BrowserError> {
        self.session.set_user_agent(user_agent).await?;
        Ok(())
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<ElementId>, BrowserError> {
        Ok(self.query_selector_all(selector).await?.into_iter().next())
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementId>, BrowserError> {
        let root = self.session.document_node_id().await?;
        let ids = self.session.query_selector_all(root, selector).await?;
        Ok(ids.into_iter().map(ElementId).collect())
    }

    async fn query_selector_all_within(
        &self,
        scope: ElementId,
        selector: &str,
    ) -> Result<Vec<ElementId>, BrowserError> {
        let ids = self.session.query_selector_all(scope.0, selector).await?;
        Ok(ids.into_iter().map(ElementId).collect())
    }

    async fn frame_documents(&self) -> Result<Vec<ElementId>, BrowserError> {
        let ids = self.session.frame_document_ids().await?;
        Ok(ids.into_iter().map(ElementId).collect())
    }

    async fn attr(&self, el: ElementId, name: &str) -> Result<Option<String>, BrowserError> {
        let attrs = self.session.get_attributes(el.0).await?;
        Ok(attrs.get(name).cloned())
    }

    async fn inner_text(&self, el: ElementId) -> Result<String, BrowserError> {
        let value = self
            .session
            .call_function_on_node(
                el.0,
                "function() { return this.innerText || this.textContent || ''; }",
            )
            .await?;
        Ok(value.as_str().unwrap_or("").to_string())
    }

    async fn label_text(&self, el: ElementId) -> Result<String, BrowserError> {
        let value = self
            .session
            .call_function_on_node(
                el.0,
                "function() { \
                    if (this.labels && this.labels.length) return this.labels[0].innerText; \
                    const wrapper = this.closest('label'); \
                    return wrapper ? wrapper.innerText : ''; \
                }",
            )
            .await?;
        Ok(value.as_str().unwrap_or("").to_string())
    }

    async fn is_visible(&self, el: ElementId) -> Result<bool, BrowserError> {
        let model = self.session.get_box_model(el.0).await?;
        Ok(model.map(|m| m.width > 0 && m.height > 0).unwrap_or(false))
    }

    async fn fill(&self, el: ElementId, value: &str) -> Result<(), BrowserError> {
        self.session.fill_node(el.0, value).await?;
        Ok(())
    }

    async fn click(&self, el: ElementId) -> Result<(), BrowserError> {
        self.session.scroll_into_view(el.0).await?;
        self.session.click_node(el.0).await?;
        Ok(())
    }

    async fn js_click(&self, el: ElementId) -> Result<(), BrowserError> {
        self.session
            .call_function_on_node(el.0, "function() { this.click(); }")
            .await?;
        Ok(())
    }

    async fn press(&self, el: ElementId, key: &str) -> Result<(), BrowserError> {
        self.session.focus(el.0).await?;
        self.session.press_key(key, 0).await?;
        Ok(())
    }

    async fn hide_element(&self, el: ElementId) -> Result<(), BrowserError> {
        self.session
            .call_function_on_node(
                el.0,
                "function() { this.style.display = 'none'; this.style.pointerEvents = 'none'; }",
            )
            .await?;
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError> {
        Ok(self.session.evaluate(expression).await?)
    }

    async fn wait_for_popup(
        &self,
        timeout_ms: u64,
    ) -> Result<Option<Box<dyn PageDriver>>, BrowserError> {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(timeout_ms);

        loop {
            let targets = self.client.get_targets().await?;
            let popup = targets.into_iter().find(|t| {
                t.target_type == "page"
                    && t.target_id != self.session.target_id()
                    && !self.known_targets.contains(&t.target_id)
            });

            if let Some(target) = popup {
                debug!("Popup detected: {} ({})", target.target_id, target.url);
                let session = self.client.attach_page(&target.target_id).await?;
                let page = CdpPage::new(self.client.clone(), session).await?;
                return Ok(Some(Box::new(page)));
            }

            if start.elapsed() > timeout {
                return Ok(None);
            }

            tokio::time::sleep(std::time::Duration::from_millis(POPUP_POLL_MS)).await;
        }
    }
}
