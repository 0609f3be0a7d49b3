//! The page abstraction the login engine programs against.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BrowserError;

/// Opaque handle to a DOM element on a page. Only meaningful to the
/// driver that minted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub i64);

/// One browser page the engine can drive.
///
/// The live implementation is [`crate::CdpPage`]; tests substitute a
/// scripted mock. Element handles come from the query methods and are
/// valid until the page navigates.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// DevTools target id, when the page is backed by a real browser
    /// tab. Used for per-tab teardown.
    fn target_id(&self) -> Option<&str> {
        None
    }

    // Navigation and page state

    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    /// Wait until the document is interactive or complete.
    async fn wait_for_load(&self, timeout_ms: u64) -> Result<(), BrowserError>;

    async fn reload(&self) -> Result<(), BrowserError>;

    async fn url(&self) -> Result<String, BrowserError>;

    async fn title(&self) -> Result<String, BrowserError>;

    /// Full serialized HTML of the current document.
    async fn content(&self) -> Result<String, BrowserError>;

    async fn set_user_agent(&self, user_agent: &str) -> Result<(), BrowserError>;

    // Element queries

    async fn query_selector(&self, selector: &str) -> Result<Option<ElementId>, BrowserError>;

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementId>, BrowserError>;

    /// Query scoped to a subtree, e.g. inputs inside one form.
    async fn query_selector_all_within(
        &self,
        scope: ElementId,
        selector: &str,
    ) -> Result<Vec<ElementId>, BrowserError>;

    /// Document roots of same-origin frames, for per-frame scans.
    async fn frame_documents(&self) -> Result<Vec<ElementId>, BrowserError>;

    // Element inspection

    async fn attr(&self, el: ElementId, name: &str) -> Result<Option<String>, BrowserError>;

    async fn inner_text(&self, el: ElementId) -> Result<String, BrowserError>;

    /// Text of the label associated with an input, if any.
    async fn label_text(&self, el: ElementId) -> Result<String, BrowserError>;

    async fn is_visible(&self, el: ElementId) -> Result<bool, BrowserError>;

    // Element interaction

    async fn fill(&self, el: ElementId, value: &str) -> Result<(), BrowserError>;

    /// Native click: scroll into view, then synthesize mouse events
    /// at the element's center.
    async fn click(&self, el: ElementId) -> Result<(), BrowserError>;

    /// Scripted click, for elements a native click cannot reach.
    async fn js_click(&self, el: ElementId) -> Result<(), BrowserError>;

    async fn press(&self, el: ElementId, key: &str) -> Result<(), BrowserError>;

    /// Remove an element from hit-testing without deleting it.
    async fn hide_element(&self, el: ElementId) -> Result<(), BrowserError>;

    // Scripting

    async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError>;

    // Popups

    /// Wait for a popup window opened by this page. Returns `None`
    /// when the timeout elapses without one appearing.
    async fn wait_for_popup(
        &self,
        timeout_ms: u64,
    ) -> Result<Option<Box<dyn PageDriver>>, BrowserError>;
}
