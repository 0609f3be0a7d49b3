//! Protocol session attached to a single page target.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::SinkExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

use super::client::{PendingRequest, WsSink};
use super::error::CdpError;
use super::protocol::{
    BoxModel, CdpRequest, DomNode, KeyEventType, MouseButton, MouseEventType,
};

/// A session attached to one page. All DOM and input operations the
/// login engine needs run through here.
pub struct PageSession {
    target_id: String,
    session_id: String,
    ws_tx: Arc<tokio::sync::Mutex<WsSink>>,
    pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
    request_id: Arc<AtomicU64>,
}

impl PageSession {
    pub(crate) fn new(
        target_id: String,
        session_id: String,
        ws_tx: Arc<tokio::sync::Mutex<WsSink>>,
        pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
        request_id: Arc<AtomicU64>,
    ) -> Self {
        Self {
            target_id,
            session_id,
            ws_tx,
            pending,
            request_id,
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Send a command scoped to this page session.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
            session_id: Some(self.session_id.clone()),
        };

        let json = serde_json::to_string(&request)?;
        trace!("CDP session send: {}", json);

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.pending.lock().insert(id, PendingRequest { tx });

        {
            let mut ws = self.ws_tx.lock().await;
            ws.send(Message::Text(json.into())).await?;
        }

        match tokio::time::timeout(std::time::Duration::from_secs(30), rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::SessionClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(CdpError::Timeout(format!("Request {} timed out", method)))
            }
        }
    }

    pub(crate) async fn enable_domains(&self) -> Result<(), CdpError> {
        self.call("Page.enable", None).await?;
        self.call("DOM.enable", None).await?;
        self.call("Runtime.enable", None).await?;
        debug!("Enabled CDP domains for session {}", self.session_id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub async fn navigate(&self, url: &str) -> Result<(), CdpError> {
        let result = self
            .call("Page.navigate", Some(json!({"url": url})))
            .await?;

        if let Some(error) = result.get("errorText") {
            if !error.as_str().unwrap_or("").is_empty() {
                return Err(CdpError::NavigationFailed(
                    error.as_str().unwrap_or("Unknown error").to_string(),
                ));
            }
        }

        debug!("Navigated to {}", url);
        Ok(())
    }

    /// Poll `document.readyState` until the page settles.
    pub async fn wait_for_load(&self, timeout_ms: u64) -> Result<(), CdpError> {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(timeout_ms);

        loop {
            let result = self.evaluate("document.readyState").await?;

            if let Some(state) = result.as_str() {
                if state == "complete" || state == "interactive" {
                    return Ok(());
                }
            }

            if start.elapsed() > timeout {
                return Err(CdpError::Timeout("Page load timeout".to_string()));
            }

            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }

    pub async fn reload(&self) -> Result<(), CdpError> {
        self.call("Page.reload", None).await?;
        Ok(())
    }

    pub async fn get_url(&self) -> Result<String, CdpError> {
        let result = self.evaluate("window.location.href").await?;
        Ok(result.as_str().unwrap_or("").to_string())
    }

    pub async fn get_title(&self) -> Result<String, CdpError> {
        let result = self.evaluate("document.title").await?;
        Ok(result.as_str().unwrap_or("").to_string())
    }

    pub async fn get_content(&self) -> Result<String, CdpError> {
        let result = self.evaluate("document.documentElement.outerHTML").await?;
        Ok(result.as_str().unwrap_or("").to_string())
    }

    /// Spoof the user agent for subsequent requests from this page.
    pub async fn set_user_agent(&self, user_agent: &str) -> Result<(), CdpError> {
        self.call(
            "Emulation.setUserAgentOverride",
            Some(json!({"userAgent": user_agent})),
        )
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // JavaScript
    // ------------------------------------------------------------------

    pub async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let text = exception["text"].as_str().unwrap_or("Unknown error");
            return Err(CdpError::JavaScript(text.to_string()));
        }

        Ok(result["result"]["value"].clone())
    }

    /// Call a function with `this` bound to the given DOM node.
    pub async fn call_function_on_node(
        &self,
        node_id: i64,
        function: &str,
    ) -> Result<Value, CdpError> {
        let resolved = self
            .call("DOM.resolveNode", Some(json!({"nodeId": node_id})))
            .await?;
        let object_id = resolved["object"]["objectId"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("Missing objectId".to_string()))?;

        let result = self
            .call(
                "Runtime.callFunctionOn",
                Some(json!({
                    "objectId": object_id,
                    "functionDeclaration": function,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let text = exception["text"].as_str().unwrap_or("Unknown error");
            return Err(CdpError::JavaScript(text.to_string()));
        }

        Ok(result["result"]["value"].clone())
    }

    // ------------------------------------------------------------------
    // DOM
    // ------------------------------------------------------------------

    async fn get_document(&self) -> Result<DomNode, CdpError> {
        let result = self
            .call("DOM.getDocument", Some(json!({"depth": -1, "pierce": true})))
            .await?;
        let root: DomNode = serde_json::from_value(result["root"].clone())?;
        Ok(root)
    }

    /// Root node of the main document.
    pub async fn document_node_id(&self) -> Result<i64, CdpError> {
        Ok(self.get_document().await?.node_id)
    }

    /// Document roots of same-origin iframes, found by walking the
    /// pierced DOM tree.
    pub async fn frame_document_ids(&self) -> Result<Vec<i64>, CdpError> {
        let root = self.get_document().await?;
        let mut ids = Vec::new();
        collect_frame_documents(&root, &mut ids);
        Ok(ids)
    }

    /// Query selector scoped to a node (use the document root for a
    /// page-wide query).
    pub async fn query_selector_all(
        &self,
        scope_node_id: i64,
        selector: &str,
    ) -> Result<Vec<i64>, CdpError> {
        let result = self
            .call(
                "DOM.querySelectorAll",
                Some(json!({
                    "nodeId": scope_node_id,
                    "selector": selector,
                })),
            )
            .await?;

        let node_ids: Vec<i64> = result["nodeIds"]
            .as_array()
            .map(|arr| arr.iter().filter_map(|v| v.as_i64()).collect())
            .unwrap_or_default();

        Ok(node_ids)
    }

    /// Attribute map for a node. The protocol returns a flat
    /// name/value array.
    pub async fn get_attributes(&self, node_id: i64) -> Result<HashMap<String, String>, CdpError> {
        let result = self
            .call("DOM.getAttributes", Some(json!({"nodeId": node_id})))
            .await?;

        let flat: Vec<String> = result["attributes"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        Ok(flat
            .chunks_exact(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect())
    }

    /// Layout box for a node. `None` when the node has no layout
    /// (hidden or detached).
    pub async fn get_box_model(&self, node_id: i64) -> Result<Option<BoxModel>, CdpError> {
        let result = self
            .call("DOM.getBoxModel", Some(json!({"nodeId": node_id})))
            .await;

        match result {
            Ok(r) => {
                let model: BoxModel = serde_json::from_value(r["model"].clone())?;
                Ok(Some(model))
            }
            Err(CdpError::Protocol { code: -32000, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn scroll_into_view(&self, node_id: i64) -> Result<(), CdpError> {
        self.call(
            "DOM.scrollIntoViewIfNeeded",
            Some(json!({"nodeId": node_id})),
        )
        .await?;
        Ok(())
    }

    pub async fn focus(&self, node_id: i64) -> Result<(), CdpError> {
        self.call("DOM.focus", Some(json!({"nodeId": node_id})))
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    /// Native click at the node's layout center.
    pub async fn click_node(&self, node_id: i64) -> Result<(), CdpError> {
        let box_model = self
            .get_box_model(node_id)
            .await?
            .ok_or_else(|| CdpError::InvalidResponse("Node has no layout".to_string()))?;

        let (x, y) = quad_center(&box_model.content);
        self.click_at(x, y).await
    }

    pub async fn click_at(&self, x: f64, y: f64) -> Result<(), CdpError> {
        for event_type in [MouseEventType::MousePressed, MouseEventType::MouseReleased] {
            self.call(
                "Input.dispatchMouseEvent",
                Some(json!({
                    "type": event_type,
                    "x": x,
                    "y": y,
                    "button": MouseButton::Left,
                    "clickCount": 1,
                })),
            )
            .await?;
        }
        debug!("Clicked at ({}, {})", x, y);
        Ok(())
    }

    pub async fn type_text(&self, text: &str) -> Result<(), CdpError> {
        self.call("Input.insertText", Some(json!({"text": text})))
            .await?;
        Ok(())
    }

    pub async fn press_key(&self, key: &str, modifiers: i32) -> Result<(), CdpError> {
        for event_type in [KeyEventType::KeyDown, KeyEventType::KeyUp] {
            self.call(
                "Input.dispatchKeyEvent",
                Some(json!({
                    "type": event_type,
                    "key": key,
                    "modifiers": modifiers,
                })),
            )
            .await?;
        }
        Ok(())
    }

    /// Focus an input, select its contents, and type a replacement.
    pub async fn fill_node(&self, node_id: i64, value: &str) -> Result<(), CdpError> {
        self.focus(node_id).await?;
        // Control+a
        self.press_key("a", 2).await?;
        self.type_text(value).await?;
        Ok(())
    }
}

fn collect_frame_documents(node: &DomNode, out: &mut Vec<i64>) {
    if let Some(doc) = &node.content_document {
        out.push(doc.node_id);
        collect_frame_documents(doc, out);
    }
    if let Some(children) = &node.children {
        for child in children {
            collect_frame_documents(child, out);
        }
    }
}

fn quad_center(quad: &[f64]) -> (f64, f64) {
    if quad.len() >= 8 {
        let x = (quad[0] + quad[2] + quad[4] + quad[6]) / 4.0;
        let y = (quad[1] + quad[3] + quad[5] + quad[7]) / 4.0;
        (x, y)
    } else {
        (0.0, 0.0)
    }
}
