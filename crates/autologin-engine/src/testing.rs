//! Scripted [`PageDriver`] for engine tests.
//!
//! `MockPage` holds a flat element list with parent links and matches
//! a small selector subset: tag, `#id`, `.class`, `[attr]`,
//! `[attr='v']`, `[attr*='v']`, `[attr^='v']`, `[attr$='v']`, and
//! comma-separated lists of those. Interactions are recorded into a
//! shared action log so tests can assert on them after the page has
//! been moved into a session.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use autologin_browser::{BrowserError, ElementId, PageDriver};

#[derive(Debug, Clone)]
struct MockElement {
    id: i64,
    tag: String,
    attrs: HashMap<String, String>,
    text: String,
    label: String,
    visible: bool,
    parent: Option<i64>,
}

pub(crate) struct MockPage {
    elements: Mutex<Vec<MockElement>>,
    next_id: Mutex<i64>,
    url: Mutex<String>,
    title: Mutex<String>,
    content: Mutex<String>,
    /// URLs returned by successive `url()` calls before falling back
    /// to the current URL.
    url_queue: Mutex<VecDeque<String>>,
    /// Where pressing Enter navigates, if anywhere.
    submit_target: Mutex<Option<String>>,
    /// Per-element click navigation targets.
    click_targets: Mutex<HashMap<i64, String>>,
    /// Popups handed out by `wait_for_popup`, in order.
    popups: Mutex<VecDeque<MockPage>>,
    /// Element ids acting as frame document roots.
    frames: Mutex<Vec<i64>>,
    actions: Arc<Mutex<Vec<String>>>,
}

impl MockPage {
    pub(crate) fn new(url: &str) -> Self {
        Self {
            elements: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
            url: Mutex::new(url.to_string()),
            title: Mutex::new(String::new()),
            content: Mutex::new(String::new()),
            url_queue: Mutex::new(VecDeque::new()),
            submit_target: Mutex::new(None),
            click_targets: Mutex::new(HashMap::new()),
            popups: Mutex::new(VecDeque::new()),
            frames: Mutex::new(Vec::new()),
            actions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    // -------- builders --------

    pub(crate) fn add_element(&self, tag: &str, attrs: &[(&str, &str)]) -> ElementId {
        self.insert(tag, attrs, None)
    }

    pub(crate) fn add_child(&self, parent: ElementId, tag: &str, attrs: &[(&str, &str)]) -> ElementId {
        self.insert(tag, attrs, Some(parent.0))
    }

    fn insert(&self, tag: &str, attrs: &[(&str, &str)], parent: Option<i64>) -> ElementId {
        let id = {
            let mut next = self.next_id.lock();
            let id = *next;
            *next += 1;
            id
        };
        self.elements.lock().push(MockElement {
            id,
            tag: tag.to_lowercase(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            text: String::new(),
            label: String::new(),
            visible: true,
            parent,
        });
        ElementId(id)
    }

    pub(crate) fn set_text(&self, el: ElementId, text: &str) {
        self.with_element(el, |e| e.text = text.to_string());
    }

    pub(crate) fn set_label(&self, el: ElementId, label: &str) {
        self.with_element(el, |e| e.label = label.to_string());
    }

    pub(crate) fn set_visible(&self, el: ElementId, visible: bool) {
        self.with_element(el, |e| e.visible = visible);
    }

    pub(crate) fn set_title(&self, title: &str) {
        *self.title.lock() = title.to_string();
    }

    pub(crate) fn set_content(&self, content: &str) {
        *self.content.lock() = content.to_string();
    }

    /// Pressing Enter anywhere navigates the page to `url`.
    pub(crate) fn navigate_on_submit(&self, url: &str) {
        *self.submit_target.lock() = Some(url.to_string());
    }

    /// Clicking `el` navigates the page to `url`.
    pub(crate) fn navigate_on_click(&self, el: ElementId, url: &str) {
        self.click_targets.lock().insert(el.0, url.to_string());
    }

    pub(crate) fn queue_popup(&self, popup: MockPage) {
        self.popups.lock().push_back(popup);
    }

    pub(crate) fn queue_urls<I: IntoIterator<Item = S>, S: Into<String>>(&self, urls: I) {
        let mut queue = self.url_queue.lock();
        for u in urls {
            queue.push_back(u.into());
        }
    }

    pub(crate) fn mark_frame_document(&self, el: ElementId) {
        self.frames.lock().push(el.0);
    }

    /// Shared log of interactions; survives moving the page into a
    /// session.
    pub(crate) fn actions_log(&self) -> Arc<Mutex<Vec<String>>> {
        self.actions.clone()
    }

    pub(crate) fn is_element_visible(&self, el: ElementId) -> bool {
        self.elements
            .lock()
            .iter()
            .find(|e| e.id == el.0)
            .map(|e| e.visible)
            .unwrap_or(false)
    }

    // -------- internals --------

    fn with_element(&self, el: ElementId, f: impl FnOnce(&mut MockElement)) {
        let mut elements = self.elements.lock();
        if let Some(e) = elements.iter_mut().find(|e| e.id == el.0) {
            f(e);
        }
    }

    fn record(&self, action: String) {
        self.actions.lock().push(action);
    }

    fn is_descendant_of(elements: &[MockElement], mut id: i64, ancestor: i64) -> bool {
        loop {
            let Some(el) = elements.iter().find(|e| e.id == id) else {
                return false;
            };
            match el.parent {
                Some(p) if p == ancestor => return true,
                Some(p) => id = p,
                None => return false,
            }
        }
    }

    fn in_main_document(&self, elements: &[MockElement], id: i64) -> bool {
        let frames = self.frames.lock();
        !frames
            .iter()
            .any(|frame| *frame == id || Self::is_descendant_of(elements, id, *frame))
    }

    fn select(&self, selector: &str, scope: Option<i64>) -> Vec<ElementId> {
        let selectors = parse_selector_list(selector);
        let elements = self.elements.lock();
        elements
            .iter()
            .filter(|el| match scope {
                Some(scope) => Self::is_descendant_of(&elements, el.id, scope),
                None => self.in_main_document(&elements, el.id),
            })
            .filter(|el| selectors.iter().any(|s| s.matches(el)))
            .map(|el| ElementId(el.id))
            .collect()
    }

    fn navigate_to(&self, url: &str) {
        *self.url.lock() = url.to_string();
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.record(format!("goto:{url}"));
        self.navigate_to(url);
        Ok(())
    }

    async fn wait_for_load(&self, _timeout_ms: u64) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn reload(&self) -> Result<(), BrowserError> {
        self.record("reload".to_string());
        Ok(())
    }

    async fn url(&self) -> Result<String, BrowserError> {
        if let Some(next) = self.url_queue.lock().pop_front() {
            self.navigate_to(&next);
            return Ok(next);
        }
        Ok(self.url.lock().clone())
    }

    async fn title(&self) -> Result<String, BrowserError> {
        Ok(self.title.lock().clone())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.content.lock().clone())
    }

    async fn set_user_agent(&self, user_agent: &str) -> Result<(), BrowserError> {
        self.record(format!("user_agent:{user_agent}"));
        Ok(())
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<ElementId>, BrowserError> {
        Ok(self.select(selector, None).into_iter().next())
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementId>, BrowserError> {
        Ok(self.select(selector, None))
    }

    async fn query_selector_all_within(
        &self,
        scope: ElementId,
        selector: &str,
    ) -> Result<Vec<ElementId>, BrowserError> {
        Ok(self.select(selector, Some(scope.0)))
    }

    async fn frame_documents(&self) -> Result<Vec<ElementId>, BrowserError> {
        Ok(self.frames.lock().iter().map(|id| ElementId(*id)).collect())
    }

    async fn attr(&self, el: ElementId, name: &str) -> Result<Option<String>, BrowserError> {
        let elements = self.elements.lock();
        Ok(elements
            .iter()
            .find(|e| e.id == el.0)
            .and_then(|e| e.attrs.get(name).cloned()))
    }

    async fn inner_text(&self, el: ElementId) -> Result<String, BrowserError> {
        let elements = self.elements.lock();
        Ok(elements
            .iter()
            .find(|e| e.id == el.0)
            .map(|e| e.text.clone())
            .unwrap_or_default())
    }

    async fn label_text(&self, el: ElementId) -> Result<String, BrowserError> {
        let elements = self.elements.lock();
        Ok(elements
            .iter()
            .find(|e| e.id == el.0)
            .map(|e| e.label.clone())
            .unwrap_or_default())
    }

    async fn is_visible(&self, el: ElementId) -> Result<bool, BrowserError> {
        Ok(self.is_element_visible(el))
    }

    async fn fill(&self, el: ElementId, value: &str) -> Result<(), BrowserError> {
        self.record(format!("fill:{}:{}", el.0, value));
        Ok(())
    }

    async fn click(&self, el: ElementId) -> Result<(), BrowserError> {
        self.record(format!("click:{}", el.0));
        if let Some(target) = self.click_targets.lock().get(&el.0).cloned() {
            self.navigate_to(&target);
        }
        Ok(())
    }

    async fn js_click(&self, el: ElementId) -> Result<(), BrowserError> {
        self.record(format!("js_click:{}", el.0));
        if let Some(target) = self.click_targets.lock().get(&el.0).cloned() {
            self.navigate_to(&target);
        }
        Ok(())
    }

    async fn press(&self, el: ElementId, key: &str) -> Result<(), BrowserError> {
        self.record(format!("press:{}:{}", el.0, key));
        if key == "Enter" {
            if let Some(target) = self.submit_target.lock().clone() {
                self.navigate_to(&target);
            }
        }
        Ok(())
    }

    async fn hide_element(&self, el: ElementId) -> Result<(), BrowserError> {
        self.record(format!("hide:{}", el.0));
        self.set_visible(el, false);
        Ok(())
    }

    async fn evaluate(&self, _expression: &str) -> Result<Value, BrowserError> {
        Ok(Value::Null)
    }

    async fn wait_for_popup(
        &self,
        _timeout_ms: u64,
    ) -> Result<Option<Box<dyn PageDriver>>, BrowserError> {
        Ok(self
            .popups
            .lock()
            .pop_front()
            .map(|p| Box::new(p) as Box<dyn PageDriver>))
    }
}

// ---------------------------------------------------------------------
// Selector matching
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum AttrOp {
    Present,
    Equals,
    Contains,
    StartsWith,
    EndsWith,
}

#[derive(Debug, Clone)]
struct AttrMatch {
    name: String,
    op: AttrOp,
    value: String,
}

#[derive(Debug, Clone, Default)]
struct SimpleSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
}

impl SimpleSelector {
    fn matches(&self, el: &MockElement) -> bool {
        if let Some(tag) = &self.tag {
            if el.tag != *tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.attrs.get("id") != Some(id) {
                return false;
            }
        }
        for class in &self.classes {
            let has = el
                .attrs
                .get("class")
                .map(|c| c.split_whitespace().any(|t| t == class))
                .unwrap_or(false);
            if !has {
                return false;
            }
        }
        for attr in &self.attrs {
            let Some(value) = el.attrs.get(&attr.name) else {
                return false;
            };
            let ok = match attr.op {
                AttrOp::Present => true,
                AttrOp::Equals => value == &attr.value,
                AttrOp::Contains => value.contains(&attr.value),
                AttrOp::StartsWith => value.starts_with(&attr.value),
                AttrOp::EndsWith => value.ends_with(&attr.value),
            };
            if !ok {
                return false;
            }
        }
        true
    }
}

fn parse_selector_list(input: &str) -> Vec<SimpleSelector> {
    input.split(',').map(|s| parse_simple(s.trim())).collect()
}

fn parse_simple(input: &str) -> SimpleSelector {
    let mut sel = SimpleSelector::default();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    let read_ident = |chars: &[char], start: usize| -> (String, usize) {
        let mut end = start;
        while end < chars.len() && !"#.[".contains(chars[end]) {
            end += 1;
        }
        (chars[start..end].iter().collect(), end)
    };

    if i < chars.len() && !"#.[".contains(chars[i]) {
        let (tag, next) = read_ident(&chars, i);
        sel.tag = Some(tag.to_lowercase());
        i = next;
    }

    while i < chars.len() {
        match chars[i] {
            '#' => {
                let (id, next) = read_ident(&chars, i + 1);
                sel.id = Some(id);
                i = next;
            }
            '.' => {
                let (class, next) = read_ident(&chars, i + 1);
                sel.classes.push(class);
                i = next;
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|p| i + p)
                    .unwrap_or(chars.len());
                let body: String = chars[i + 1..close].iter().collect();
                sel.attrs.push(parse_attr(&body));
                i = close + 1;
            }
            _ => break,
        }
    }

    sel
}

fn parse_attr(body: &str) -> AttrMatch {
    for (token, op) in [
        ("*=", AttrOp::Contains),
        ("^=", AttrOp::StartsWith),
        ("$=", AttrOp::EndsWith),
        ("=", AttrOp::Equals),
    ] {
        if let Some(pos) = body.find(token) {
            let name = body[..pos].trim().to_string();
            let value = body[pos + token.len()..]
                .trim()
                .trim_matches('\'')
                .trim_matches('"')
                .to_string();
            return AttrMatch { name, op, value };
        }
    }
    AttrMatch {
        name: body.trim().to_string(),
        op: AttrOp::Present,
        value: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tag_and_attr_matching() {
        let page = MockPage::new("https://x.example");
        let form = page.add_element("form", &[]);
        let user = page.add_child(form, "input", &[("name", "username")]);
        let pass = page.add_child(form, "input", &[("type", "password")]);
        page.add_element("div", &[("class", "side overlay")]);

        assert_eq!(page.query_selector_all("input").await.unwrap(), vec![user, pass]);
        assert_eq!(
            page.query_selector_all("input[type='password']").await.unwrap(),
            vec![pass]
        );
        assert_eq!(page.query_selector_all("[class*='overlay']").await.unwrap().len(), 1);
        assert_eq!(page.query_selector_all(".overlay").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn comma_list_and_scoping() {
        let page = MockPage::new("https://x.example");
        let form = page.add_element("form", &[]);
        let inside = page.add_child(form, "button", &[]);
        let outside = page.add_element("a", &[("href", "/x")]);

        let all = page.query_selector_all("button, a").await.unwrap();
        assert_eq!(all, vec![inside, outside]);

        let scoped = page.query_selector_all_within(form, "button, a").await.unwrap();
        assert_eq!(scoped, vec![inside]);
    }

    #[tokio::test]
    async fn frame_elements_excluded_from_main_document() {
        let page = MockPage::new("https://x.example");
        let frame = page.add_element("#document", &[]);
        page.mark_frame_document(frame);
        let framed = page.add_child(frame, "button", &[]);
        let main = page.add_element("button", &[]);

        assert_eq!(page.query_selector_all("button").await.unwrap(), vec![main]);
        assert_eq!(
            page.query_selector_all_within(frame, "button").await.unwrap(),
            vec![framed]
        );
    }

    #[tokio::test]
    async fn enter_navigates_when_scripted() {
        let page = MockPage::new("https://x.example/login");
        let el = page.add_element("input", &[("type", "password")]);
        page.navigate_on_submit("https://app.example/home");

        page.press(el, "Enter").await.unwrap();
        assert_eq!(page.url().await.unwrap(), "https://app.example/home");
    }

    #[tokio::test]
    async fn id_selector_and_attr_suffix() {
        let page = MockPage::new("https://x.example");
        let captcha = page.add_element("div", &[("id", "captcha")]);
        let overlay = page.add_element("div", &[("id", "gsi_12345-overlay")]);

        assert_eq!(page.query_selector("#captcha").await.unwrap(), Some(captcha));
        assert_eq!(
            page.query_selector("div[id$='-overlay']").await.unwrap(),
            Some(overlay)
        );
    }
}
