use super::*;
use parking_lot::Mutex;

use autologin_browser::SessionHandle;

use crate::testing::MockPage;

fn strategy() -> OauthStrategy {
    OauthStrategy::new(OAuthConfig::default(), LoginConfig::default())
}

/// Main page with a provider link that pass 1 finds by href.
fn page_with_provider_link(url: &str) -> (MockPage, ElementId) {
    let page = MockPage::new(url);
    let link = page.add_element("a", &[("href", "https://accounts.google.com/o/oauth2/auth")]);
    (page, link)
}

fn add_provider_inputs(page: &MockPage) -> (ElementId, ElementId) {
    let email = page.add_element("input", &[("type", "email")]);
    let password = page.add_element("input", &[("type", "password")]);
    (email, password)
}

#[tokio::test(start_paused = true)]
async fn same_tab_flow_reaches_success() {
    let (page, link) = page_with_provider_link("https://site.example/login");
    page.navigate_on_click(link, "https://accounts.google.com/o/oauth2/auth");
    let (email, password) = add_provider_inputs(&page);
    page.navigate_on_submit("https://site.example/home");
    let log = page.actions_log();

    let mut session = SessionHandle::from_page(Box::new(page));
    let request = LoginRequest::new("https://site.example/login", "alice@example.com", "s3cret");
    let events: Mutex<Vec<StatusEvent>> = Mutex::new(Vec::new());
    let outcome = strategy()
        .run(&mut session, &request, &|e| events.lock().push(e))
        .await;

    assert_eq!(outcome.event.stage, Stage::Success);
    assert_eq!(outcome.event.success, Some(true));
    assert!(!outcome.requires_user_action);

    let actions = log.lock().clone();
    assert!(actions.contains(&format!("click:{}", link.0)));
    assert!(actions.contains(&format!("fill:{}:alice@example.com", email.0)));
    assert!(actions.contains(&format!("fill:{}:s3cret", password.0)));

    let stages: Vec<Stage> = events.lock().iter().map(|e| e.stage).collect();
    assert_eq!(
        stages,
        vec![
            Stage::Navigating,
            Stage::DetectingOauth,
            Stage::ClickingOauth,
            Stage::FillingProviderForm,
            Stage::WaitingForProvider,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn provider_two_factor_challenge_parks_the_attempt() {
    let (page, link) = page_with_provider_link("https://site.example/login");
    page.navigate_on_click(link, "https://accounts.google.com/o/oauth2/auth");
    add_provider_inputs(&page);
    page.navigate_on_submit("https://accounts.google.com/signin/challenge/ipp?x=1");

    let mut session = SessionHandle::from_page(Box::new(page));
    let request = LoginRequest::new("https://site.example/login", "alice@example.com", "s3cret");
    let outcome = strategy().run(&mut session, &request, &|_| {}).await;

    assert_eq!(outcome.event.stage, Stage::WaitingForTwoFactor);
    assert_eq!(outcome.event.success, Some(false));
    assert!(outcome.requires_user_action);
}

#[tokio::test(start_paused = true)]
async fn text_scan_button_with_popup_is_adopted() {
    let page = MockPage::new("https://site.example/login");
    let button = page.add_element("button", &[]);
    page.set_text(button, "Sign in with Google");

    let popup = MockPage::new("https://accounts.google.com/o/oauth2/auth");
    let (email, _) = add_provider_inputs(&popup);
    popup.navigate_on_submit("https://site.example/dashboard");
    let popup_log = popup.actions_log();
    page.queue_popup(popup);
    let main_log = page.actions_log();

    let mut session = SessionHandle::from_page(Box::new(page));
    let request = LoginRequest::new("https://site.example/login", "alice@example.com", "s3cret");
    let outcome = strategy().run(&mut session, &request, &|_| {}).await;

    assert_eq!(outcome.event.stage, Stage::Success);
    assert_eq!(outcome.event.success, Some(true));

    assert!(main_log.lock().contains(&format!("click:{}", button.0)));
    assert!(popup_log
        .lock()
        .contains(&format!("fill:{}:alice@example.com", email.0)));
}

#[tokio::test(start_paused = true)]
async fn covering_overlay_is_hidden_before_the_click() {
    let (page, link) = page_with_provider_link("https://site.example/login");
    let overlay = page.add_element("div", &[("class", "modal-backdrop")]);
    // Site already has a provider grant: the click lands straight back
    // on the original domain.
    page.navigate_on_click(link, "https://site.example/welcome");
    let log = page.actions_log();

    let mut session = SessionHandle::from_page(Box::new(page));
    let request = LoginRequest::new("https://site.example/login", "alice@example.com", "s3cret");
    let outcome = strategy().run(&mut session, &request, &|_| {}).await;

    assert_eq!(outcome.event.stage, Stage::Success);
    assert_eq!(outcome.event.success, Some(true));

    let actions = log.lock().clone();
    let hide_pos = actions.iter().position(|a| a == &format!("hide:{}", overlay.0));
    let click_pos = actions.iter().position(|a| a == &format!("click:{}", link.0));
    assert!(hide_pos.is_some());
    assert!(hide_pos < click_pos);
}

#[tokio::test(start_paused = true)]
async fn missing_button_fails_after_reload_retry() {
    let page = MockPage::new("https://site.example/login");
    let log = page.actions_log();

    let mut session = SessionHandle::from_page(Box::new(page));
    let request = LoginRequest::new("https://site.example/login", "alice@example.com", "s3cret");
    let outcome = strategy().run(&mut session, &request, &|_| {}).await;

    assert_eq!(outcome.event.stage, Stage::Error);
    assert_eq!(outcome.event.success, Some(false));
    assert!(outcome.event.message.contains("No google sign-in button"));

    let actions = log.lock().clone();
    assert!(actions.iter().any(|a| a == "reload"));
    assert!(actions.iter().any(|a| a.starts_with("user_agent:")));
}

#[test]
fn success_check_orders_provider_origin_first() {
    let config = OAuthConfig::default();
    let original = "https://site.example/login";

    // Still parked on the sign-in origin: failure, even though that
    // host also appears in the service domain list.
    assert!(!oauth_login_succeeded(
        "https://accounts.google.com/signin",
        original,
        &config
    ));
    assert!(oauth_login_succeeded("https://site.example/home", original, &config));
    assert!(oauth_login_succeeded("https://mail.google.com/mail", original, &config));
    assert!(oauth_login_succeeded("https://elsewhere.example/", original, &config));
    assert!(!oauth_login_succeeded("not a url", original, &config));
}
