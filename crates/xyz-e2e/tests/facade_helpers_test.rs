// Integration tests for the facade helpers and attribute reads

mod fake_browser;

use fake_browser::{FakeBrowser, FakePage};
use std::time::Duration;
use xyz_e2e::automation::wait_for_element_text;
use xyz_e2e::{BrowserAutomation, Error};

const HOME: &str = "https://xyz.test/";

fn browser() -> FakeBrowser {
    let page = FakePage::new("NetMind XYZ", "Welcome")
        .text("h1", "Welcome to XYZ")
        .attribute("a.pricing", "href", "/#pricing")
        .attribute("input[type=\"email\"]", "placeholder", "Email");
    FakeBrowser::new().page(HOME, page)
}

#[tokio::test]
async fn test_wait_for_element_text_matches() {
    let browser = browser();
    browser.navigate(HOME).await.unwrap();

    let matched = wait_for_element_text(&browser, "h1", "Welcome to XYZ", None)
        .await
        .unwrap();
    assert!(matched);
}

#[tokio::test]
async fn test_wait_for_element_text_mismatch_is_false() {
    let browser = browser();
    browser.navigate(HOME).await.unwrap();

    let matched = wait_for_element_text(&browser, "h1", "Welcome", Some(Duration::from_secs(1)))
        .await
        .unwrap();
    assert!(!matched);
}

#[tokio::test]
async fn test_wait_for_element_text_missing_element_fails() {
    let browser = browser();
    browser.navigate(HOME).await.unwrap();

    let result = wait_for_element_text(&browser, "h2", "Welcome to XYZ", None).await;
    assert!(matches!(result, Err(Error::ElementNotFound(_))));
}

#[tokio::test]
async fn test_get_attribute_present_and_missing() {
    let browser = browser();
    browser.navigate(HOME).await.unwrap();

    let href = browser.get_attribute("a.pricing", "href").await.unwrap();
    assert_eq!(href.as_deref(), Some("/#pricing"));

    let target = browser.get_attribute("a.pricing", "target").await.unwrap();
    assert!(target.is_none());

    let placeholder = browser
        .get_attribute("input[type=\"email\"]", "placeholder")
        .await
        .unwrap();
    assert_eq!(placeholder.as_deref(), Some("Email"));

    let result = browser.get_attribute("a.missing", "href").await;
    assert!(matches!(result, Err(Error::ElementNotFound(_))));
}
