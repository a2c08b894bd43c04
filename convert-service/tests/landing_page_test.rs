mod common;

use common::{TestApp, LANDING_HTML};
use reqwest::{Client, StatusCode};

async fn get(app: &TestApp, path: &str) -> reqwest::Response {
    Client::new()
        .get(format!("{}{}", app.address, path))
        .send()
        .await
        .expect("Failed to execute request")
}

#[tokio::test]
async fn root_serves_the_landing_page() {
    let app = TestApp::spawn().await;

    let response = get(&app, "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), LANDING_HTML);
}

#[tokio::test]
async fn unknown_paths_fall_back_to_the_landing_page() {
    let app = TestApp::spawn().await;

    for path in ["/anything", "/deep/link/into/the/app", "/convert/extra"] {
        let response = get(&app, path).await;

        assert_eq!(response.status(), StatusCode::OK, "path={}", path);
        assert_eq!(response.text().await.unwrap(), LANDING_HTML, "path={}", path);
    }
}

#[tokio::test]
async fn get_on_convert_serves_the_landing_page() {
    let app = TestApp::spawn().await;

    let response = get(&app, "/convert").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), LANDING_HTML);
}

#[tokio::test]
async fn static_assets_are_served_as_is() {
    let app = TestApp::spawn().await;

    let response = get(&app, "/css/site.css").await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .expect("Missing content-type header")
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/css"), "{}", content_type);
    assert_eq!(response.text().await.unwrap(), "body{}");
}
