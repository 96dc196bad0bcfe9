use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Echo};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

// --- search ---

#[tokio::test]
async fn search_returns_ok_document() {
    let resp = app().oneshot(get("/search?q=cat&page=1")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body, serde_json::json!({"ok": true}));
}

// --- echo ---

#[tokio::test]
async fn echo_reports_query_verbatim() {
    let resp = app().oneshot(get("/echo?q=a%20b&page=1")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "GET");
    assert_eq!(echo.query.as_deref(), Some("q=a%20b&page=1"));
    assert!(echo.body.is_empty());
}

#[tokio::test]
async fn echo_reports_body_and_headers() {
    let req = Request::builder()
        .method("POST")
        .uri("/echo")
        .header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(http::header::COOKIE, "sid=1")
        .body("title=milk".to_string())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();

    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.query, None);
    assert_eq!(echo.content_type.as_deref(), Some("application/x-www-form-urlencoded"));
    assert_eq!(echo.cookie.as_deref(), Some("sid=1"));
    assert_eq!(echo.body, "title=milk");
}

// --- status ---

#[tokio::test]
async fn status_route_returns_requested_code() {
    let resp = app().oneshot(get("/status/404")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_bytes(resp).await, "Not Found");
}

#[tokio::test]
async fn status_route_rejects_non_numeric_code() {
    let resp = app().oneshot(get("/status/teapot")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- relay ---

#[tokio::test]
async fn relay_wraps_params_in_callback() {
    let resp = app().oneshot(get("/relay?callback=relay_abc&q=cat")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[http::header::CONTENT_TYPE],
        "application/javascript"
    );
    let script = String::from_utf8(body_bytes(resp).await.to_vec()).unwrap();
    let argument = script
        .strip_prefix("relay_abc(")
        .and_then(|s| s.strip_suffix(");"))
        .unwrap();
    let payload: serde_json::Value = serde_json::from_str(argument).unwrap();
    assert_eq!(payload, serde_json::json!({"ok": true, "q": "cat"}));
}

#[tokio::test]
async fn relay_accepts_alternate_param_names() {
    let resp = app().oneshot(get("/relay?cb=other")).await.unwrap();

    let script = String::from_utf8(body_bytes(resp).await.to_vec()).unwrap();
    assert_eq!(script, r#"other({"ok":true});"#);
}

#[tokio::test]
async fn relay_without_callback_is_bad_request() {
    let resp = app().oneshot(get("/relay?q=cat")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn broken_relay_is_not_a_callback() {
    let resp = app().oneshot(get("/relay/broken")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let script = String::from_utf8(body_bytes(resp).await.to_vec()).unwrap();
    assert!(script.starts_with("throw"));
}

// --- slow ---

#[tokio::test(start_paused = true)]
async fn slow_route_waits_before_answering() {
    let start = tokio::time::Instant::now();
    let resp = app().oneshot(get("/slow/250")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(start.elapsed() >= std::time::Duration::from_millis(250));
}
