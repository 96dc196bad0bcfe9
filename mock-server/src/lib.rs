use std::{collections::HashMap, time::Duration};

use axum::{
    extract::{Path, Query, RawQuery},
    http::{header, HeaderMap, Method, StatusCode},
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tracing::debug;

/// Query keys accepted as the relay callback name, in lookup order.
pub const RELAY_PARAMS: [&str; 3] = ["callback", "cb", "jsonp"];

/// What `/echo` saw of the request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub cookie: Option<String>,
    pub body: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/search", get(search))
        .route("/echo", any(echo))
        .route("/status/{code}", get(status))
        .route("/slow/{ms}", get(slow))
        .route("/relay", get(relay))
        .route("/relay/slow/{ms}", get(slow_relay))
        .route("/relay/broken", get(broken_relay))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Body of a relay script calling `callback` with `payload`.
pub fn relay_script(callback: &str, payload: &Value) -> String {
    format!("{callback}({payload});")
}

async fn search() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn echo(method: Method, RawQuery(query): RawQuery, headers: HeaderMap, body: String) -> Json<Echo> {
    let header_text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(Echo {
        method: method.to_string(),
        query,
        content_type: header_text(header::CONTENT_TYPE),
        cookie: header_text(header::COOKIE),
        body,
    })
}

async fn status(Path(code): Path<u16>) -> (StatusCode, String) {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, status.canonical_reason().unwrap_or_default().to_string())
}

async fn slow(Path(ms): Path<u64>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(json!({ "ok": true }))
}

async fn relay(Query(params): Query<HashMap<String, String>>) -> Result<impl IntoResponse, StatusCode> {
    let callback = RELAY_PARAMS
        .iter()
        .find_map(|key| params.get(*key))
        .ok_or(StatusCode::BAD_REQUEST)?;

    let mut payload: Map<String, Value> = params
        .iter()
        .filter(|(key, _)| !RELAY_PARAMS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect();
    payload.insert("ok".to_string(), Value::Bool(true));

    debug!(%callback, "relay script served");
    Ok((
        [(header::CONTENT_TYPE, "application/javascript")],
        relay_script(callback, &Value::Object(payload)),
    ))
}

async fn slow_relay(
    Path(ms): Path<u64>,
    query: Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, StatusCode> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    relay(query).await
}

async fn broken_relay() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        "throw new Error('no relay here');",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_script_wraps_payload_in_call() {
        let script = relay_script("relay_1", &json!({"ok": true}));
        assert_eq!(script, r#"relay_1({"ok":true});"#);
    }

    #[test]
    fn echo_roundtrips_through_json() {
        let echo = Echo {
            method: "POST".to_string(),
            query: Some("a=1".to_string()),
            content_type: Some("application/json".to_string()),
            cookie: None,
            body: "{}".to_string(),
        };
        let json = serde_json::to_string(&echo).unwrap();
        let back: Echo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, echo);
    }

    #[test]
    fn echo_serializes_missing_fields_as_null() {
        let echo = Echo {
            method: "GET".to_string(),
            query: None,
            content_type: None,
            cookie: None,
            body: String::new(),
        };
        let json = serde_json::to_value(&echo).unwrap();
        assert_eq!(json["query"], Value::Null);
        assert_eq!(json["method"], "GET");
    }
}
