//! Direct request/response transport over `reqwest`.
//!
//! # Design
//! `build_request` and `classify` are pure and carry all of the wire rules:
//! GET merges the body into the URL, other methods serialize it according to
//! the content type. `execute` is the only part that touches the network.

use tracing::debug;

use crate::error::DispatchError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::query::{append_query, encode};
use crate::request::{FailureCode, Payload, RequestSpec};
use crate::transport::{Completion, Started, Transport, TransportHandle};
use crate::util::cookie::CookieJar;

/// Status reported when the timeout aborts a direct request.
pub const TIMEOUT_STATUS: u16 = 408;

/// Transport A: abortable, status-coded request/response.
#[derive(Debug, Clone, Default)]
pub struct DirectTransport {
    client: reqwest::Client,
    cookies: Option<CookieJar>,
}

impl DirectTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            cookies: None,
        }
    }

    /// Send the jar's cookies with every request.
    pub fn with_cookies(mut self, jar: CookieJar) -> Self {
        self.cookies = Some(jar);
        self
    }
}

impl Transport for DirectTransport {
    fn start(&self, spec: &RequestSpec) -> Result<Started, DispatchError> {
        let mut request = build_request(spec)?;
        if let Some(cookie) = self.cookies.as_ref().and_then(CookieJar::header) {
            request.headers.push(("cookie".to_string(), cookie));
        }
        let client = self.client.clone();
        Ok(Started {
            handle: TransportHandle::Direct,
            completion: Box::pin(async move { execute(&client, request).await }),
        })
    }

    fn release(&self, _handle: TransportHandle) {}

    fn timeout_code(&self) -> FailureCode {
        FailureCode::Status(TIMEOUT_STATUS)
    }
}

/// Turn a `RequestSpec` into the request that goes on the wire.
pub fn build_request(spec: &RequestSpec) -> Result<HttpRequest, DispatchError> {
    let url = spec.target().unwrap_or_default();
    let headers = vec![("content-type".to_string(), spec.content_type.clone())];

    if spec.method == HttpMethod::Get {
        let url = match &spec.body {
            Some(body) => append_query(url, body),
            None => url.to_string(),
        };
        return Ok(HttpRequest {
            method: spec.method,
            url,
            headers,
            body: None,
        });
    }

    let body = match &spec.body {
        Some(body) if spec.content_type.contains("json") => Some(
            serde_json::to_string(body).map_err(|e| DispatchError::SerializationError(e.to_string()))?,
        ),
        Some(body) => Some(encode(body)),
        None => None,
    };
    Ok(HttpRequest {
        method: spec.method,
        url: url.to_string(),
        headers,
        body,
    })
}

/// Map a finished response to success or a status failure.
pub fn classify(response: HttpResponse) -> Completion {
    if response.is_success() {
        Completion::Success(Payload::Text(response.body))
    } else {
        Completion::Failed {
            status: response.status,
            message: response.status_text,
        }
    }
}

/// Run the request. Errors before a status arrives are reported as status 0.
async fn execute(client: &reqwest::Client, request: HttpRequest) -> Completion {
    debug!(method = %request.method, url = %request.url, "direct request");

    let mut builder = client.request(request.method.into(), &request.url);
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = request.body {
        builder = builder.body(body);
    }

    let response = match builder.send().await {
        Ok(response) => response,
        Err(e) => {
            return Completion::Failed {
                status: 0,
                message: e.to_string(),
            }
        }
    };

    let status = response.status();
    let status_text = status.canonical_reason().unwrap_or_default().to_string();
    match response.text().await {
        Ok(body) => classify(HttpResponse {
            status: status.as_u16(),
            status_text,
            body,
        }),
        Err(e) => Completion::Failed {
            status: 0,
            message: e.to_string(),
        },
    }
}
