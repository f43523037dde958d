//! Scripted HTTP server for provider tests
//!
//! Binds `127.0.0.1:0`, answers every path with the next scripted response and
//! keeps a copy of each request. The server task is aborted on drop.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A request as seen by the test server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// Header names are lowercase
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Body parsed as JSON. Panics on invalid JSON, which fails the test.
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("request body is not valid JSON")
    }
}

/// A canned response
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl MockResponse {
    /// Empty body with the given status
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// JSON body with the given status
    pub fn json(status: u16, body: Value) -> Self {
        Self::status(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    fn into_http(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();

        for (name, value) in self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                response.headers_mut().insert(name, value);
            }
        }

        response
    }
}

type Responder = Arc<dyn Fn(&RecordedRequest) -> MockResponse + Send + Sync>;

struct ServerState {
    requests: Mutex<Vec<RecordedRequest>>,
    responder: Responder,
}

/// Local HTTP server answering with scripted responses
pub struct TestHttpServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    task: JoinHandle<()>,
}

impl TestHttpServer {
    /// Replay `script` in order. Once exhausted the last response repeats;
    /// an empty script always answers `200`.
    pub async fn start(script: Vec<MockResponse>) -> Self {
        let queue = Mutex::new(VecDeque::from(script));
        let last = Mutex::new(MockResponse::status(200));

        Self::with_handler(move |_| {
            let next = queue.lock().unwrap().pop_front();
            match next {
                Some(response) => {
                    *last.lock().unwrap() = response.clone();
                    response
                }
                None => last.lock().unwrap().clone(),
            }
        })
        .await
    }

    /// Answer each request with `handler(request)`
    pub async fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&RecordedRequest) -> MockResponse + Send + Sync + 'static,
    {
        let state = Arc::new(ServerState {
            requests: Mutex::new(Vec::new()),
            responder: Arc::new(handler),
        });

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test HTTP server");
        let addr = listener
            .local_addr()
            .expect("Failed to read test HTTP server address");

        let app = Router::new().fallback(handle).with_state(state.clone());
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Test HTTP server stopped");
            }
        });

        Self { addr, state, task }
    }

    /// `http://127.0.0.1:<port>`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for TestHttpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle(
    State(state): State<Arc<ServerState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        headers: headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect(),
        body: body.to_vec(),
    };

    let response = (state.responder)(&request);
    state.requests.lock().unwrap().push(request);
    response.into_http()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_script_is_replayed_then_last_repeats() {
        let server = TestHttpServer::start(vec![
            MockResponse::status(503),
            MockResponse::json(201, json!({"ok": true})).with_header("x-message-id", "m-1"),
        ])
        .await;
        let client = reqwest::Client::new();
        let url = format!("{}/v3/mail/send", server.base_url());

        let first = client.post(&url).body("{}").send().await.unwrap();
        assert_eq!(first.status().as_u16(), 503);

        let second = client.post(&url).send().await.unwrap();
        assert_eq!(second.status().as_u16(), 201);
        assert_eq!(second.headers()["x-message-id"], "m-1");

        let third = client.post(&url).send().await.unwrap();
        assert_eq!(third.status().as_u16(), 201);

        assert_eq!(server.request_count(), 3);
        let recorded = &server.requests()[0];
        assert_eq!(recorded.method, "POST");
        assert_eq!(recorded.path, "/v3/mail/send");
        assert_eq!(recorded.json(), json!({}));
    }

    #[tokio::test]
    async fn test_handler_sees_request() {
        let server = TestHttpServer::with_handler(|req| {
            if req.header("api-key") == Some("secret") {
                MockResponse::status(200)
            } else {
                MockResponse::status(401)
            }
        })
        .await;
        let client = reqwest::Client::new();

        let denied = client.get(server.base_url()).send().await.unwrap();
        let allowed = client
            .get(server.base_url())
            .header("api-key", "secret")
            .send()
            .await
            .unwrap();

        assert_eq!(denied.status().as_u16(), 401);
        assert_eq!(allowed.status().as_u16(), 200);
    }
}
