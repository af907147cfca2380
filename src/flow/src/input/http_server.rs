//! HTTP server input: accepts POST bodies and holds each request open
//! until its transaction resolves.
//!
//! Single-part for plain bodies, RFC 2046 multipart for `multipart/*`
//! content types. A downstream processor may synthesise the reply body
//! by marking a message as the synchronous response; otherwise an
//! `Ack` replies 200 with an empty body. The per-request timeout
//! replies 408, errors reply 5xx, and non-POST methods reply 405.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes as BodyBytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use datatypes::{Message, Part, ResultStore};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::component::{ComponentConfig, ComponentError};
use crate::duration::parse_duration;
use crate::input::{Input, INPUT_CHANNEL_CAPACITY};
use crate::shutdown::{shutdown_pair, ShutdownError, ShutdownHandle, ShutdownListener};
use crate::transaction::{Response, Transaction};

#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    pub address: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// How long a request waits for its transaction's response.
    #[serde(default = "default_timeout")]
    pub timeout: String,
}

fn default_path() -> String {
    "/post".to_string()
}

fn default_timeout() -> String {
    "5s".to_string()
}

pub struct HttpServerInput {
    receiver: Option<mpsc::Receiver<Transaction>>,
    handle: ShutdownHandle,
}

#[derive(Clone)]
struct ServerState {
    sender: mpsc::Sender<Transaction>,
    timeout: Duration,
}

impl HttpServerInput {
    pub fn new(config: HttpServerConfig) -> Result<Self, ComponentError> {
        let timeout = parse_duration(&config.timeout)
            .map_err(|e| ComponentError::BadConfig("input", e))?;
        let (sender, receiver) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        let (handle, listener) = shutdown_pair();
        tokio::spawn(serve(config, ServerState { sender, timeout }, listener));
        Ok(Self {
            receiver: Some(receiver),
            handle,
        })
    }

    pub fn from_config(conf: &ComponentConfig) -> Result<Self, ComponentError> {
        Self::new(conf.parse_options("input")?)
    }
}

async fn serve(config: HttpServerConfig, state: ServerState, listener: ShutdownListener) {
    let app = Router::new()
        .route(&config.path, post(handle_request))
        .with_state(state);

    let tcp = match TcpListener::bind(&config.address).await {
        Ok(tcp) => tcp,
        Err(err) => {
            tracing::error!(address = %config.address, error = %err, "http input failed to bind");
            listener.mark_done();
            return;
        }
    };
    tracing::info!(address = %config.address, path = %config.path, "http input listening");

    let mut close_signal = listener.clone();
    let result = axum::serve(tcp, app)
        .with_graceful_shutdown(async move { close_signal.closed().await })
        .await;
    if let Err(err) = result {
        tracing::error!(error = %err, "http input server error");
    }
    listener.mark_done();
}

async fn handle_request(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: BodyBytes,
) -> axum::response::Response {
    let parts = match parse_body(&headers, body) {
        Ok(parts) => parts,
        Err(detail) => return (StatusCode::BAD_REQUEST, detail).into_response(),
    };

    let store = ResultStore::new();
    let message = Message::from(parts).with_result_store(store.clone());
    let (transaction, response) = Transaction::new(message);

    if state.sender.send(transaction).await.is_err() {
        return (StatusCode::SERVICE_UNAVAILABLE, "input closed").into_response();
    }
    telemetry::MESSAGES_RECEIVED_COUNTER
        .with_label_values(&["http_server"])
        .inc();

    match tokio::time::timeout(state.timeout, response.wait()).await {
        Err(_) => StatusCode::REQUEST_TIMEOUT.into_response(),
        Ok(Response::Ack) => {
            let body = store
                .take_all()
                .into_iter()
                .next()
                .and_then(|msg| msg.get(0).map(|part| part.to_bytes()))
                .unwrap_or_default();
            (StatusCode::OK, body).into_response()
        }
        Ok(Response::NoAck) => {
            (StatusCode::SERVICE_UNAVAILABLE, "transient failure").into_response()
        }
        Ok(Response::Error(kind, detail)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{}: {detail}", kind.as_str()),
        )
            .into_response(),
    }
}

fn parse_body(headers: &HeaderMap, body: BodyBytes) -> Result<Vec<Part>, String> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if let Some(boundary) = multipart_boundary(content_type) {
        let parts = parse_multipart(&body, boundary)?;
        if parts.is_empty() {
            return Err("empty multipart body".to_string());
        }
        Ok(parts.into_iter().map(Part::new).collect())
    } else {
        Ok(vec![Part::new(Bytes::from(body))])
    }
}

fn multipart_boundary(content_type: &str) -> Option<&str> {
    if !content_type.starts_with("multipart/") {
        return None;
    }
    content_type.split(';').find_map(|param| {
        let param = param.trim();
        param
            .strip_prefix("boundary=")
            .map(|b| b.trim_matches('"'))
    })
}

/// Minimal RFC 2046 multipart parser: sections are delimited by
/// `--boundary` lines, each with headers separated from its body by a
/// blank line, terminated by `--boundary--`.
fn parse_multipart(body: &[u8], boundary: &str) -> Result<Vec<Bytes>, String> {
    let delimiter = format!("--{boundary}");
    let text = body;
    let mut parts = Vec::new();

    let mut positions: Vec<usize> = find_all(text, delimiter.as_bytes());
    if positions.is_empty() {
        return Err("multipart boundary not found in body".to_string());
    }
    // Sentinel so a body missing its closing delimiter still yields its
    // final section.
    positions.push(text.len());

    for window in positions.windows(2) {
        let section_start = window[0] + delimiter.len();
        let section_end = window[1];
        let section = &text[section_start..section_end];
        // Closing delimiter: the section begins with `--`.
        if section.starts_with(b"--") {
            break;
        }
        let section = strip_crlf_prefix(section);
        let body = match find_subslice(section, b"\r\n\r\n") {
            Some(split) => &section[split + 4..],
            // Headerless section: the whole thing is the body.
            None => section,
        };
        let body = strip_crlf_suffix(body);
        parts.push(Bytes::copy_from_slice(body));
    }

    Ok(parts)
}

fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut offset = 0;
    while let Some(pos) = find_subslice(&haystack[offset..], needle) {
        positions.push(offset + pos);
        offset += pos + needle.len();
    }
    positions
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn strip_crlf_prefix(section: &[u8]) -> &[u8] {
    section.strip_prefix(b"\r\n").unwrap_or(section)
}

fn strip_crlf_suffix(section: &[u8]) -> &[u8] {
    section.strip_suffix(b"\r\n").unwrap_or(section)
}

#[async_trait]
impl Input for HttpServerInput {
    fn take_transactions(&mut self) -> Option<mpsc::Receiver<Transaction>> {
        self.receiver.take()
    }

    fn close_async(&self) {
        self.handle.close_async();
    }

    async fn wait_for_close(&self, deadline: Duration) -> Result<(), ShutdownError> {
        self.handle.wait_for_close(deadline).await
    }
}
