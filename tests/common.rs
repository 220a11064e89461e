#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use http::StatusCode;
use lexgate::client::{ApiClient, AuthListener, ErrorCallback, OutboundRequest, Transport, TransportResponse};
use lexgate::error::ClientError;
use lexgate::models::Envelope;
use lexgate::store::{MemoryTokenStore, TokenStore};

/// What the scripted backend does with one request.
pub enum Scripted {
    Reply {
        status: u16,
        body: String,
        delay: Duration,
    },
    Fail(String),
}

impl Scripted {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Scripted::Reply {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn raw(status: u16, body: &str) -> Self {
        Scripted::Reply {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn after(self, wait: Duration) -> Self {
        match self {
            Scripted::Reply { status, body, .. } => Scripted::Reply {
                status,
                body,
                delay: wait,
            },
            other => other,
        }
    }
}

type Handler = Box<dyn Fn(&OutboundRequest) -> Scripted + Send + Sync>;

/// An in-process backend: a routing closure plus a log of everything sent.
pub struct ScriptedTransport {
    handler: Handler,
    sent: Mutex<Vec<OutboundRequest>>,
}

impl ScriptedTransport {
    pub fn new(handler: impl Fn(&OutboundRequest) -> Scripted + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(ScriptedTransport {
            handler: Box::new(handler),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<OutboundRequest> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of requests sent to a URL ending in `path`.
    pub fn calls_to(&self, path: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.ends_with(path))
            .count()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, ClientError> {
        self.sent.lock().unwrap().push(request.clone());
        match (self.handler)(&request) {
            Scripted::Reply {
                status,
                body,
                delay,
            } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(TransportResponse {
                    status: StatusCode::from_u16(status).expect("valid status"),
                    body,
                })
            }
            Scripted::Fail(message) => Err(ClientError::Transport(message)),
        }
    }
}

pub const BASE_URL: &str = "http://backend.test";

pub fn scripted_client(
    transport: Arc<ScriptedTransport>,
    store: Arc<MemoryTokenStore>,
) -> ApiClient {
    ApiClient::with_transport(BASE_URL, store as Arc<dyn TokenStore>, transport)
}

/// A listener that counts its invocations.
pub fn counting_listener() -> (AuthListener, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let listener: AuthListener = Arc::new(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    (listener, count)
}

/// An error callback that records every envelope it receives.
pub fn recording_callback() -> (ErrorCallback, Arc<Mutex<Vec<Envelope>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: ErrorCallback = Arc::new(move |envelope: &Envelope| {
        sink.lock().unwrap().push(envelope.clone());
    });
    (callback, seen)
}

pub fn bearer(request: &OutboundRequest) -> Option<&str> {
    request
        .header("authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
}
