//! Scripted transport and session helpers for client tests.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use portal_api::{ApiRequest, ApiResponse, Method, PortalClient, Transport, TransportError};
use portal_session::SessionManager;
use portal_storage::{MemoryStorage, SessionStore};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

type Scripted = Result<ApiResponse, TransportError>;

#[derive(Default)]
struct Route {
    responses: VecDeque<Scripted>,
    delay: Option<Duration>,
}

/// Transport that answers from a per-route script and records every call.
///
/// Each route replays its responses in order and then keeps repeating the
/// last one. Unscripted routes answer 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), Route>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, method: Method, path: &str, status: u16, body: serde_json::Value) {
        self.push(method, path, Ok(ApiResponse::new(status, body.to_string())));
    }

    pub fn respond_raw(&self, method: Method, path: &str, status: u16, body: &str) {
        self.push(method, path, Ok(ApiResponse::new(status, body)));
    }

    pub fn fail(&self, method: Method, path: &str, error: TransportError) {
        self.push(method, path, Err(error));
    }

    pub fn delay(&self, method: Method, path: &str, delay: Duration) {
        self.routes
            .lock()
            .entry((method, path.to_string()))
            .or_default()
            .delay = Some(delay);
    }

    fn push(&self, method: Method, path: &str, response: Scripted) {
        self.routes
            .lock()
            .entry((method, path.to_string()))
            .or_default()
            .responses
            .push_back(response);
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method == method && call.path == path)
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.calls.lock().push(request.clone());

        let (response, delay) = {
            let mut routes = self.routes.lock();
            match routes.get_mut(&(request.method, request.path.clone())) {
                Some(route) => {
                    let response = if route.responses.len() > 1 {
                        route.responses.pop_front()
                    } else {
                        route.responses.front().cloned()
                    };
                    (response, route.delay)
                }
                None => (None, None),
            }
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        response.unwrap_or_else(|| {
            Ok(ApiResponse::new(
                404,
                serde_json::json!({ "message": "no route" }).to_string(),
            ))
        })
    }
}

/// Unsigned credential expiring `secs_from_now` seconds from now.
pub fn credential(secs_from_now: i64) -> String {
    let payload = serde_json::json!({
        "exp": chrono::Utc::now().timestamp() + secs_from_now,
        "name": "A",
        "email": "a@x.com",
        "picture": "p",
    });
    format!(
        "{}.{}.sig",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#),
        URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}

pub struct Harness {
    pub client: PortalClient,
    pub session: Arc<SessionManager>,
    pub transport: Arc<MockTransport>,
    pub token: String,
}

/// Client with a signed-in session and an empty script.
pub fn signed_in() -> Harness {
    let harness = anonymous();
    let token = credential(3600);
    harness.client.sign_in(&token).unwrap();
    Harness { token, ..harness }
}

/// Client with no session.
pub fn anonymous() -> Harness {
    let session = Arc::new(SessionManager::new(SessionStore::new(Arc::new(
        MemoryStorage::new(),
    ))));
    let transport = MockTransport::new();
    let client = PortalClient::new(session.clone(), transport.clone());
    Harness {
        client,
        session,
        transport,
        token: String::new(),
    }
}

/// Let spawned fetch drivers run to completion.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
