use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{oneshot, Notify};
use verdant_core::ClientError;
use verdant_http::{ApiRequest, ApiResponse, CredentialProvider, Method, Transport, TransportFuture};

type Outcome = Result<ApiResponse, ClientError>;

enum Reply {
    Ready(Outcome),
    Gated(oneshot::Receiver<Outcome>),
}

#[derive(Default)]
struct Route {
    queue: VecDeque<Reply>,
    fallback: Option<Outcome>,
}

/// Scripted in-memory [`Transport`].
///
/// Routes are matched on method and exact path. Each route answers from its
/// queue of one-shot replies first, then from its standing reply; unknown
/// routes answer `404`. Every request is recorded, including ones rejected
/// for missing credentials.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), Route>>,
    calls: Mutex<Vec<ApiRequest>>,
    credentials: Mutex<Option<Arc<dyn CredentialProvider>>>,
    notify: Notify,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer every `GET path` with `status` and a JSON body.
    pub fn on_get(&self, path: &str, status: u16, body: impl Serialize) -> &Self {
        self.respond(Method::GET, path, Ok(json_response(status, body)))
    }

    /// Answer every `POST path` with `status` and a JSON body.
    pub fn on_post(&self, path: &str, status: u16, body: impl Serialize) -> &Self {
        self.respond(Method::POST, path, Ok(json_response(status, body)))
    }

    /// Fail every request to the route with `error`.
    pub fn fail(&self, method: Method, path: &str, error: ClientError) -> &Self {
        self.respond(method, path, Err(error))
    }

    /// Set the standing reply of a route.
    pub fn respond(&self, method: Method, path: &str, outcome: Outcome) -> &Self {
        self.route(method, path, |route| route.fallback = Some(outcome));
        self
    }

    /// Queue a reply used by the next request to the route only.
    pub fn respond_once(&self, method: Method, path: &str, outcome: Outcome) -> &Self {
        self.route(method, path, |route| route.queue.push_back(Reply::Ready(outcome)));
        self
    }

    /// Queue a reply that the test releases later through the returned gate.
    pub fn gate(&self, method: Method, path: &str) -> ResponseGate {
        let (tx, rx) = oneshot::channel();
        self.route(method, path, |route| route.queue.push_back(Reply::Gated(rx)));
        ResponseGate { sender: tx }
    }

    /// Require a bearer token from `credentials` on authenticated requests,
    /// as the real transport does.
    pub fn with_credentials(&self, credentials: Arc<dyn CredentialProvider>) -> &Self {
        *self.credentials.lock().unwrap() = Some(credentials);
        self
    }

    /// Every request seen so far, in order.
    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Wait until at least `n` requests have been made.
    pub async fn wait_for_calls(&self, n: usize) {
        loop {
            let notified = self.notify.notified();
            if self.total_calls() >= n {
                return;
            }
            notified.await;
        }
    }

    fn route(&self, method: Method, path: &str, apply: impl FnOnce(&mut Route)) {
        let mut routes = self.routes.lock().unwrap();
        apply(routes.entry((method, path.to_string())).or_default());
    }

    fn next_reply(&self, request: &ApiRequest) -> Reply {
        let mut routes = self.routes.lock().unwrap();
        let Some(route) = routes.get_mut(&(request.method.clone(), request.path.clone())) else {
            return Reply::Ready(Ok(json_response(404, serde_json::json!({"message": "no route"}))));
        };
        if let Some(reply) = route.queue.pop_front() {
            return reply;
        }
        match &route.fallback {
            Some(outcome) => Reply::Ready(outcome.clone()),
            None => Reply::Ready(Ok(json_response(404, serde_json::json!({"message": "no reply"})))),
        }
    }
}

impl Transport for MockTransport {
    fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
        self.calls.lock().unwrap().push(request.clone());
        self.notify.notify_waiters();
        tracing::debug!(method = %request.method, path = %request.path, "mock request");

        let credentials = self.credentials.lock().unwrap().clone();
        if request.authenticated {
            if let Some(credentials) = credentials {
                if credentials.token().is_none() {
                    return Box::pin(async {
                        Err(ClientError::Auth("No credentials for a protected request".into()))
                    });
                }
            }
        }

        let reply = self.next_reply(&request);
        Box::pin(async move {
            match reply {
                Reply::Ready(outcome) => outcome,
                Reply::Gated(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(ClientError::Transport("response gate dropped".into()))),
            }
        })
    }
}

/// Releases one gated reply of a [`MockTransport`].
pub struct ResponseGate {
    sender: oneshot::Sender<Outcome>,
}

impl ResponseGate {
    pub fn respond(self, status: u16, body: impl Serialize) {
        let _ = self.sender.send(Ok(json_response(status, body)));
    }

    pub fn fail(self, error: ClientError) {
        let _ = self.sender.send(Err(error));
    }
}

fn json_response(status: u16, body: impl Serialize) -> ApiResponse {
    let value = serde_json::to_value(body).unwrap_or(Value::Null);
    ApiResponse::json_body(status, &value)
}
