//! Mock HTTP transport for testing.
//!
//! Replies are scripted per web service operation (the `operation`
//! parameter of the request), so tests stay deterministic even when
//! several callers run concurrently.
//!
//! # Features
//!
//! - Sticky replies per operation, plus one-shot replies consumed first
//! - Simulated latency for concurrency testing
//! - Transport failure injection
//! - Call recording for verification
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new()
//!     .on("getchallenge", MockReply::success(json!({"token": "t", "expireTime": 4102444800i64})))
//!     .on("login", MockReply::success(json!({"sessionName": "s", "userId": "19x1"})));
//! ```

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{HttpRequest, HttpResponse, HttpTransport, TransportError};

/// A scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// HTTP response with the given status and raw body.
    Response { status: u16, body: String },
    /// Transport failure; no response is produced.
    Fail(TransportError),
}

impl MockReply {
    /// `{"success": true, "result": <result>}` with status 200.
    pub fn success(result: Value) -> Self {
        Self::json(json!({ "success": true, "result": result }))
    }

    /// `{"success": false, "error": {"code": .., "message": ..}}` with status 200.
    pub fn failure(code: &str, message: &str) -> Self {
        Self::json(json!({
            "success": false,
            "error": { "code": code, "message": message }
        }))
    }

    /// Any JSON document with status 200.
    pub fn json(body: Value) -> Self {
        Self::Response {
            status: 200,
            body: body.to_string(),
        }
    }

    /// Raw body with an arbitrary status.
    pub fn raw(status: u16, body: impl Into<String>) -> Self {
        Self::Response {
            status,
            body: body.into(),
        }
    }

    pub fn transport(error: TransportError) -> Self {
        Self::Fail(error)
    }
}

#[derive(Debug, Default)]
struct Script {
    once: HashMap<String, VecDeque<MockReply>>,
    sticky: HashMap<String, MockReply>,
}

/// Mock transport; clones share replies and call history.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
    calls: Arc<Mutex<Vec<HttpRequest>>>,
    delay: Duration,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reply returned for every call of `operation`.
    pub fn on(self, operation: &str, reply: MockReply) -> Self {
        self.set_reply(operation, reply);
        self
    }

    /// Queues a reply used once, before any sticky reply.
    pub fn once(self, operation: &str, reply: MockReply) -> Self {
        self.push_once(operation, reply);
        self
    }

    /// Sets simulated latency per request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Replaces the sticky reply of an operation on a shared transport.
    pub fn set_reply(&self, operation: &str, reply: MockReply) {
        self.script
            .lock()
            .unwrap()
            .sticky
            .insert(operation.to_string(), reply);
    }

    /// Queues a one-shot reply on a shared transport.
    pub fn push_once(&self, operation: &str, reply: MockReply) {
        self.script
            .lock()
            .unwrap()
            .once
            .entry(operation.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Returns all recorded requests.
    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Total number of requests sent.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of requests sent for one operation.
    pub fn calls_for(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.param("operation") == Some(operation))
            .count()
    }

    /// Most recent request for one operation.
    pub fn last_call_for(&self, operation: &str) -> Option<HttpRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.param("operation") == Some(operation))
            .cloned()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn next_reply(&self, operation: &str) -> MockReply {
        let mut script = self.script.lock().unwrap();
        if let Some(reply) = script.once.get_mut(operation).and_then(VecDeque::pop_front) {
            return reply;
        }
        script.sticky.get(operation).cloned().unwrap_or_else(|| {
            MockReply::failure(
                "MOCK_NO_REPLY",
                &format!("no reply scripted for operation '{}'", operation),
            )
        })
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let operation = request.param("operation").unwrap_or_default().to_string();
        self.calls.lock().unwrap().push(request);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match self.next_reply(&operation) {
            MockReply::Response { status, body } => Ok(HttpResponse::new(status, body)),
            MockReply::Fail(err) => Err(err),
        }
    }
}
