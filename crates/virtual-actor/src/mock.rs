//! # Mocks & Testing Guide
//!
//! [`MockTransport`] stands in for the sidecar on the caller side. Proxies built on it
//! never reach a runtime: each call pops the next expectation and returns its canned
//! response, and every request is recorded so tests can assert on payloads and headers.
//! [`RecordingPubSub`] does the same for the publishing side.
//!
//! ## When to use Mocks vs a Host
//!
//! | Feature | MockTransport | ActorHost |
//! |---------|---------------|-----------|
//! | **Speed** | Instant | Fast (spawns a task per hop) |
//! | **State** | None | Real state store |
//! | **Use Case** | Testing callers and typed clients | Testing actors and full flows |
//! | **Error Injection** | Easy (`return_status`, `return_err`) | Requires a failing actor |
//!
//! ## Testing Strategies
//!
//! <details>
//! <summary><b>Pattern 0: Client Logic Test (Pure Mock)</b></summary>
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use virtual_actor::mock::MockTransport;
//! use virtual_actor::ActorClientRegistry;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mock = Arc::new(MockTransport::new());
//!     mock.expect_invoke("getCounter").on_actor("CounterActor", "1").return_ok(json!(7));
//!
//!     let registry = ActorClientRegistry::new(mock.clone());
//!     registry.register("CounterActor", "CounterActor");
//!
//!     let counter = registry.get_actor("CounterActor", "1").unwrap();
//!     assert_eq!(counter.call("getCounter", vec![]).await.unwrap(), json!(7));
//!     mock.verify();
//! }
//! ```
//! </details>
//!
//! <details>
//! <summary><b>Pattern 1: Actor Test (Host + Loopback)</b></summary>
//!
//! Register the actor on an [`ActorHost`](crate::host::ActorHost) and call it through
//! the host's registry. State goes to a [`MemoryStateStore`](crate::state::MemoryStateStore)
//! that the test can inspect. See `tests/integration_test.rs`.
//! </details>
//!
//! ## Testing Failure Scenarios
//!
//! ```rust
//! use std::sync::Arc;
//! use virtual_actor::mock::MockTransport;
//! use virtual_actor::{ActorClientRegistry, ActorError, SerializableError};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mock = Arc::new(MockTransport::new());
//!     mock.expect_invoke("increment")
//!         .return_err(ActorError::Transport("sidecar unavailable".into()));
//!     mock.expect_invoke("increment")
//!         .return_status(400, SerializableError::bad_request("no").to_value());
//!
//!     let registry = ActorClientRegistry::new(mock.clone());
//!     registry.register("CounterActor", "CounterActor");
//!     let counter = registry.get_actor("CounterActor", "1").unwrap();
//!
//!     assert!(matches!(counter.call("increment", vec![]).await, Err(ActorError::Transport(_))));
//!     assert!(matches!(counter.call("increment", vec![]).await, Err(ActorError::Serializable(_))));
//! }
//! ```
use crate::error::{ActorError, Result};
use crate::pubsub::PubSubTransport;
use crate::transport::{ActorTransport, InvocationRequest, InvocationResponse};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

struct Expectation {
    method: String,
    actor: Option<(String, String)>,
    response: Result<InvocationResponse>,
}

impl Expectation {
    fn matches(&self, request: &InvocationRequest) -> bool {
        if self.method != request.method {
            return false;
        }
        match &self.actor {
            Some((actor_type, actor_id)) => {
                actor_type == &request.actor_type && actor_id == &request.actor_id
            }
            None => true,
        }
    }
}

/// Caller-side transport with expectation tracking.
#[derive(Default)]
pub struct MockTransport {
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
    requests: Mutex<Vec<InvocationRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects one call to `method`. Expectations are consumed in order.
    pub fn expect_invoke(&self, method: &str) -> InvokeExpectationBuilder {
        InvokeExpectationBuilder {
            method: method.to_string(),
            actor: None,
            expectations: self.expectations.clone(),
        }
    }

    pub fn requests(&self) -> Vec<InvocationRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<InvocationRequest> {
        self.requests.lock().last().cloned()
    }

    /// Panics unless every expectation was consumed.
    pub fn verify(&self) {
        let remaining = self.expectations.lock().len();
        if remaining > 0 {
            panic!("Not all expectations were met. {remaining} remaining");
        }
    }
}

#[async_trait]
impl ActorTransport for MockTransport {
    async fn invoke(&self, request: InvocationRequest) -> Result<InvocationResponse> {
        self.requests.lock().push(request.clone());
        let mut expectations = self.expectations.lock();
        match expectations.front() {
            Some(expectation) if expectation.matches(&request) => {}
            _ => {
                return Err(ActorError::Transport(format!(
                    "Unexpected request or expectation mismatch: {}/{}.{}",
                    request.actor_type, request.actor_id, request.method
                )))
            }
        }
        match expectations.pop_front() {
            Some(expectation) => expectation.response,
            None => Err(ActorError::Transport("no expectation left".into())),
        }
    }
}

pub struct InvokeExpectationBuilder {
    method: String,
    actor: Option<(String, String)>,
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
}

impl InvokeExpectationBuilder {
    /// Only match calls addressed to this identity.
    pub fn on_actor(mut self, actor_type: &str, actor_id: &str) -> Self {
        self.actor = Some((actor_type.to_string(), actor_id.to_string()));
        self
    }

    pub fn return_ok(self, body: Value) {
        self.push(Ok(InvocationResponse::ok(body)));
    }

    /// Answers with a raw status and body, as the sidecar would.
    pub fn return_status(self, status: u16, body: Value) {
        self.push(Ok(InvocationResponse { status, body }));
    }

    /// Fails the call before any response exists.
    pub fn return_err(self, error: ActorError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<InvocationResponse>) {
        self.expectations.lock().push_back(Expectation {
            method: self.method,
            actor: self.actor,
            response,
        });
    }
}

/// One call observed by [`RecordingPubSub`].
#[derive(Debug, Clone, PartialEq)]
pub enum Published {
    Single {
        name: String,
        topic: String,
        payload: Value,
        metadata: BTreeMap<String, String>,
    },
    Bulk {
        name: String,
        topic: String,
        payloads: Vec<Value>,
        metadata: BTreeMap<String, String>,
    },
}

/// Publish transport that records instead of sending.
#[derive(Default)]
pub struct RecordingPubSub {
    published: Mutex<Vec<Published>>,
    fail_with: Mutex<Option<String>>,
}

impl RecordingPubSub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later publish fail with a transport error.
    pub fn fail_with(&self, reason: &str) {
        *self.fail_with.lock() = Some(reason.to_string());
    }

    pub fn published(&self) -> Vec<Published> {
        self.published.lock().clone()
    }

    /// Number of payloads seen, counting each entry of a bulk call.
    pub fn payload_count(&self) -> usize {
        self.published
            .lock()
            .iter()
            .map(|p| match p {
                Published::Single { .. } => 1,
                Published::Bulk { payloads, .. } => payloads.len(),
            })
            .sum()
    }

    fn check(&self) -> Result<()> {
        match self.fail_with.lock().as_ref() {
            Some(reason) => Err(ActorError::Transport(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PubSubTransport for RecordingPubSub {
    async fn publish(
        &self,
        name: &str,
        topic: &str,
        payload: &Value,
        metadata: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.check()?;
        self.published.lock().push(Published::Single {
            name: name.to_string(),
            topic: topic.to_string(),
            payload: payload.clone(),
            metadata: metadata.clone(),
        });
        Ok(())
    }

    async fn publish_bulk(
        &self,
        name: &str,
        topic: &str,
        payloads: &[Value],
        metadata: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.check()?;
        self.published.lock().push(Published::Bulk {
            name: name.to_string(),
            topic: topic.to_string(),
            payloads: payloads.to_vec(),
            metadata: metadata.clone(),
        });
        Ok(())
    }
}
