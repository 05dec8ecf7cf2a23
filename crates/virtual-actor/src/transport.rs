//! # Transport
//!
//! The seam between proxies and the actor runtime. In production an [`ActorTransport`]
//! talks to the sidecar's invocation API; [`LoopbackTransport`] plays the sidecar
//! in-process by encoding each request to bytes and dispatching it on its own task.
//! Ambient state therefore crosses a hop only through the payload and headers, the
//! same as it would over a network.
use crate::error::{ActorError, Result, SerializableError};
use crate::runtime::ActorRuntime;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tracing::debug;

pub const CORRELATION_ID_HEADER: &str = "Correlation-Id";
pub const REENTRANCY_ID_HEADER: &str = "Reentrancy-Id";

/// A single method call addressed to one actor identity.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    pub actor_type: String,
    pub actor_id: String,
    pub method: String,
    pub payload: Value,
    pub correlation_id: Option<String>,
    pub reentrancy_id: Option<String>,
}

impl InvocationRequest {
    pub fn new(
        actor_type: impl Into<String>,
        actor_id: impl Into<String>,
        method: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            actor_type: actor_type.into(),
            actor_id: actor_id.into(),
            method: method.into(),
            payload,
            correlation_id: None,
            reentrancy_id: None,
        }
    }

    /// Out-of-band header fields. The correlation and reentrancy ids never go in the body.
    pub fn headers(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        if let Some(id) = &self.correlation_id {
            headers.insert(CORRELATION_ID_HEADER.to_string(), id.clone());
        }
        if let Some(id) = &self.reentrancy_id {
            headers.insert(REENTRANCY_ID_HEADER.to_string(), id.clone());
        }
        headers
    }

    pub fn encode(&self) -> Result<WireRequest> {
        Ok(WireRequest {
            actor_type: self.actor_type.clone(),
            actor_id: self.actor_id.clone(),
            method: self.method.clone(),
            headers: self.headers(),
            body: serde_json::to_vec(&self.payload)?,
        })
    }

    pub fn decode(wire: WireRequest) -> Result<Self> {
        let payload = if wire.body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&wire.body)?
        };
        Ok(Self {
            actor_type: wire.actor_type,
            actor_id: wire.actor_id,
            method: wire.method,
            payload,
            correlation_id: wire.headers.get(CORRELATION_ID_HEADER).cloned(),
            reentrancy_id: wire.headers.get(REENTRANCY_ID_HEADER).cloned(),
        })
    }
}

/// Request as it crosses the wire: routing fields, headers and a JSON byte body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRequest {
    pub actor_type: String,
    pub actor_id: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResponse {
    pub status: u16,
    pub body: Value,
}

impl InvocationResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn from_error(error: &ActorError) -> Self {
        Self {
            status: error.status_code(),
            body: error.response_body(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Caller-side view of the response.
    pub fn into_result(self) -> Result<Value> {
        if self.is_success() {
            return Ok(self.body);
        }
        match SerializableError::from_value(&self.body) {
            Some(error) => Err(ActorError::Serializable(error)),
            None => Err(ActorError::Remote {
                status: self.status,
            }),
        }
    }

    pub fn encode(&self) -> Result<(u16, Vec<u8>)> {
        Ok((self.status, serde_json::to_vec(&self.body)?))
    }

    pub fn decode(status: u16, body: &[u8]) -> Result<Self> {
        let body = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(body)?
        };
        Ok(Self { status, body })
    }
}

#[async_trait]
pub trait ActorTransport: Send + Sync {
    async fn invoke(&self, request: InvocationRequest) -> Result<InvocationResponse>;
}

/// In-process stand-in for the sidecar.
#[derive(Default)]
pub struct LoopbackTransport {
    runtime: RwLock<Weak<ActorRuntime>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, runtime: &Arc<ActorRuntime>) {
        *self.runtime.write() = Arc::downgrade(runtime);
    }
}

#[async_trait]
impl ActorTransport for LoopbackTransport {
    async fn invoke(&self, request: InvocationRequest) -> Result<InvocationResponse> {
        let runtime = self
            .runtime
            .read()
            .upgrade()
            .ok_or_else(|| ActorError::Transport("no runtime attached to loopback".into()))?;
        let wire = request.encode()?;
        debug!(
            actor_type = %wire.actor_type,
            actor_id = %wire.actor_id,
            method = %wire.method,
            bytes = wire.body.len(),
            "Loopback request"
        );

        let handle = tokio::spawn(async move {
            let request = InvocationRequest::decode(wire)?;
            runtime.handle_request(request).await.encode()
        });
        let (status, body) = handle
            .await
            .map_err(|e| ActorError::Transport(e.to_string()))??;
        InvocationResponse::decode(status, &body)
    }
}
