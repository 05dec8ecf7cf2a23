//! # Actor Proxy
//!
//! An [`ActorProxy`] is a reference to one actor identity. Every call:
//!
//! 1. packs the arguments and appends the active context ([`envelope::shape_payload`]);
//! 2. resolves a correlation id (creating one if needed) for the out-of-band header;
//! 3. picks up the chain's reentrancy id when reentrancy is enabled;
//! 4. routes in-process when internal calls are allowed and the identity is active in
//!    this process, and through the [`ActorTransport`] otherwise.
//!
//! Both routes look the same to the caller. An in-process call runs in its own context
//! scope, restored from the request exactly as a transport hop would restore it, and its
//! result passes through the same response boundary: a [`SerializableError`] keeps its
//! status and message, anything else becomes [`ActorError::Remote`].
//!
//! Transport failures reach the caller unchanged. Nothing is retried here.
//!
//! [`SerializableError`]: crate::SerializableError
//! [`ActorError::Remote`]: crate::ActorError::Remote
use crate::config::ReentrancyOptions;
use crate::context::{AmbientContext, ContextStore};
use crate::envelope;
use crate::error::Result;
use crate::identity::ActorIdentity;
use crate::runtime::ActorRuntime;
use crate::transport::{ActorTransport, InvocationRequest};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Routing settings shared by every proxy a registry hands out.
pub struct ProxyLink {
    transport: Arc<dyn ActorTransport>,
    runtime: RwLock<Weak<ActorRuntime>>,
    allow_internal_calls: AtomicBool,
    propagate_context: AtomicBool,
    reentrancy: RwLock<ReentrancyOptions>,
}

impl ProxyLink {
    pub fn new(transport: Arc<dyn ActorTransport>) -> Self {
        Self {
            transport,
            runtime: RwLock::new(Weak::new()),
            allow_internal_calls: AtomicBool::new(false),
            propagate_context: AtomicBool::new(true),
            reentrancy: RwLock::new(ReentrancyOptions::default()),
        }
    }

    pub(crate) fn attach_runtime(&self, runtime: &Arc<ActorRuntime>) {
        *self.runtime.write() = Arc::downgrade(runtime);
    }

    pub(crate) fn set_allow_internal_calls(&self, allow: bool) {
        self.allow_internal_calls.store(allow, Ordering::SeqCst);
    }

    pub(crate) fn set_propagate_context(&self, propagate: bool) {
        self.propagate_context.store(propagate, Ordering::SeqCst);
    }

    pub(crate) fn set_reentrancy(&self, options: ReentrancyOptions) {
        *self.reentrancy.write() = options;
    }

    pub fn allow_internal_calls(&self) -> bool {
        self.allow_internal_calls.load(Ordering::SeqCst)
    }

    fn reentrancy_enabled(&self) -> bool {
        self.reentrancy.read().enabled
    }

    fn local_runtime(&self, identity: &ActorIdentity) -> Option<Arc<ActorRuntime>> {
        if !self.allow_internal_calls() {
            return None;
        }
        let runtime = self.runtime.read().upgrade()?;
        runtime
            .has_actor(identity.type_name(), identity.id())
            .then_some(runtime)
    }
}

#[derive(Clone)]
pub struct ActorProxy {
    identity: ActorIdentity,
    link: Arc<ProxyLink>,
}

impl std::fmt::Debug for ActorProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorProxy")
            .field("identity", &self.identity)
            .finish()
    }
}

impl ActorProxy {
    pub fn new(identity: ActorIdentity, link: Arc<ProxyLink>) -> Self {
        Self { identity, link }
    }

    /// Identity as the runtime sees it, prefixes included.
    pub fn identity(&self) -> &ActorIdentity {
        &self.identity
    }

    /// Calls `method` with the ambient context of the current chain.
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        self.call_with_context(method, args, ContextStore::get()).await
    }

    /// Calls `method` carrying `context` explicitly instead of reading the ambient one.
    pub async fn call_with_context(
        &self,
        method: &str,
        args: Vec<Value>,
        context: Option<AmbientContext>,
    ) -> Result<Value> {
        let context = context.filter(|_| self.link.propagate_context.load(Ordering::SeqCst));
        let correlation_id = context
            .as_ref()
            .and_then(|c| c.correlation_id().map(str::to_owned))
            .or_else(|| ContextStore::get_correlation_id(true));
        let reentrancy_id = if self.link.reentrancy_enabled() {
            ContextStore::reentrancy_id(true)
        } else {
            None
        };

        let request = InvocationRequest {
            actor_type: self.identity.type_name().to_string(),
            actor_id: self.identity.id().to_string(),
            method: method.to_string(),
            payload: envelope::shape_payload(args, context.as_ref()),
            correlation_id,
            reentrancy_id,
        };

        if let Some(runtime) = self.link.local_runtime(&self.identity) {
            debug!(actor = %self.identity, method, "Routing call in-process");
            return ContextStore::scope(runtime.handle_request(request))
                .await
                .into_result();
        }

        debug!(actor = %self.identity, method, "Routing call through transport");
        self.link.transport.invoke(request).await?.into_result()
    }

    /// Like [`call`](Self::call), decoding the result into `R`.
    pub async fn call_as<R: DeserializeOwned>(&self, method: &str, args: Vec<Value>) -> Result<R> {
        let value = self.call(method, args).await?;
        Ok(serde_json::from_value(value)?)
    }
}
