//! # Invocation Pipeline
//!
//! The wrappers placed around the runtime's raw activate/invoke/deactivate steps:
//!
//! - **activation**: resolve dependencies, build the instance, load declared state,
//!   run `on_activate`;
//! - **invocation**: restore the propagated context and the reentrancy chain id,
//!   then run the method (optionally through an [`InvocationInterceptor`]);
//! - **error serialization**: turn the final result into an [`InvocationResponse`].
//!   This happens only at the outermost boundary, in
//!   [`ActorRuntime::handle_request`](crate::ActorRuntime::handle_request).
//!
//! Deactivation of unknown identities is a no-op; see [`crate::ActorRuntime::deactivate`].
use crate::actor::ActivatedActor;
use crate::config::ReentrancyOptions;
use crate::context::{AmbientContext, ContextStore};
use crate::dependencies::{Dependencies, Resolve};
use crate::entity::{MethodArgs, VirtualActor};
use crate::error::{ActorError, Result};
use crate::identity::ActorIdentity;
use crate::state::{StateManager, StateStore};
use crate::stateful::StateProperty;
use crate::transport::InvocationResponse;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The rest of the pipeline, handed to an interceptor.
pub type Next<'a> = BoxFuture<'a, Result<Value>>;

/// Middleware around every actor method dispatch.
#[async_trait]
pub trait InvocationInterceptor: Send + Sync {
    async fn intercept(&self, identity: &ActorIdentity, method: &str, next: Next<'_>)
        -> Result<Value>;
}

pub(crate) async fn activate<A: VirtualActor>(
    identity: ActorIdentity,
    dependencies: &Dependencies,
    store: Arc<dyn StateStore>,
    properties: Arc<Vec<StateProperty<A>>>,
) -> Result<Arc<ActivatedActor<A>>> {
    let resolved = A::Dependencies::resolve(dependencies, identity.type_name()).map_err(|e| {
        error!(
            actor_type = identity.type_name(),
            actor_id = identity.id(),
            error = %e,
            "Dependency resolution failed"
        );
        e
    })?;

    let actor = Arc::new(A::create(&identity, resolved));
    let state = Arc::new(StateManager::new(identity.clone(), store));
    let activated = Arc::new(ActivatedActor::new(identity, actor, state, properties));

    if let Err(e) = activated.start().await {
        warn!(
            actor_type = activated.identity().type_name(),
            actor_id = activated.identity().id(),
            error = %e,
            "Activation failed"
        );
        return Err(e);
    }
    info!(
        actor_type = activated.identity().type_name(),
        actor_id = activated.identity().id(),
        "Activated"
    );
    Ok(activated)
}

/// Restores what the caller propagated: the tagged context, the correlation id header
/// and the reentrancy chain id. Must run inside a [`ContextStore`] scope.
///
/// Returns the chain id this turn runs under.
pub(crate) fn restore_inbound(
    context: Option<AmbientContext>,
    correlation_id: Option<String>,
    reentrancy_id: Option<String>,
    reentrancy: &ReentrancyOptions,
) -> Option<String> {
    if let Some(mut context) = context {
        if context.correlation_id().is_none() {
            if let Some(id) = &correlation_id {
                context.set_correlation_id(id.clone());
            }
        }
        let _ = ContextStore::set(context);
    } else if let Some(id) = correlation_id {
        if ContextStore::get_correlation_id(false).is_none() {
            let _ = ContextStore::set_correlation_id(id);
        }
    }

    if !reentrancy.enabled {
        return None;
    }
    // A root call starts a new chain so nested calls can re-enter this actor.
    let chain = reentrancy_id
        .or_else(|| ContextStore::reentrancy_id(false))
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let _ = ContextStore::set_reentrancy_id(chain.clone());
    Some(chain)
}

pub(crate) async fn dispatch<A: VirtualActor>(
    activated: &ActivatedActor<A>,
    method: &str,
    args: MethodArgs,
    interceptor: Option<Arc<dyn InvocationInterceptor>>,
) -> Result<Value> {
    let ctx = activated.context();
    match interceptor {
        Some(interceptor) => {
            let next: Next<'_> = activated.actor().invoke(&ctx, method, args);
            interceptor.intercept(ctx.identity(), method, next).await
        }
        None => activated.actor().invoke(&ctx, method, args).await,
    }
}

fn log_failure(identity: &ActorIdentity, method: &str, error: &ActorError) {
    match error {
        ActorError::Serializable(e) => warn!(
            actor_type = identity.type_name(),
            actor_id = identity.id(),
            method,
            status = e.status_code,
            error = %e,
            "Method returned serializable error"
        ),
        other => error!(
            actor_type = identity.type_name(),
            actor_id = identity.id(),
            method,
            error = ?other,
            "Method failed"
        ),
    }
}

/// Outermost boundary: errors become status codes, only serializable ones keep a body.
/// This is the only place a failed invocation is logged.
pub fn into_response(
    identity: &ActorIdentity,
    method: &str,
    result: Result<Value>,
) -> InvocationResponse {
    match result {
        Ok(body) => InvocationResponse::ok(body),
        Err(e) => {
            log_failure(identity, method, &e);
            InvocationResponse::from_error(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SerializableError;
    use serde_json::json;

    #[test]
    fn serializable_error_keeps_status_and_body() {
        let response = into_response(
            &ActorIdentity::new("A", "1"),
            "m",
            Err(SerializableError::bad_request("bad request").into()),
        );
        assert_eq!(response.status, 400);
        assert_eq!(
            response.body,
            json!({"name": "SerializableError", "message": "bad request", "statusCode": 400})
        );
    }

    #[test]
    fn plain_error_hides_message() {
        let response = into_response(
            &ActorIdentity::new("A", "1"),
            "m",
            Err(ActorError::Unexpected("secret detail".into())),
        );
        assert_eq!(response.status, 500);
        assert_eq!(response.body, Value::Null);
        assert!(!response.body.to_string().contains("secret"));
    }

    #[tokio::test]
    async fn correlation_header_seeds_context() {
        ContextStore::scope(async {
            restore_inbound(None, Some("X".into()), None, &ReentrancyOptions::default());
            assert_eq!(ContextStore::get_correlation_id(false).as_deref(), Some("X"));
        })
        .await;
    }

    #[tokio::test]
    async fn payload_context_wins_over_header() {
        ContextStore::scope(async {
            let ctx = AmbientContext::with_correlation_id("from-payload");
            restore_inbound(Some(ctx), Some("from-header".into()), None, &ReentrancyOptions::default());
            assert_eq!(
                ContextStore::get_correlation_id(false).as_deref(),
                Some("from-payload")
            );
        })
        .await;
    }

    #[tokio::test]
    async fn chain_id_is_kept_or_started() {
        ContextStore::scope(async {
            let options = ReentrancyOptions::enabled();
            let chain = restore_inbound(None, None, Some("chain-1".into()), &options);
            assert_eq!(chain.as_deref(), Some("chain-1"));
            assert_eq!(ContextStore::reentrancy_id(false).as_deref(), Some("chain-1"));
        })
        .await;

        ContextStore::scope(async {
            let chain = restore_inbound(None, None, None, &ReentrancyOptions::enabled());
            assert!(chain.is_some());
            assert_eq!(ContextStore::reentrancy_id(false), chain);
        })
        .await;

        ContextStore::scope(async {
            let chain = restore_inbound(None, None, Some("x".into()), &ReentrancyOptions::default());
            assert!(chain.is_none());
        })
        .await;
    }
}
