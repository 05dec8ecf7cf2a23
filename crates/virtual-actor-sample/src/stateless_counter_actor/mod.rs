//! # Stateless Counter Actor
//!
//! Keeps its count in memory only, so the count starts over after every activation.
//! Also exposes two failing methods that show how errors reach callers:
//!
//! | Method | Caller sees |
//! |--------|-------------|
//! | `throwSerializableError` | `ActorError::Serializable` with status 400 and the message |
//! | `throwError` | `ActorError::Remote { status: 500 }` and nothing else |

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use virtual_actor::{
    reply, unknown_method, ActorContext, ActorError, ActorIdentity, MethodArgs, Result,
    SerializableError, VirtualActor,
};

pub const SERIALIZABLE_ERROR_MESSAGE: &str = "This is a serializable error";

#[derive(Default)]
pub struct StatelessCounterActor {
    counter: AtomicI64,
}

#[async_trait]
impl VirtualActor for StatelessCounterActor {
    const TYPE_NAME: &'static str = "StatelessCounterActor";
    type Dependencies = ();

    fn create(_: &ActorIdentity, _: ()) -> Self {
        Self::default()
    }

    async fn invoke(&self, _: &ActorContext<Self>, method: &str, _: MethodArgs) -> Result<Value> {
        match method {
            "increment" => {
                self.counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            }
            "getCounter" => reply(self.counter.load(Ordering::SeqCst)),
            "throwSerializableError" => {
                Err(SerializableError::bad_request(SERIALIZABLE_ERROR_MESSAGE).into())
            }
            "throwError" => Err(ActorError::Unexpected("This is an error".into())),
            _ => Err(unknown_method(Self::TYPE_NAME, method)),
        }
    }
}
