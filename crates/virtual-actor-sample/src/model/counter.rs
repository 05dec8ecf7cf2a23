use serde_json::{json, Value};
use virtual_actor::{ActorError, Result, SerializableState};

/// Persisted state of a [`CounterActor`](crate::counter_actor::CounterActor).
///
/// Stored as `{"counter": n}`. A persisted document without the field loads as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterState {
    pub counter: i64,
}

impl SerializableState for CounterState {
    fn from_raw(&mut self, raw: &Value) -> Result<()> {
        let Value::Object(fields) = raw else {
            return Err(ActorError::State {
                key: "state".into(),
                reason: format!("expected an object, found {raw}"),
            });
        };
        self.counter = fields
            .get("counter")
            .and_then(Value::as_i64)
            .unwrap_or_default();
        Ok(())
    }

    fn to_raw(&self) -> Result<Value> {
        Ok(json!({ "counter": self.counter }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_missing_counter_as_zero() {
        let mut state = CounterState { counter: 9 };
        state.from_raw(&json!({})).unwrap();
        assert_eq!(state.counter, 0);
    }

    #[test]
    fn rejects_non_object_documents() {
        let mut state = CounterState::default();
        assert!(state.from_raw(&json!(3)).is_err());
    }
}
