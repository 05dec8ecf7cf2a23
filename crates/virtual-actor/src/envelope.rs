//! # Invocation Envelope
//!
//! Payload conventions for actor method calls:
//!
//! - arguments travel as a JSON array;
//! - an active context is appended as a trailing `{"$t": "ctx", ...}` object;
//! - a call without arguments sends the context object alone;
//! - no arguments and no context sends `null`.
//!
//! [`shape_payload`] builds the outgoing body and [`unpack_payload`] reverses it.
use crate::context::AmbientContext;
use serde_json::Value;

/// Builds the outgoing payload for a call.
///
/// One heuristic is kept on purpose: a single `null` placeholder argument followed by a
/// context (`[null, ctx]`) collapses to `[ctx]`. It matches call sites that pass `null`
/// to mean "no arguments". Only that exact two-element shape collapses; nothing broader
/// is pattern-matched.
pub fn shape_payload(args: Vec<Value>, context: Option<&AmbientContext>) -> Value {
    let Some(context) = context else {
        return if args.is_empty() {
            Value::Null
        } else {
            Value::Array(args)
        };
    };

    let tagged = context.to_tagged_value();
    if args.is_empty() {
        return tagged;
    }

    let placeholder_only = args.len() == 1 && args[0].is_null();
    let mut body = args;
    body.push(tagged);
    if placeholder_only && body.len() == 2 {
        body.remove(0);
    }
    Value::Array(body)
}

/// Splits a received payload into the visible arguments and the propagated context.
pub fn unpack_payload(payload: Value) -> (Vec<Value>, Option<AmbientContext>) {
    match payload {
        Value::Null => (Vec::new(), None),
        Value::Array(mut items) => {
            let context = items.last().and_then(AmbientContext::from_tagged_value);
            if context.is_some() {
                items.pop();
            }
            (items, context)
        }
        other => match AmbientContext::from_tagged_value(&other) {
            Some(context) => (Vec::new(), Some(context)),
            None => (vec![other], None),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> AmbientContext {
        AmbientContext::with_correlation_id("X")
    }

    #[test]
    fn no_context_keeps_arguments() {
        assert_eq!(shape_payload(vec![], None), Value::Null);
        assert_eq!(shape_payload(vec![json!(1), json!("a")], None), json!([1, "a"]));
        assert_eq!(shape_payload(vec![Value::Null], None), json!([null]));
    }

    #[test]
    fn zero_arguments_send_context_alone() {
        let payload = shape_payload(vec![], Some(&ctx()));
        assert_eq!(payload, json!({"$t": "ctx", "correlationId": "X"}));
    }

    #[test]
    fn context_is_appended_after_arguments() {
        let payload = shape_payload(vec![json!(5), json!({"a": 1})], Some(&ctx()));
        assert_eq!(
            payload,
            json!([5, {"a": 1}, {"$t": "ctx", "correlationId": "X"}])
        );
    }

    #[test]
    fn null_placeholder_collapses_to_context() {
        let payload = shape_payload(vec![Value::Null], Some(&ctx()));
        assert_eq!(payload, json!([{"$t": "ctx", "correlationId": "X"}]));
    }

    #[test]
    fn leading_null_with_more_arguments_is_not_collapsed() {
        let payload = shape_payload(vec![Value::Null, json!(2)], Some(&ctx()));
        assert_eq!(payload.as_array().map(Vec::len), Some(3));
        let payload = shape_payload(vec![json!(0)], Some(&ctx()));
        assert_eq!(payload.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn unpack_strips_trailing_context() {
        let (args, context) = unpack_payload(json!([1, 2, {"$t": "ctx", "correlationId": "X"}]));
        assert_eq!(args, vec![json!(1), json!(2)]);
        assert_eq!(context, Some(ctx()));

        let (args, context) = unpack_payload(json!({"$t": "ctx", "correlationId": "X"}));
        assert!(args.is_empty());
        assert_eq!(context, Some(ctx()));
    }

    #[test]
    fn unpack_leaves_untagged_objects_as_arguments() {
        let (args, context) = unpack_payload(json!([{"correlationId": "X"}]));
        assert_eq!(args, vec![json!({"correlationId": "X"})]);
        assert!(context.is_none());

        let (args, context) = unpack_payload(json!("single"));
        assert_eq!(args, vec![json!("single")]);
        assert!(context.is_none());

        let (args, _) = unpack_payload(Value::Null);
        assert!(args.is_empty());
    }
}
