//! Read-only access to voice platform webhook payloads.
//!
//! The platform does not commit to a schema, so nothing here assumes a field
//! exists: every lookup returns `Option` and type mismatches read as absent.

use serde_json::Value;

/// End-of-call report event type
pub const END_OF_CALL_REPORT: &str = "end-of-call-report";

#[derive(Debug, Clone)]
pub struct Payload {
    root: Value,
}

/// First tool call found in a wrapped tool-call request
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: Option<String>,
    pub arguments: Value,
}

impl Payload {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Walk `path` through nested objects
    pub fn value_at(&self, path: &[&str]) -> Option<&Value> {
        path.iter()
            .try_fold(&self.root, |node, key| node.as_object()?.get(*key))
    }

    /// Non-blank string at `path`
    pub fn str_at(&self, path: &[&str]) -> Option<&str> {
        self.value_at(path)?
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// First non-blank string among `paths`, in order
    pub fn first_str(&self, paths: &[&[&str]]) -> Option<&str> {
        paths.iter().find_map(|path| self.str_at(path))
    }

    pub fn message_type(&self) -> Option<&str> {
        self.first_str(&[&["message", "type"], &["type"]])
    }

    /// The platform uses either `toolCalls` or `toolCallList`
    pub fn tool_call(&self) -> Option<ToolCall> {
        let calls = self
            .value_at(&["message", "toolCalls"])
            .or_else(|| self.value_at(&["message", "toolCallList"]))?
            .as_array()?;
        let call = calls.first()?;

        let id = call.get("id").and_then(Value::as_str).map(str::to_string);
        let arguments = match call.get("function")?.get("arguments")? {
            Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!(error = %e, "Tool call arguments are not valid JSON");
                    return None;
                }
            },
            other => other.clone(),
        };

        if !arguments.is_object() {
            return None;
        }
        Some(ToolCall { id, arguments })
    }

    /// Arguments of a mid-call tool request: unwrapped from the platform's
    /// tool-call envelope when present, otherwise the payload itself.
    pub fn mid_call_arguments(&self) -> (Payload, Option<String>) {
        match self.tool_call() {
            Some(call) => (Payload::new(call.arguments), call.id),
            None => (self.clone(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_at_missing_or_wrong_type_is_none() {
        let payload = Payload::new(json!({"message": {"call": "not-an-object"}}));
        assert!(payload.value_at(&["message", "call", "customer"]).is_none());
        assert!(payload.value_at(&["absent"]).is_none());
    }

    #[test]
    fn test_str_at_ignores_blank_and_non_strings() {
        let payload = Payload::new(json!({"a": "  ", "b": 42, "c": " x "}));
        assert_eq!(payload.str_at(&["a"]), None);
        assert_eq!(payload.str_at(&["b"]), None);
        assert_eq!(payload.str_at(&["c"]), Some("x"));
    }

    #[test]
    fn test_message_type_falls_back_to_top_level() {
        let nested = Payload::new(json!({"message": {"type": "end-of-call-report"}}));
        let flat = Payload::new(json!({"type": "status-update"}));
        assert_eq!(nested.message_type(), Some(END_OF_CALL_REPORT));
        assert_eq!(flat.message_type(), Some("status-update"));
    }

    #[test]
    fn test_tool_call_with_object_arguments() {
        let payload = Payload::new(json!({
            "message": {
                "toolCallList": [{
                    "id": "call_1",
                    "function": {"name": "send_email", "arguments": {"user_email": "a@b.com"}}
                }]
            }
        }));

        let call = payload.tool_call().unwrap();
        assert_eq!(call.id.as_deref(), Some("call_1"));
        assert_eq!(call.arguments["user_email"], "a@b.com");
    }

    #[test]
    fn test_tool_call_with_string_arguments() {
        let payload = Payload::new(json!({
            "message": {
                "toolCalls": [{
                    "id": "call_2",
                    "function": {"arguments": "{\"user_email\":\"c@d.com\",\"topic\":\"quote\"}"}
                }]
            }
        }));

        let (args, id) = payload.mid_call_arguments();
        assert_eq!(id.as_deref(), Some("call_2"));
        assert_eq!(args.str_at(&["topic"]), Some("quote"));
    }

    #[test]
    fn test_tool_call_with_broken_arguments_falls_back_to_payload() {
        let payload = Payload::new(json!({
            "message": {"toolCalls": [{"function": {"arguments": "{not json"}}]},
            "user_email": "direct@b.com"
        }));

        let (args, id) = payload.mid_call_arguments();
        assert!(id.is_none());
        assert_eq!(args.str_at(&["user_email"]), Some("direct@b.com"));
    }
}
