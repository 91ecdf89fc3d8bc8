//! Tool-call protocol types.
//!
//! The remote model can request a named local capability mid-stream
//! (e.g. "read the current editor buffer"). A [`ToolCall`] must be
//! answered by exactly one [`ToolResponse`] paired by id; an unanswered
//! call stalls the remote model's turn, so even failures are answered
//! with an error payload rather than dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::ToolCallId;

/// A capability advertised to the remote model at connect time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDeclaration {
    /// Tool name the model calls it by.
    pub name: String,
    /// What the tool does, for the model's benefit.
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: Value,
}

impl ToolDeclaration {
    /// Declaration with an empty-object parameter schema.
    #[must_use]
    pub fn no_args(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }
    }
}

/// A capability request issued by the remote model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Pairing id — the response must echo it.
    pub id: ToolCallId,
    /// Requested tool name.
    pub name: String,
    /// Arguments object.
    pub arguments: serde_json::Map<String, Value>,
}

/// The engine's answer to a [`ToolCall`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    /// Echoed pairing id.
    pub id: ToolCallId,
    /// Echoed tool name.
    pub name: String,
    /// Result payload (an error object when `is_error`).
    pub result: Value,
    /// Whether `result` carries an error payload.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResponse {
    /// Successful response.
    #[must_use]
    pub fn ok(id: ToolCallId, name: impl Into<String>, result: Value) -> Self {
        Self {
            id,
            name: name.into(),
            result,
            is_error: false,
        }
    }

    /// Error response. Sent instead of dropping the call so the remote
    /// model's turn is never stalled.
    #[must_use]
    pub fn error(id: ToolCallId, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            result: serde_json::json!({ "error": message.into() }),
            is_error: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_response_pairs_id() {
        let id = ToolCallId::from("tc-1");
        let r = ToolResponse::ok(id.clone(), "get_current_code", json!("print('hi')"));
        assert_eq!(r.id, id);
        assert!(!r.is_error);
        assert_eq!(r.result, json!("print('hi')"));
    }

    #[test]
    fn error_response_carries_payload() {
        let r = ToolResponse::error(ToolCallId::from("tc-2"), "get_weather", "unknown tool");
        assert!(r.is_error);
        assert_eq!(r.result["error"], "unknown tool");
    }

    #[test]
    fn response_serde_omits_false_is_error() {
        let r = ToolResponse::ok(ToolCallId::from("tc-3"), "t", json!(null));
        let json = serde_json::to_value(&r).unwrap();
        assert!(json.get("isError").is_none());

        let r = ToolResponse::error(ToolCallId::from("tc-4"), "t", "boom");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["isError"], true);
    }

    #[test]
    fn tool_call_serde_roundtrip() {
        let mut args = serde_json::Map::new();
        let _ = args.insert("path".to_owned(), json!("main.py"));
        let call = ToolCall {
            id: ToolCallId::from("tc-5"),
            name: "read_file".into(),
            arguments: args,
        };
        let json = serde_json::to_string(&call).unwrap();
        let back: ToolCall = serde_json::from_str(&json).unwrap();
        assert_eq!(back, call);
    }

    #[test]
    fn no_args_declaration_schema() {
        let d = ToolDeclaration::no_args("get_current_code", "Read the editor buffer");
        assert_eq!(d.parameters["type"], "object");
        assert!(d.parameters["properties"].as_object().unwrap().is_empty());
    }
}
