//! Tool-call bridge.
//!
//! The remote model can request local capabilities mid-stream. The
//! bridge looks up a registered resolver by name, invokes it against
//! engine-held state, and produces exactly one [`ToolResponse`] per
//! call. Unregistered names get an error-payload response rather than
//! silence — an unanswered call stalls the remote model's turn.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use tracing::{debug, warn};

use vox_core::tools::{ToolCall, ToolDeclaration, ToolResponse};

/// Name of the built-in editor-buffer capability.
pub const GET_CURRENT_CODE: &str = "get_current_code";

/// Synchronous view of the most recently edited document.
///
/// Supplied by the hosting application, not owned by the engine.
pub trait DocumentAccessor: Send + Sync {
    /// The current buffer contents.
    fn current_document(&self) -> String;
}

/// A registered capability resolver.
///
/// Resolvers read engine-held state synchronously; they must not
/// suspend the dispatch loop.
pub type ToolResolver = Arc<dyn Fn(&ToolCall) -> std::result::Result<Value, String> + Send + Sync>;

/// Resolves model-issued tool calls against registered capabilities.
pub struct ToolCallBridge {
    resolvers: HashMap<String, (ToolDeclaration, ToolResolver)>,
}

impl ToolCallBridge {
    /// Empty bridge.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolvers: HashMap::new(),
        }
    }

    /// Bridge with the built-in `get_current_code` capability wired to a
    /// document accessor.
    #[must_use]
    pub fn with_document_accessor(accessor: Arc<dyn DocumentAccessor>) -> Self {
        let mut bridge = Self::new();
        bridge.register(
            ToolDeclaration::no_args(
                GET_CURRENT_CODE,
                "Read the candidate's current editor buffer",
            ),
            Arc::new(move |_call| Ok(Value::String(accessor.current_document()))),
        );
        bridge
    }

    /// Register a capability. Re-registering a name replaces it.
    pub fn register(&mut self, declaration: ToolDeclaration, resolver: ToolResolver) {
        let _ = self
            .resolvers
            .insert(declaration.name.clone(), (declaration, resolver));
    }

    /// Declarations advertised to the remote model at connect time.
    #[must_use]
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        let mut decls: Vec<ToolDeclaration> =
            self.resolvers.values().map(|(d, _)| d.clone()).collect();
        decls.sort_by(|a, b| a.name.cmp(&b.name));
        decls
    }

    /// Resolve one call into exactly one response.
    #[must_use]
    pub fn resolve(&self, call: &ToolCall) -> ToolResponse {
        match self.resolvers.get(&call.name) {
            Some((_, resolver)) => match resolver(call) {
                Ok(result) => {
                    debug!(tool = %call.name, id = %call.id, "tool call resolved");
                    ToolResponse::ok(call.id.clone(), call.name.clone(), result)
                }
                Err(message) => {
                    warn!(tool = %call.name, %message, "tool resolver failed");
                    counter!("vox_tool_resolver_failures_total").increment(1);
                    ToolResponse::error(call.id.clone(), call.name.clone(), message)
                }
            },
            None => {
                warn!(tool = %call.name, "unknown tool requested");
                counter!("vox_tool_unknown_total").increment(1);
                ToolResponse::error(
                    call.id.clone(),
                    call.name.clone(),
                    format!("unknown tool '{}'", call.name),
                )
            }
        }
    }
}

impl Default for ToolCallBridge {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use vox_core::ids::ToolCallId;

    struct FixedDocument(&'static str);

    impl DocumentAccessor for FixedDocument {
        fn current_document(&self) -> String {
            self.0.to_owned()
        }
    }

    fn call(name: &str, id: &str) -> ToolCall {
        ToolCall {
            id: ToolCallId::from(id),
            name: name.to_owned(),
            arguments: serde_json::Map::new(),
        }
    }

    #[test]
    fn get_current_code_resolves_via_accessor() {
        let bridge = ToolCallBridge::with_document_accessor(Arc::new(FixedDocument("print('hi')")));
        let response = bridge.resolve(&call(GET_CURRENT_CODE, "tc-1"));

        assert_eq!(response.id, ToolCallId::from("tc-1"));
        assert_eq!(response.name, GET_CURRENT_CODE);
        assert!(!response.is_error);
        assert_eq!(response.result, Value::String("print('hi')".into()));
    }

    #[test]
    fn unknown_tool_gets_error_payload_not_silence() {
        let bridge = ToolCallBridge::with_document_accessor(Arc::new(FixedDocument("")));
        let response = bridge.resolve(&call("get_weather", "tc-2"));

        assert_eq!(response.id, ToolCallId::from("tc-2"));
        assert!(response.is_error);
        assert_eq!(response.result["error"], "unknown tool 'get_weather'");
    }

    #[test]
    fn resolver_failure_becomes_error_response() {
        let mut bridge = ToolCallBridge::new();
        bridge.register(
            ToolDeclaration::no_args("flaky", "always fails"),
            Arc::new(|_| Err("backend unavailable".to_owned())),
        );
        let response = bridge.resolve(&call("flaky", "tc-3"));
        assert!(response.is_error);
        assert_eq!(response.result["error"], "backend unavailable");
    }

    #[test]
    fn declarations_are_sorted_and_complete() {
        let mut bridge = ToolCallBridge::with_document_accessor(Arc::new(FixedDocument("")));
        bridge.register(
            ToolDeclaration::no_args("another_tool", "does things"),
            Arc::new(|_| Ok(Value::Null)),
        );
        let names: Vec<String> = bridge.declarations().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["another_tool", GET_CURRENT_CODE]);
    }

    #[test]
    fn reregistering_replaces() {
        let mut bridge = ToolCallBridge::new();
        bridge.register(
            ToolDeclaration::no_args("t", "v1"),
            Arc::new(|_| Ok(Value::from(1))),
        );
        bridge.register(
            ToolDeclaration::no_args("t", "v2"),
            Arc::new(|_| Ok(Value::from(2))),
        );
        let response = bridge.resolve(&call("t", "tc-4"));
        assert_eq!(response.result, Value::from(2));
        assert_eq!(bridge.declarations().len(), 1);
    }
}
