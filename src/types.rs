//! Plain Rust types exchanged between the plugin server and the provider.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The protocol version announced in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// The handshake prefix printed to stdout on startup.
pub const HANDSHAKE_PREFIX: &str = "NOMAD_PROVIDER";

/// Encode a value as a JSON payload; `None` is the empty payload.
pub(crate) fn to_payload(value: Option<&Value>) -> Vec<u8> {
    value
        .and_then(|v| serde_json::to_vec(v).ok())
        .unwrap_or_default()
}

/// Decode a JSON payload; the empty payload and invalid JSON are `None`.
pub(crate) fn from_payload(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(bytes).ok()
    }
}

/// A change to a single top-level attribute or block during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Attribute or block name.
    pub path: String,
    /// The value before the change (`None` when creating).
    pub before: Option<Value>,
    /// The value after the change (`None` when destroying).
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// A value that did not exist before.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// A value that goes away.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// A value that changes.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

impl From<crate::generated::AttributeChange> for AttributeChange {
    fn from(proto: crate::generated::AttributeChange) -> Self {
        Self {
            path: proto.path,
            before: from_payload(&proto.before),
            after: from_payload(&proto.after),
        }
    }
}

impl From<AttributeChange> for crate::generated::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        Self {
            path: change.path,
            before: to_payload(change.before.as_ref()),
            after: to_payload(change.after.as_ref()),
        }
    }
}

/// The result of planning a resource change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The state the resource will have after apply; `null` for destroy.
    pub planned_state: Value,
    /// Changed top-level attributes and blocks.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource must be destroyed and recreated.
    pub requires_replace: bool,
}

impl PlanResult {
    /// A plan with no changes.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// A plan with changes.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether applying this plan destroys the resource.
    pub fn is_destroy(&self) -> bool {
        self.planned_state.is_null()
    }
}

/// A resource produced by import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Provider metadata returned by `GetMetadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names.
    pub resources: Vec<String>,
    /// Data source type names.
    pub data_sources: Vec<String>,
    /// Server capabilities.
    pub capabilities: ServerCapabilities,
}

/// Server capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Whether the provider plans destroy operations.
    pub plan_destroy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_change_conversion() {
        let change = AttributeChange::modified("rules_hcl", json!("old"), json!("new"));
        let proto: crate::generated::AttributeChange = change.clone().into();
        assert_eq!(proto.path, "rules_hcl");

        let back: AttributeChange = proto.into();
        assert_eq!(back, change);
    }

    #[test]
    fn test_added_change_has_empty_before_payload() {
        let proto: crate::generated::AttributeChange =
            AttributeChange::added("name", json!("ops")).into();
        assert!(proto.before.is_empty());
        assert_eq!(from_payload(&proto.after), Some(json!("ops")));
    }

    #[test]
    fn test_payload_helpers() {
        assert!(to_payload(None).is_empty());
        assert_eq!(to_payload(Some(&Value::Null)), b"null".to_vec());
        assert_eq!(from_payload(b""), None);
        assert_eq!(from_payload(b"null"), Some(Value::Null));
        assert_eq!(from_payload(b"{not json"), None);
    }

    #[test]
    fn test_plan_result() {
        assert!(PlanResult::no_change(json!({"id": "ops"})).changes.is_empty());
        assert!(PlanResult::no_change(Value::Null).is_destroy());
    }

    #[test]
    fn test_protocol_constants() {
        assert_eq!(PROTOCOL_VERSION, 1);
        assert_eq!(HANDSHAKE_PREFIX, "NOMAD_PROVIDER");
    }
}
