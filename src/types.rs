//! Plan types shared between the provider and the gRPC layer.

use serde::{Deserialize, Serialize};

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The path to the attribute that changed.
    pub path: String,
    /// The value before the change (None if creating).
    pub before: Option<serde_json::Value>,
    /// The value after the change (None if deleting).
    pub after: Option<serde_json::Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(
        path: impl Into<String>,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Create a change for a new attribute.
    pub fn added(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// Create a change for a removed attribute.
    pub fn removed(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// Create a change for a modified attribute.
    pub fn modified(
        path: impl Into<String>,
        before: serde_json::Value,
        after: serde_json::Value,
    ) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

impl From<crate::generated::AttributeChange> for AttributeChange {
    fn from(proto: crate::generated::AttributeChange) -> Self {
        Self {
            path: proto.path,
            before: if proto.before.is_empty() {
                None
            } else {
                serde_json::from_slice(&proto.before).ok()
            },
            after: if proto.after.is_empty() {
                None
            } else {
                serde_json::from_slice(&proto.after).ok()
            },
        }
    }
}

impl From<AttributeChange> for crate::generated::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        Self {
            path: change.path,
            before: change
                .before
                .map(|v| serde_json::to_vec(&v).unwrap_or_default())
                .unwrap_or_default(),
            after: change
                .after
                .map(|v| serde_json::to_vec(&v).unwrap_or_default())
                .unwrap_or_default(),
        }
    }
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation.
    pub planned_state: serde_json::Value,
    /// The list of attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource requires replacement.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Create a plan result with no changes.
    pub fn no_change(state: serde_json::Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// Create a plan result with changes.
    pub fn with_changes(
        planned_state: serde_json::Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether the plan changes anything.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// The protocol version for the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// The handshake prefix written to stdout once the server is listening.
pub const HANDSHAKE_PREFIX: &str = "PROVIDER_PLUGIN";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_change_constructors() {
        let added = AttributeChange::added("name", json!("Acme"));
        assert!(added.before.is_none());
        assert_eq!(added.after, Some(json!("Acme")));

        let removed = AttributeChange::removed("description", json!("old"));
        assert_eq!(removed.before, Some(json!("old")));
        assert!(removed.after.is_none());
    }

    #[test]
    fn test_attribute_change_conversion() {
        let change = AttributeChange::modified("website_url", json!("a"), json!("b"));

        let proto: crate::generated::AttributeChange = change.clone().into();
        assert_eq!(proto.path, "website_url");
        assert_eq!(proto.before, b"\"a\"".to_vec());

        let back: AttributeChange = proto.into();
        assert_eq!(back, change);

        let create: crate::generated::AttributeChange =
            AttributeChange::added("name", json!("x")).into();
        assert!(create.before.is_empty());
        assert!(AttributeChange::from(create).before.is_none());
    }

    #[test]
    fn test_plan_result() {
        let no_change = PlanResult::no_change(json!({"id": "p-1"}));
        assert!(!no_change.has_changes());
        assert!(!no_change.requires_replace);

        let replace = PlanResult::with_changes(
            json!({"name": "new"}),
            vec![AttributeChange::modified("name", json!("old"), json!("new"))],
            true,
        );
        assert!(replace.has_changes());
        assert!(replace.requires_replace);
    }

    #[test]
    fn test_handshake_constants() {
        assert_eq!(PROTOCOL_VERSION, 1);
        assert_eq!(HANDSHAKE_PREFIX, "PROVIDER_PLUGIN");
    }
}
