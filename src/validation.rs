//! Schema validation helpers.
//!
//! Configuration arrives from the host as a `serde_json::Value`. Before any
//! remote call is made it is checked against the declared [`Schema`]: presence,
//! value types, block cardinality and the accepted-value lists attached to
//! enum-like attributes.
//!
//! # Example
//!
//! ```
//! use muleb2b_provider::schema::{Attribute, Schema};
//! use muleb2b_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("direction", Attribute::required_string().one_of(&["inbound"]));
//!
//! assert!(validate(&schema, &json!({"name": "flow", "direction": "inbound"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "flow", "direction": "outbound"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("direction".to_string()));
//! ```

use crate::schema::{
    Attribute, AttributeType, AttributeValidator, Block, Diagnostic, DiagnosticSeverity,
    NestedBlock, Schema,
};
use serde_json::Value;

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics for any validation errors found.
/// An empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Optional attributes may be absent or null
/// - Computed-only attributes are skipped (provider sets these)
/// - Attribute types must match the schema
/// - Attributes with an accepted-value list must hold one of those values
/// - Nested blocks are validated recursively with min/max item constraints
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Validate a JSON value against a schema, returning Ok if valid or Err with diagnostics.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            let mut diag = Diagnostic::error("Expected object")
                .with_detail(format!("Got {}", value_type_name(value)));
            if !path.is_empty() {
                diag = diag.with_attribute(path);
            }
            diagnostics.push(diag);
            return;
        },
    };

    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        validate_attribute(attr, obj.get(name), &attr_path, diagnostics);
    }

    for (name, nested_block) in &block.blocks {
        let block_path = join_path(path, name);
        validate_nested_block(nested_block, obj.get(name), &block_path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            if let Some(diag) = check_type(&attr.attr_type, v, path) {
                diagnostics.push(diag);
            } else if let Some(validator) = &attr.validator {
                if let Some(diag) = check_choice(validator, v, path) {
                    diagnostics.push(diag);
                }
            }
        },
    }
}

fn check_type(attr_type: &AttributeType, value: &Value, path: &str) -> Option<Diagnostic> {
    let ok = match attr_type {
        AttributeType::String => value.is_string(),
        AttributeType::Int64 => is_int64(value),
        AttributeType::Bool => value.is_boolean(),
    };
    if ok {
        None
    } else {
        let expected = match attr_type {
            AttributeType::String => "string",
            AttributeType::Int64 => "int64",
            AttributeType::Bool => "bool",
        };
        Some(type_error(path, expected, value))
    }
}

fn check_choice(validator: &AttributeValidator, value: &Value, path: &str) -> Option<Diagnostic> {
    let accepted = match validator {
        AttributeValidator::OneOfStrings(choices) => value
            .as_str()
            .map(|s| choices.iter().any(|c| c == s))
            .unwrap_or(false),
        AttributeValidator::OneOfInts(choices) => as_int64(value)
            .map(|i| choices.contains(&i))
            .unwrap_or(false),
    };
    if accepted {
        return None;
    }
    Some(
        Diagnostic::error(format!("Invalid value for attribute '{}'", path))
            .with_detail(format!(
                "Expected one of {}, got {}",
                validator.describe_choices(),
                value
            ))
            .with_attribute(path),
    )
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    // Lists and sets share the same JSON shape: an array of objects.
    match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
        },
        Some(Value::Array(arr)) => {
            let len = arr.len() as u32;

            if len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s), got {}",
                        path, nested.min_items, len
                    ))
                    .with_attribute(path),
                );
            }

            // 0 means unlimited
            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }

            for (i, item) in arr.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        },
        Some(v) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn as_int64(value: &Value) -> Option<i64> {
    let n = value.as_number()?;
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn is_int64(value: &Value) -> bool {
    as_int64(value).is_some()
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic {
        severity: DiagnosticSeverity::Error,
        summary: format!("Invalid type for attribute '{}'", path),
        detail: Some(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(got)
        )),
        attribute: Some(path.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Block, NestedBlock, Schema};
    use serde_json::json;

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(validate(&schema, &json!({"name": "Acme"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("name".to_string()));

        let diagnostics = validate(&schema, &json!({"name": null}));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(&schema, &json!({"name": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_optional_and_computed() {
        let schema = Schema::v0()
            .with_attribute("server_port", Attribute::optional_int64())
            .with_attribute("id", Attribute::computed_string());

        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"server_port": null})).is_empty());
        // computed-only attributes are never checked
        assert!(validate(&schema, &json!({"id": 123})).is_empty());

        let diagnostics = validate(&schema, &json!({"server_port": "443"}));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_validate_int64() {
        let schema = Schema::v0().with_attribute("timeout", Attribute::required_int64());

        assert!(validate(&schema, &json!({"timeout": 15000})).is_empty());
        assert!(validate(&schema, &json!({"timeout": 15000.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"timeout": 1.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"timeout": "15000"})).len(), 1);
    }

    #[test]
    fn test_validate_string_choices() {
        let schema = Schema::v0().with_attribute(
            "role",
            Attribute::required_string().one_of(&["send", "receive", "receive_ack", "storage_api"]),
        );

        assert!(validate(&schema, &json!({"role": "receive_ack"})).is_empty());

        let diagnostics = validate(&schema, &json!({"role": "SEND"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("role".to_string()));
        assert!(diagnostics[0]
            .detail
            .as_deref()
            .unwrap()
            .contains("send, receive, receive_ack or storage_api"));
    }

    #[test]
    fn test_validate_int_choices() {
        let schema = Schema::v0().with_attribute(
            "failure_acknowledgement_type",
            Attribute::optional_int64().one_of_ints(&[0, 997, 999]),
        );

        assert!(validate(&schema, &json!({"failure_acknowledgement_type": 999})).is_empty());
        assert!(validate(&schema, &json!({})).is_empty());
        assert_eq!(
            validate(&schema, &json!({"failure_acknowledgement_type": 998})).len(),
            1
        );
    }

    #[test]
    fn test_type_error_suppresses_choice_error() {
        let schema =
            Schema::v0().with_attribute("type", Attribute::required_string().one_of(&["http"]));

        let diagnostics = validate(&schema, &json!({"type": 1}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_single_value_block() {
        let schema = Schema::v0().with_block(
            "address",
            NestedBlock::optional_single(
                Block::new().with_attribute("city", Attribute::optional_string()),
            ),
        );

        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"address": [{"city": "Austin"}]})).is_empty());

        let diagnostics = validate(
            &schema,
            &json!({"address": [{"city": "Austin"}, {"city": "Dallas"}]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at most 1"));

        let diagnostics = validate(&schema, &json!({"address": {"city": "Austin"}}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected list"));
    }

    #[test]
    fn test_validate_required_set() {
        let schema = Schema::v0().with_block(
            "identifier",
            NestedBlock::set(
                Block::new()
                    .with_attribute("identifier_type_id", Attribute::required_string())
                    .with_attribute("value", Attribute::required_string()),
            )
            .with_min_items(1),
        );

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at least 1"));

        let diagnostics = validate(&schema, &json!({"identifier": []}));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(
            &schema,
            &json!({"identifier": [{"identifier_type_id": "q-1", "value": 7}]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("identifier.0.value".to_string())
        );
    }

    #[test]
    fn test_validate_deeply_nested() {
        let schema = Schema::v0().with_block(
            "http_config",
            NestedBlock::optional_single(Block::new().with_block(
                "auth_mode",
                NestedBlock::required_single(Block::new().with_attribute(
                    "auth_type",
                    Attribute::required_string().one_of(&["none", "basic"]),
                )),
            )),
        );

        assert!(validate(
            &schema,
            &json!({"http_config": [{"auth_mode": [{"auth_type": "basic"}]}]})
        )
        .is_empty());

        let diagnostics = validate(
            &schema,
            &json!({"http_config": [{"auth_mode": [{"auth_type": "digest"}]}]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("http_config.0.auth_mode.0.auth_type".to_string())
        );
    }

    #[test]
    fn test_helpers_and_root_shape() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(is_valid(&schema, &json!({"name": "Acme"})));
        assert!(!is_valid(&schema, &json!({})));
        assert!(validate_result(&schema, &json!({"name": "Acme"})).is_ok());
        assert_eq!(validate_result(&schema, &json!({})).unwrap_err().len(), 1);

        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
        assert_eq!(diagnostics[0].attribute, None);
    }
}
