//! Schema types for describing provider, resource and data source structure.
//!
//! The host reads these through `GetSchema` to build its configuration
//! language. The provider itself uses them for validation, plan defaults and
//! force-new detection.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The type of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// A string value.
    String,
    /// A 64-bit integer.
    Int64,
    /// A boolean value.
    Bool,
}

/// Describes how an attribute can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// The attribute is required in configuration.
    pub required: bool,
    /// The attribute is optional in configuration.
    pub optional: bool,
    /// The attribute is computed by the provider (read-only).
    pub computed: bool,
    /// The attribute is sensitive and should be hidden in logs/UI.
    pub sensitive: bool,
}

impl AttributeFlags {
    /// Create flags for a required attribute.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// Create flags for an optional attribute.
    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }

    /// Create flags for a computed attribute (read-only, set by provider).
    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Default::default()
        }
    }

    /// Create flags for an optional+computed attribute (falls back to the server value).
    pub fn optional_computed() -> Self {
        Self {
            optional: true,
            computed: true,
            ..Default::default()
        }
    }
}

/// A value constraint checked before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "values")]
pub enum AttributeValidator {
    /// The string value must be one of the listed choices.
    OneOfStrings(Vec<String>),
    /// The integer value must be one of the listed choices.
    OneOfInts(Vec<i64>),
}

impl AttributeValidator {
    /// Human-readable list of accepted values, e.g. `send, receive or storage_api`.
    pub fn describe_choices(&self) -> String {
        let choices: Vec<String> = match self {
            Self::OneOfStrings(values) => values.clone(),
            Self::OneOfInts(values) => values.iter().map(|v| v.to_string()).collect(),
        };
        match choices.split_last() {
            None => String::new(),
            Some((last, [])) => last.clone(),
            Some((last, rest)) => format!("{} or {}", rest.join(", "), last),
        }
    }
}

/// Describes a single attribute in a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// The type of the attribute.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Flags describing how the attribute can be used.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Human-readable description of the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// If set, changing this attribute forces resource replacement.
    #[serde(default)]
    pub force_new: bool,
    /// Default value for the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Accepted values, if restricted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validator: Option<AttributeValidator>,
}

impl Attribute {
    /// Create a new attribute with the given type and flags.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            default: None,
            validator: None,
        }
    }

    /// Create a required string attribute.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::required())
    }

    /// Create an optional string attribute.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional())
    }

    /// Create an optional string attribute that falls back to the server value.
    pub fn optional_computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional_computed())
    }

    /// Create a computed string attribute.
    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::computed())
    }

    /// Create a required int64 attribute.
    pub fn required_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::required())
    }

    /// Create an optional int64 attribute.
    pub fn optional_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::optional())
    }

    /// Create an optional int64 attribute that falls back to the server value.
    pub fn optional_computed_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::optional_computed())
    }

    /// Create a computed int64 attribute.
    pub fn computed_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::computed())
    }

    /// Create an optional bool attribute.
    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional())
    }

    /// Create an optional bool attribute that falls back to the server value.
    pub fn optional_computed_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional_computed())
    }

    /// Set the description for this attribute.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark this attribute as forcing resource replacement when changed.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Set a default value for this attribute.
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Restrict a string attribute to the given choices.
    pub fn one_of(mut self, choices: &[&str]) -> Self {
        self.validator = Some(AttributeValidator::OneOfStrings(
            choices.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    /// Restrict an integer attribute to the given choices.
    pub fn one_of_ints(mut self, choices: &[i64]) -> Self {
        self.validator = Some(AttributeValidator::OneOfInts(choices.to_vec()));
        self
    }

    /// Mark this attribute as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }
}

/// The nesting mode for a block.
///
/// Both modes are JSON arrays of objects; sets are unordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    /// A list of nested blocks (zero or more, ordered).
    List,
    /// A set of nested blocks (zero or more, unordered, unique).
    #[default]
    Set,
}

/// A nested block within a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// The attributes within this block.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, Attribute>,
    /// Nested blocks within this block.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub blocks: HashMap<String, NestedBlock>,
    /// Human-readable description of the block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    /// Create a new empty block.
    pub fn new() -> Self {
        Self {
            attributes: HashMap::new(),
            blocks: HashMap::new(),
            description: None,
        }
    }

    /// Add an attribute to this block.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block to this block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    /// Set the description for this block.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}

/// A nested block with its nesting mode and constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    /// The block definition.
    #[serde(flatten)]
    pub block: Block,
    /// How the block is nested.
    #[serde(default)]
    pub nesting_mode: BlockNestingMode,
    /// Minimum number of blocks required.
    #[serde(default)]
    pub min_items: u32,
    /// Maximum number of blocks allowed (0 = unlimited).
    #[serde(default)]
    pub max_items: u32,
    /// If set, changing this block forces resource replacement.
    #[serde(default)]
    pub force_new: bool,
    /// If set, the provider fills the block when configuration leaves it out.
    #[serde(default)]
    pub computed: bool,
}

impl NestedBlock {
    /// Create a list of nested blocks.
    pub fn list(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::List,
            min_items: 0,
            max_items: 0,
            force_new: false,
            computed: false,
        }
    }

    /// Create a set of nested blocks.
    pub fn set(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::Set,
            min_items: 0,
            max_items: 0,
            force_new: false,
            computed: false,
        }
    }

    /// Create an optional single-value block: a set holding at most one item.
    pub fn optional_single(block: Block) -> Self {
        Self::set(block).with_max_items(1)
    }

    /// Create a required single-value block: a set holding exactly one item.
    pub fn required_single(block: Block) -> Self {
        Self::set(block).with_min_items(1).with_max_items(1)
    }

    /// Set the minimum number of blocks required.
    pub fn with_min_items(mut self, min: u32) -> Self {
        self.min_items = min;
        self
    }

    /// Set the maximum number of blocks allowed.
    pub fn with_max_items(mut self, max: u32) -> Self {
        self.max_items = max;
        self
    }

    /// Mark this block as forcing resource replacement when changed.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Mark this block as filled from the server when not configured.
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }
}

/// Schema for a resource or data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// The version of this schema.
    #[serde(default)]
    pub version: u64,
    /// The root block containing all attributes and nested blocks.
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    /// Create a new schema with the given version.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            block: Block::new(),
        }
    }

    /// Create a schema at version 0.
    pub fn v0() -> Self {
        Self::new(0)
    }

    /// Add an attribute to the schema.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block to the schema.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block.blocks.insert(name.into(), block);
        self
    }

    /// Whether a top-level attribute or block forces replacement when changed.
    pub fn forces_new(&self, name: &str) -> bool {
        self.block
            .attributes
            .get(name)
            .map(|a| a.force_new)
            .or_else(|| self.block.blocks.get(name).map(|b| b.force_new))
            .unwrap_or(false)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::v0()
    }
}

/// Schema for the provider configuration, resources and data sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// Schema for provider configuration.
    #[serde(default)]
    pub provider: Schema,
    /// Schemas for each resource type.
    #[serde(default)]
    pub resources: HashMap<String, Schema>,
    /// Schemas for each data source type.
    #[serde(default)]
    pub data_sources: HashMap<String, Schema>,
}

impl ProviderSchema {
    /// Create a new empty provider schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider configuration schema.
    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    /// Add a resource schema.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    /// Add a data source schema.
    pub fn with_data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// An error that prevents the operation from completing.
    Error,
    /// A warning that doesn't prevent the operation but should be addressed.
    Warning,
}

/// A diagnostic message reported back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity of the diagnostic.
    pub severity: DiagnosticSeverity,
    /// A short summary of the issue.
    pub summary: String,
    /// A detailed description of the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// The attribute path where the issue occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Add detail to this diagnostic.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set the attribute path for this diagnostic.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_flags() {
        let required = AttributeFlags::required();
        assert!(required.required);
        assert!(!required.optional);
        assert!(!required.computed);

        let optional_computed = AttributeFlags::optional_computed();
        assert!(!optional_computed.required);
        assert!(optional_computed.optional);
        assert!(optional_computed.computed);
    }

    #[test]
    fn test_attribute_builders() {
        let attr = Attribute::required_string()
            .with_description("Name to give the partner")
            .with_force_new();

        assert_eq!(attr.attr_type, AttributeType::String);
        assert!(attr.flags.required);
        assert_eq!(attr.description.as_deref(), Some("Name to give the partner"));
        assert!(attr.force_new);

        let password = Attribute::optional_string().sensitive();
        assert!(password.flags.sensitive);

        let flag = Attribute::optional_computed_bool();
        assert_eq!(flag.attr_type, AttributeType::Bool);
        assert!(flag.flags.optional && flag.flags.computed);
        assert!(Attribute::optional_computed_int64().flags.computed);
    }

    #[test]
    fn test_one_of_validators() {
        let role = Attribute::required_string().one_of(&["send", "receive", "storage_api"]);
        let validator = role.validator.unwrap();
        assert_eq!(validator.describe_choices(), "send, receive or storage_api");

        let ack = Attribute::optional_int64().one_of_ints(&[0, 997, 999]);
        assert_eq!(
            ack.validator.unwrap(),
            AttributeValidator::OneOfInts(vec![0, 997, 999])
        );

        let single = AttributeValidator::OneOfStrings(vec!["inbound".into()]);
        assert_eq!(single.describe_choices(), "inbound");
    }

    #[test]
    fn test_schema_builder_and_force_new() {
        let schema = Schema::v0()
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute("id", Attribute::computed_string())
            .with_block(
                "address",
                NestedBlock::optional_single(
                    Block::new().with_attribute("city", Attribute::required_string()),
                ),
            );

        assert!(schema.forces_new("name"));
        assert!(!schema.forces_new("id"));
        assert!(!schema.forces_new("address"));
        assert!(!schema.forces_new("missing"));
        assert_eq!(schema.block.blocks["address"].max_items, 1);
        assert_eq!(schema.block.blocks["address"].min_items, 0);
    }

    #[test]
    fn test_nested_block_modes() {
        let required = NestedBlock::required_single(Block::new());
        assert_eq!(required.nesting_mode, BlockNestingMode::Set);
        assert_eq!((required.min_items, required.max_items), (1, 1));

        let list = NestedBlock::list(Block::new()).with_min_items(1);
        assert_eq!(list.nesting_mode, BlockNestingMode::List);
        assert_eq!(list.max_items, 0);

        let x12 = NestedBlock::optional_single(Block::new()).computed();
        assert!(x12.computed);
        assert!(!x12.force_new);
    }

    #[test]
    fn test_diagnostic() {
        let err = Diagnostic::error("Invalid configuration")
            .with_detail("value must be http or https")
            .with_attribute("http_config.0.protocol");

        assert!(err.is_error());
        assert_eq!(err.detail.as_deref(), Some("value must be http or https"));
        assert!(!Diagnostic::warning("heads up").is_error());
    }
}
