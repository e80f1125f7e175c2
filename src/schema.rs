//! Schema types for describing provider, resource and data source structure.
//!
//! Schemas describe the shape of the provider block, each Nomad resource and
//! each data source. They drive structural validation ([`crate::validation`]),
//! planning ([`crate::plan`]) and are sent to the host on `GetSchema`.
//!
//! State values follow the schema shape directly: a `Single` nested block is
//! a JSON object (or `null`), `List`/`Set` blocks are arrays and `Map` blocks
//! are objects keyed by name.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Value types, matching what Nomad objects carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// String.
    String,
    /// Integer.
    Int64,
    /// Floating point.
    Float64,
    /// Bool.
    Bool,
    /// Ordered, homogeneous.
    List(Box<AttributeType>),
    /// Unordered, no duplicates.
    Set(Box<AttributeType>),
    /// String keys, homogeneous values.
    Map(Box<AttributeType>),
    /// Fixed field names, as in a flattened Nomad struct.
    Object(HashMap<String, AttributeType>),
    /// Raw JSON, passed through as Nomad returns it.
    Dynamic,
}

impl AttributeType {
    /// Create a list type.
    pub fn list(element_type: AttributeType) -> Self {
        Self::List(Box::new(element_type))
    }

    /// Create a set type.
    pub fn set(element_type: AttributeType) -> Self {
        Self::Set(Box::new(element_type))
    }

    /// Create a map type.
    pub fn map(element_type: AttributeType) -> Self {
        Self::Map(Box::new(element_type))
    }

    /// Create an object type from `(name, type)` pairs.
    pub fn object<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (S, AttributeType)>,
        S: Into<String>,
    {
        Self::Object(
            attributes
                .into_iter()
                .map(|(name, ty)| (name.into(), ty))
                .collect(),
        )
    }

    /// The value an unset attribute of this type is equivalent to.
    pub fn zero_value(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::String => Value::String(String::new()),
            Self::Int64 | Self::Float64 => Value::from(0),
            Self::Bool => Value::Bool(false),
            Self::List(_) | Self::Set(_) => Value::Array(Vec::new()),
            Self::Map(_) | Self::Object(_) => Value::Object(Default::default()),
            Self::Dynamic => Value::Null,
        }
    }
}

/// Where an attribute's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// Must be set in configuration.
    pub required: bool,
    /// May be set in configuration.
    pub optional: bool,
    /// Filled in from Nomad.
    pub computed: bool,
    /// Redacted in host output (tokens, secrets, keys).
    pub sensitive: bool,
}

impl AttributeFlags {
    /// Flags for a required attribute.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// Flags for an optional attribute.
    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }

    /// Flags for a computed attribute.
    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Default::default()
        }
    }

    /// Flags for an attribute that may be set but otherwise comes from Nomad.
    pub fn optional_computed() -> Self {
        Self {
            optional: true,
            computed: true,
            ..Default::default()
        }
    }

    /// Mark the attribute as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// A constraint on an attribute's value, checked during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueValidator {
    /// The string must be one of the listed values.
    OneOf(Vec<String>),
    /// The string must be a Go duration (`"10m"`, `"1h30m"`).
    Duration,
    /// The string must be a human-readable byte size (`"10GiB"`).
    ByteSize,
    /// The string must not be empty.
    NonEmpty,
    /// The integer must be at least this value.
    AtLeast(i64),
}

/// One attribute of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// The type of the attribute.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// See [`AttributeFlags`].
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Shown in generated docs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// A change recreates the Nomad object.
    #[serde(default)]
    pub force_new: bool,
    /// Default value for the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Value constraints. Not part of the wire schema.
    #[serde(skip)]
    pub validators: Vec<ValueValidator>,
}

impl Attribute {
    /// An attribute with no description, default or validators.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            default: None,
            validators: Vec::new(),
        }
    }

    /// A required string attribute.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::required())
    }

    /// An optional string attribute.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional())
    }

    /// A computed string attribute.
    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::computed())
    }

    /// An optional string attribute Nomad fills in when unset.
    pub fn optional_computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional_computed())
    }

    /// A required int64 attribute.
    pub fn required_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::required())
    }

    /// An optional int64 attribute.
    pub fn optional_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::optional())
    }

    /// A computed int64 attribute.
    pub fn computed_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::computed())
    }

    /// An optional int64 attribute Nomad fills in when unset.
    pub fn optional_computed_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::optional_computed())
    }

    /// A required bool attribute.
    pub fn required_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::required())
    }

    /// An optional bool attribute.
    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional())
    }

    /// A computed bool attribute.
    pub fn computed_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::computed())
    }

    /// An optional bool attribute Nomad fills in when unset.
    pub fn optional_computed_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional_computed())
    }

    /// A list of strings with the given flags.
    pub fn string_list(flags: AttributeFlags) -> Self {
        Self::new(AttributeType::list(AttributeType::String), flags)
    }

    /// A set of strings with the given flags.
    pub fn string_set(flags: AttributeFlags) -> Self {
        Self::new(AttributeType::set(AttributeType::String), flags)
    }

    /// A map of strings with the given flags.
    pub fn string_map(flags: AttributeFlags) -> Self {
        Self::new(AttributeType::map(AttributeType::String), flags)
    }

    /// A computed attribute holding arbitrary JSON.
    pub fn computed_dynamic() -> Self {
        Self::new(AttributeType::Dynamic, AttributeFlags::computed())
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// See [`Attribute::force_new`].
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Used by the planner when the configuration leaves the value null.
    pub fn with_default(mut self, default: impl Into<serde_json::Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Redact the value in host output.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }

    /// Add a value constraint.
    pub fn with_validator(mut self, validator: ValueValidator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Restrict a string attribute to a fixed set of values.
    pub fn one_of<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_validator(ValueValidator::OneOf(
            values.into_iter().map(Into::into).collect(),
        ))
    }
}

/// How many instances of a nested block may appear, and how they are keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    /// Zero or one; state holds an object or null.
    #[default]
    Single,
    /// State holds an array, order kept.
    List,
    /// State holds an array, order ignored.
    Set,
    /// State holds an object keyed by label.
    Map,
}

/// A block of attributes and nested blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Attributes by name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, Attribute>,
    /// Nested blocks by name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub blocks: HashMap<String, NestedBlock>,
    /// Shown in generated docs.
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

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether any attribute at any depth forces replacement.
    pub fn has_force_new(&self) -> bool {
        self.attributes.values().any(|a| a.force_new)
            || self.blocks.values().any(|b| b.block.has_force_new())
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}

/// A block nested inside another block, e.g. a job's `group`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    /// The block definition.
    #[serde(flatten)]
    pub block: Block,
    /// How the block is nested.
    #[serde(default)]
    pub nesting_mode: BlockNestingMode,
    /// Lower bound on instances.
    #[serde(default)]
    pub min_items: u32,
    /// Upper bound on instances; 0 means no limit.
    #[serde(default)]
    pub max_items: u32,
}

impl NestedBlock {
    /// A single nested block (0 or 1 allowed).
    pub fn single(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::Single,
            min_items: 0,
            max_items: 1,
        }
    }

    /// A list of nested blocks.
    pub fn list(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::List,
            min_items: 0,
            max_items: 0,
        }
    }

    /// A set of nested blocks.
    pub fn set(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::Set,
            min_items: 0,
            max_items: 0,
        }
    }

    /// A map of nested blocks.
    pub fn map(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::Map,
            min_items: 0,
            max_items: 0,
        }
    }

    /// Require at least `min` instances.
    pub fn with_min_items(mut self, min: u32) -> Self {
        self.min_items = min;
        self
    }

    /// Allow at most `max` instances.
    pub fn with_max_items(mut self, max: u32) -> Self {
        self.max_items = max;
        self
    }

    /// Make a single block mandatory.
    pub fn required(self) -> Self {
        self.with_min_items(1)
    }
}

/// A versioned block describing one resource or data source type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Bumped when the state layout changes.
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

    /// Set the schema description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.block.description = Some(description.into());
        self
    }

    /// Add the computed `id` attribute every resource carries.
    pub fn with_id(self) -> Self {
        self.with_attribute("id", Attribute::computed_string())
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::v0()
    }
}

/// Schema for the provider configuration and everything it serves.
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
    /// A warning that doesn't prevent the operation.
    Warning,
}

/// A diagnostic message from the provider.
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

    /// Whether this is an error.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// Whether any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_type_constructors() {
        let list = AttributeType::list(AttributeType::String);
        assert!(matches!(list, AttributeType::List(_)));

        let object = AttributeType::object([("key", AttributeType::String)]);
        match object {
            AttributeType::Object(attrs) => assert_eq!(attrs["key"], AttributeType::String),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(AttributeType::String.zero_value(), serde_json::json!(""));
        assert_eq!(AttributeType::Int64.zero_value(), serde_json::json!(0));
        assert_eq!(AttributeType::Bool.zero_value(), serde_json::json!(false));
        assert_eq!(
            AttributeType::set(AttributeType::String).zero_value(),
            serde_json::json!([])
        );
        assert_eq!(
            AttributeType::map(AttributeType::String).zero_value(),
            serde_json::json!({})
        );
    }

    #[test]
    fn test_attribute_flags() {
        let optional_computed = AttributeFlags::optional_computed();
        assert!(!optional_computed.required);
        assert!(optional_computed.optional);
        assert!(optional_computed.computed);

        let sensitive = AttributeFlags::required().sensitive();
        assert!(sensitive.sensitive);
    }

    #[test]
    fn test_attribute_builders() {
        let attr = Attribute::required_string()
            .with_description("Job ID")
            .with_force_new()
            .one_of(["service", "batch"]);

        assert_eq!(attr.attr_type, AttributeType::String);
        assert!(attr.flags.required);
        assert!(attr.force_new);
        assert_eq!(
            attr.validators,
            vec![ValueValidator::OneOf(vec!["service".into(), "batch".into()])]
        );

        let attr = Attribute::optional_bool().with_default(true);
        assert_eq!(attr.default, Some(serde_json::json!(true)));
    }

    #[test]
    fn test_validators_not_serialized() {
        let attr = Attribute::optional_string().with_validator(ValueValidator::Duration);
        let encoded = serde_json::to_value(&attr).unwrap();
        assert!(encoded.get("validators").is_none());
    }

    #[test]
    fn test_schema_builder() {
        let schema = Schema::v0()
            .with_id()
            .with_attribute("name", Attribute::required_string())
            .with_block(
                "job_acl",
                NestedBlock::single(
                    Block::new().with_attribute("job_id", Attribute::optional_string()),
                ),
            );

        assert!(schema.block.attributes.contains_key("id"));
        assert!(schema.block.attributes.contains_key("name"));
        assert!(schema.block.blocks.contains_key("job_acl"));
    }

    #[test]
    fn test_has_force_new_is_deep() {
        let block = Block::new().with_block(
            "capability",
            NestedBlock::set(
                Block::new().with_attribute("access_mode", Attribute::required_string().with_force_new()),
            ),
        );
        assert!(block.has_force_new());
        assert!(!Block::new()
            .with_attribute("name", Attribute::optional_string())
            .has_force_new());
    }

    #[test]
    fn test_diagnostic() {
        let err = Diagnostic::error("Invalid bind_name")
            .with_detail("bind_name must not be set for management rules")
            .with_attribute("bind_name");

        assert!(err.is_error());
        assert_eq!(err.attribute, Some("bind_name".to_string()));
        assert!(has_errors(&[Diagnostic::warning("w"), err]));
        assert!(!has_errors(&[Diagnostic::warning("w")]));
    }

    #[test]
    fn test_nested_block_modes() {
        let single = NestedBlock::single(Block::new()).required();
        assert_eq!(single.nesting_mode, BlockNestingMode::Single);
        assert_eq!(single.min_items, 1);
        assert_eq!(single.max_items, 1);

        let list = NestedBlock::list(Block::new()).with_max_items(5);
        assert_eq!(list.nesting_mode, BlockNestingMode::List);
        assert_eq!(list.max_items, 5);
    }
}
