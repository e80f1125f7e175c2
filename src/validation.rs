//! Structural validation of configuration values against a [`Schema`].
//!
//! Checks presence of required attributes, value types, nested block
//! cardinality and the per-attribute [`ValueValidator`]s (enums, Go
//! durations, byte sizes). Resource-specific rules that span several
//! attributes live in each adapter's `validate`.
//!
//! # Example
//!
//! ```
//! use nomad_provider::schema::{Attribute, Schema, ValueValidator};
//! use nomad_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("ttl", Attribute::optional_string().with_validator(ValueValidator::Duration));
//!
//! assert!(validate(&schema, &json!({"name": "ops", "ttl": "1h30m"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "ops", "ttl": "soon"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("ttl".to_string()));
//! ```

use crate::helper::{parse_bytes, parse_duration};
use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema,
    ValueValidator,
};
use serde_json::Value;
use std::collections::HashMap;

/// Validate a JSON value against a schema.
///
/// Returns one diagnostic per problem; an empty list means the value is valid.
/// Computed-only attributes are skipped since the provider sets them.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Like [`validate`], as a `Result`.
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
            let mut diag =
                Diagnostic::error("Expected object").with_detail(format!("Got {}", value_type_name(value)));
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

    for (name, nested) in &block.blocks {
        let block_path = join_path(path, name);
        validate_nested_block(nested, obj.get(name), &block_path, diagnostics);
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
            let before = diagnostics.len();
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
            if diagnostics.len() == before {
                for validator in &attr.validators {
                    check_validator(validator, v, path, diagnostics);
                }
            }
        },
    }
}

fn check_validator(
    validator: &ValueValidator,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match (validator, value) {
        (ValueValidator::OneOf(allowed), Value::String(s)) => {
            if !allowed.iter().any(|a| a == s) {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid value for '{}'", path))
                        .with_detail(format!(
                            "expected {} to be one of [{}], got {}",
                            path,
                            allowed.join(", "),
                            s
                        ))
                        .with_attribute(path),
                );
            }
        },
        (ValueValidator::Duration, Value::String(s)) if !s.is_empty() => {
            if let Err(e) = parse_duration(s) {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid duration for '{}'", path))
                        .with_detail(e.to_string())
                        .with_attribute(path),
                );
            }
        },
        (ValueValidator::ByteSize, Value::String(s)) if !s.is_empty() => {
            if let Err(e) = parse_bytes(s) {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid byte size for '{}'", path))
                        .with_detail(e.to_string())
                        .with_attribute(path),
                );
            }
        },
        (ValueValidator::NonEmpty, Value::String(s)) => {
            if s.is_empty() {
                diagnostics.push(
                    Diagnostic::error(format!("'{}' must not be empty", path)).with_attribute(path),
                );
            }
        },
        (ValueValidator::AtLeast(min), Value::Number(n)) => {
            if n.as_f64().is_some_and(|v| v < *min as f64) {
                diagnostics.push(
                    Diagnostic::error(format!("'{}' must be at least {}", path, min))
                        .with_attribute(path),
                );
            }
        },
        (_, Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                check_validator(validator, item, &format!("{}.{}", path, i), diagnostics);
            }
        },
        _ => {},
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Float64 => {
            if !value.is_number() {
                diagnostics.push(type_error(path, "float64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) | AttributeType::Set(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                let expected = if matches!(attr_type, AttributeType::Set(_)) { "set" } else { "list" };
                diagnostics.push(type_error(path, expected, value));
            }
        },
        AttributeType::Map(value_type) => {
            if let Some(obj) = value.as_object() {
                for (key, val) in obj {
                    let key_path = format!("{}.{}", path, key);
                    validate_attribute_type(value_type, val, &key_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "map", value));
            }
        },
        AttributeType::Object(attrs) => {
            if let Some(obj) = value.as_object() {
                validate_object_type(attrs, obj, path, diagnostics);
            } else {
                diagnostics.push(type_error(path, "object", value));
            }
        },
        AttributeType::Dynamic => {},
    }
}

fn validate_object_type(
    attrs: &HashMap<String, AttributeType>,
    obj: &serde_json::Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (name, attr_type) in attrs {
        if let Some(value) = obj.get(name).filter(|v| !v.is_null()) {
            validate_attribute_type(attr_type, value, &join_path(path, name), diagnostics);
        }
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match (nested.nesting_mode, value) {
        (_, None | Some(Value::Null)) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required block '{}'", path))
                        .with_detail(format!("At least {} block(s) required", nested.min_items))
                        .with_attribute(path),
                );
            }
        },
        (BlockNestingMode::Single, Some(v)) => validate_block(&nested.block, v, path, diagnostics),
        (BlockNestingMode::List | BlockNestingMode::Set, Some(Value::Array(arr))) => {
            check_item_count(nested, arr.len(), path, diagnostics);
            for (i, item) in arr.iter().enumerate() {
                validate_block(&nested.block, item, &format!("{}.{}", path, i), diagnostics);
            }
        },
        (BlockNestingMode::Map, Some(Value::Object(obj))) => {
            check_item_count(nested, obj.len(), path, diagnostics);
            for (key, item) in obj {
                validate_block(&nested.block, item, &format!("{}.{}", path, key), diagnostics);
            }
        },
        (mode, Some(v)) => {
            let expected = if mode == BlockNestingMode::Map { "map" } else { "list" };
            diagnostics.push(
                Diagnostic::error(format!("Expected {} for block '{}'", expected, path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

fn check_item_count(nested: &NestedBlock, len: usize, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let len = len as u32;
    if len < nested.min_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' requires at least {} item(s), got {}",
                path, nested.min_items, len
            ))
            .with_attribute(path),
        );
    }
    if nested.max_items > 0 && len > nested.max_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' allows at most {} item(s), got {}",
                path, nested.max_items, len
            ))
            .with_attribute(path),
        );
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

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.as_i64().is_some()
                || n
                    .as_f64()
                    .is_some_and(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64)
        },
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}
