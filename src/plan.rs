//! Schema-driven planning.
//!
//! [`plan_resource`] turns a prior state and the host's proposed state into
//! a [`PlanResult`]. Unset and zero values are treated alike, so an
//! attribute that Nomad echoes back as `""` or `[]` does not show up as a
//! perpetual diff.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::schema::{Attribute, AttributeType, Block, BlockNestingMode, NestedBlock, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Plan a resource change.
///
/// A `null` proposal plans a destroy. Otherwise defaults are applied, prior
/// values of computed attributes the proposal leaves unset are carried
/// over, and a change is reported for every top-level attribute or block
/// that differs from the prior state. On create every set value is a change.
pub fn plan_resource(schema: &Schema, prior: Option<&Value>, proposed: Value) -> PlanResult {
    let prior = prior.filter(|p| !p.is_null());

    if proposed.is_null() {
        let changes = match prior.and_then(Value::as_object) {
            Some(prior) => prior
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| AttributeChange::removed(k.clone(), v.clone()))
                .collect(),
            None => Vec::new(),
        };
        return PlanResult::with_changes(Value::Null, changes, false);
    }

    let mut planned = match proposed {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    apply_defaults(&schema.block, &mut planned);
    if let Some(Value::Object(prior)) = prior {
        carry_computed(&schema.block, prior, &mut planned);
    }

    let Some(prior_map) = prior.and_then(Value::as_object) else {
        let changes = planned
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| AttributeChange::added(k.clone(), v.clone()))
            .collect();
        return PlanResult::with_changes(Value::Object(planned), changes, false);
    };
    let mut changes = Vec::new();
    let mut requires_replace = false;

    for name in top_level_names(&schema.block) {
        let before = prior_map.get(name).filter(|v| !v.is_null());
        let after = planned.get(name).filter(|v| !v.is_null());

        let (equal, force_new) = if let Some(attr) = schema.block.attributes.get(name) {
            let equal = values_equal(&attr.attr_type, before, after);
            (equal, attr.force_new)
        } else if let Some(nested) = schema.block.blocks.get(name) {
            let equal = blocks_equal(nested, before, after);
            let force_new = !equal && block_force_new_changed(nested, before, after);
            (equal, force_new)
        } else {
            continue;
        };

        if equal {
            continue;
        }
        if force_new {
            requires_replace = true;
        }
        changes.push(AttributeChange::new(name, before.cloned(), after.cloned()));
    }

    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}

fn top_level_names(block: &Block) -> BTreeSet<&str> {
    block
        .attributes
        .keys()
        .chain(block.blocks.keys())
        .map(String::as_str)
        .collect()
}

/// Fill in attribute defaults at every depth.
fn apply_defaults(block: &Block, object: &mut Map<String, Value>) {
    for (name, attr) in &block.attributes {
        if let Some(default) = &attr.default {
            let unset = object.get(name).map_or(true, Value::is_null);
            if unset {
                object.insert(name.clone(), default.clone());
            }
        }
    }
    for (name, nested) in &block.blocks {
        for_each_block_item(nested, object.get_mut(name), |item| {
            apply_defaults(&nested.block, item)
        });
    }
}

fn for_each_block_item<F>(nested: &NestedBlock, value: Option<&mut Value>, mut f: F)
where
    F: FnMut(&mut Map<String, Value>),
{
    match (nested.nesting_mode, value) {
        (BlockNestingMode::Single, Some(Value::Object(item))) => f(item),
        (BlockNestingMode::List | BlockNestingMode::Set, Some(Value::Array(items))) => {
            for item in items {
                if let Value::Object(item) = item {
                    f(item);
                }
            }
        },
        (BlockNestingMode::Map, Some(Value::Object(items))) => {
            for item in items.values_mut() {
                if let Value::Object(item) = item {
                    f(item);
                }
            }
        },
        _ => {},
    }
}

/// Keep prior values of computed attributes the proposal leaves unset.
///
/// Single nested blocks are followed; list and set items have no stable
/// identity to match them by.
fn carry_computed(block: &Block, prior: &Map<String, Value>, planned: &mut Map<String, Value>) {
    for (name, attr) in &block.attributes {
        if !is_carried(attr) {
            continue;
        }
        let unset = planned.get(name).map_or(true, Value::is_null);
        if let Some(value) = prior.get(name).filter(|v| !v.is_null()) {
            if unset {
                planned.insert(name.clone(), value.clone());
            }
        }
    }
    for (name, nested) in &block.blocks {
        if nested.nesting_mode != BlockNestingMode::Single {
            continue;
        }
        if let (Some(Value::Object(prior)), Some(Value::Object(planned))) =
            (prior.get(name), planned.get_mut(name))
        {
            carry_computed(&nested.block, prior, planned);
        }
    }
}

fn is_carried(attr: &Attribute) -> bool {
    attr.flags.computed && !attr.flags.required
}

/// Compare two attribute values with `null` equal to the type's zero value.
fn values_equal(attr_type: &AttributeType, before: Option<&Value>, after: Option<&Value>) -> bool {
    let zero = attr_type.zero_value();
    let before = before.unwrap_or(&zero);
    let after = after.unwrap_or(&zero);
    match attr_type {
        AttributeType::Set(_) => canonical_set(before) == canonical_set(after),
        _ => strip_nulls(before) == strip_nulls(after),
    }
}

fn blocks_equal(nested: &NestedBlock, before: Option<&Value>, after: Option<&Value>) -> bool {
    let zero = match nested.nesting_mode {
        BlockNestingMode::Single => Value::Null,
        BlockNestingMode::List | BlockNestingMode::Set => Value::Array(Vec::new()),
        BlockNestingMode::Map => Value::Object(Map::new()),
    };
    let before = before.unwrap_or(&zero);
    let after = after.unwrap_or(&zero);
    match nested.nesting_mode {
        BlockNestingMode::Set => canonical_set(before) == canonical_set(after),
        _ => strip_nulls(before) == strip_nulls(after),
    }
}

/// A set value as sorted serialized members.
fn canonical_set(value: &Value) -> Vec<String> {
    let mut members: Vec<String> = match value {
        Value::Array(items) => items.iter().map(|v| strip_nulls(v).to_string()).collect(),
        other => vec![strip_nulls(other).to_string()],
    };
    members.sort();
    members
}

/// Object members set to `null` are the same as absent ones.
fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_nulls).collect()),
        other => other.clone(),
    }
}

/// Whether a changed block differs in a `force_new` attribute.
fn block_force_new_changed(
    nested: &NestedBlock,
    before: Option<&Value>,
    after: Option<&Value>,
) -> bool {
    if !nested.block.has_force_new() {
        return false;
    }
    match nested.nesting_mode {
        BlockNestingMode::Single => item_force_new_changed(&nested.block, before, after),
        BlockNestingMode::List => {
            let before = before.and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
            let after = after.and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
            before.len() != after.len()
                || before
                    .iter()
                    .zip(after)
                    .any(|(b, a)| item_force_new_changed(&nested.block, Some(b), Some(a)))
        },
        // Set and map members have no positional identity.
        BlockNestingMode::Set | BlockNestingMode::Map => true,
    }
}

fn item_force_new_changed(block: &Block, before: Option<&Value>, after: Option<&Value>) -> bool {
    let field = |value: Option<&Value>, name: &str| {
        value
            .and_then(|v| v.get(name))
            .filter(|v| !v.is_null())
            .cloned()
    };
    let attributes_changed = block.attributes.iter().any(|(name, attr)| {
        attr.force_new
            && !values_equal(
                &attr.attr_type,
                field(before, name).as_ref(),
                field(after, name).as_ref(),
            )
    });
    attributes_changed
        || block.blocks.iter().any(|(name, nested)| {
            let b = field(before, name);
            let a = field(after, name);
            !blocks_equal(nested, b.as_ref(), a.as_ref())
                && block_force_new_changed(nested, b.as_ref(), a.as_ref())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeFlags;
    use serde_json::json;

    fn token_schema() -> Schema {
        Schema::v0()
            .with_id()
            .with_attribute("name", Attribute::optional_string())
            .with_attribute("type", Attribute::required_string())
            .with_attribute("global", Attribute::optional_bool().with_default(false))
            .with_attribute("policies", Attribute::string_set(AttributeFlags::optional()))
            .with_attribute(
                "expiration_ttl",
                Attribute::optional_string().with_force_new(),
            )
            .with_attribute("secret_id", Attribute::computed_string().sensitive())
    }

    #[test]
    fn test_create_plan() {
        let plan = plan_resource(
            &token_schema(),
            None,
            json!({"name": "ci", "type": "client", "id": null}),
        );
        assert_eq!(plan.planned_state["global"], false);
        assert!(!plan.requires_replace);
        let paths: Vec<_> = plan.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["global", "name", "type"]);
    }

    #[test]
    fn test_computed_values_are_carried() {
        let prior = json!({"id": "a1", "name": "ci", "type": "client", "secret_id": "s1", "global": false});
        let plan = plan_resource(
            &token_schema(),
            Some(&prior),
            json!({"id": null, "name": "ci", "type": "client", "secret_id": null}),
        );
        assert_eq!(plan.planned_state["id"], "a1");
        assert_eq!(plan.planned_state["secret_id"], "s1");
        assert!(plan.changes.is_empty());
    }

    #[test]
    fn test_null_equals_zero_value() {
        let prior = json!({"id": "a1", "name": "", "type": "client", "policies": []});
        let plan = plan_resource(
            &token_schema(),
            Some(&prior),
            json!({"name": null, "type": "client", "policies": null}),
        );
        assert!(plan.changes.is_empty());
    }

    #[test]
    fn test_set_order_is_ignored() {
        let prior = json!({"id": "a1", "type": "client", "policies": ["a", "b"]});
        let plan = plan_resource(
            &token_schema(),
            Some(&prior),
            json!({"type": "client", "policies": ["b", "a"]}),
        );
        assert!(plan.changes.is_empty());
    }

    #[test]
    fn test_force_new_requires_replace() {
        let prior = json!({"id": "a1", "type": "client", "expiration_ttl": "1h"});
        let plan = plan_resource(
            &token_schema(),
            Some(&prior),
            json!({"type": "client", "expiration_ttl": "2h"}),
        );
        assert!(plan.requires_replace);
        assert_eq!(plan.changes[0].path, "expiration_ttl");

        let plan = plan_resource(
            &token_schema(),
            Some(&prior),
            json!({"type": "management", "expiration_ttl": "1h"}),
        );
        assert!(!plan.requires_replace);
    }

    #[test]
    fn test_nested_force_new() {
        let schema = Schema::v0().with_block(
            "capability",
            NestedBlock::list(
                Block::new()
                    .with_attribute("access_mode", Attribute::required_string().with_force_new())
                    .with_attribute("note", Attribute::optional_string()),
            ),
        );
        let prior = json!({"capability": [{"access_mode": "single-node-writer", "note": "a"}]});

        let plan = plan_resource(
            &schema,
            Some(&prior),
            json!({"capability": [{"access_mode": "single-node-writer", "note": "b"}]}),
        );
        assert_eq!(plan.changes.len(), 1);
        assert!(!plan.requires_replace);

        let plan = plan_resource(
            &schema,
            Some(&prior),
            json!({"capability": [{"access_mode": "multi-node-reader-only", "note": "a"}]}),
        );
        assert!(plan.requires_replace);
    }

    #[test]
    fn test_nested_defaults() {
        let schema = Schema::v0().with_block(
            "update",
            NestedBlock::single(
                Block::new().with_attribute("max_parallel", Attribute::optional_int64().with_default(1)),
            ),
        );
        let plan = plan_resource(&schema, None, json!({"update": {}}));
        assert_eq!(plan.planned_state["update"]["max_parallel"], 1);
    }

    #[test]
    fn test_destroy_plan() {
        let prior = json!({"id": "a1", "name": "ci", "type": "client", "secret_id": null});
        let plan = plan_resource(&token_schema(), Some(&prior), Value::Null);
        assert!(plan.is_destroy());
        assert_eq!(plan.changes.len(), 3);
        assert!(plan.changes.iter().all(|c| c.after.is_none()));
    }
}
