//! Plan computation shared by every resource type.
//!
//! A plan takes the prior state (if any) and the proposed configuration and
//! produces the state the apply step should aim for. Values the user left out
//! but the provider owns are carried over from the prior state so that a
//! refresh does not show up as a change:
//!
//! - computed attributes and computed blocks missing from the proposal
//! - computed attributes inside nested blocks, matched to the prior item
//!
//! Attributes with a schema default are filled at every nesting level before
//! comparison, so a block read back with the server's defaults matches the
//! configuration that left them out.

use serde_json::{Map, Value};
use tracing::debug;

use crate::resources::strip_nulls;
use crate::schema::{Block, BlockNestingMode, NestedBlock, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Compute the plan for one resource instance.
///
/// `proposed` is null when the resource is being destroyed.
pub fn plan(schema: &Schema, prior: Option<Value>, proposed: Value) -> PlanResult {
    let prior = prior.map(strip_nulls).filter(|p| !p.is_null());
    let proposed = strip_nulls(proposed);

    if proposed.is_null() {
        let changes = match &prior {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| AttributeChange::removed(k.clone(), v.clone()))
                .collect(),
            _ => Vec::new(),
        };
        return PlanResult::with_changes(Value::Null, changes, false);
    }

    let empty = Map::new();
    let prior_map = match &prior {
        Some(Value::Object(map)) => map,
        _ => &empty,
    };
    let mut planned = match proposed {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    fill_defaults(&schema.block, &mut planned);
    fill_block(&schema.block, &mut planned, prior_map);

    if prior.is_none() {
        let changes = planned
            .iter()
            .map(|(k, v)| AttributeChange::added(k.clone(), v.clone()))
            .collect();
        return PlanResult::with_changes(Value::Object(planned), changes, false);
    }

    let mut names: Vec<&String> = prior_map.keys().chain(planned.keys()).collect();
    names.sort();
    names.dedup();

    let mut changes = Vec::new();
    for name in names {
        let before = prior_map.get(name);
        let after = planned.get(name);
        let differs = match schema.block.blocks.get(name) {
            Some(nested) => {
                normalize_items(nested, before) != normalize_items(nested, after)
            },
            None => before != after,
        };
        if !differs {
            continue;
        }
        changes.push(AttributeChange::new(name.clone(), before.cloned(), after.cloned()));
    }

    let requires_replace = changes.iter().any(|c| schema.forces_new(&c.path));
    if requires_replace {
        debug!(
            attributes = ?changes.iter().map(|c| c.path.as_str()).collect::<Vec<_>>(),
            "Plan requires replacement"
        );
    }
    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}

/// Fill defaults of user-settable attributes throughout `planned`.
///
/// Runs before prior items are matched, since set items pair by content.
fn fill_defaults(block: &Block, planned: &mut Map<String, Value>) {
    for (name, attr) in &block.attributes {
        if attr.flags.computed || planned.contains_key(name) {
            continue;
        }
        if let Some(default) = &attr.default {
            planned.insert(name.clone(), default.clone());
        }
    }

    for (name, nested) in &block.blocks {
        if let Some(Value::Array(items)) = planned.get_mut(name) {
            for item in items.iter_mut() {
                if let Value::Object(item) = item {
                    fill_defaults(&nested.block, item);
                }
            }
        }
    }
}

/// Carry provider-owned values from `prior` into `planned`.
fn fill_block(block: &Block, planned: &mut Map<String, Value>, prior: &Map<String, Value>) {
    for (name, attr) in &block.attributes {
        if planned.contains_key(name) || !attr.flags.computed {
            continue;
        }
        match (prior.get(name), &attr.default) {
            (Some(value), _) | (None, Some(value)) => {
                planned.insert(name.clone(), value.clone());
            },
            (None, None) => {},
        }
    }

    let empty = Map::new();
    for (name, nested) in &block.blocks {
        let prior_items = items(prior.get(name));
        let planned_items = items(planned.get(name));
        if planned_items.is_empty() {
            if nested.computed && !prior_items.is_empty() {
                planned.insert(name.clone(), Value::Array(prior_items.to_vec()));
            }
            continue;
        }

        let filled: Vec<Value> = planned_items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let Value::Object(item) = item else {
                    return item.clone();
                };
                let mut item = item.clone();
                let matched = match match_prior(nested, i, &item, prior_items) {
                    Some(Value::Object(matched)) => matched,
                    _ => &empty,
                };
                fill_block(&nested.block, &mut item, matched);
                Value::Object(item)
            })
            .collect();
        planned.insert(name.clone(), Value::Array(filled));
    }
}

/// The prior item a planned item corresponds to.
///
/// Single-item blocks and lists pair by position. Set items pair with the
/// prior item that has the same user-supplied content.
fn match_prior<'a>(
    nested: &NestedBlock,
    index: usize,
    item: &Map<String, Value>,
    prior_items: &'a [Value],
) -> Option<&'a Value> {
    if nested.max_items == 1 || nested.nesting_mode == BlockNestingMode::List {
        return prior_items.get(index);
    }
    let wanted = strip_computed(&nested.block, &Value::Object(item.clone()));
    prior_items
        .iter()
        .find(|p| strip_computed(&nested.block, p) == wanted)
}

fn items(value: Option<&Value>) -> &[Value] {
    match value {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

/// Block items without computed-only attributes, sorted when order does not matter.
fn normalize_items(nested: &NestedBlock, value: Option<&Value>) -> Vec<Value> {
    let mut normalized: Vec<Value> = items(value)
        .iter()
        .map(|item| strip_computed(&nested.block, item))
        .collect();
    if nested.nesting_mode == BlockNestingMode::Set {
        normalized.sort_by_key(|v| v.to_string());
    }
    normalized
}

fn strip_computed(block: &Block, value: &Value) -> Value {
    let Value::Object(map) = value else {
        return value.clone();
    };
    let stripped = map
        .iter()
        .filter(|(k, _)| {
            !block
                .attributes
                .get(k.as_str())
                .is_some_and(|a| a.flags.computed && !a.flags.optional)
        })
        .map(|(k, v)| match block.blocks.get(k.as_str()) {
            Some(nested) => (k.clone(), Value::Array(normalize_items(nested, Some(v)))),
            None => (k.clone(), v.clone()),
        })
        .collect();
    Value::Object(stripped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use crate::testing::{
        assert_plan_changes_attribute, assert_plan_creates, assert_plan_does_not_change_attribute,
        assert_plan_no_changes, assert_plan_replaces, assert_plan_updates_in_place,
    };
    use serde_json::json;

    fn schema() -> Schema {
        let identifier = Block::new()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("value", Attribute::required_string())
            .with_attribute("status", Attribute::computed_string());
        let settings = Block::new()
            .with_attribute("encoding", Attribute::optional_computed_string())
            .with_attribute("strict", Attribute::optional_bool());
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "environment_id",
                Attribute::required_string().with_force_new(),
            )
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "timeout",
                Attribute::optional_int64().with_default(json!(30000)),
            )
            .with_block("identifier", NestedBlock::set(identifier))
            .with_block("settings", NestedBlock::optional_single(settings).computed())
    }

    fn prior() -> Value {
        json!({
            "id": "p-1",
            "environment_id": "env-1",
            "timeout": 30000,
            "identifier": [
                {"id": "i-1", "value": "a", "status": "ACTIVE"},
                {"id": "i-2", "value": "b", "status": "ACTIVE"}
            ],
            "settings": [{"encoding": "UTF8", "strict": false}]
        })
    }

    #[test]
    fn test_create_fills_defaults() {
        let result = plan(&schema(), None, json!({"environment_id": "env-1", "description": null}));
        assert_plan_creates(&result);
        assert_eq!(result.planned_state["timeout"], json!(30000));
        assert!(result.planned_state.get("description").is_none());
        assert_plan_changes_attribute(&result, "environment_id");
    }

    #[test]
    fn test_refresh_is_not_a_change() {
        let proposed = json!({
            "environment_id": "env-1",
            "identifier": [{"value": "b"}, {"value": "a"}]
        });
        let result = plan(&schema(), Some(prior()), proposed);
        assert_plan_no_changes(&result);
        assert_eq!(result.planned_state["id"], json!("p-1"));
        assert_eq!(result.planned_state["settings"], prior()["settings"]);

        let ids: Vec<&Value> = result.planned_state["identifier"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| &i["id"])
            .collect();
        assert_eq!(ids, vec![&json!("i-2"), &json!("i-1")]);
    }

    #[test]
    fn test_nested_optional_computed_is_carried() {
        let proposed = json!({
            "environment_id": "env-1",
            "identifier": [{"value": "a"}, {"value": "b"}],
            "settings": [{"strict": true}]
        });
        let result = plan(&schema(), Some(prior()), proposed);
        assert_plan_changes_attribute(&result, "settings");
        assert_plan_updates_in_place(&result);
        assert_eq!(
            result.planned_state["settings"][0],
            json!({"encoding": "UTF8", "strict": true})
        );
    }

    #[test]
    fn test_nested_defaults_are_filled() {
        let transport = Block::new()
            .with_attribute("host", Attribute::required_string())
            .with_attribute(
                "timeout",
                Attribute::optional_int64().with_default(json!(15000)),
            );
        let schema = Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_block("transport", NestedBlock::optional_single(transport));

        let created = plan(&schema, None, json!({"transport": [{"host": "a"}]}));
        assert_eq!(
            created.planned_state["transport"][0],
            json!({"host": "a", "timeout": 15000})
        );

        let read_back = json!({"id": "e-1", "transport": [{"host": "a", "timeout": 15000}]});
        let result = plan(&schema, Some(read_back), json!({"transport": [{"host": "a"}]}));
        assert_plan_no_changes(&result);
    }

    #[test]
    fn test_force_new_change_replaces() {
        let mut proposed = prior();
        proposed["environment_id"] = json!("env-2");
        let result = plan(&schema(), Some(prior()), proposed);
        assert_plan_replaces(&result);
        assert_plan_does_not_change_attribute(&result, "identifier");
    }

    #[test]
    fn test_destroy_lists_removed_attributes() {
        let result = plan(&schema(), Some(prior()), Value::Null);
        assert!(result.planned_state.is_null());
        assert!(!result.requires_replace);
        assert_plan_changes_attribute(&result, "id");
        assert!(result.changes.iter().all(|c| c.after.is_none()));
    }
}
