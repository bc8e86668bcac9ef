//! Schema-driven planning.
//!
//! The planner fills in what configuration leaves open (schema defaults,
//! computed values carried over from prior state), reports changes per
//! top-level attribute or block, and decides whether `force_new` makes the
//! change a replacement. Resources can refine the result through
//! `customize_diff`.

use serde_json::{Map, Value};

use crate::schema::{AttributeType, Block, BlockNestingMode, NestedBlock, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Plan the transition from `prior` to `proposed`.
///
/// A `null` proposed state with a prior state plans a destroy.
pub fn plan(schema: &Schema, prior: Option<&Value>, proposed: Value) -> PlanResult {
    let mut prior = prior.filter(|p| !p.is_null()).cloned();
    if let Some(Value::Object(map)) = &mut prior {
        normalize_sets(&schema.block, map);
    }
    let prior = prior.as_ref();

    if proposed.is_null() {
        let Some(prior) = prior else {
            return PlanResult::no_change(Value::Null);
        };
        let changes = prior
            .as_object()
            .into_iter()
            .flatten()
            .filter_map(|(name, value)| present(Some(value)).map(|v| (name, v)))
            .map(|(name, value)| AttributeChange::removed(name.as_str(), value.clone()))
            .collect();
        return PlanResult::with_changes(Value::Null, changes, false);
    }

    let mut planned = proposed;
    if let Value::Object(map) = &mut planned {
        fill_block(&schema.block, map, prior.and_then(Value::as_object));
        normalize_sets(&schema.block, map);
    }

    let changes = diff(&schema.block, prior, &planned);
    if changes.is_empty() {
        return PlanResult::no_change(planned);
    }

    let requires_replace =
        prior.is_some() && block_forces_new(&schema.block, prior, Some(&planned));
    PlanResult::with_changes(planned, changes, requires_replace)
}

/// `null`, `[]` and `{}` all mean "not set".
fn present(value: Option<&Value>) -> Option<&Value> {
    match value? {
        Value::Null => None,
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other),
    }
}

/// Sort and deduplicate set-typed values so ordering never shows up as a
/// change.
fn normalize_sets(block: &Block, map: &mut Map<String, Value>) {
    for (name, attr) in &block.attributes {
        if !matches!(attr.attr_type, AttributeType::Set(_)) {
            continue;
        }
        if let Some(Value::Array(items)) = map.get_mut(name) {
            sort_unique(items);
        }
    }

    for (name, nested) in &block.blocks {
        if let Some(Value::Array(items)) = map.get_mut(name) {
            for item in items.iter_mut() {
                if let Value::Object(item) = item {
                    normalize_sets(&nested.block, item);
                }
            }
            if nested.nesting_mode == BlockNestingMode::Set {
                sort_unique(items);
            }
        }
    }
}

fn sort_unique(items: &mut Vec<Value>) {
    items.sort_by_cached_key(|v| v.to_string());
    items.dedup();
}

fn fill_block(
    block: &Block,
    proposed: &mut Map<String, Value>,
    prior: Option<&Map<String, Value>>,
) {
    for (name, attr) in &block.attributes {
        if present(proposed.get(name)).is_some() {
            continue;
        }
        if let Some(default) = &attr.default {
            proposed.insert(name.clone(), default.clone());
        } else if attr.flags.computed {
            if let Some(value) = prior.and_then(|p| present(p.get(name))) {
                proposed.insert(name.clone(), value.clone());
            }
        }
    }

    for (name, nested) in &block.blocks {
        let prior_items = prior.and_then(|p| p.get(name)).and_then(Value::as_array);
        match proposed.get_mut(name) {
            Some(Value::Array(items)) if !items.is_empty() => {
                for (index, item) in items.iter_mut().enumerate() {
                    if let Value::Object(item) = item {
                        let prior_item = prior_items
                            .and_then(|p| p.get(index))
                            .and_then(Value::as_object);
                        fill_block(&nested.block, item, prior_item);
                    }
                }
            },
            _ => {
                let carried = prior_items
                    .filter(|items| nested.computed && !items.is_empty())
                    .map(|items| Value::Array(items.clone()))
                    .unwrap_or_else(|| Value::Array(vec![]));
                proposed.insert(name.clone(), carried);
            },
        }
    }
}

fn diff(block: &Block, prior: Option<&Value>, planned: &Value) -> Vec<AttributeChange> {
    let mut names: Vec<&String> = block.attributes.keys().chain(block.blocks.keys()).collect();
    names.sort();

    names
        .into_iter()
        .filter_map(|name| {
            let before = present(prior.and_then(|p| p.get(name)));
            let after = present(planned.get(name));
            match (before, after) {
                (None, None) => None,
                (Some(b), Some(a)) if b == a => None,
                (None, Some(a)) => Some(AttributeChange::added(name.as_str(), a.clone())),
                (Some(b), None) => Some(AttributeChange::removed(name.as_str(), b.clone())),
                (Some(b), Some(a)) => {
                    Some(AttributeChange::modified(name.as_str(), b.clone(), a.clone()))
                },
            }
        })
        .collect()
}

fn block_forces_new(block: &Block, before: Option<&Value>, after: Option<&Value>) -> bool {
    let attribute_forces_new = block.attributes.iter().any(|(name, attr)| {
        attr.force_new
            && present(before.and_then(|b| b.get(name))) != present(after.and_then(|a| a.get(name)))
    });

    attribute_forces_new
        || block.blocks.iter().any(|(name, nested)| {
            nested_forces_new(
                nested,
                before.and_then(|b| b.get(name)),
                after.and_then(|a| a.get(name)),
            )
        })
}

fn nested_forces_new(nested: &NestedBlock, before: Option<&Value>, after: Option<&Value>) -> bool {
    let before_items = items(before);
    let after_items = items(after);
    if before_items == after_items {
        return false;
    }
    if nested.force_new {
        return true;
    }

    let count = before_items.len().max(after_items.len());
    (0..count).any(|index| {
        block_forces_new(
            &nested.block,
            before_items.get(index).copied(),
            after_items.get(index).copied(),
        )
    })
}

fn items(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::v0()
            .with_id()
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute("capacity", Attribute::optional_int64().with_default(json!(1)))
            .with_attribute("minimum_tls_version", Attribute::optional_computed_string())
            .with_attribute("tags", Attribute::tags())
            .with_block(
                "network_rulesets",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("default_action", Attribute::required_string())
                        .with_attribute(
                            "trusted_service_access_enabled",
                            Attribute::optional_computed_string(),
                        ),
                )
                .with_max_items(1)
                .computed(),
            )
            .with_block(
                "identity",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("type", Attribute::required_string())
                        .with_attribute("identity_ids", Attribute::optional_string_set()),
                )
                .with_max_items(1),
            )
            .with_block(
                "destination",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("name", Attribute::required_string().with_force_new()),
                )
                .with_max_items(1),
            )
    }

    #[test]
    fn test_create_reports_added_and_fills_defaults() {
        let result = plan(&schema(), None, json!({"name": "ns1"}));

        assert_eq!(result.planned_state["capacity"], 1);
        assert_eq!(result.planned_state["network_rulesets"], json!([]));
        assert!(!result.requires_replace);
        let paths: Vec<&str> = result.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["capacity", "name"]);
    }

    #[test]
    fn test_computed_values_are_carried_over() {
        let prior = json!({
            "id": "/subscriptions/sub/x",
            "name": "ns1",
            "capacity": 1,
            "minimum_tls_version": "1.2",
            "network_rulesets": [{
                "default_action": "Allow",
                "trusted_service_access_enabled": "true"
            }],
            "destination": []
        });
        let result = plan(&schema(), Some(&prior), json!({"name": "ns1", "capacity": 1}));

        assert!(result.changes.is_empty(), "{:?}", result.changes);
        assert_eq!(result.planned_state["id"], "/subscriptions/sub/x");
        assert_eq!(result.planned_state["minimum_tls_version"], "1.2");
        assert_eq!(result.planned_state["network_rulesets"], prior["network_rulesets"]);
    }

    #[test]
    fn test_computed_attribute_inside_configured_block() {
        let prior = json!({
            "name": "ns1",
            "capacity": 1,
            "network_rulesets": [{
                "default_action": "Allow",
                "trusted_service_access_enabled": "true"
            }]
        });
        let result = plan(
            &schema(),
            Some(&prior),
            json!({"name": "ns1", "network_rulesets": [{"default_action": "Deny"}]}),
        );

        assert_eq!(
            result.planned_state["network_rulesets"][0]["trusted_service_access_enabled"],
            "true"
        );
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].path, "network_rulesets");
        assert!(!result.requires_replace);
    }

    #[test]
    fn test_force_new_attribute_requires_replace() {
        let prior = json!({"name": "ns1", "capacity": 1});
        let result = plan(&schema(), Some(&prior), json!({"name": "ns2", "capacity": 1}));
        assert!(result.requires_replace);

        let result = plan(&schema(), Some(&prior), json!({"name": "ns1", "capacity": 2}));
        assert!(!result.requires_replace);
        assert_eq!(result.changes, vec![AttributeChange::modified("capacity", json!(1), json!(2))]);
    }

    #[test]
    fn test_force_new_inside_block() {
        let prior = json!({"name": "ns1", "capacity": 1, "destination": [{"name": "a"}]});
        let result = plan(
            &schema(),
            Some(&prior),
            json!({"name": "ns1", "capacity": 1, "destination": [{"name": "b"}]}),
        );
        assert!(result.requires_replace);
    }

    #[test]
    fn test_set_order_is_not_a_change() {
        let prior = json!({
            "name": "ns1",
            "capacity": 1,
            "identity": [{"type": "UserAssigned", "identity_ids": ["/ids/a", "/ids/b"]}]
        });
        let result = plan(
            &schema(),
            Some(&prior),
            json!({
                "name": "ns1",
                "identity": [{"type": "UserAssigned", "identity_ids": ["/ids/b", "/ids/a"]}]
            }),
        );

        assert!(result.changes.is_empty(), "{:?}", result.changes);
        assert!(!result.requires_replace);
        assert_eq!(
            result.planned_state["identity"][0]["identity_ids"],
            json!(["/ids/a", "/ids/b"])
        );

        let result = plan(
            &schema(),
            Some(&prior),
            json!({
                "name": "ns1",
                "identity": [{"type": "UserAssigned", "identity_ids": ["/ids/c", "/ids/a"]}]
            }),
        );
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].path, "identity");
    }

    #[test]
    fn test_empty_tags_equal_absent() {
        let prior = json!({"name": "ns1", "capacity": 1});
        let result = plan(&schema(), Some(&prior), json!({"name": "ns1", "tags": {}}));
        assert!(result.changes.is_empty());
    }

    #[test]
    fn test_destroy() {
        let prior = json!({"name": "ns1", "capacity": 1, "tags": {}});
        let result = plan(&schema(), Some(&prior), Value::Null);

        assert!(result.planned_state.is_null());
        assert_eq!(result.changes.len(), 2);
        assert!(result.changes.iter().all(|c| c.after.is_none()));
    }

    #[test]
    fn test_null_without_prior_is_noop() {
        let result = plan(&schema(), None, Value::Null);
        assert!(result.changes.is_empty());
        assert!(result.planned_state.is_null());
    }
}
