// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Property equality filter: drops `set_property` operations that would not change anything.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use super::AliasMap;
use crate::model::{NodePath, SceneTree, TreeSnapshot};
use crate::ops::PatchOp;

/// Structural equality for property values.
///
/// Object keys compare regardless of order and numbers compare by value, so `1` equals `1.0`.
/// Arrays stay ordered.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => {
            a == b || matches!((a.as_f64(), b.as_f64()), (Some(x), Some(y)) if x == y)
        }
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, value)| b.get(key).is_some_and(|other| values_equal(value, other)))
        }
        _ => false,
    }
}

/// Where current property values come from, addressed by absolute snapshot path.
pub trait PropertySource {
    /// `None` when the node is unknown or its properties were not captured.
    fn fetch_properties(&self, path: &NodePath) -> Option<BTreeMap<String, Value>>;
}

impl PropertySource for TreeSnapshot {
    fn fetch_properties(&self, path: &NodePath) -> Option<BTreeMap<String, Value>> {
        self.find(path)?.properties.clone()
    }
}

impl PropertySource for SceneTree {
    fn fetch_properties(&self, path: &NodePath) -> Option<BTreeMap<String, Value>> {
        let key = self.lookup(path)?;
        Some(self.node(key)?.properties().clone())
    }
}

/// Memoizes one fetch per distinct path for the duration of one diff.
pub struct PropertyCache<'s, S: PropertySource + ?Sized> {
    source: &'s S,
    entries: HashMap<NodePath, Option<BTreeMap<String, Value>>>,
    fetches: usize,
}

impl<'s, S: PropertySource + ?Sized> PropertyCache<'s, S> {
    pub fn new(source: &'s S) -> Self {
        Self {
            source,
            entries: HashMap::new(),
            fetches: 0,
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches
    }

    pub fn properties(&mut self, path: &NodePath) -> Option<&BTreeMap<String, Value>> {
        if !self.entries.contains_key(path) {
            self.fetches += 1;
            let fetched = self.source.fetch_properties(path);
            self.entries.insert(path.clone(), fetched);
        }
        self.entries.get(path)?.as_ref()
    }

    /// `Some(true)` when the stored value equals `value`, `None` when it is not known.
    pub fn holds(&mut self, path: &NodePath, property: &str, value: &Value) -> Option<bool> {
        let current = self.properties(path)?.get(property)?;
        Some(values_equal(current, value))
    }
}

/// Removes `set_property` operations whose target already holds an equal value.
///
/// Paths in `ops` are taken as absolute and valid at the point each operation runs; the filter
/// replays renames and moves to map each target back to its snapshot path. Targets created
/// within the batch and values the source does not know are kept.
pub fn filter_unchanged<S: PropertySource + ?Sized>(
    ops: Vec<PatchOp>,
    cache: &mut PropertyCache<'_, S>,
) -> Vec<PatchOp> {
    let mut aliases = AliasMap::default();
    let mut created: Vec<NodePath> = Vec::new();
    let mut kept = Vec::with_capacity(ops.len());

    for op in ops {
        match &op {
            PatchOp::SetProperty {
                target,
                property,
                value,
            } => {
                if let Some(path) = target.path() {
                    let created_depth = created
                        .iter()
                        .filter(|prefix| path.starts_with(prefix))
                        .map(NodePath::len)
                        .max();
                    let fresh = match (created_depth, aliases.matched_depth(path)) {
                        (Some(created), Some(moved)) => created >= moved,
                        (created, _) => created.is_some(),
                    };
                    if !fresh {
                        let original = aliases.original_of(path);
                        if cache.holds(&original, property, value) == Some(true) {
                            continue;
                        }
                    }
                }
            }
            PatchOp::CreateNode { parent, name, .. } => {
                if let Some(parent) = parent.path() {
                    created.push(parent.join(name));
                }
            }
            PatchOp::DeleteNode { target } => {
                if let Some(path) = target.path() {
                    created.retain(|prefix| !prefix.starts_with(path));
                }
            }
            PatchOp::RenameNode { target, new_name } => {
                if let Some(old) = target.path() {
                    let new = old.with_name(new_name);
                    rewrite_created(&mut created, old, &new);
                    aliases.record_move(old, &new);
                }
            }
            PatchOp::ReparentNode {
                target, new_parent, ..
            } => {
                if let (Some(old), Some(parent)) = (target.path(), new_parent.path()) {
                    if let Some(name) = old.name() {
                        let new = parent.join(name);
                        rewrite_created(&mut created, old, &new);
                        aliases.record_move(old, &new);
                    }
                }
            }
        }
        kept.push(op);
    }

    kept
}

fn rewrite_created(created: &mut [NodePath], old: &NodePath, new: &NodePath) {
    for path in created.iter_mut() {
        if let Some(moved) = path.replace_prefix(old, new) {
            *path = moved;
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{filter_unchanged, values_equal, PropertyCache};
    use crate::model::fixtures::demo_scene;
    use crate::model::{NodePath, SnapshotOptions};
    use crate::ops::PatchOp;

    fn path(raw: &str) -> NodePath {
        NodePath::parse(raw).expect("path")
    }

    #[test]
    fn equality_ignores_key_order_and_number_repr() {
        let a = json!({"x": 1, "y": {"b": [1, 2], "a": true}});
        let b = json!({"y": {"a": true, "b": [1.0, 2.0]}, "x": 1.0});
        assert!(values_equal(&a, &b));
        assert!(!values_equal(&json!([1, 2]), &json!([2, 1])));
        assert!(!values_equal(&json!({"x": 1}), &json!({"x": 1, "y": 2})));
        assert!(!values_equal(&json!(0), &json!(false)));
        assert!(!values_equal(&json!(null), &json!("")));
    }

    #[test]
    fn drops_only_redundant_set_property() {
        let mut tree = demo_scene();
        let snapshot = tree.snapshot(&SnapshotOptions::full());
        let mut cache = PropertyCache::new(&snapshot);

        let ops = vec![
            PatchOp::set_property(path("/root/Player"), "position", json!([10, 20])),
            PatchOp::set_property(path("/root/Player"), "velocity", json!([5.0, 0.0])),
            PatchOp::set_property(path("/root/Player"), "rotation", json!(0.0)),
        ];
        let kept = filter_unchanged(ops, &mut cache);

        assert_eq!(kept.len(), 2);
        assert_eq!(cache.fetch_count(), 1);
    }

    #[test]
    fn follows_renames_back_to_snapshot_paths() {
        let mut tree = demo_scene();
        let snapshot = tree.snapshot(&SnapshotOptions::full());
        let mut cache = PropertyCache::new(&snapshot);

        let ops = vec![
            PatchOp::create(path("/root"), "Control", "UI"),
            PatchOp::rename(path("/root/Player"), "Hero"),
            PatchOp::reparent(path("/root/Hero"), path("/root/UI"), None),
            PatchOp::set_property(path("/root/UI/Hero/Sprite"), "centered", json!(true)),
            PatchOp::set_property(path("/root/UI"), "visible", json!(true)),
        ];
        let kept = filter_unchanged(ops, &mut cache);

        assert_eq!(kept.len(), 4);
        assert!(matches!(
            kept[3],
            PatchOp::SetProperty { ref property, .. } if property == "visible"
        ));
    }

    #[test]
    fn unknown_values_are_kept() {
        let mut tree = demo_scene();
        let snapshot = tree.snapshot(&SnapshotOptions::with_ids());
        let mut cache = PropertyCache::new(&snapshot);

        let ops = vec![PatchOp::set_property(
            path("/root/Player"),
            "position",
            json!([10.0, 20.0]),
        )];
        assert_eq!(filter_unchanged(ops, &mut cache).len(), 1);
    }
}
