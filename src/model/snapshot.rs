// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeMap;

use serde_json::Value;
use smol_str::SmolStr;

use super::ids::{InstanceId, NodeId};
use super::path::NodePath;
use super::tree::SceneTree;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotOptions {
    /// Assign ids to nodes that lack one before capturing.
    pub ensure_ids: bool,
    pub include_properties: bool,
    /// Restricts captured properties; empty means all of them.
    pub properties: Vec<String>,
}

impl SnapshotOptions {
    pub fn with_ids() -> Self {
        Self {
            ensure_ids: true,
            ..Self::default()
        }
    }

    pub fn full() -> Self {
        Self {
            ensure_ids: true,
            include_properties: true,
            properties: Vec::new(),
        }
    }
}

/// Immutable capture of one live node.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotNode {
    pub id: Option<NodeId>,
    pub name: SmolStr,
    pub type_name: SmolStr,
    pub path: NodePath,
    pub properties: Option<BTreeMap<String, Value>>,
    pub children: Vec<SnapshotNode>,
}

impl SnapshotNode {
    pub fn child_named(&self, name: &str) -> Option<&SnapshotNode> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Parents before children.
    pub fn walk(&self) -> Vec<&SnapshotNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(SnapshotNode::subtree_len)
            .sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeSnapshot {
    pub root_path: NodePath,
    pub root: SnapshotNode,
}

impl TreeSnapshot {
    pub fn len(&self) -> usize {
        self.root.subtree_len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Finds a node by absolute or root-relative path.
    pub fn find(&self, path: &NodePath) -> Option<&SnapshotNode> {
        let absolute = path.to_absolute(&self.root.name);
        let (first, rest) = absolute.segments().split_first()?;
        if *first != self.root.name {
            return None;
        }
        let mut current = &self.root;
        for segment in rest {
            current = current.child_named(segment)?;
        }
        Some(current)
    }

    pub fn find_id(&self, id: &NodeId) -> Option<&SnapshotNode> {
        self.root
            .walk()
            .into_iter()
            .find(|node| node.id.as_ref() == Some(id))
    }
}

impl SceneTree {
    /// Captures the tree, assigning missing ids first when asked to.
    pub fn snapshot(&mut self, options: &SnapshotOptions) -> TreeSnapshot {
        if options.ensure_ids {
            self.ensure_all_ids();
        }
        self.capture(options)
    }

    /// Read-only capture; nodes without ids report `None`.
    pub fn capture(&self, options: &SnapshotOptions) -> TreeSnapshot {
        let root_path = self.root_path();
        let root = self.capture_node(self.root(), &root_path, options);
        TreeSnapshot { root_path, root }
    }

    fn capture_node(
        &self,
        key: InstanceId,
        path: &NodePath,
        options: &SnapshotOptions,
    ) -> SnapshotNode {
        let node = self
            .node(key)
            .expect("snapshot walks existing children only");

        let properties = options.include_properties.then(|| {
            if options.properties.is_empty() {
                node.properties().clone()
            } else {
                options
                    .properties
                    .iter()
                    .filter_map(|name| {
                        node.property(name)
                            .map(|value| (name.clone(), value.clone()))
                    })
                    .collect()
            }
        });

        let children = node
            .children()
            .iter()
            .filter_map(|child| {
                let child_node = self.node(*child)?;
                let child_path = path.join(child_node.name());
                Some(self.capture_node(*child, &child_path, options))
            })
            .collect();

        SnapshotNode {
            id: node.node_id(),
            name: SmolStr::new(node.name()),
            type_name: SmolStr::new(node.type_name()),
            path: path.clone(),
            properties,
            children,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::SnapshotOptions;
    use crate::model::fixtures::demo_scene;
    use crate::model::NodePath;

    #[test]
    fn snapshot_assigns_ids_and_reports_paths() {
        let mut tree = demo_scene();
        let snapshot = tree.snapshot(&SnapshotOptions::with_ids());

        assert_eq!(snapshot.root_path.to_string(), "/root");
        assert_eq!(snapshot.len(), tree.len());
        for node in snapshot.root.walk() {
            assert!(node.id.is_some(), "{} has no id", node.path);
            assert!(node.properties.is_none());
            assert_eq!(tree.lookup(&node.path).and_then(|k| tree.node_id(k)), node.id);
        }
    }

    #[test]
    fn capture_without_ids_leaves_tree_untouched() {
        let tree = demo_scene();
        let snapshot = tree.capture(&SnapshotOptions::default());
        assert!(snapshot.root.walk().iter().all(|node| node.id.is_none()));
    }

    #[test]
    fn property_filter_limits_captured_values() {
        let mut tree = demo_scene();
        let options = SnapshotOptions {
            ensure_ids: false,
            include_properties: true,
            properties: vec!["position".to_owned()],
        };
        let snapshot = tree.snapshot(&options);
        let player = snapshot
            .find(&NodePath::parse("Player").expect("path"))
            .expect("player");
        let props = player.properties.as_ref().expect("properties");
        assert_eq!(props.get("position"), Some(&json!([10.0, 20.0])));
        assert_eq!(props.len(), 1);

        let all = tree.snapshot(&SnapshotOptions::full());
        let player = all
            .find(&NodePath::parse("/root/Player").expect("path"))
            .expect("player");
        assert!(player.properties.as_ref().is_some_and(|p| p.len() > 1));
    }
}
