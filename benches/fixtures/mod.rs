// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

#![allow(dead_code)]

// Shared deterministic benchmark fixtures (no RNG).

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;

use scenepatch::model::{DesiredNode, SceneTree, SnapshotOptions, TypeRegistry};

#[derive(Debug, Clone, Copy)]
pub enum Case {
    Small,
    Medium,
    Large,
}

impl Case {
    pub fn id(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }

    fn shape(self) -> (usize, usize) {
        match self {
            Self::Small => (4, 8),
            Self::Medium => (16, 32),
            Self::Large => (48, 96),
        }
    }
}

/// `groups` Node2D children of the root, each holding `items` Sprite2D leaves.
pub fn scene(case: Case) -> SceneTree {
    let (groups, items) = case.shape();
    let mut tree =
        SceneTree::new("root", "Node", Arc::new(TypeRegistry::builtin())).expect("root");
    let root = tree.root();
    for g in 0..groups {
        let mut props = BTreeMap::new();
        props.insert("position".to_owned(), json!([g as f64 * 64.0, 0.0]));
        let group = tree
            .add_child(root, &format!("Group_{g:03}"), "Node2D", props)
            .expect("group");
        for i in 0..items {
            let mut props = BTreeMap::new();
            props.insert("position".to_owned(), json!([0.0, i as f64 * 16.0]));
            props.insert("frame".to_owned(), json!(i % 4));
            tree.add_child(group, &format!("Item_{i:03}"), "Sprite2D", props)
                .expect("item");
        }
    }
    tree
}

/// Desired tree derived from the live one: every 7th item moves, every 5th group is renamed,
/// every group gains a child, and the group order is reversed.
pub fn edited(tree: &mut SceneTree) -> DesiredNode {
    let snapshot = tree.snapshot(&SnapshotOptions::full());
    let mut desired = DesiredNode::from_snapshot(&snapshot.root);

    if let Some(groups) = desired.children.as_mut() {
        for (g, group) in groups.iter_mut().enumerate() {
            if g % 5 == 0 {
                group.name = format!("Renamed_{g:03}").into();
            }
            if let Some(items) = group.children.as_mut() {
                for (i, item) in items.iter_mut().enumerate() {
                    if i % 7 == 0 {
                        item.properties
                            .insert("position".to_owned(), json!([8.0, i as f64 * 16.0]));
                    }
                }
                items.push(DesiredNode::new("Marker").with_type("Node2D"));
            }
        }
        groups.reverse();
    }
    desired
}
