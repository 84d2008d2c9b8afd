// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};

use super::schema::TypeRegistry;
use super::tree::SceneTree;

fn props<const N: usize>(entries: [(&str, Value); N]) -> BTreeMap<String, Value> {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value))
        .collect()
}

/// Small 2D scene used by `--demo` and by tests.
///
/// ```text
/// /root            Node
///   Player         CharacterBody2D
///     Sprite       Sprite2D
///   Camera         Camera2D
///   HUD            CanvasLayer
///     Score        Label
/// ```
pub fn demo_scene() -> SceneTree {
    demo_scene_with(Arc::new(TypeRegistry::builtin()))
}

pub fn demo_scene_with(registry: Arc<TypeRegistry>) -> SceneTree {
    let mut tree = SceneTree::new("root", "Node", registry).expect("static root name is valid");
    let root = tree.root();

    let player = tree
        .add_child(
            root,
            "Player",
            "CharacterBody2D",
            props([("position", json!([10.0, 20.0])), ("velocity", json!([0.0, 0.0]))]),
        )
        .expect("demo player");
    tree.add_child(
        player,
        "Sprite",
        "Sprite2D",
        props([("texture", json!("res://player.png")), ("centered", json!(true))]),
    )
    .expect("demo sprite");
    tree.add_child(
        root,
        "Camera",
        "Camera2D",
        props([("zoom", json!([1.0, 1.0])), ("enabled", json!(true))]),
    )
    .expect("demo camera");
    let hud = tree
        .add_child(root, "HUD", "CanvasLayer", props([("layer", json!(1))]))
        .expect("demo hud");
    tree.add_child(hud, "Score", "Label", props([("text", json!("0"))]))
        .expect("demo score");

    tree
}

/// Root with plain `Node` children named in order.
#[cfg(test)]
pub(crate) fn flat_scene(names: &[&str]) -> SceneTree {
    let mut tree = SceneTree::new("root", "Node", Arc::new(TypeRegistry::builtin())).expect("root");
    let root = tree.root();
    for name in names {
        tree.add_child(root, name, "Node", BTreeMap::new())
            .expect("flat child");
    }
    tree
}
