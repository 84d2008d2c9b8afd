// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;

use scenepatch::diff::{diff, generate, DiffOptions};
use scenepatch::model::{
    DesiredNode, NodePath, SceneTree, SnapshotOptions, TreeSnapshot, TypeRegistry,
};
use scenepatch::ops::{apply_patch, ApplyMode, NodeRef, PatchOp};

fn path(raw: &str) -> NodePath {
    NodePath::parse(raw).expect("path")
}

fn scene(children: &[(&str, &str)]) -> SceneTree {
    let mut tree =
        SceneTree::new("root", "Node", Arc::new(TypeRegistry::builtin())).expect("root");
    let root = tree.root();
    for (name, type_name) in children {
        tree.add_child(root, name, type_name, BTreeMap::new())
            .expect("child");
    }
    tree
}

fn names(snapshot: &TreeSnapshot) -> Vec<String> {
    snapshot
        .root
        .children
        .iter()
        .map(|child| child.name.to_string())
        .collect()
}

#[test]
fn renamed_and_moved_node_keeps_its_id() {
    let mut tree = scene(&[("Player", "Node2D")]);
    let before = tree.snapshot(&SnapshotOptions::with_ids());
    let player_id = before
        .find(&path("/root/Player"))
        .and_then(|node| node.id.clone())
        .expect("player id");

    let desired = DesiredNode::new("root").child(
        DesiredNode::new("UI")
            .with_type("Node")
            .child(DesiredNode::new("Hero").with_id(player_id.clone()).with_type("Node2D")),
    );
    let outcome = generate(&mut tree, &desired, &DiffOptions::default());
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    assert_eq!(
        outcome.operations,
        vec![
            PatchOp::create(path("/root"), "Node", "UI"),
            PatchOp::rename(path("/root/Player"), "Hero"),
            PatchOp::reparent(path("/root/Hero"), path("/root/UI"), None),
        ]
    );

    let report = apply_patch(&mut tree, &outcome.operations, ApplyMode::Strict);
    assert!(report.is_complete(), "{report:?}");

    let key = tree.lookup_id(&player_id).expect("id still bound");
    assert_eq!(tree.path_of(key), Some(path("/root/UI/Hero")));
}

#[test]
fn strict_batches_are_all_or_nothing() {
    let batch = vec![
        PatchOp::create(path("/root"), "Node2D", "A"),
        PatchOp::create(path("/root"), "Node2D", "B"),
        PatchOp::set_property(path("/root/A"), "rotation", json!(1.5)),
        PatchOp::delete(path("/root/DoesNotExist")),
    ];

    let mut strict = scene(&[]);
    let report = apply_patch(&mut strict, &batch, ApplyMode::Strict);
    assert_eq!(report.applied, 0);
    assert!(report.rolled_back);
    assert_eq!(strict.len(), 1);

    let mut lenient = scene(&[]);
    let report = apply_patch(&mut lenient, &batch, ApplyMode::Lenient);
    assert_eq!(report.applied, 3);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].index, 3);
    assert_eq!(lenient.len(), 3);
}

#[test]
fn applying_a_diff_reaches_the_desired_tree() {
    let mut tree = scene(&[("B", "Node2D"), ("A", "Node2D"), ("Old", "Timer")]);
    let desired = DesiredNode::new("root").with_children(vec![
        DesiredNode::new("A")
            .with_type("Node2D")
            .with_property("position", json!({ "x": 1.0, "y": 2.0 })),
        DesiredNode::new("B").with_type("Node2D").child(
            DesiredNode::new("Label")
                .with_type("Label")
                .with_property("text", json!("hi")),
        ),
        DesiredNode::new("C").with_type("Sprite2D"),
    ]);
    let options = DiffOptions {
        allow_delete: true,
        reorder_children: true,
        ..DiffOptions::default()
    };

    let outcome = generate(&mut tree, &desired, &options);
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    let report = apply_patch(&mut tree, &outcome.operations, ApplyMode::Strict);
    assert!(report.is_complete(), "{report:?}");

    let after = tree.snapshot(&SnapshotOptions::full());
    assert_eq!(names(&after), vec!["A", "B", "C"]);
    let label = after.find(&path("/root/B/Label")).expect("label");
    assert_eq!(label.type_name, "Label");
    assert_eq!(
        label.properties.as_ref().and_then(|props| props.get("text")),
        Some(&json!("hi"))
    );

    let again = diff(&after, &desired, &options);
    assert!(again.is_noop(), "{again:?}");
}

#[test]
fn reorder_moves_only_out_of_place_children() {
    let mut tree = scene(&[("B", "Node"), ("A", "Node"), ("C", "Node")]);
    let snapshot = tree.snapshot(&SnapshotOptions::with_ids());
    let desired = DesiredNode::new("root").with_children(vec![
        DesiredNode::new("A"),
        DesiredNode::new("B"),
        DesiredNode::new("C"),
    ]);
    let options = DiffOptions {
        reorder_children: true,
        ..DiffOptions::default()
    };

    let outcome = diff(&snapshot, &desired, &options);
    assert_eq!(
        outcome.operations,
        vec![PatchOp::reparent(path("/root/A"), path("/root"), Some(0))]
    );
}

#[test]
fn ambiguous_siblings_are_never_renamed() {
    let mut tree = scene(&[("Left", "Sprite2D"), ("Right", "Sprite2D")]);
    let snapshot = tree.snapshot(&SnapshotOptions::with_ids());
    let desired = DesiredNode::new("root")
        .with_children(vec![DesiredNode::new("Center").with_type("Sprite2D")]);

    let outcome = diff(&snapshot, &desired, &DiffOptions::default());
    assert_eq!(
        outcome.operations,
        vec![PatchOp::create(path("/root"), "Sprite2D", "Center")]
    );
}

#[test]
fn ids_are_resolved_at_apply_time() {
    let mut tree = scene(&[("Enemy", "Node2D"), ("Arena", "Node2D")]);
    let snapshot = tree.snapshot(&SnapshotOptions::with_ids());
    let enemy = snapshot
        .find(&path("/root/Enemy"))
        .and_then(|node| node.id.clone())
        .expect("enemy id");
    let arena = snapshot
        .find(&path("/root/Arena"))
        .and_then(|node| node.id.clone())
        .expect("arena id");

    let batch = vec![
        PatchOp::RenameNode {
            target: NodeRef::by_id(enemy.clone()),
            new_name: "Boss".into(),
        },
        PatchOp::ReparentNode {
            target: NodeRef::by_id(enemy.clone()),
            new_parent: NodeRef::by_id(arena),
            index: None,
            keep_global_transform: false,
        },
        PatchOp::SetProperty {
            target: NodeRef::by_id(enemy.clone()),
            property: "rotation".to_owned(),
            value: json!(0.5),
        },
    ];
    let report = apply_patch(&mut tree, &batch, ApplyMode::Strict);
    assert!(report.is_complete(), "{report:?}");

    let key = tree.lookup_id(&enemy).expect("enemy");
    assert_eq!(tree.path_of(key), Some(path("/root/Arena/Boss")));
    assert_eq!(
        tree.node(key).and_then(|node| node.property("rotation")),
        Some(&json!(0.5))
    );
}
