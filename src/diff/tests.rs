// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeMap;
use std::sync::Arc;

use rstest::rstest;
use serde_json::json;

use super::{diff, generate, DiffError, DiffOptions};
use crate::model::fixtures::{demo_scene, flat_scene};
use crate::model::{
    DesiredNode, NodeId, NodePath, SceneTree, SnapshotOptions, TreeSnapshot, TypeRegistry,
};
use crate::ops::{apply_patch, ApplyMode, PatchOp};

fn path(raw: &str) -> NodePath {
    NodePath::parse(raw).expect("path")
}

fn full(tree: &mut SceneTree) -> TreeSnapshot {
    tree.snapshot(&SnapshotOptions::full())
}

fn id_at(snapshot: &TreeSnapshot, raw: &str) -> NodeId {
    snapshot
        .find(&path(raw))
        .and_then(|node| node.id.clone())
        .expect("snapshot id")
}

fn player_scene() -> SceneTree {
    let mut tree = SceneTree::new("root", "Node", Arc::new(TypeRegistry::builtin())).expect("root");
    let root = tree.root();
    tree.add_child(root, "Player", "Node2D", BTreeMap::new())
        .expect("player");
    tree
}

fn typed_scene(children: &[(&str, &str)]) -> SceneTree {
    let mut tree = SceneTree::new("root", "Node", Arc::new(TypeRegistry::builtin())).expect("root");
    let root = tree.root();
    for (name, type_name) in children {
        tree.add_child(root, name, type_name, BTreeMap::new())
            .expect("child");
    }
    tree
}

fn child_names(tree: &SceneTree) -> Vec<String> {
    tree.root_node()
        .children()
        .iter()
        .filter_map(|key| tree.node(*key).map(|node| node.name().to_owned()))
        .collect()
}

#[test]
fn diff_of_a_tree_against_itself_is_empty() {
    let mut tree = demo_scene();
    let snapshot = full(&mut tree);
    let desired = DesiredNode::from_snapshot(&snapshot.root);

    let options = DiffOptions {
        allow_delete: true,
        reorder_children: true,
        strict_types: true,
        ..DiffOptions::default()
    };
    let outcome = diff(&snapshot, &desired, &options);

    assert!(outcome.is_noop(), "{outcome:?}");
    assert!(outcome.aliases.is_empty());
}

#[test]
fn pinned_node_is_renamed_then_moved_under_new_parent() {
    let mut tree = player_scene();
    let snapshot = full(&mut tree);
    let player = id_at(&snapshot, "/root/Player");

    let desired = DesiredNode::new("root").child(
        DesiredNode::new("UI")
            .with_type("Control")
            .child(DesiredNode::new("Hero").with_id(player).with_type("Node2D")),
    );
    let outcome = diff(&snapshot, &desired, &DiffOptions::default());

    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    assert_eq!(
        outcome.operations,
        vec![
            PatchOp::create(path("/root"), "Control", "UI"),
            PatchOp::rename(path("/root/Player"), "Hero"),
            PatchOp::reparent(path("/root/Hero"), path("/root/UI"), None),
        ]
    );
    assert_eq!(outcome.aliases.resolve(&path("/root/Player")), path("/root/UI/Hero"));
    assert_eq!(
        outcome.aliases.original_of(&path("/root/UI/Hero")),
        path("/root/Player")
    );
}

#[test]
fn moved_node_takes_a_name_still_used_by_a_sibling_it_leaves() {
    let mut tree = typed_scene(&[("Player", "Node2D"), ("Hero", "Node2D")]);
    let snapshot = full(&mut tree);
    let player = id_at(&snapshot, "/root/Player");

    let desired = DesiredNode::new("root").with_children(vec![
        DesiredNode::new("Hero").with_type("Node2D"),
        DesiredNode::new("UI").child(
            DesiredNode::new("Hero")
                .with_id(player.clone())
                .with_type("Node2D"),
        ),
    ]);
    let outcome = diff(&snapshot, &desired, &DiffOptions::default());

    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    assert_eq!(
        outcome.operations,
        vec![
            PatchOp::create(path("/root"), "Node", "UI"),
            PatchOp::reparent(path("/root/Player"), path("/root/UI"), None),
            PatchOp::rename(path("/root/UI/Player"), "Hero"),
        ]
    );
    assert_eq!(outcome.aliases.resolve(&path("/root/Player")), path("/root/UI/Hero"));

    let report = apply_patch(&mut tree, &outcome.operations, ApplyMode::Strict);
    assert!(report.is_complete(), "{report:?}");
    let key = tree.lookup_id(&player).expect("id still bound");
    assert_eq!(tree.path_of(key), Some(path("/root/UI/Hero")));
    assert_eq!(child_names(&tree), ["Hero", "UI"]);
}

#[test]
fn moved_node_blocked_under_both_parents_is_a_collision() {
    let mut tree = typed_scene(&[("Player", "Node2D"), ("Hero", "Node2D"), ("UI", "Control")]);
    let ui = tree.root_node().children()[2];
    tree.add_child(ui, "Player", "Node2D", BTreeMap::new())
        .expect("ui player");
    let snapshot = full(&mut tree);
    let player = id_at(&snapshot, "/root/Player");

    let desired = DesiredNode::new("root").with_children(vec![
        DesiredNode::new("Hero").with_type("Node2D"),
        DesiredNode::new("UI").with_type("Control").with_children(vec![
            DesiredNode::new("Player").with_type("Node2D"),
            DesiredNode::new("Hero").with_id(player).with_type("Node2D"),
        ]),
    ]);
    let outcome = diff(&snapshot, &desired, &DiffOptions::default());

    assert!(outcome.operations.is_empty(), "{:?}", outcome.operations);
    assert!(matches!(
        outcome.errors.as_slice(),
        [DiffError::NameCollision { parent, name }]
            if parent == &path("/root/UI") && name == "Player"
    ));
}

#[test]
fn unique_structural_candidate_is_renamed() {
    let mut tree = player_scene();
    let snapshot = full(&mut tree);
    let desired = DesiredNode::new("root").child(DesiredNode::new("Hero").with_type("Node2D"));

    let outcome = diff(&snapshot, &desired, &DiffOptions::default());

    assert_eq!(
        outcome.operations,
        vec![PatchOp::rename(path("/root/Player"), "Hero")]
    );
}

#[test]
fn ambiguous_rename_candidates_are_left_alone() {
    let mut tree = typed_scene(&[("A", "Node2D"), ("B", "Node2D")]);
    let snapshot = full(&mut tree);
    let desired = DesiredNode::new("root")
        .with_children(vec![DesiredNode::new("C").with_type("Node2D")]);

    let outcome = diff(&snapshot, &desired, &DiffOptions::default());

    assert_eq!(
        outcome.operations,
        vec![PatchOp::create(path("/root"), "Node2D", "C")]
    );
}

#[test]
fn candidate_wanted_by_two_desired_nodes_is_not_renamed() {
    let mut tree = typed_scene(&[("A", "Node2D")]);
    let snapshot = full(&mut tree);
    let desired = DesiredNode::new("root").with_children(vec![
        DesiredNode::new("B").with_type("Node2D"),
        DesiredNode::new("C").with_type("Node2D"),
    ]);

    let outcome = diff(&snapshot, &desired, &DiffOptions::default());

    assert!(outcome
        .operations
        .iter()
        .all(|op| matches!(op, PatchOp::CreateNode { .. })));
    assert_eq!(outcome.operations.len(), 2);
}

#[test]
fn rename_detection_needs_type_and_matching_child_count() {
    let mut tree = demo_scene();
    let snapshot = full(&mut tree);

    let untyped = DesiredNode::new("root").child(DesiredNode::new("Hero"));
    let outcome = diff(&snapshot, &untyped, &DiffOptions::default());
    assert_eq!(
        outcome.operations,
        vec![PatchOp::create(path("/root"), "Node", "Hero")]
    );

    let wrong_count = DesiredNode::new("root").child(
        DesiredNode::new("Hero")
            .with_type("CharacterBody2D")
            .with_children(Vec::new()),
    );
    let outcome = diff(&snapshot, &wrong_count, &DiffOptions::default());
    assert!(matches!(outcome.operations[0], PatchOp::CreateNode { .. }));

    let disabled = DiffOptions {
        detect_renames: false,
        ..DiffOptions::default()
    };
    let typed =
        DesiredNode::new("root").child(DesiredNode::new("Hero").with_type("CharacterBody2D"));
    let outcome = diff(&snapshot, &typed, &disabled);
    assert!(matches!(outcome.operations[0], PatchOp::CreateNode { .. }));
}

#[test]
fn name_match_wins_over_rename_detection() {
    let mut tree = typed_scene(&[("A", "Node2D"), ("B", "Node2D")]);
    let snapshot = full(&mut tree);
    let desired = DesiredNode::new("root").with_children(vec![
        DesiredNode::new("B").with_type("Node2D"),
        DesiredNode::new("Z").with_type("Node2D"),
    ]);

    let outcome = diff(&snapshot, &desired, &DiffOptions::default());

    assert_eq!(outcome.operations, vec![PatchOp::rename(path("/root/A"), "Z")]);
}

#[test]
fn type_mismatch_is_a_warning_unless_strict() {
    let mut tree = demo_scene();
    let snapshot = full(&mut tree);
    let desired = DesiredNode::new("root").child(
        DesiredNode::new("Camera")
            .with_type("Node3D")
            .with_property("enabled", json!(false)),
    );

    let lenient = diff(&snapshot, &desired, &DiffOptions::default());
    assert_eq!(lenient.errors.len(), 1);
    assert!(lenient.errors[0].is_warning());
    assert_eq!(lenient.operations.len(), 1);

    let strict = DiffOptions {
        strict_types: true,
        ..DiffOptions::default()
    };
    let outcome = diff(&snapshot, &desired, &strict);
    assert!(matches!(
        outcome.errors[0],
        DiffError::TypeMismatch { fatal: true, .. }
    ));
    assert!(outcome.has_errors());
    assert!(outcome.operations.is_empty());
}

#[test]
fn strict_type_mismatch_does_not_stop_siblings() {
    let mut tree = demo_scene();
    let snapshot = full(&mut tree);
    let desired = DesiredNode::new("root").with_children(vec![
        DesiredNode::new("Camera")
            .with_type("Label")
            .with_property("text", json!("x")),
        DesiredNode::new("HUD").with_property("layer", json!(4)),
    ]);
    let strict = DiffOptions {
        strict_types: true,
        ..DiffOptions::default()
    };

    let outcome = diff(&snapshot, &desired, &strict);

    assert_eq!(
        outcome.operations,
        vec![PatchOp::set_property(path("/root/HUD"), "layer", json!(4))]
    );
}

#[test]
fn deletes_are_opt_in_and_children_go_first() {
    let mut tree = demo_scene();
    let snapshot = full(&mut tree);
    let desired = DesiredNode::new("root").with_children(vec![
        DesiredNode::new("Camera"),
        DesiredNode::new("HUD"),
    ]);

    let keep = diff(&snapshot, &desired, &DiffOptions::default());
    assert!(keep.operations.is_empty());

    let delete = DiffOptions {
        allow_delete: true,
        ..DiffOptions::default()
    };
    let outcome = diff(&snapshot, &desired, &delete);
    assert_eq!(
        outcome.operations,
        vec![
            PatchOp::delete(path("/root/Player/Sprite")),
            PatchOp::delete(path("/root/Player")),
        ]
    );
}

#[test]
fn missing_children_list_leaves_live_children_alone() {
    let mut tree = demo_scene();
    let snapshot = full(&mut tree);
    let desired = DesiredNode::new("root").with_children(vec![
        DesiredNode::new("Player"),
        DesiredNode::new("Camera"),
        DesiredNode::new("HUD"),
    ]);
    let delete = DiffOptions {
        allow_delete: true,
        ..DiffOptions::default()
    };

    assert!(diff(&snapshot, &desired, &delete).operations.is_empty());
}

#[test]
fn pinned_nodes_survive_deletion_of_their_old_parent() {
    let mut tree = demo_scene();
    let snapshot = full(&mut tree);
    let sprite = id_at(&snapshot, "/root/Player/Sprite");
    let desired = DesiredNode::new("root").with_children(vec![
        DesiredNode::new("Camera"),
        DesiredNode::new("HUD").with_children(vec![
            DesiredNode::new("Score"),
            DesiredNode::new("Sprite").with_id(sprite),
        ]),
    ]);
    let delete = DiffOptions {
        allow_delete: true,
        ..DiffOptions::default()
    };

    let outcome = diff(&snapshot, &desired, &delete);

    assert_eq!(
        outcome.operations,
        vec![
            PatchOp::reparent(path("/root/Player/Sprite"), path("/root/HUD"), None),
            PatchOp::delete(path("/root/Player")),
        ]
    );
}

#[test]
fn deletion_waits_for_pins_placed_later() {
    let mut tree = typed_scene(&[("A", "Node"), ("B", "Node")]);
    let a = tree.lookup(&path("/root/A")).expect("a");
    let old = tree.add_child(a, "Old", "Node", BTreeMap::new()).expect("old");
    tree.add_child(old, "P", "Node2D", BTreeMap::new()).expect("p");
    let snapshot = full(&mut tree);
    let pinned = id_at(&snapshot, "/root/A/Old/P");

    let desired = DesiredNode::new("root").with_children(vec![
        DesiredNode::new("A").with_children(Vec::new()),
        DesiredNode::new("B").child(DesiredNode::new("P").with_id(pinned)),
    ]);
    let delete = DiffOptions {
        allow_delete: true,
        ..DiffOptions::default()
    };

    let outcome = diff(&snapshot, &desired, &delete);

    assert_eq!(
        outcome.operations,
        vec![
            PatchOp::reparent(path("/root/A/Old/P"), path("/root/B"), None),
            PatchOp::delete(path("/root/A/Old")),
        ]
    );
}

#[rstest]
#[case::swap_front(&["B", "A", "C"], &["A", "B", "C"], 1)]
#[case::already_sorted(&["A", "B", "C"], &["A", "B", "C"], 0)]
#[case::rotate(&["C", "A", "B"], &["A", "B", "C"], 2)]
#[case::reverse(&["C", "B", "A"], &["A", "B", "C"], 2)]
fn reorder_emits_only_needed_moves(
    #[case] live: &[&str],
    #[case] wanted: &[&str],
    #[case] expected_moves: usize,
) {
    let mut tree = flat_scene(live);
    let snapshot = full(&mut tree);
    let desired = DesiredNode::new("root")
        .with_children(wanted.iter().map(|name| DesiredNode::new(*name)).collect());
    let options = DiffOptions {
        reorder_children: true,
        ..DiffOptions::default()
    };

    let outcome = diff(&snapshot, &desired, &options);

    assert_eq!(outcome.operations.len(), expected_moves, "{:?}", outcome.operations);
    assert!(outcome.operations.iter().all(|op| matches!(
        op,
        PatchOp::ReparentNode { index: Some(_), keep_global_transform: false, .. }
    )));

    let report = apply_patch(&mut tree, &outcome.operations, ApplyMode::Strict);
    assert!(report.is_complete());
    assert_eq!(child_names(&tree), wanted);
}

#[test]
fn reorder_swap_moves_the_first_child_to_index_zero() {
    let mut tree = flat_scene(&["B", "A", "C"]);
    let snapshot = full(&mut tree);
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
fn unchanged_properties_are_skipped_by_default() {
    let mut tree = demo_scene();
    let snapshot = full(&mut tree);
    let desired = DesiredNode::new("root").child(
        DesiredNode::new("Player")
            .with_property("position", json!([10, 20]))
            .with_property("velocity", json!({"y": 0, "x": 3})),
    );

    let outcome = diff(&snapshot, &desired, &DiffOptions::default());
    assert_eq!(
        outcome.operations,
        vec![PatchOp::set_property(
            path("/root/Player"),
            "velocity",
            json!({"y": 0, "x": 3})
        )]
    );

    let keep_all = DiffOptions {
        skip_unchanged: false,
        ..DiffOptions::default()
    };
    assert_eq!(diff(&snapshot, &desired, &keep_all).operations.len(), 2);
}

#[test]
fn unknown_and_duplicate_pins_are_identity_errors() {
    let mut tree = demo_scene();
    let snapshot = full(&mut tree);
    let camera = id_at(&snapshot, "/root/Camera");
    let ghost = NodeId::new("n-ghost").expect("id");
    let desired = DesiredNode::new("root").with_children(vec![
        DesiredNode::new("Camera").with_id(camera.clone()),
        DesiredNode::new("Cam2").with_id(camera.clone()),
        DesiredNode::new("HUD").with_id(ghost.clone()),
    ]);

    let outcome = diff(&snapshot, &desired, &DiffOptions::default());

    assert!(outcome.errors.contains(&DiffError::DuplicateId { id: camera }));
    assert!(outcome.errors.contains(&DiffError::UnknownId { id: ghost }));
    assert!(outcome.errors.iter().all(|err| err.kind() == "identity"));
    assert_eq!(
        outcome.operations,
        vec![PatchOp::create(path("/root"), "Node", "Cam2")]
    );
}

#[test]
fn rename_into_an_existing_sibling_is_reported() {
    let mut tree = typed_scene(&[("A", "Node2D"), ("B", "Node")]);
    let snapshot = full(&mut tree);
    let a = id_at(&snapshot, "/root/A");
    let desired = DesiredNode::new("root").child(DesiredNode::new("B").with_id(a));

    let outcome = diff(&snapshot, &desired, &DiffOptions::default());

    assert!(outcome.operations.is_empty());
    assert!(matches!(
        outcome.errors.as_slice(),
        [DiffError::NameCollision { name, .. }] if name == "B"
    ));
}

#[test]
fn root_is_renamed_in_place() {
    let mut tree = demo_scene();
    let snapshot = full(&mut tree);
    let desired = DesiredNode::new("Level").child(
        DesiredNode::new("Camera").with_property("enabled", json!(false)),
    );

    let outcome = diff(&snapshot, &desired, &DiffOptions::default());

    assert_eq!(
        outcome.operations,
        vec![
            PatchOp::rename(path("/root"), "Level"),
            PatchOp::set_property(path("/Level/Camera"), "enabled", json!(false)),
        ]
    );
}

#[test]
fn new_subtrees_become_nested_creates() {
    let mut tree = flat_scene(&[]);
    let snapshot = full(&mut tree);
    let desired = DesiredNode::new("root").child(
        DesiredNode::new("Menu")
            .with_type("Control")
            .child(
                DesiredNode::new("Start")
                    .with_type("Button")
                    .with_property("text", json!("Start")),
            )
            .child(DesiredNode::new("Spacer")),
    );

    let outcome = diff(&snapshot, &desired, &DiffOptions::default());

    assert_eq!(outcome.operations.len(), 3);
    let PatchOp::CreateNode {
        parent,
        type_name,
        properties,
        ..
    } = &outcome.operations[1]
    else {
        panic!("expected create_node");
    };
    assert_eq!(parent.path(), Some(&path("/root/Menu")));
    assert_eq!(type_name, "Button");
    assert_eq!(properties.get("text"), Some(&json!("Start")));
    assert!(matches!(
        &outcome.operations[2],
        PatchOp::CreateNode { type_name, .. } if type_name == "Node"
    ));
}

#[test]
fn generated_patch_reaches_the_desired_tree() {
    let mut tree = demo_scene();
    let snapshot = full(&mut tree);
    let player = id_at(&snapshot, "/root/Player");
    let desired = DesiredNode::new("root").with_children(vec![
        DesiredNode::new("HUD")
            .with_type("CanvasLayer")
            .with_children(vec![
                DesiredNode::new("Hero")
                    .with_id(player.clone())
                    .with_type("CharacterBody2D")
                    .with_property("velocity", json!([1.0, 2.0])),
                DesiredNode::new("Score").with_type("Label"),
            ]),
        DesiredNode::new("Timer").with_type("Timer"),
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

    assert_eq!(child_names(&tree), ["HUD", "Timer"]);
    let hero = tree.lookup_id(&player).expect("hero");
    assert_eq!(tree.path_of(hero), Some(path("/root/HUD/Hero")));
    assert!(generate(&mut tree, &desired, &options).is_noop());
}

#[test]
fn options_deserialize_with_defaults() {
    let options: DiffOptions = serde_json::from_str("{}").expect("options");
    assert_eq!(options, DiffOptions::default());

    let options: DiffOptions =
        serde_json::from_str(r#"{"allow_delete": true, "skip_unchanged": false}"#)
            .expect("options");
    assert!(options.allow_delete);
    assert!(options.detect_renames);
    assert!(!options.skip_unchanged);
}
