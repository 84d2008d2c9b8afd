// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::{BTreeMap, HashMap, HashSet};

use smol_str::SmolStr;

use super::{AliasMap, DiffError, DiffOptions, DiffOutcome};
use crate::model::{
    validate_node_name, DesiredNode, NodeId, NodePath, SnapshotNode, TreeSnapshot,
    DEFAULT_NODE_TYPE,
};
use crate::ops::{NodeRef, PatchOp};

type Slot = usize;

const ROOT: Slot = 0;

#[derive(Debug)]
struct ScratchNode<'a> {
    name: SmolStr,
    type_name: SmolStr,
    live: Option<&'a SnapshotNode>,
    parent: Option<Slot>,
    children: Vec<Slot>,
    removed: bool,
}

/// Working copy of the live structure; every emitted operation is replayed on it so the
/// next operation is addressed by paths that are valid at the point it runs.
#[derive(Debug)]
struct Scratch<'a> {
    nodes: Vec<ScratchNode<'a>>,
    by_id: HashMap<&'a NodeId, Slot>,
}

impl<'a> Scratch<'a> {
    fn from_snapshot(snapshot: &'a TreeSnapshot) -> Self {
        let mut scratch = Self {
            nodes: Vec::with_capacity(snapshot.len()),
            by_id: HashMap::new(),
        };
        scratch.push_live(&snapshot.root, None);
        scratch
    }

    fn push_live(&mut self, node: &'a SnapshotNode, parent: Option<Slot>) -> Slot {
        let slot = self.nodes.len();
        self.nodes.push(ScratchNode {
            name: node.name.clone(),
            type_name: node.type_name.clone(),
            live: Some(node),
            parent,
            children: Vec::with_capacity(node.children.len()),
            removed: false,
        });
        if let Some(id) = node.id.as_ref() {
            self.by_id.insert(id, slot);
        }
        for child in &node.children {
            let child_slot = self.push_live(child, Some(slot));
            self.nodes[slot].children.push(child_slot);
        }
        slot
    }

    fn path(&self, slot: Slot) -> NodePath {
        let mut names = Vec::new();
        let mut current = Some(slot);
        while let Some(node) = current {
            names.push(self.nodes[node].name.clone());
            current = self.nodes[node].parent;
        }
        names.reverse();
        NodePath::from_segments(true, names)
    }

    fn children(&self, slot: Slot) -> &[Slot] {
        &self.nodes[slot].children
    }

    fn child_named(&self, parent: Slot, name: &str) -> Option<Slot> {
        self.nodes[parent]
            .children
            .iter()
            .copied()
            .find(|child| self.nodes[*child].name == name)
    }

    fn index_of(&self, slot: Slot) -> Option<usize> {
        let parent = self.nodes[slot].parent?;
        self.nodes[parent]
            .children
            .iter()
            .position(|child| *child == slot)
    }

    fn subtree(&self, slot: Slot) -> Vec<Slot> {
        let mut out = Vec::new();
        let mut stack = vec![slot];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.nodes[current].children.iter().rev().copied());
        }
        out
    }

    fn is_ancestor_or_self(&self, ancestor: Slot, slot: Slot) -> bool {
        let mut current = Some(slot);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.nodes[node].parent;
        }
        false
    }

    fn rename(&mut self, slot: Slot, name: &SmolStr) {
        self.nodes[slot].name = name.clone();
    }

    fn move_to(&mut self, slot: Slot, parent: Slot, index: Option<usize>) {
        if let Some(old_parent) = self.nodes[slot].parent {
            self.nodes[old_parent].children.retain(|child| *child != slot);
        }
        let children = &mut self.nodes[parent].children;
        let index = index.unwrap_or(children.len()).min(children.len());
        children.insert(index, slot);
        self.nodes[slot].parent = Some(parent);
    }

    fn remove(&mut self, slot: Slot) {
        if let Some(parent) = self.nodes[slot].parent {
            self.nodes[parent].children.retain(|child| *child != slot);
        }
        for node in self.subtree(slot) {
            self.nodes[node].removed = true;
        }
    }

    fn create(&mut self, parent: Slot, name: SmolStr, type_name: SmolStr) -> Slot {
        let slot = self.nodes.len();
        self.nodes.push(ScratchNode {
            name,
            type_name,
            live: None,
            parent: Some(parent),
            children: Vec::new(),
            removed: false,
        });
        self.nodes[parent].children.push(slot);
        slot
    }
}

pub(super) struct Differ<'a> {
    options: &'a DiffOptions,
    scratch: Scratch<'a>,
    /// Valid pins: desired ids that occur once and name a live non-root node.
    pins: HashMap<NodeId, Slot>,
    pinned: HashSet<Slot>,
    placed: HashSet<Slot>,
    deferred: Vec<Slot>,
    operations: Vec<PatchOp>,
    errors: Vec<DiffError>,
    aliases: AliasMap,
}

impl<'a> Differ<'a> {
    pub(super) fn new(live: &'a TreeSnapshot, options: &'a DiffOptions) -> Self {
        Self {
            options,
            scratch: Scratch::from_snapshot(live),
            pins: HashMap::new(),
            pinned: HashSet::new(),
            placed: HashSet::new(),
            deferred: Vec::new(),
            operations: Vec::new(),
            errors: Vec::new(),
            aliases: AliasMap::default(),
        }
    }

    pub(super) fn run(mut self, desired: &DesiredNode) -> DiffOutcome {
        self.collect_pins(desired);

        let root = ROOT;
        self.placed.insert(root);
        if desired.name != self.scratch.nodes[root].name {
            match validate_node_name(&desired.name) {
                Ok(()) => self.rename(root, &desired.name),
                Err(reason) => self.errors.push(DiffError::InvalidName {
                    name: desired.name.clone(),
                    reason,
                }),
            }
        }
        if self.check_type(root, desired) {
            self.update(root, desired);
        }

        for slot in std::mem::take(&mut self.deferred) {
            if self.scratch.nodes[slot].removed || self.placed.contains(&slot) {
                continue;
            }
            if !self.holds_unplaced_pin(slot) {
                self.delete(slot);
            }
        }

        DiffOutcome {
            operations: self.operations,
            errors: self.errors,
            aliases: self.aliases,
        }
    }

    fn collect_pins(&mut self, desired: &DesiredNode) {
        let mut counts: BTreeMap<&NodeId, usize> = BTreeMap::new();
        let mut stack: Vec<&DesiredNode> = desired.children.iter().flatten().collect();
        while let Some(node) = stack.pop() {
            if let Some(id) = node.id.as_ref() {
                *counts.entry(id).or_default() += 1;
            }
            stack.extend(node.children.iter().flatten());
        }

        if let Some(id) = desired.id.as_ref() {
            match self.scratch.by_id.get(id) {
                Some(&ROOT) => {}
                Some(_) => self.errors.push(DiffError::PinnedRoot { id: id.clone() }),
                None => self.errors.push(DiffError::UnknownId { id: id.clone() }),
            }
        }

        for (id, count) in counts {
            if count > 1 {
                self.errors.push(DiffError::DuplicateId { id: id.clone() });
                continue;
            }
            match self.scratch.by_id.get(id).copied() {
                Some(ROOT) => self.errors.push(DiffError::PinnedRoot { id: id.clone() }),
                Some(slot) => {
                    self.pins.insert(id.clone(), slot);
                    self.pinned.insert(slot);
                }
                None => self.errors.push(DiffError::UnknownId { id: id.clone() }),
            }
        }
    }

    fn pin_of(&self, desired: &DesiredNode) -> Option<Slot> {
        desired.id.as_ref().and_then(|id| self.pins.get(id).copied())
    }

    fn holds_unplaced_pin(&self, slot: Slot) -> bool {
        self.scratch
            .subtree(slot)
            .into_iter()
            .any(|node| self.pinned.contains(&node) && !self.placed.contains(&node))
    }

    /// Reconciles the children of `parent` with `desired.children`.
    fn reconcile_children(&mut self, parent: Slot, desired: &DesiredNode) {
        let Some(wanted) = desired.children.as_ref() else {
            return;
        };
        let mut matches: Vec<Option<Slot>> = vec![None; wanted.len()];
        let mut claimed: HashSet<Slot> = HashSet::new();

        for (slot_match, node) in matches.iter_mut().zip(wanted) {
            if let Some(slot) = self.pin_of(node) {
                if !self.placed.contains(&slot) {
                    *slot_match = Some(slot);
                    claimed.insert(slot);
                }
            }
        }

        for (slot_match, node) in matches.iter_mut().zip(wanted) {
            if slot_match.is_some() || self.pin_of(node).is_some() {
                continue;
            }
            let Some(slot) = self.scratch.child_named(parent, &node.name) else {
                continue;
            };
            if claimed.contains(&slot) || self.pinned.contains(&slot) || self.placed.contains(&slot)
            {
                continue;
            }
            *slot_match = Some(slot);
            claimed.insert(slot);
        }

        let wanted_names: HashSet<&str> = wanted.iter().map(|node| node.name.as_str()).collect();
        if self.options.detect_renames {
            let renames = self.detect_renames(parent, wanted, &matches, &claimed, &wanted_names);
            for (position, slot) in renames {
                matches[position] = Some(slot);
                claimed.insert(slot);
            }
        }

        let mut order: Vec<Option<Slot>> = Vec::with_capacity(wanted.len());
        for (node, slot_match) in wanted.iter().zip(matches) {
            let slot = match slot_match {
                Some(slot) => self.place(slot, parent, node),
                None => self.create(parent, node),
            };
            order.push(slot);
        }

        if self.options.allow_delete {
            let current: Vec<Slot> = self.scratch.children(parent).to_vec();
            for child in current {
                let name = self.scratch.nodes[child].name.clone();
                if self.placed.contains(&child)
                    || self.pinned.contains(&child)
                    || wanted_names.contains(name.as_str())
                {
                    continue;
                }
                if self.holds_unplaced_pin(child) {
                    self.deferred.push(child);
                } else {
                    self.delete(child);
                }
            }
        }

        if self.options.reorder_children {
            self.reorder(parent, &order);
        }
    }

    /// Unmatched desired children that have exactly one structural candidate, which in turn
    /// is wanted by nobody else.
    fn detect_renames(
        &self,
        parent: Slot,
        wanted: &[DesiredNode],
        matches: &[Option<Slot>],
        claimed: &HashSet<Slot>,
        wanted_names: &HashSet<&str>,
    ) -> Vec<(usize, Slot)> {
        let free: Vec<Slot> = self
            .scratch
            .children(parent)
            .iter()
            .copied()
            .filter(|slot| {
                let node = &self.scratch.nodes[*slot];
                !claimed.contains(slot)
                    && !self.pinned.contains(slot)
                    && !self.placed.contains(slot)
                    && !wanted_names.contains(node.name.as_str())
            })
            .collect();

        let mut candidates: Vec<(usize, Vec<Slot>)> = Vec::new();
        let mut demand: HashMap<Slot, usize> = HashMap::new();
        for (position, node) in wanted.iter().enumerate() {
            if matches[position].is_some() || self.pin_of(node).is_some() {
                continue;
            }
            let Some(type_name) = node.type_name.as_ref() else {
                continue;
            };
            let fits: Vec<Slot> = free
                .iter()
                .copied()
                .filter(|slot| {
                    let live = &self.scratch.nodes[*slot];
                    live.type_name == *type_name
                        && node
                            .children
                            .as_ref()
                            .map_or(true, |children| children.len() == live.children.len())
                })
                .collect();
            for slot in &fits {
                *demand.entry(*slot).or_default() += 1;
            }
            candidates.push((position, fits));
        }

        candidates
            .into_iter()
            .filter_map(|(position, fits)| match fits.as_slice() {
                [slot] if demand.get(slot) == Some(&1) => Some((position, *slot)),
                _ => None,
            })
            .collect()
    }

    /// Brings a matched live node to `parent` under the desired name, then diffs it.
    fn place(&mut self, slot: Slot, parent: Slot, desired: &DesiredNode) -> Option<Slot> {
        self.placed.insert(slot);

        let moving = self.scratch.nodes[slot].parent != Some(parent);
        if moving && self.scratch.is_ancestor_or_self(slot, parent) {
            let id = desired.id.clone().or_else(|| {
                self.scratch.nodes[slot]
                    .live
                    .and_then(|live| live.id.clone())
            });
            if let Some(id) = id {
                self.errors.push(DiffError::PinnedIntoOwnSubtree {
                    id,
                    path: self.scratch.path(slot),
                });
            }
            return None;
        }

        if !self.check_type(slot, desired) {
            return Some(slot);
        }

        let mut target_name = self.scratch.nodes[slot].name.clone();
        if target_name != desired.name {
            match validate_node_name(&desired.name) {
                Ok(()) => target_name = desired.name.clone(),
                Err(reason) => self.errors.push(DiffError::InvalidName {
                    name: desired.name.clone(),
                    reason,
                }),
            }
        }

        if !moving {
            if target_name != self.scratch.nodes[slot].name {
                if let Some(current_parent) = self.scratch.nodes[slot].parent {
                    if self.collides(current_parent, &target_name, slot) {
                        self.errors.push(DiffError::NameCollision {
                            parent: self.scratch.path(current_parent),
                            name: target_name,
                        });
                    } else {
                        self.rename(slot, &target_name);
                    }
                }
            }
            self.update(slot, desired);
            return Some(slot);
        }

        if self.collides(parent, &target_name, slot) {
            self.errors.push(DiffError::NameCollision {
                parent: self.scratch.path(parent),
                name: target_name,
            });
            return None;
        }

        // Rename in the old parent, then move. When a sibling left behind still holds the
        // target name, move first and rename under the new parent instead.
        let current_name = self.scratch.nodes[slot].name.clone();
        let blocked_at_home = self.scratch.nodes[slot]
            .parent
            .map_or(true, |current_parent| {
                self.collides(current_parent, &target_name, slot)
            });
        if current_name == target_name {
            self.reparent(slot, parent);
        } else if !blocked_at_home {
            self.rename(slot, &target_name);
            self.reparent(slot, parent);
        } else if !self.collides(parent, &current_name, slot) {
            self.reparent(slot, parent);
            self.rename(slot, &target_name);
        } else {
            self.errors.push(DiffError::NameCollision {
                parent: self.scratch.path(parent),
                name: current_name,
            });
            return None;
        }

        self.update(slot, desired);
        Some(slot)
    }

    fn collides(&self, parent: Slot, name: &str, except: Slot) -> bool {
        self.scratch
            .child_named(parent, name)
            .is_some_and(|existing| existing != except)
    }

    /// Records a type mismatch; returns `false` when the subtree must not be diffed further.
    fn check_type(&mut self, slot: Slot, desired: &DesiredNode) -> bool {
        let Some(expected) = desired.type_name.as_ref() else {
            return true;
        };
        let found = &self.scratch.nodes[slot].type_name;
        if found == expected {
            return true;
        }
        let fatal = self.options.strict_types;
        self.errors.push(DiffError::TypeMismatch {
            path: self.scratch.path(slot),
            expected: expected.clone(),
            found: found.clone(),
            fatal,
        });
        !fatal
    }

    fn reparent(&mut self, slot: Slot, parent: Slot) {
        let old = self.scratch.path(slot);
        self.operations.push(PatchOp::ReparentNode {
            target: NodeRef::by_path(old.clone()),
            new_parent: NodeRef::by_path(self.scratch.path(parent)),
            index: None,
            keep_global_transform: false,
        });
        self.scratch.move_to(slot, parent, None);
        self.aliases.record_move(&old, &self.scratch.path(slot));
    }

    fn rename(&mut self, slot: Slot, new_name: &SmolStr) {
        let old = self.scratch.path(slot);
        self.operations.push(PatchOp::RenameNode {
            target: NodeRef::by_path(old.clone()),
            new_name: new_name.clone(),
        });
        self.scratch.rename(slot, new_name);
        self.aliases.record_move(&old, &self.scratch.path(slot));
    }

    /// Emits the desired properties of a matched node, then recurses into its children.
    fn update(&mut self, slot: Slot, desired: &DesiredNode) {
        if !desired.properties.is_empty() {
            let path = self.scratch.path(slot);
            for (property, value) in &desired.properties {
                self.operations.push(PatchOp::SetProperty {
                    target: NodeRef::by_path(path.clone()),
                    property: property.clone(),
                    value: value.clone(),
                });
            }
        }
        self.reconcile_children(slot, desired);
    }

    fn create(&mut self, parent: Slot, desired: &DesiredNode) -> Option<Slot> {
        if let Err(reason) = validate_node_name(&desired.name) {
            self.errors.push(DiffError::InvalidName {
                name: desired.name.clone(),
                reason,
            });
            return None;
        }
        if self.scratch.child_named(parent, &desired.name).is_some() {
            self.errors.push(DiffError::NameCollision {
                parent: self.scratch.path(parent),
                name: desired.name.clone(),
            });
            return None;
        }

        let type_name = desired
            .type_name
            .clone()
            .unwrap_or_else(|| SmolStr::new(DEFAULT_NODE_TYPE));
        self.operations.push(PatchOp::CreateNode {
            parent: NodeRef::by_path(self.scratch.path(parent)),
            type_name: type_name.clone(),
            name: desired.name.clone(),
            properties: desired.properties.clone(),
        });
        let slot = self.scratch.create(parent, desired.name.clone(), type_name);
        self.placed.insert(slot);
        self.reconcile_children(slot, desired);
        Some(slot)
    }

    /// Deletes a subtree, children before parents.
    fn delete(&mut self, slot: Slot) {
        let mut doomed = self.scratch.subtree(slot);
        doomed.reverse();
        for node in doomed {
            self.operations.push(PatchOp::DeleteNode {
                target: NodeRef::by_path(self.scratch.path(node)),
            });
        }
        self.scratch.remove(slot);
    }

    fn reorder(&mut self, parent: Slot, order: &[Option<Slot>]) {
        let mut position = 0;
        for slot in order.iter().flatten().copied() {
            if self.scratch.nodes[slot].parent != Some(parent) || self.scratch.nodes[slot].removed {
                continue;
            }
            if self.scratch.index_of(slot) != Some(position) {
                self.operations.push(PatchOp::ReparentNode {
                    target: NodeRef::by_path(self.scratch.path(slot)),
                    new_parent: NodeRef::by_path(self.scratch.path(parent)),
                    index: Some(position),
                    keep_global_transform: false,
                });
                self.scratch.move_to(slot, parent, Some(position));
            }
            position += 1;
        }
    }
}
