// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use smol_str::SmolStr;

use crate::identity::IdAssigner;

use super::ids::{InstanceId, NodeId};
use super::path::{validate_node_name, NameError, NodePath};
use super::schema::TypeRegistry;
use super::transaction::Transaction;

/// Metadata key of the hidden identity tag.
pub const NODE_ID_META_KEY: &str = "__scene_id";

/// Committed batches kept for `undo`.
pub const DEFAULT_HISTORY_LIMIT: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    instance_id: InstanceId,
    name: SmolStr,
    type_name: SmolStr,
    properties: BTreeMap<String, Value>,
    metadata: BTreeMap<String, Value>,
    parent: Option<InstanceId>,
    children: Vec<InstanceId>,
    owner: Option<InstanceId>,
}

impl SceneNode {
    fn new(instance_id: InstanceId, name: SmolStr, type_name: SmolStr) -> Self {
        Self {
            instance_id,
            name,
            type_name,
            properties: BTreeMap::new(),
            metadata: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
            owner: None,
        }
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    pub fn parent(&self) -> Option<InstanceId> {
        self.parent
    }

    pub fn children(&self) -> &[InstanceId] {
        &self.children
    }

    pub fn owner(&self) -> Option<InstanceId> {
        self.owner
    }

    /// The persisted identity tag, if one was assigned.
    pub fn node_id(&self) -> Option<NodeId> {
        self.metadata
            .get(NODE_ID_META_KEY)?
            .as_str()
            .and_then(|raw| raw.parse().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    UnknownNode { instance_id: InstanceId },
    InvalidName { name: String, reason: NameError },
    NameCollision { parent: NodePath, name: SmolStr },
    RootForbidden,
    Cycle { node: NodePath, new_parent: NodePath },
    IndexOutOfRange { index: usize, len: usize },
    DuplicateId { id: NodeId },
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNode { instance_id } => write!(f, "node {instance_id} does not exist"),
            Self::InvalidName { name, reason } => write!(f, "invalid node name '{name}': {reason}"),
            Self::NameCollision { parent, name } => {
                write!(f, "{parent} already has a child named '{name}'")
            }
            Self::RootForbidden => f.write_str("operation is not allowed on the tree root"),
            Self::Cycle { node, new_parent } => {
                write!(f, "cannot move {node} under its own descendant {new_parent}")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "child index {index} is out of range (children={len})")
            }
            Self::DuplicateId { id } => write!(f, "node id {id} is already in use"),
        }
    }
}

impl std::error::Error for TreeError {}

/// A subtree removed from the tree, kept so the removal can be undone.
#[derive(Debug, Clone, PartialEq)]
pub struct DetachedSubtree {
    root: InstanceId,
    parent: InstanceId,
    index: usize,
    nodes: Vec<SceneNode>,
}

impl DetachedSubtree {
    pub fn root(&self) -> InstanceId {
        self.root
    }

    pub fn parent(&self) -> InstanceId {
        self.parent
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// The authoritative live tree.
///
/// A `SceneTree` is the explicit handle threaded through snapshot, diff, resolve and apply;
/// nothing in the crate reaches for a process-wide tree.
#[derive(Debug, Clone)]
pub struct SceneTree {
    root: InstanceId,
    nodes: BTreeMap<InstanceId, SceneNode>,
    next_instance: u64,
    registry: Arc<TypeRegistry>,
    pub(crate) assigner: IdAssigner,
    pub(crate) id_index: HashMap<NodeId, InstanceId>,
    pub(crate) retired_ids: HashSet<NodeId>,
    supports_transactions: bool,
    pub(crate) history: VecDeque<Transaction>,
    history_limit: usize,
}

impl SceneTree {
    pub fn new(
        root_name: &str,
        root_type: &str,
        registry: Arc<TypeRegistry>,
    ) -> Result<Self, TreeError> {
        validate_node_name(root_name).map_err(|reason| TreeError::InvalidName {
            name: root_name.to_owned(),
            reason,
        })?;

        let root = InstanceId::from_raw(1);
        let mut nodes = BTreeMap::new();
        nodes.insert(
            root,
            SceneNode::new(root, SmolStr::new(root_name), SmolStr::new(root_type)),
        );

        Ok(Self {
            root,
            nodes,
            next_instance: 2,
            registry,
            assigner: IdAssigner::new(),
            id_index: HashMap::new(),
            retired_ids: HashSet::new(),
            supports_transactions: true,
            history: VecDeque::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        })
    }

    /// Hosts without undo/redo grouping apply every batch leniently.
    pub fn with_transactions(mut self, enabled: bool) -> Self {
        self.supports_transactions = enabled;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn supports_transactions(&self) -> bool {
        self.supports_transactions
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    pub fn root(&self) -> InstanceId {
        self.root
    }

    pub fn root_node(&self) -> &SceneNode {
        self.nodes
            .get(&self.root)
            .expect("root node is never removed")
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, key: InstanceId) -> Option<&SceneNode> {
        self.nodes.get(&key)
    }

    pub fn contains(&self, key: InstanceId) -> bool {
        self.nodes.contains_key(&key)
    }

    fn node_mut(&mut self, key: InstanceId) -> Result<&mut SceneNode, TreeError> {
        self.nodes
            .get_mut(&key)
            .ok_or(TreeError::UnknownNode { instance_id: key })
    }

    fn existing(&self, key: InstanceId) -> Result<&SceneNode, TreeError> {
        self.nodes
            .get(&key)
            .ok_or(TreeError::UnknownNode { instance_id: key })
    }

    pub fn node_id(&self, key: InstanceId) -> Option<NodeId> {
        self.nodes.get(&key).and_then(SceneNode::node_id)
    }

    pub fn lookup_id(&self, id: &NodeId) -> Option<InstanceId> {
        self.id_index.get(id).copied()
    }

    pub fn is_retired(&self, id: &NodeId) -> bool {
        self.retired_ids.contains(id)
    }

    /// Absolute path of `key`, recomputed by walking its ancestors.
    pub fn path_of(&self, key: InstanceId) -> Option<NodePath> {
        let mut names = Vec::new();
        let mut current = Some(key);
        while let Some(node_key) = current {
            let node = self.nodes.get(&node_key)?;
            names.push(node.name.clone());
            current = node.parent;
        }
        names.reverse();
        Some(NodePath::from_segments(true, names))
    }

    pub fn root_path(&self) -> NodePath {
        NodePath::from_segments(true, [self.root_node().name.clone()])
    }

    /// Normalizes a relative path against the current root name.
    pub fn absolute(&self, path: &NodePath) -> NodePath {
        path.to_absolute(self.root_node().name())
    }

    pub fn lookup(&self, path: &NodePath) -> Option<InstanceId> {
        let segments = if path.is_absolute() {
            let (first, rest) = path.segments().split_first()?;
            if first.as_str() != self.root_node().name() {
                return None;
            }
            rest
        } else {
            path.segments()
        };

        let mut current = self.root;
        for segment in segments {
            current = self.child_named(current, segment)?;
        }
        Some(current)
    }

    pub fn child_named(&self, parent: InstanceId, name: &str) -> Option<InstanceId> {
        let parent = self.nodes.get(&parent)?;
        parent
            .children
            .iter()
            .copied()
            .find(|child| self.nodes.get(child).is_some_and(|node| node.name == name))
    }

    pub fn index_in_parent(&self, key: InstanceId) -> Option<usize> {
        let parent = self.nodes.get(&key)?.parent?;
        self.nodes
            .get(&parent)?
            .children
            .iter()
            .position(|child| *child == key)
    }

    pub fn is_ancestor_or_self(&self, ancestor: InstanceId, node: InstanceId) -> bool {
        let mut current = Some(node);
        while let Some(key) = current {
            if key == ancestor {
                return true;
            }
            current = self.nodes.get(&key).and_then(|n| n.parent);
        }
        false
    }

    /// `key` and its descendants, parents before children.
    pub fn pre_order(&self, key: InstanceId) -> Vec<InstanceId> {
        let mut out = Vec::new();
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// `key` and its descendants, children before parents.
    pub fn post_order(&self, key: InstanceId) -> Vec<InstanceId> {
        let mut out = self.pre_order(key);
        out.reverse();
        out
    }

    fn allocate_instance(&mut self) -> InstanceId {
        let key = InstanceId::from_raw(self.next_instance);
        self.next_instance += 1;
        key
    }

    fn check_child_name(
        &self,
        parent: InstanceId,
        name: &str,
        ignore: Option<InstanceId>,
    ) -> Result<(), TreeError> {
        validate_node_name(name).map_err(|reason| TreeError::InvalidName {
            name: name.to_owned(),
            reason,
        })?;
        if let Some(existing) = self.child_named(parent, name) {
            if Some(existing) != ignore {
                return Err(TreeError::NameCollision {
                    parent: self.path_of(parent).unwrap_or_else(NodePath::relative_root),
                    name: SmolStr::new(name),
                });
            }
        }
        Ok(())
    }

    /// Appends an owned child (persisted with the scene).
    pub fn add_child(
        &mut self,
        parent: InstanceId,
        name: &str,
        type_name: &str,
        properties: BTreeMap<String, Value>,
    ) -> Result<InstanceId, TreeError> {
        let key = self.add_transient_child(parent, name, type_name, properties)?;
        self.nodes
            .get_mut(&key)
            .expect("child inserted above")
            .owner = Some(self.root);
        Ok(key)
    }

    /// Appends a child without an owner; such nodes live in the tree but are not persisted.
    pub fn add_transient_child(
        &mut self,
        parent: InstanceId,
        name: &str,
        type_name: &str,
        properties: BTreeMap<String, Value>,
    ) -> Result<InstanceId, TreeError> {
        self.existing(parent)?;
        self.check_child_name(parent, name, None)?;

        let key = self.allocate_instance();
        let mut node = SceneNode::new(key, SmolStr::new(name), SmolStr::new(type_name));
        node.properties = properties;
        node.parent = Some(parent);
        self.nodes.insert(key, node);
        self.node_mut(parent)?.children.push(key);
        Ok(key)
    }

    /// Sets one property, returning the previous value.
    pub fn set_property(
        &mut self,
        key: InstanceId,
        property: &str,
        value: Value,
    ) -> Result<Option<Value>, TreeError> {
        Ok(self.node_mut(key)?.properties.insert(property.to_owned(), value))
    }

    pub fn remove_property(
        &mut self,
        key: InstanceId,
        property: &str,
    ) -> Result<Option<Value>, TreeError> {
        Ok(self.node_mut(key)?.properties.remove(property))
    }

    pub(crate) fn set_metadata(
        &mut self,
        key: InstanceId,
        meta_key: &str,
        value: Value,
    ) -> Result<(), TreeError> {
        self.node_mut(key)?.metadata.insert(meta_key.to_owned(), value);
        Ok(())
    }

    /// Records an id read back from storage (or assigned by the identity assignor).
    pub(crate) fn attach_id(&mut self, key: InstanceId, id: NodeId) -> Result<(), TreeError> {
        if let Some(existing) = self.id_index.get(&id) {
            if *existing != key {
                return Err(TreeError::DuplicateId { id });
            }
        }
        self.set_metadata(key, NODE_ID_META_KEY, Value::String(id.to_string()))?;
        self.retired_ids.remove(&id);
        self.id_index.insert(id, key);
        Ok(())
    }

    /// Renames `key`, returning its previous name.
    pub fn rename(&mut self, key: InstanceId, new_name: &str) -> Result<SmolStr, TreeError> {
        let parent = self.existing(key)?.parent;
        match parent {
            Some(parent) => self.check_child_name(parent, new_name, Some(key))?,
            None => validate_node_name(new_name).map_err(|reason| TreeError::InvalidName {
                name: new_name.to_owned(),
                reason,
            })?,
        }
        let node = self.node_mut(key)?;
        Ok(std::mem::replace(&mut node.name, SmolStr::new(new_name)))
    }

    /// Moves `key` under `new_parent` at `index` (appending when `None`).
    ///
    /// Returns the previous parent and index so the move can be reverted.
    pub fn move_node(
        &mut self,
        key: InstanceId,
        new_parent: InstanceId,
        index: Option<usize>,
    ) -> Result<(InstanceId, usize), TreeError> {
        if key == self.root {
            return Err(TreeError::RootForbidden);
        }
        let node_name = self.existing(key)?.name.clone();
        self.existing(new_parent)?;
        if self.is_ancestor_or_self(key, new_parent) {
            return Err(TreeError::Cycle {
                node: self.path_of(key).unwrap_or_else(NodePath::relative_root),
                new_parent: self.path_of(new_parent).unwrap_or_else(NodePath::relative_root),
            });
        }

        let old_parent = self
            .existing(key)?
            .parent
            .ok_or(TreeError::RootForbidden)?;
        let old_index = self
            .index_in_parent(key)
            .ok_or(TreeError::UnknownNode { instance_id: key })?;

        if old_parent == new_parent {
            let len = self.existing(new_parent)?.children.len();
            let target = index.unwrap_or(len - 1);
            if target >= len {
                return Err(TreeError::IndexOutOfRange { index: target, len });
            }
            let children = &mut self.node_mut(new_parent)?.children;
            children.remove(old_index);
            children.insert(target, key);
            return Ok((old_parent, old_index));
        }

        self.check_child_name(new_parent, &node_name, None)?;
        let len = self.existing(new_parent)?.children.len();
        let target = index.unwrap_or(len);
        if target > len {
            return Err(TreeError::IndexOutOfRange { index: target, len });
        }

        self.node_mut(old_parent)?.children.remove(old_index);
        self.node_mut(new_parent)?.children.insert(target, key);
        self.node_mut(key)?.parent = Some(new_parent);
        Ok((old_parent, old_index))
    }

    /// Marks `key` and its subtree as owned by the root so they are persisted.
    /// Returns the previous owner of every node that changed.
    pub fn set_owner_recursive(
        &mut self,
        key: InstanceId,
    ) -> Vec<(InstanceId, Option<InstanceId>)> {
        let root = self.root;
        let mut changed = Vec::new();
        for node_key in self.pre_order(key) {
            if node_key == root {
                continue;
            }
            if let Some(node) = self.nodes.get_mut(&node_key) {
                if node.owner != Some(root) {
                    changed.push((node_key, node.owner.replace(root)));
                }
            }
        }
        changed
    }

    pub(crate) fn restore_owners(&mut self, owners: Vec<(InstanceId, Option<InstanceId>)>) {
        for (key, owner) in owners {
            if let Some(node) = self.nodes.get_mut(&key) {
                node.owner = owner;
            }
        }
    }

    /// Removes `key` and its subtree. Ids in the subtree are retired for the session.
    pub fn detach(&mut self, key: InstanceId) -> Result<DetachedSubtree, TreeError> {
        if key == self.root {
            return Err(TreeError::RootForbidden);
        }
        let parent = self
            .existing(key)?
            .parent
            .ok_or(TreeError::RootForbidden)?;
        let index = self
            .index_in_parent(key)
            .ok_or(TreeError::UnknownNode { instance_id: key })?;

        let order = self.pre_order(key);
        self.node_mut(parent)?.children.remove(index);

        let mut nodes = Vec::with_capacity(order.len());
        for node_key in order {
            let Some(node) = self.nodes.remove(&node_key) else {
                continue;
            };
            if let Some(id) = node.node_id() {
                self.id_index.remove(&id);
                self.retired_ids.insert(id);
            }
            nodes.push(node);
        }

        Ok(DetachedSubtree {
            root: key,
            parent,
            index,
            nodes,
        })
    }

    /// Puts a detached subtree back where it was removed from.
    pub(crate) fn reattach(&mut self, subtree: DetachedSubtree) -> Result<(), TreeError> {
        let DetachedSubtree {
            root,
            parent,
            index,
            nodes,
        } = subtree;
        self.existing(parent)?;
        if let Some(name) = nodes.first().map(|node| node.name.clone()) {
            self.check_child_name(parent, &name, None)?;
        }

        for node in nodes {
            if let Some(id) = node.node_id() {
                self.retired_ids.remove(&id);
                self.id_index.insert(id, node.instance_id);
            }
            self.nodes.insert(node.instance_id, node);
        }
        let children = &mut self.node_mut(parent)?.children;
        let index = index.min(children.len());
        children.insert(index, root);
        Ok(())
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub(crate) fn push_history(&mut self, transaction: Transaction) {
        if self.history_limit == 0 {
            return;
        }
        self.history.push_back(transaction);
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }
}
