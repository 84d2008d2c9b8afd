// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::{HashMap, HashSet};
use std::fmt;

use smol_str::SmolStr;

use super::{NodeRef, PatchOp};
use crate::model::{NodeId, NodePath, SceneTree, TreeSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    MissingAddress,
    UnknownId { id: NodeId },
    DeletedId { id: NodeId },
    IdPathMismatch {
        id: NodeId,
        path: NodePath,
        resolved: NodePath,
    },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAddress => f.write_str("node reference needs a path or an id"),
            Self::UnknownId { id } => write!(f, "unknown node id {id}"),
            Self::DeletedId { id } => write!(f, "node id {id} refers to a deleted node"),
            Self::IdPathMismatch { id, path, resolved } => write!(
                f,
                "id {id} resolves to {resolved} but the operation names {path}"
            ),
        }
    }
}

impl std::error::Error for ResolveError {}

/// Tracks `id -> current path` across one batch.
///
/// Every resolved reference comes back in absolute form. After an operation has been applied,
/// [`IdResolver::observe`] folds its effect into the map so later operations in the same batch
/// see post-rename and post-reparent addresses.
#[derive(Debug, Clone)]
pub struct IdResolver {
    root_name: SmolStr,
    paths: HashMap<NodeId, NodePath>,
    deleted: HashSet<NodeId>,
}

impl IdResolver {
    pub fn from_tree(tree: &SceneTree) -> Self {
        let paths = tree
            .id_index
            .iter()
            .filter_map(|(id, key)| Some((id.clone(), tree.path_of(*key)?)))
            .collect();
        Self {
            root_name: SmolStr::new(tree.root_node().name()),
            paths,
            deleted: tree.retired_ids.clone(),
        }
    }

    pub fn from_snapshot(snapshot: &TreeSnapshot) -> Self {
        let paths = snapshot
            .root
            .walk()
            .into_iter()
            .filter_map(|node| Some((node.id.clone()?, node.path.clone())))
            .collect();
        Self {
            root_name: snapshot.root.name.clone(),
            paths,
            deleted: HashSet::new(),
        }
    }

    pub fn path_of(&self, id: &NodeId) -> Option<&NodePath> {
        self.paths.get(id)
    }

    pub fn resolve_ref(&self, node: &NodeRef) -> Result<NodeRef, ResolveError> {
        let path = node.path().map(|path| path.to_absolute(&self.root_name));
        let Some(id) = node.id() else {
            return path.map(NodeRef::by_path).ok_or(ResolveError::MissingAddress);
        };

        if self.deleted.contains(id) {
            return Err(ResolveError::DeletedId { id: id.clone() });
        }
        let resolved = self
            .paths
            .get(id)
            .ok_or_else(|| ResolveError::UnknownId { id: id.clone() })?;
        if let Some(path) = path {
            if &path != resolved {
                return Err(ResolveError::IdPathMismatch {
                    id: id.clone(),
                    path,
                    resolved: resolved.clone(),
                });
            }
        }
        Ok(NodeRef::with_both(resolved.clone(), id.clone()))
    }

    /// Rewrites every reference of `op` to a concrete absolute path.
    pub fn resolve_op(&self, op: &PatchOp) -> Result<PatchOp, ResolveError> {
        Ok(match op {
            PatchOp::CreateNode {
                parent,
                type_name,
                name,
                properties,
            } => PatchOp::CreateNode {
                parent: self.resolve_ref(parent)?,
                type_name: type_name.clone(),
                name: name.clone(),
                properties: properties.clone(),
            },
            PatchOp::DeleteNode { target } => PatchOp::DeleteNode {
                target: self.resolve_ref(target)?,
            },
            PatchOp::SetProperty {
                target,
                property,
                value,
            } => PatchOp::SetProperty {
                target: self.resolve_ref(target)?,
                property: property.clone(),
                value: value.clone(),
            },
            PatchOp::RenameNode { target, new_name } => PatchOp::RenameNode {
                target: self.resolve_ref(target)?,
                new_name: new_name.clone(),
            },
            PatchOp::ReparentNode {
                target,
                new_parent,
                index,
                keep_global_transform,
            } => PatchOp::ReparentNode {
                target: self.resolve_ref(target)?,
                new_parent: self.resolve_ref(new_parent)?,
                index: *index,
                keep_global_transform: *keep_global_transform,
            },
        })
    }

    /// Records the effect of an applied, already-resolved operation.
    pub fn observe(&mut self, op: &PatchOp) {
        match op {
            PatchOp::CreateNode { .. } | PatchOp::SetProperty { .. } => {}
            PatchOp::DeleteNode { target } => {
                let Some(path) = target.path() else {
                    return;
                };
                let gone: Vec<NodeId> = self
                    .paths
                    .iter()
                    .filter(|(_, current)| current.starts_with(path))
                    .map(|(id, _)| id.clone())
                    .collect();
                for id in gone {
                    self.paths.remove(&id);
                    self.deleted.insert(id);
                }
            }
            PatchOp::RenameNode { target, new_name } => {
                let Some(old) = target.path() else {
                    return;
                };
                let new = old.with_name(new_name);
                if old.len() == 1 {
                    self.root_name = new_name.clone();
                }
                self.move_prefix(old, &new);
            }
            PatchOp::ReparentNode {
                target, new_parent, ..
            } => {
                let (Some(old), Some(parent)) = (target.path(), new_parent.path()) else {
                    return;
                };
                let Some(name) = old.name() else {
                    return;
                };
                let new = parent.join(name);
                self.move_prefix(old, &new);
            }
        }
    }

    fn move_prefix(&mut self, old: &NodePath, new: &NodePath) {
        if old == new {
            return;
        }
        for current in self.paths.values_mut() {
            if let Some(moved) = current.replace_prefix(old, new) {
                *current = moved;
            }
        }
    }
}

/// `true` when any operation addresses a node by id.
pub fn needs_resolution(ops: &[PatchOp]) -> bool {
    ops.iter().any(|op| op.refs().any(|node| node.id().is_some()))
}

/// Resolves a whole batch against a snapshot, assuming every operation succeeds.
///
/// Fails on the first operation that cannot be resolved, returning its index.
pub fn resolve(
    ops: &[PatchOp],
    snapshot: &TreeSnapshot,
) -> Result<Vec<PatchOp>, (usize, ResolveError)> {
    let mut resolver = IdResolver::from_snapshot(snapshot);
    let mut out = Vec::with_capacity(ops.len());
    for (index, op) in ops.iter().enumerate() {
        let resolved = resolver.resolve_op(op).map_err(|err| (index, err))?;
        resolver.observe(&resolved);
        out.push(resolved);
    }
    Ok(out)
}
