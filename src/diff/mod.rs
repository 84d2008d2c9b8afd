// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Tree differ: computes the operations that reconcile a live snapshot with a desired tree.
//!
//! Diffing never touches the live tree. Problems are collected into [`DiffOutcome::errors`]
//! next to whatever operations could still be produced; callers decide whether to apply.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::model::{
    DesiredNode, NameError, NodeId, NodePath, SceneTree, SnapshotOptions, TreeSnapshot,
};
use crate::ops::PatchOp;

mod differ;
pub mod props;

pub use props::{filter_unchanged, values_equal, PropertyCache, PropertySource};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DiffOptions {
    /// Delete live children the desired tree does not mention.
    pub allow_delete: bool,
    /// Stop diffing a subtree whose live type differs from the desired type.
    pub strict_types: bool,
    /// Turn an unmatched live child into a rename when exactly one candidate fits.
    pub detect_renames: bool,
    /// Emit indexed `reparent_node` operations to match the desired child order.
    pub reorder_children: bool,
    /// Drop `set_property` operations whose value is already current.
    pub skip_unchanged: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            allow_delete: false,
            strict_types: false,
            detect_renames: true,
            reorder_children: false,
            skip_unchanged: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffError {
    TypeMismatch {
        path: NodePath,
        expected: SmolStr,
        found: SmolStr,
        fatal: bool,
    },
    UnknownId {
        id: NodeId,
    },
    DuplicateId {
        id: NodeId,
    },
    PinnedRoot {
        id: NodeId,
    },
    PinnedIntoOwnSubtree {
        id: NodeId,
        path: NodePath,
    },
    NameCollision {
        parent: NodePath,
        name: SmolStr,
    },
    InvalidName {
        name: SmolStr,
        reason: NameError,
    },
}

impl DiffError {
    /// Type mismatches outside `strict_types` are warnings; everything else is an error.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::TypeMismatch { fatal: false, .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::TypeMismatch { .. } => "type",
            Self::UnknownId { .. }
            | Self::DuplicateId { .. }
            | Self::PinnedRoot { .. }
            | Self::PinnedIntoOwnSubtree { .. } => "identity",
            Self::NameCollision { .. } => "structural",
            Self::InvalidName { .. } => "validation",
        }
    }
}

impl fmt::Display for DiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch {
                path,
                expected,
                found,
                ..
            } => write!(f, "{path} is a {found}, desired type is {expected}"),
            Self::UnknownId { id } => write!(f, "desired node references unknown id {id}"),
            Self::DuplicateId { id } => {
                write!(f, "id {id} is pinned by more than one desired node")
            }
            Self::PinnedRoot { id } => {
                write!(f, "id {id} pins the tree root to a non-root position")
            }
            Self::PinnedIntoOwnSubtree { id, path } => {
                write!(f, "id {id} would move {path} under its own descendant")
            }
            Self::NameCollision { parent, name } => {
                write!(f, "{parent} already has a child named '{name}'")
            }
            Self::InvalidName { name, reason } => write!(f, "invalid node name '{name}': {reason}"),
        }
    }
}

impl std::error::Error for DiffError {}

/// Original snapshot path to current path for every node renamed or moved in one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap {
    entries: BTreeMap<NodePath, NodePath>,
}

impl AliasMap {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodePath, &NodePath)> {
        self.entries.iter()
    }

    /// Records that the node currently at `old` now lives at `new`.
    pub fn record_move(&mut self, old: &NodePath, new: &NodePath) {
        if old == new {
            return;
        }
        let original = self.original_of(old);
        for current in self.entries.values_mut() {
            if let Some(moved) = current.replace_prefix(old, new) {
                *current = moved;
            }
        }
        if &original == new {
            self.entries.remove(&original);
        } else {
            self.entries.insert(original, new.clone());
        }
    }

    /// Current address of a snapshot path, following the longest renamed or moved ancestor.
    pub fn resolve(&self, original: &NodePath) -> NodePath {
        self.entries
            .iter()
            .filter(|(from, _)| original.starts_with(from))
            .max_by_key(|(from, _)| from.len())
            .and_then(|(from, to)| original.replace_prefix(from, to))
            .unwrap_or_else(|| original.clone())
    }

    /// Snapshot path of a current address (inverse of [`AliasMap::resolve`]).
    pub fn original_of(&self, current: &NodePath) -> NodePath {
        self.entries
            .iter()
            .filter(|(_, to)| current.starts_with(to))
            .max_by_key(|(_, to)| to.len())
            .and_then(|(from, to)| current.replace_prefix(to, from))
            .unwrap_or_else(|| current.clone())
    }

    /// Depth of the deepest moved node that `current` lies in, if any.
    pub fn matched_depth(&self, current: &NodePath) -> Option<usize> {
        self.entries
            .values()
            .filter(|to| current.starts_with(to))
            .map(NodePath::len)
            .max()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffOutcome {
    pub operations: Vec<PatchOp>,
    pub errors: Vec<DiffError>,
    pub aliases: AliasMap,
}

impl DiffOutcome {
    pub fn is_noop(&self) -> bool {
        self.operations.is_empty() && self.errors.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(|err| !err.is_warning())
    }
}

/// Diffs against a snapshot, taking current property values from the snapshot itself.
pub fn diff(live: &TreeSnapshot, desired: &DesiredNode, options: &DiffOptions) -> DiffOutcome {
    diff_with_source(live, desired, options, live)
}

/// Diffs against a snapshot, fetching current property values lazily from `source`.
pub fn diff_with_source<S: PropertySource + ?Sized>(
    live: &TreeSnapshot,
    desired: &DesiredNode,
    options: &DiffOptions,
    source: &S,
) -> DiffOutcome {
    let mut outcome = differ::Differ::new(live, options).run(desired);
    if options.skip_unchanged {
        let mut cache = PropertyCache::new(source);
        let before = outcome.operations.len();
        outcome.operations = filter_unchanged(std::mem::take(&mut outcome.operations), &mut cache);
        tracing::debug!(
            dropped = before - outcome.operations.len(),
            fetches = cache.fetch_count(),
            "filtered unchanged properties"
        );
    }
    tracing::debug!(
        operations = outcome.operations.len(),
        errors = outcome.errors.len(),
        aliases = outcome.aliases.len(),
        "diff computed"
    );
    outcome
}

/// Snapshots `tree` (assigning ids) and diffs it against `desired`.
pub fn generate(tree: &mut SceneTree, desired: &DesiredNode, options: &DiffOptions) -> DiffOutcome {
    let snapshot = tree.snapshot(&SnapshotOptions::with_ids());
    diff_with_source(&snapshot, desired, options, &*tree)
}

#[cfg(test)]
mod tests;
