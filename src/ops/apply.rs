// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::fmt;

use serde_json::{Map, Value};
use smol_str::SmolStr;

use super::resolve::{IdResolver, ResolveError};
use super::{NodeRef, OpKind, PatchOp};
use crate::model::transaction::UndoEntry;
use crate::model::{
    validate_node_name, InstanceId, NameError, PropertyKind, SceneTree, Transaction, TreeError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// All-or-nothing: the first failure rolls the batch back.
    Strict,
    /// Best effort: failures are recorded and later operations still run.
    Lenient,
}

impl ApplyMode {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            Self::Strict
        } else {
            Self::Lenient
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    Structural,
    Identity,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Structural => "structural",
            Self::Identity => "identity",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    Malformed { message: String },
    Resolve(ResolveError),
    NotFound { path: String },
    InvalidName { name: String, reason: NameError },
    UnknownType { type_name: SmolStr },
    NotInstantiable { type_name: SmolStr },
    UnknownProperty { type_name: SmolStr, property: String },
    PropertyKindMismatch { property: String, expected: PropertyKind },
    Tree(TreeError),
}

impl ApplyError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Malformed { .. }
            | Self::InvalidName { .. }
            | Self::UnknownType { .. }
            | Self::NotInstantiable { .. }
            | Self::UnknownProperty { .. }
            | Self::PropertyKindMismatch { .. }
            | Self::Tree(TreeError::InvalidName { .. }) => ErrorClass::Validation,
            Self::Resolve(_) | Self::Tree(TreeError::DuplicateId { .. }) => ErrorClass::Identity,
            Self::NotFound { .. } | Self::Tree(_) => ErrorClass::Structural,
        }
    }
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { message } => write!(f, "malformed operation: {message}"),
            Self::Resolve(err) => write!(f, "{err}"),
            Self::NotFound { path } => write!(f, "node not found: {path}"),
            Self::InvalidName { name, reason } => write!(f, "invalid node name '{name}': {reason}"),
            Self::UnknownType { type_name } => write!(f, "unknown node type {type_name}"),
            Self::NotInstantiable { type_name } => {
                write!(f, "node type {type_name} cannot be instantiated")
            }
            Self::UnknownProperty {
                type_name,
                property,
            } => write!(f, "type {type_name} does not declare property '{property}'"),
            Self::PropertyKindMismatch { property, expected } => {
                write!(f, "property '{property}' expects a {expected} value")
            }
            Self::Tree(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ApplyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Resolve(err) => Some(err),
            Self::Tree(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TreeError> for ApplyError {
    fn from(err: TreeError) -> Self {
        Self::Tree(err)
    }
}

impl From<ResolveError> for ApplyError {
    fn from(err: ResolveError) -> Self {
        Self::Resolve(err)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpFailure {
    pub index: usize,
    pub op: Option<OpKind>,
    pub error: ApplyError,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApplyReport {
    pub applied: usize,
    pub total: usize,
    pub errors: Vec<OpFailure>,
    pub rolled_back: bool,
    pub degraded_to_lenient: bool,
}

impl ApplyReport {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty() && self.applied == self.total
    }
}

pub fn apply_patch(tree: &mut SceneTree, ops: &[PatchOp], mode: ApplyMode) -> ApplyReport {
    run_batch(tree, ops.iter().map(Ok).collect(), mode)
}

/// Like [`apply_patch`], for batches where some entries already failed to decode.
///
/// Decode failures are reported at their index and never reach the tree.
pub fn apply_decoded(
    tree: &mut SceneTree,
    ops: &[Result<PatchOp, ApplyError>],
    mode: ApplyMode,
) -> ApplyReport {
    run_batch(
        tree,
        ops.iter().map(|entry| entry.as_ref().map_err(Clone::clone)).collect(),
        mode,
    )
}

fn run_batch(
    tree: &mut SceneTree,
    entries: Vec<Result<&PatchOp, ApplyError>>,
    mode: ApplyMode,
) -> ApplyReport {
    let total = entries.len();
    let mut transaction = tree.begin_batch(format!("apply_patch ({total} ops)"));
    let degraded_to_lenient = mode == ApplyMode::Strict && transaction.is_none();
    if degraded_to_lenient {
        tracing::warn!(total, "tree has no transaction support; applying strict batch leniently");
    }
    let abort_on_error = mode == ApplyMode::Strict && transaction.is_some();

    let mut resolver = IdResolver::from_tree(tree);
    let mut applied = 0;
    let mut errors = Vec::new();

    for (index, entry) in entries.into_iter().enumerate() {
        let kind = entry.as_ref().ok().map(|op| op.kind());
        let outcome = entry.and_then(|op| {
            let resolved = resolver.resolve_op(op)?;
            apply_one(tree, &resolved, transaction.as_mut())?;
            Ok(resolved)
        });

        match outcome {
            Ok(resolved) => {
                resolver.observe(&resolved);
                applied += 1;
            }
            Err(error) => {
                tracing::debug!(index, error = %error, "patch operation failed");
                errors.push(OpFailure {
                    index,
                    op: kind,
                    error,
                });
                if abort_on_error {
                    break;
                }
            }
        }
    }

    let mut rolled_back = false;
    if let Some(transaction) = transaction {
        if abort_on_error && !errors.is_empty() {
            tree.rollback(transaction);
            applied = 0;
            rolled_back = true;
        } else {
            tree.commit(transaction);
        }
    }

    tracing::info!(
        applied,
        total,
        errors = errors.len(),
        rolled_back,
        degraded_to_lenient,
        "patch applied"
    );

    ApplyReport {
        applied,
        total,
        errors,
        rolled_back,
        degraded_to_lenient,
    }
}

fn record(transaction: &mut Option<&mut Transaction>, entry: UndoEntry) {
    if let Some(transaction) = transaction.as_deref_mut() {
        transaction.record(entry);
    }
}

fn locate(tree: &SceneTree, node: &NodeRef) -> Result<InstanceId, ApplyError> {
    let path = node.path().ok_or(ApplyError::Resolve(ResolveError::MissingAddress))?;
    tree.lookup(path).ok_or_else(|| ApplyError::NotFound {
        path: path.to_string(),
    })
}

fn check_property(
    tree: &SceneTree,
    type_name: &str,
    property: &str,
    value: &Value,
) -> Result<(), ApplyError> {
    let kind = tree
        .registry()
        .property_kind(type_name, property)
        .ok_or_else(|| ApplyError::UnknownProperty {
            type_name: SmolStr::new(type_name),
            property: property.to_owned(),
        })?;
    if !kind.accepts(value) {
        return Err(ApplyError::PropertyKindMismatch {
            property: property.to_owned(),
            expected: kind,
        });
    }
    Ok(())
}

/// Validates and executes one resolved operation, recording its inverse.
fn apply_one(
    tree: &mut SceneTree,
    op: &PatchOp,
    mut transaction: Option<&mut Transaction>,
) -> Result<(), ApplyError> {
    match op {
        PatchOp::CreateNode {
            parent,
            type_name,
            name,
            properties,
        } => {
            validate_node_name(name).map_err(|reason| ApplyError::InvalidName {
                name: name.to_string(),
                reason,
            })?;
            let registry = tree.registry();
            if !registry.is_known(type_name) {
                return Err(ApplyError::UnknownType {
                    type_name: type_name.clone(),
                });
            }
            if !registry.is_instantiable(type_name) {
                return Err(ApplyError::NotInstantiable {
                    type_name: type_name.clone(),
                });
            }
            for (property, value) in properties {
                check_property(tree, type_name, property, value)?;
            }

            let parent = locate(tree, parent)?;
            let key = tree.add_child(parent, name, type_name, properties.clone())?;
            record(&mut transaction, UndoEntry::Remove { key });
        }
        PatchOp::DeleteNode { target } => {
            let key = locate(tree, target)?;
            if key == tree.root() {
                return Err(TreeError::RootForbidden.into());
            }
            let subtree = tree.detach(key)?;
            record(&mut transaction, UndoEntry::Restore { subtree });
        }
        PatchOp::SetProperty {
            target,
            property,
            value,
        } => {
            let key = locate(tree, target)?;
            let type_name = node_type(tree, key)?;
            check_property(tree, &type_name, property, value)?;
            let previous = tree.set_property(key, property, value.clone())?;
            record(
                &mut transaction,
                UndoEntry::SetProperty {
                    key,
                    property: property.clone(),
                    previous,
                },
            );
        }
        PatchOp::RenameNode { target, new_name } => {
            let key = locate(tree, target)?;
            let previous = tree.rename(key, new_name)?;
            if previous != *new_name {
                record(&mut transaction, UndoEntry::Rename { key, previous });
            }
        }
        PatchOp::ReparentNode {
            target,
            new_parent,
            index,
            keep_global_transform,
        } => {
            let key = locate(tree, target)?;
            if key == tree.root() {
                return Err(TreeError::RootForbidden.into());
            }
            let new_parent = locate(tree, new_parent)?;
            let global_before = keep_global_transform
                .then(|| global_translation(tree, key))
                .flatten();

            let (parent, old_index) = tree.move_node(key, new_parent, *index)?;
            record(
                &mut transaction,
                UndoEntry::Move {
                    key,
                    parent,
                    index: old_index,
                },
            );
            let owners = tree.set_owner_recursive(key);
            if !owners.is_empty() {
                record(&mut transaction, UndoEntry::Owner { owners });
            }

            if let Some(global) = global_before {
                preserve_translation(tree, key, new_parent, &global, &mut transaction)?;
            }
        }
    }
    Ok(())
}

fn node_type(tree: &SceneTree, key: InstanceId) -> Result<SmolStr, ApplyError> {
    tree.node(key)
        .map(|node| SmolStr::new(node.type_name()))
        .ok_or(ApplyError::Tree(TreeError::UnknownNode { instance_id: key }))
}

/// Components of a vector property given as `[x, y(, z)]` or `{x, y(, z)}`.
fn vector_components(value: &Value) -> Option<Vec<f64>> {
    match value {
        Value::Array(items) => items.iter().map(Value::as_f64).collect(),
        Value::Object(map) => ["x", "y", "z"]
            .iter()
            .map_while(|axis| map.get(*axis))
            .map(Value::as_f64)
            .collect(),
        _ => None,
    }
}

fn vector_like(template: &Value, components: &[f64]) -> Value {
    match template {
        Value::Object(_) => {
            let mut map = Map::new();
            for (axis, component) in ["x", "y", "z"].iter().zip(components) {
                map.insert((*axis).to_owned(), Value::from(*component));
            }
            Value::Object(map)
        }
        _ => Value::Array(components.iter().copied().map(Value::from).collect()),
    }
}

fn positional(tree: &SceneTree, key: InstanceId) -> Option<Vec<f64>> {
    let node = tree.node(key)?;
    let kind = tree.registry().property_kind(node.type_name(), "position")?;
    if !matches!(kind, PropertyKind::Vector2 | PropertyKind::Vector3) {
        return None;
    }
    vector_components(node.property("position")?)
}

/// Sum of positions from the root down to `key` (translation only).
fn global_translation(tree: &SceneTree, key: InstanceId) -> Option<Vec<f64>> {
    let mut total = positional(tree, key)?;
    add_chain_offset(tree, tree.node(key)?.parent(), &mut total);
    Some(total)
}

/// Adds the position of `start` and of every ancestor above it; nodes without one count as zero.
fn add_chain_offset(tree: &SceneTree, start: Option<InstanceId>, total: &mut [f64]) {
    let mut current = start;
    while let Some(key) = current {
        if let Some(offset) = positional(tree, key) {
            for (axis, component) in total.iter_mut().zip(offset) {
                *axis += component;
            }
        }
        current = tree.node(key).and_then(|node| node.parent());
    }
}

fn preserve_translation(
    tree: &mut SceneTree,
    key: InstanceId,
    new_parent: InstanceId,
    global: &[f64],
    transaction: &mut Option<&mut Transaction>,
) -> Result<(), ApplyError> {
    let mut parent_global = vec![0.0; global.len()];
    add_chain_offset(tree, Some(new_parent), &mut parent_global);

    let local: Vec<f64> = global
        .iter()
        .enumerate()
        .map(|(axis, component)| component - parent_global.get(axis).copied().unwrap_or(0.0))
        .collect();

    let Some(template) = tree.node(key).and_then(|node| node.property("position")).cloned() else {
        return Ok(());
    };
    let value = vector_like(&template, &local);
    if value == template {
        return Ok(());
    }
    let previous = tree.set_property(key, "position", value)?;
    record(
        transaction,
        UndoEntry::SetProperty {
            key,
            property: "position".to_owned(),
            previous,
        },
    );
    Ok(())
}
