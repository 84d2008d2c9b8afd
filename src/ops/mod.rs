// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Patch operations against a live scene tree.
//!
//! Operations address nodes by path, by id, or both. Id references are turned into concrete
//! paths by [`resolve::IdResolver`] one operation at a time, and [`apply::apply_patch`] runs the
//! batch inside a transaction when the tree supports one.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use smol_str::SmolStr;

use crate::model::{NodeId, NodePath};

pub mod apply;
pub mod resolve;

pub use apply::{
    apply_decoded, apply_patch, ApplyError, ApplyMode, ApplyReport, ErrorClass, OpFailure,
};
pub use resolve::{needs_resolution, resolve, IdResolver, ResolveError};

/// Address of a node in an operation: a path, an id, or both (which must agree).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeRef {
    path: Option<NodePath>,
    id: Option<NodeId>,
}

impl NodeRef {
    pub fn by_path(path: NodePath) -> Self {
        Self {
            path: Some(path),
            id: None,
        }
    }

    pub fn by_id(id: NodeId) -> Self {
        Self {
            path: None,
            id: Some(id),
        }
    }

    pub fn with_both(path: NodePath, id: NodeId) -> Self {
        Self {
            path: Some(path),
            id: Some(id),
        }
    }

    /// `None` when neither half is present.
    pub fn from_parts(path: Option<NodePath>, id: Option<NodeId>) -> Option<Self> {
        (path.is_some() || id.is_some()).then_some(Self { path, id })
    }

    pub fn path(&self) -> Option<&NodePath> {
        self.path.as_ref()
    }

    pub fn id(&self) -> Option<&NodeId> {
        self.id.as_ref()
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.path, &self.id) {
            (Some(path), Some(id)) => write!(f, "{path} (id={id})"),
            (Some(path), None) => write!(f, "{path}"),
            (None, Some(id)) => write!(f, "id={id}"),
            (None, None) => f.write_str("<unaddressed>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp {
    CreateNode {
        parent: NodeRef,
        type_name: SmolStr,
        name: SmolStr,
        properties: BTreeMap<String, Value>,
    },
    DeleteNode {
        target: NodeRef,
    },
    SetProperty {
        target: NodeRef,
        property: String,
        value: Value,
    },
    RenameNode {
        target: NodeRef,
        new_name: SmolStr,
    },
    ReparentNode {
        target: NodeRef,
        new_parent: NodeRef,
        index: Option<usize>,
        keep_global_transform: bool,
    },
}

impl PatchOp {
    pub fn kind(&self) -> OpKind {
        match self {
            Self::CreateNode { .. } => OpKind::CreateNode,
            Self::DeleteNode { .. } => OpKind::DeleteNode,
            Self::SetProperty { .. } => OpKind::SetProperty,
            Self::RenameNode { .. } => OpKind::RenameNode,
            Self::ReparentNode { .. } => OpKind::ReparentNode,
        }
    }

    /// The node the operation acts on (the parent for `create_node`).
    pub fn target(&self) -> &NodeRef {
        match self {
            Self::CreateNode { parent, .. } => parent,
            Self::DeleteNode { target }
            | Self::SetProperty { target, .. }
            | Self::RenameNode { target, .. }
            | Self::ReparentNode { target, .. } => target,
        }
    }

    /// Every node reference carried by the operation.
    pub fn refs(&self) -> impl Iterator<Item = &NodeRef> {
        let second = match self {
            Self::ReparentNode { new_parent, .. } => Some(new_parent),
            _ => None,
        };
        std::iter::once(self.target()).chain(second)
    }

    pub fn create(parent: NodePath, type_name: &str, name: &str) -> Self {
        Self::CreateNode {
            parent: NodeRef::by_path(parent),
            type_name: SmolStr::new(type_name),
            name: SmolStr::new(name),
            properties: BTreeMap::new(),
        }
    }

    pub fn delete(target: NodePath) -> Self {
        Self::DeleteNode {
            target: NodeRef::by_path(target),
        }
    }

    pub fn set_property(target: NodePath, property: &str, value: Value) -> Self {
        Self::SetProperty {
            target: NodeRef::by_path(target),
            property: property.to_owned(),
            value,
        }
    }

    pub fn rename(target: NodePath, new_name: &str) -> Self {
        Self::RenameNode {
            target: NodeRef::by_path(target),
            new_name: SmolStr::new(new_name),
        }
    }

    pub fn reparent(target: NodePath, new_parent: NodePath, index: Option<usize>) -> Self {
        Self::ReparentNode {
            target: NodeRef::by_path(target),
            new_parent: NodeRef::by_path(new_parent),
            index,
            keep_global_transform: false,
        }
    }
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateNode {
                parent,
                type_name,
                name,
                ..
            } => write!(f, "create_node {name} ({type_name}) under {parent}"),
            Self::DeleteNode { target } => write!(f, "delete_node {target}"),
            Self::SetProperty {
                target, property, ..
            } => write!(f, "set_property {target}.{property}"),
            Self::RenameNode { target, new_name } => {
                write!(f, "rename_node {target} -> {new_name}")
            }
            Self::ReparentNode {
                target,
                new_parent,
                index,
                ..
            } => match index {
                Some(index) => write!(f, "reparent_node {target} -> {new_parent} at {index}"),
                None => write!(f, "reparent_node {target} -> {new_parent}"),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    CreateNode,
    DeleteNode,
    SetProperty,
    RenameNode,
    ReparentNode,
}

impl OpKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateNode => "create_node",
            Self::DeleteNode => "delete_node",
            Self::SetProperty => "set_property",
            Self::RenameNode => "rename_node",
            Self::ReparentNode => "reparent_node",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
