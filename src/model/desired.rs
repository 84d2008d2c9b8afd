// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeMap;

use serde_json::Value;
use smol_str::SmolStr;

use super::ids::NodeId;
use super::snapshot::SnapshotNode;

/// Target shape of one node for the differ.
///
/// `children: None` leaves the live children untouched; `Some(vec![])` means "no children".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DesiredNode {
    pub name: SmolStr,
    pub id: Option<NodeId>,
    pub type_name: Option<SmolStr>,
    pub properties: BTreeMap<String, Value>,
    pub children: Option<Vec<DesiredNode>>,
}

impl DesiredNode {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_type(mut self, type_name: impl Into<SmolStr>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    pub fn with_children(mut self, children: Vec<DesiredNode>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn child(mut self, child: DesiredNode) -> Self {
        self.children.get_or_insert_with(Vec::new).push(child);
        self
    }

    /// Desired tree equal to a snapshot: every node pinned, typed and fully listed.
    pub fn from_snapshot(node: &SnapshotNode) -> Self {
        Self {
            name: node.name.clone(),
            id: node.id.clone(),
            type_name: Some(node.type_name.clone()),
            properties: node.properties.clone().unwrap_or_default(),
            children: Some(node.children.iter().map(Self::from_snapshot).collect()),
        }
    }

    /// Number of nodes in this desired subtree.
    pub fn len(&self) -> usize {
        1 + self
            .children
            .iter()
            .flatten()
            .map(DesiredNode::len)
            .sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}
