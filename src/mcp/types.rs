// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diff::DiffOptions;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct SceneSnapshotParams {
    /// Assign ids to nodes that lack one (default true).
    pub ensure_ids: Option<bool>,
    #[serde(default)]
    pub include_properties: bool,
    /// Property names to include; empty means all.
    #[serde(default)]
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct McpSceneNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub children: Vec<McpSceneNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SceneSnapshotResponse {
    pub root_path: String,
    pub node_count: u64,
    pub structure: McpSceneNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct McpDesiredNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
    /// Omit to leave live children untouched; `[]` means no children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<McpDesiredNode>>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GeneratePatchParams {
    pub desired: McpDesiredNode,
    #[serde(default)]
    pub options: DiffOptions,
    /// Apply the generated operations right away.
    #[serde(default)]
    pub apply: bool,
    /// Strict mode for the follow-up apply (default true).
    pub strict: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct McpDiffError {
    pub kind: String,
    pub message: String,
    pub warning: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct McpAlias {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GeneratePatchResponse {
    pub operations: Vec<McpPatchOp>,
    pub errors: Vec<McpDiffError>,
    pub aliases: Vec<McpAlias>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied: Option<ApplyPatchResponse>,
}

/// One patch operation on the wire. Every node reference accepts a path, an id, or both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum McpPatchOp {
    CreateNode {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<String>,
        #[serde(rename = "type")]
        type_name: String,
        name: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        properties: BTreeMap<String, Value>,
    },
    DeleteNode {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<String>,
    },
    SetProperty {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<String>,
        property: String,
        value: Value,
    },
    RenameNode {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<String>,
        new_name: String,
    },
    ReparentNode {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_parent: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_parent_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
        #[serde(default = "default_true")]
        keep_global_transform: bool,
    },
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ApplyPatchParams {
    /// Operations are decoded one by one so a malformed entry fails only itself.
    #[schemars(with = "Vec<McpPatchOp>")]
    pub operations: Vec<Value>,
    /// All-or-nothing when true (default true).
    pub strict: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct McpOpFailure {
    pub index: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApplyPatchResponse {
    pub applied: u64,
    pub total: u64,
    pub errors: Vec<McpOpFailure>,
    pub rolled_back: bool,
    pub degraded_to_lenient: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SceneUndoResponse {
    pub undone: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub remaining: u64,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct SceneSchemaParams {
    /// Limit the answer to one type.
    #[serde(rename = "type")]
    pub type_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct McpTypeSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    pub instantiable: bool,
    /// Every property the type accepts, including inherited ones, mapped to its kind.
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SceneSchemaResponse {
    pub types: Vec<McpTypeSchema>,
}
