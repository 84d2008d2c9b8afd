// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

/// MCP server helper functions:
/// snapshot/desired mapping, patch operation decoding, and report conversion.
fn mcp_node_from_snapshot(node: &SnapshotNode) -> McpSceneNode {
    McpSceneNode {
        id: node.id.as_ref().map(ToString::to_string),
        name: node.name.to_string(),
        type_name: node.type_name.to_string(),
        path: node.path.to_string(),
        properties: node.properties.clone(),
        children: node.children.iter().map(mcp_node_from_snapshot).collect(),
    }
}

fn desired_from_mcp(node: &McpDesiredNode) -> Result<DesiredNode, ErrorData> {
    let id = node
        .id
        .as_deref()
        .map(|raw| {
            NodeId::new(raw).map_err(|err| {
                ErrorData::invalid_params(
                    format!("invalid node id: {err}"),
                    Some(serde_json::json!({ "id": raw, "name": node.name })),
                )
            })
        })
        .transpose()?;

    let children = match &node.children {
        Some(children) => Some(
            children
                .iter()
                .map(desired_from_mcp)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        None => None,
    };

    Ok(DesiredNode {
        name: node.name.as_str().into(),
        id,
        type_name: node.type_name.as_deref().map(Into::into),
        properties: node.properties.clone(),
        children,
    })
}

fn parse_node_ref(
    path: Option<&str>,
    id: Option<&str>,
    field: &str,
) -> Result<NodeRef, ApplyError> {
    let path = path
        .map(|raw| {
            NodePath::parse(raw).map_err(|err| ApplyError::Malformed {
                message: format!("invalid {field} path '{raw}': {err}"),
            })
        })
        .transpose()?;
    let id = id
        .map(|raw| {
            NodeId::new(raw).map_err(|err| ApplyError::Malformed {
                message: format!("invalid {field}_id '{raw}': {err}"),
            })
        })
        .transpose()?;

    NodeRef::from_parts(path, id).ok_or_else(|| ApplyError::Malformed {
        message: format!("{field} or {field}_id is required"),
    })
}

fn decode_patch_op(raw: &Value) -> Result<PatchOp, ApplyError> {
    let op = serde_json::from_value::<McpPatchOp>(raw.clone()).map_err(|err| {
        ApplyError::Malformed {
            message: err.to_string(),
        }
    })?;
    mcp_op_to_internal(op)
}

fn mcp_op_to_internal(op: McpPatchOp) -> Result<PatchOp, ApplyError> {
    Ok(match op {
        McpPatchOp::CreateNode {
            parent,
            parent_id,
            type_name,
            name,
            properties,
        } => PatchOp::CreateNode {
            parent: parse_node_ref(parent.as_deref(), parent_id.as_deref(), "parent")?,
            type_name: type_name.into(),
            name: name.into(),
            properties,
        },
        McpPatchOp::DeleteNode { target, target_id } => PatchOp::DeleteNode {
            target: parse_node_ref(target.as_deref(), target_id.as_deref(), "target")?,
        },
        McpPatchOp::SetProperty {
            target,
            target_id,
            property,
            value,
        } => PatchOp::SetProperty {
            target: parse_node_ref(target.as_deref(), target_id.as_deref(), "target")?,
            property,
            value,
        },
        McpPatchOp::RenameNode {
            target,
            target_id,
            new_name,
        } => PatchOp::RenameNode {
            target: parse_node_ref(target.as_deref(), target_id.as_deref(), "target")?,
            new_name: new_name.into(),
        },
        McpPatchOp::ReparentNode {
            target,
            target_id,
            new_parent,
            new_parent_id,
            index,
            keep_global_transform,
        } => PatchOp::ReparentNode {
            target: parse_node_ref(target.as_deref(), target_id.as_deref(), "target")?,
            new_parent: parse_node_ref(
                new_parent.as_deref(),
                new_parent_id.as_deref(),
                "new_parent",
            )?,
            index,
            keep_global_transform,
        },
    })
}

fn split_ref(node_ref: &NodeRef) -> (Option<String>, Option<String>) {
    (
        node_ref.path().map(ToString::to_string),
        node_ref.id().map(ToString::to_string),
    )
}

fn mcp_op_from_internal(op: &PatchOp) -> McpPatchOp {
    match op {
        PatchOp::CreateNode {
            parent,
            type_name,
            name,
            properties,
        } => {
            let (parent, parent_id) = split_ref(parent);
            McpPatchOp::CreateNode {
                parent,
                parent_id,
                type_name: type_name.to_string(),
                name: name.to_string(),
                properties: properties.clone(),
            }
        }
        PatchOp::DeleteNode { target } => {
            let (target, target_id) = split_ref(target);
            McpPatchOp::DeleteNode { target, target_id }
        }
        PatchOp::SetProperty {
            target,
            property,
            value,
        } => {
            let (target, target_id) = split_ref(target);
            McpPatchOp::SetProperty {
                target,
                target_id,
                property: property.clone(),
                value: value.clone(),
            }
        }
        PatchOp::RenameNode { target, new_name } => {
            let (target, target_id) = split_ref(target);
            McpPatchOp::RenameNode {
                target,
                target_id,
                new_name: new_name.to_string(),
            }
        }
        PatchOp::ReparentNode {
            target,
            new_parent,
            index,
            keep_global_transform,
        } => {
            let (target, target_id) = split_ref(target);
            let (new_parent, new_parent_id) = split_ref(new_parent);
            McpPatchOp::ReparentNode {
                target,
                target_id,
                new_parent,
                new_parent_id,
                index: *index,
                keep_global_transform: *keep_global_transform,
            }
        }
    }
}

fn mcp_report(report: &ApplyReport) -> ApplyPatchResponse {
    ApplyPatchResponse {
        applied: report.applied as u64,
        total: report.total as u64,
        errors: report
            .errors
            .iter()
            .map(|failure| McpOpFailure {
                index: failure.index as u64,
                op: failure.op.map(|kind| kind.as_str().to_owned()),
                kind: failure.error.class().as_str().to_owned(),
                message: failure.error.to_string(),
            })
            .collect(),
        rolled_back: report.rolled_back,
        degraded_to_lenient: report.degraded_to_lenient,
    }
}

fn mcp_diff_error(err: &DiffError) -> McpDiffError {
    McpDiffError {
        kind: err.kind().to_owned(),
        message: err.to_string(),
        warning: err.is_warning(),
    }
}

fn generate_response(outcome: &DiffOutcome, report: Option<&ApplyReport>) -> GeneratePatchResponse {
    GeneratePatchResponse {
        operations: outcome.operations.iter().map(mcp_op_from_internal).collect(),
        errors: outcome.errors.iter().map(mcp_diff_error).collect(),
        aliases: outcome
            .aliases
            .iter()
            .map(|(from, to)| McpAlias {
                from: from.to_string(),
                to: to.to_string(),
            })
            .collect(),
        applied: report.map(mcp_report),
    }
}

fn mcp_type_schema(registry: &TypeRegistry, type_name: &str) -> McpTypeSchema {
    let schema = registry.get(type_name);
    let properties = registry
        .property_names(type_name)
        .into_iter()
        .filter_map(|property| {
            registry
                .property_kind(type_name, property)
                .map(|kind| (property.to_owned(), kind.as_str().to_owned()))
        })
        .collect::<BTreeMap<_, _>>();

    McpTypeSchema {
        name: type_name.to_owned(),
        base: schema.and_then(|schema| schema.base.as_ref().map(ToString::to_string)),
        instantiable: schema.is_some_and(|schema| schema.instantiable),
        properties,
    }
}
