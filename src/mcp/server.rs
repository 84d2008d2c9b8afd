// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeMap;
use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::{Json, Parameters};
use rmcp::model::{ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData, ServerHandler, ServiceExt};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::diff::{generate, DiffError, DiffOutcome};
use crate::model::{
    DesiredNode, NodeId, NodePath, SceneTree, SnapshotNode, SnapshotOptions, TypeRegistry,
};
use crate::ops::{
    apply_decoded, apply_patch, ApplyError, ApplyMode, ApplyReport, NodeRef, PatchOp,
};
use crate::store::SceneFile;

use super::types::*;

#[derive(Debug)]
struct McpState {
    tree: SceneTree,
}

#[derive(Clone)]
pub struct ScenePatchMcp {
    state: Arc<Mutex<McpState>>,
    scene_file: Option<Arc<SceneFile>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl ScenePatchMcp {
    pub fn new(tree: SceneTree) -> Self {
        Self {
            state: Arc::new(Mutex::new(McpState { tree })),
            scene_file: None,
            tool_router: Self::tool_router(),
        }
    }

    /// Every successful mutation is written back to `scene_file` before it becomes visible.
    pub fn new_persistent(tree: SceneTree, scene_file: SceneFile) -> Self {
        Self {
            state: Arc::new(Mutex::new(McpState { tree })),
            scene_file: Some(Arc::new(scene_file)),
            tool_router: Self::tool_router(),
        }
    }

    pub async fn serve_stdio(self) -> Result<(), rmcp::RmcpError> {
        let service = self.serve((tokio::io::stdin(), tokio::io::stdout())).await?;
        service.waiting().await?;
        Ok(())
    }

    fn persist(&self, tree: &SceneTree) -> Result<(), ErrorData> {
        let Some(scene_file) = &self.scene_file else {
            return Ok(());
        };
        scene_file.save(tree).map_err(|err| {
            ErrorData::internal_error(
                format!("failed to persist scene: {err}"),
                Some(serde_json::json!({ "path": scene_file.path().display().to_string() })),
            )
        })
    }

    /// Snapshot of the live tree; assigns missing ids unless `ensure_ids` is false.
    #[tool(name = "scene.snapshot")]
    async fn scene_snapshot(
        &self,
        params: Parameters<SceneSnapshotParams>,
    ) -> Result<Json<SceneSnapshotResponse>, ErrorData> {
        let SceneSnapshotParams {
            ensure_ids,
            include_properties,
            properties,
        } = params.0;
        let options = SnapshotOptions {
            ensure_ids: ensure_ids.unwrap_or(true),
            include_properties,
            properties,
        };

        let mut state = self.state.lock().await;
        if options.ensure_ids {
            let mut candidate = state.tree.clone();
            if candidate.ensure_all_ids() > 0 {
                self.persist(&candidate)?;
                state.tree = candidate;
            }
        }

        let snapshot = state.tree.capture(&options);
        Ok(Json(SceneSnapshotResponse {
            root_path: snapshot.root_path.to_string(),
            node_count: snapshot.len() as u64,
            structure: mcp_node_from_snapshot(&snapshot.root),
        }))
    }

    /// Diff the live tree against a desired tree; optionally apply the result.
    #[tool(name = "scene.generate_patch")]
    async fn scene_generate_patch(
        &self,
        params: Parameters<GeneratePatchParams>,
    ) -> Result<Json<GeneratePatchResponse>, ErrorData> {
        let GeneratePatchParams {
            desired,
            options,
            apply,
            strict,
        } = params.0;
        let desired = desired_from_mcp(&desired)?;
        let mode = ApplyMode::from_strict(strict.unwrap_or(true));

        let mut state = self.state.lock().await;
        let mut candidate = state.tree.clone();
        let assigned = candidate.ensure_all_ids();
        let outcome = generate(&mut candidate, &desired, &options);

        let report = if !apply {
            None
        } else if mode == ApplyMode::Strict && outcome.has_errors() {
            tracing::warn!(
                errors = outcome.errors.len(),
                "strict apply skipped: diff reported errors"
            );
            None
        } else {
            Some(apply_patch(&mut candidate, &outcome.operations, mode))
        };

        let applied = report.as_ref().map_or(0, |report| report.applied);
        if assigned > 0 || applied > 0 {
            self.persist(&candidate)?;
            state.tree = candidate;
        }

        Ok(Json(generate_response(&outcome, report.as_ref())))
    }

    /// Apply path- or id-addressed operations; strict (default) is all-or-nothing.
    #[tool(name = "scene.apply_patch")]
    async fn scene_apply_patch(
        &self,
        params: Parameters<ApplyPatchParams>,
    ) -> Result<Json<ApplyPatchResponse>, ErrorData> {
        let ApplyPatchParams { operations, strict } = params.0;
        let mode = ApplyMode::from_strict(strict.unwrap_or(true));
        let decoded = operations.iter().map(decode_patch_op).collect::<Vec<_>>();

        let mut state = self.state.lock().await;
        let mut candidate = state.tree.clone();
        let report = apply_decoded(&mut candidate, &decoded, mode);
        if report.applied > 0 {
            self.persist(&candidate)?;
            state.tree = candidate;
        }

        Ok(Json(mcp_report(&report)))
    }

    /// Revert the most recent committed batch.
    #[tool(name = "scene.undo")]
    async fn scene_undo(&self) -> Result<Json<SceneUndoResponse>, ErrorData> {
        let mut state = self.state.lock().await;
        let mut candidate = state.tree.clone();
        let label = candidate.undo();
        if label.is_some() {
            self.persist(&candidate)?;
            state.tree = candidate;
        }

        Ok(Json(SceneUndoResponse {
            undone: label.is_some(),
            label,
            remaining: state.tree.history_len() as u64,
        }))
    }

    /// Node types and the properties each accepts.
    #[tool(name = "scene.schema")]
    async fn scene_schema(
        &self,
        params: Parameters<SceneSchemaParams>,
    ) -> Result<Json<SceneSchemaResponse>, ErrorData> {
        let state = self.state.lock().await;
        let registry = state.tree.registry();

        let types = match params.0.type_name {
            Some(type_name) => {
                if !registry.is_known(&type_name) {
                    return Err(ErrorData::resource_not_found(
                        "unknown node type",
                        Some(serde_json::json!({ "type": type_name })),
                    ));
                }
                vec![mcp_type_schema(registry, &type_name)]
            }
            None => registry
                .types()
                .keys()
                .map(|name| mcp_type_schema(registry, name))
                .collect(),
        };

        Ok(Json(SceneSchemaResponse { types }))
    }
}

#[tool_handler]
impl ServerHandler for ScenePatchMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Scenepatch scene-graph reconciliation server (tools: scene.snapshot, scene.generate_patch, scene.apply_patch, scene.undo, scene.schema)"
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// Wire mapping and decoding helpers for the tool handlers.
include!("server/helpers.rs");
