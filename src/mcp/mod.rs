// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Model Context Protocol (MCP) server surface.
//!
//! Exposes snapshotting, patch generation, patch application, and undo for one live scene.

mod server;
mod types;

pub use server::ScenePatchMcp;
pub use types::{McpDesiredNode, McpPatchOp, McpSceneNode};
