// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Live scene tree, node addressing and type schema.
//!
//! A [`SceneTree`] is the explicit handle every reconciliation step receives.

pub mod desired;
pub mod fixtures;
pub mod ids;
pub mod path;
pub mod schema;
pub mod snapshot;
pub mod transaction;
pub mod tree;

pub use desired::DesiredNode;
pub use ids::{Id, IdError, InstanceId, NodeId};
pub use path::{validate_node_name, NameError, NodePath, PathError, FORBIDDEN_NAME_CHARS};
pub use schema::{PropertyKind, SchemaError, TypeRegistry, TypeSchema, DEFAULT_NODE_TYPE};
pub use snapshot::{SnapshotNode, SnapshotOptions, TreeSnapshot};
pub use transaction::Transaction;
pub use tree::{
    DetachedSubtree, SceneNode, SceneTree, TreeError, DEFAULT_HISTORY_LIMIT, NODE_ID_META_KEY,
};
