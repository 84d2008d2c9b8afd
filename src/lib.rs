// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Scenepatch: scene-graph reconciliation with stable node identity.
//!
//! Snapshot a live [`model::SceneTree`], diff it against a desired shape ([`diff`]), and apply
//! the resulting operations transactionally ([`ops`]), addressing nodes by path or by id.

pub mod diff;
pub mod identity;
pub mod mcp;
pub mod model;
pub mod ops;
pub mod store;
