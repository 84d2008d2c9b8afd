// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Persistence for scenes on disk.
//!
//! A scene is one JSON document holding the owned part of the tree, including each node's hidden
//! identity tag, so ids survive a save/load round trip.

pub mod scene_file;

pub use scene_file::{SceneFile, StoreError, WriteDurability, SCENE_FORMAT};
