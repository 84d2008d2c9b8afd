// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Identity assignment: gives every live node a persistent, session-unique id.

use crate::model::{InstanceId, NodeId, SceneTree, TreeError};

/// Upper bound on candidates tried before giving up on a fresh id.
const MAX_ATTEMPTS: usize = 32;

/// Produces id candidates of the form `n<counter>-<instance>-<random>` (all hex).
#[derive(Debug, Clone, Default)]
pub struct IdAssigner {
    counter: u64,
}

impl IdAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issued(&self) -> u64 {
        self.counter
    }

    pub fn next_candidate(&mut self, instance: InstanceId) -> NodeId {
        self.counter += 1;
        let salt: u32 = rand::random();
        let raw = format!("n{:x}-{:x}-{salt:08x}", self.counter, instance.get());
        NodeId::new(raw).expect("generated ids contain neither slashes nor whitespace")
    }
}

impl SceneTree {
    /// Returns the node's id, assigning one first if it has none.
    ///
    /// Idempotent: a node that already carries an id keeps it. Fresh ids never collide with a
    /// live id or with one retired earlier in this session.
    pub fn ensure_id(&mut self, key: InstanceId) -> Result<NodeId, TreeError> {
        if !self.contains(key) {
            return Err(TreeError::UnknownNode { instance_id: key });
        }
        if let Some(existing) = self.node_id(key) {
            self.id_index.entry(existing.clone()).or_insert(key);
            return Ok(existing);
        }

        let mut attempts = 0;
        let id = loop {
            let candidate = self.assigner.next_candidate(key);
            if !self.id_index.contains_key(&candidate) && !self.retired_ids.contains(&candidate) {
                break candidate;
            }
            attempts += 1;
            if attempts >= MAX_ATTEMPTS {
                return Err(TreeError::DuplicateId { id: candidate });
            }
        };

        self.attach_id(key, id.clone())?;
        tracing::trace!(node = %key, id = %id, "assigned node id");
        Ok(id)
    }

    /// Assigns ids to every node that lacks one; returns how many were assigned.
    pub fn ensure_all_ids(&mut self) -> usize {
        let mut assigned = 0;
        for key in self.pre_order(self.root()) {
            if self.node_id(key).is_some() {
                continue;
            }
            match self.ensure_id(key) {
                Ok(_) => assigned += 1,
                Err(err) => tracing::warn!(node = %key, error = %err, "could not assign node id"),
            }
        }
        if assigned > 0 {
            tracing::debug!(assigned, "assigned missing node ids");
        }
        assigned
    }
}
