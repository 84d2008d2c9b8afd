// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use serde_json::Value;
use smol_str::SmolStr;

use super::ids::InstanceId;
use super::tree::{DetachedSubtree, SceneTree, TreeError};

/// Inverse of one applied mutation, keyed by instance id (paths go stale mid-batch).
#[derive(Debug, Clone)]
pub(crate) enum UndoEntry {
    Remove {
        key: InstanceId,
    },
    Restore {
        subtree: DetachedSubtree,
    },
    SetProperty {
        key: InstanceId,
        property: String,
        previous: Option<Value>,
    },
    Rename {
        key: InstanceId,
        previous: SmolStr,
    },
    Move {
        key: InstanceId,
        parent: InstanceId,
        index: usize,
    },
    Owner {
        owners: Vec<(InstanceId, Option<InstanceId>)>,
    },
}

/// One undo/redo group. Either committed into the tree history or rolled back.
#[must_use = "a transaction must be committed or rolled back"]
#[derive(Debug, Clone)]
pub struct Transaction {
    label: String,
    entries: Vec<UndoEntry>,
}

impl Transaction {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn record(&mut self, entry: UndoEntry) {
        self.entries.push(entry);
    }
}

impl SceneTree {
    /// Opens a transaction, or `None` when this tree cannot group mutations.
    pub fn begin_batch(&self, label: impl Into<String>) -> Option<Transaction> {
        self.supports_transactions().then(|| Transaction {
            label: label.into(),
            entries: Vec::new(),
        })
    }

    /// Keeps the mutations and makes the batch undoable. Empty batches leave no history entry.
    pub fn commit(&mut self, transaction: Transaction) {
        if transaction.is_empty() {
            return;
        }
        tracing::debug!(
            label = transaction.label(),
            entries = transaction.len(),
            "transaction committed"
        );
        self.push_history(transaction);
    }

    /// Reverts every mutation recorded in `transaction`, newest first.
    pub fn rollback(&mut self, transaction: Transaction) {
        tracing::debug!(
            label = transaction.label(),
            entries = transaction.len(),
            "transaction rolled back"
        );
        self.revert(transaction.entries);
    }

    /// Reverts the most recent committed batch and returns its label.
    pub fn undo(&mut self) -> Option<String> {
        let transaction = self.history.pop_back()?;
        let Transaction { label, entries } = transaction;
        self.revert(entries);
        Some(label)
    }

    fn revert(&mut self, entries: Vec<UndoEntry>) {
        for entry in entries.into_iter().rev() {
            if let Err(err) = self.revert_entry(entry) {
                tracing::error!(error = %err, "failed to revert scene mutation");
            }
        }
    }

    fn revert_entry(&mut self, entry: UndoEntry) -> Result<(), TreeError> {
        match entry {
            UndoEntry::Remove { key } => self.detach(key).map(drop),
            UndoEntry::Restore { subtree } => self.reattach(subtree),
            UndoEntry::SetProperty {
                key,
                property,
                previous,
            } => match previous {
                Some(value) => self.set_property(key, &property, value).map(drop),
                None => self.remove_property(key, &property).map(drop),
            },
            UndoEntry::Rename { key, previous } => self.rename(key, &previous).map(drop),
            UndoEntry::Move { key, parent, index } => {
                self.move_node(key, parent, Some(index)).map(drop)
            }
            UndoEntry::Owner { owners } => {
                self.restore_owners(owners);
                Ok(())
            }
        }
    }
}
