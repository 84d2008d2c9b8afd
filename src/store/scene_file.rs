// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{
    IdError, InstanceId, NodeId, SceneTree, TreeError, TypeRegistry, DEFAULT_NODE_TYPE,
    NODE_ID_META_KEY,
};

/// Version tag written into every scene document.
pub const SCENE_FORMAT: u32 = 1;

#[derive(Debug)]
pub enum StoreError {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    UnsupportedFormat {
        path: PathBuf,
        format: u32,
    },
    InvalidScene {
        path: PathBuf,
        source: TreeError,
    },
    InvalidId {
        path: PathBuf,
        value: String,
        source: IdError,
    },
    SymlinkRefused {
        path: PathBuf,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "io error at {path:?}: {source}"),
            Self::Json { path, source } => write!(f, "json error at {path:?}: {source}"),
            Self::UnsupportedFormat { path, format } => {
                write!(f, "unsupported scene format {format} in {path:?} (expected {SCENE_FORMAT})")
            }
            Self::InvalidScene { path, source } => write!(f, "invalid scene in {path:?}: {source}"),
            Self::InvalidId {
                path,
                value,
                source,
            } => write!(f, "invalid node id '{value}' in {path:?}: {source}"),
            Self::SymlinkRefused { path } => {
                write!(f, "refusing to write through symlink at {path:?}")
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::InvalidScene { source, .. } => Some(source),
            Self::InvalidId { source, .. } => Some(source),
            Self::UnsupportedFormat { .. } | Self::SymlinkRefused { .. } => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WriteDurability {
    /// Writes a temp file and renames it into place, without fsync.
    #[default]
    BestEffort,

    /// Also flushes the file and its directory entry to stable storage where the platform
    /// allows it.
    Durable,
}

#[derive(Debug, Serialize, Deserialize)]
struct SceneDocument {
    format: u32,
    root: StoredNode,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredNode {
    name: String,
    #[serde(rename = "type", default = "default_type")]
    type_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    properties: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    meta: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<StoredNode>,
}

fn default_type() -> String {
    DEFAULT_NODE_TYPE.to_owned()
}

/// A scene document on disk.
#[derive(Debug, Clone)]
pub struct SceneFile {
    path: PathBuf,
    durability: WriteDurability,
}

impl SceneFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            durability: WriteDurability::default(),
        }
    }

    pub fn with_durability(mut self, durability: WriteDurability) -> Self {
        self.durability = durability;
        self
    }

    pub fn durability(&self) -> WriteDurability {
        self.durability
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Loads the scene, or creates and saves an empty one (`root` of type `Node`).
    pub fn load_or_init(&self, registry: Arc<TypeRegistry>) -> Result<SceneTree, StoreError> {
        if self.exists() {
            return self.load(registry);
        }
        let tree = SceneTree::new("root", DEFAULT_NODE_TYPE, registry).map_err(|source| {
            StoreError::InvalidScene {
                path: self.path.clone(),
                source,
            }
        })?;
        self.save(&tree)?;
        Ok(tree)
    }

    pub fn load(&self, registry: Arc<TypeRegistry>) -> Result<SceneTree, StoreError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        let document: SceneDocument =
            serde_json::from_str(&raw).map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            })?;
        if document.format != SCENE_FORMAT {
            return Err(StoreError::UnsupportedFormat {
                path: self.path.clone(),
                format: document.format,
            });
        }

        let root = document.root;
        let mut tree = SceneTree::new(&root.name, &root.type_name, registry)
            .map_err(|source| self.invalid(source))?;
        let root_key = tree.root();
        for (property, value) in root.properties {
            tree.set_property(root_key, &property, value)
                .map_err(|source| self.invalid(source))?;
        }
        self.restore_meta(&mut tree, root_key, root.meta)?;
        for child in root.children {
            self.restore_node(&mut tree, root_key, child)?;
        }

        tracing::info!(path = %self.path.display(), nodes = tree.len(), "scene loaded");
        Ok(tree)
    }

    fn invalid(&self, source: TreeError) -> StoreError {
        StoreError::InvalidScene {
            path: self.path.clone(),
            source,
        }
    }

    fn restore_node(
        &self,
        tree: &mut SceneTree,
        parent: InstanceId,
        node: StoredNode,
    ) -> Result<(), StoreError> {
        let key = tree
            .add_child(parent, &node.name, &node.type_name, node.properties)
            .map_err(|source| self.invalid(source))?;
        self.restore_meta(tree, key, node.meta)?;
        for child in node.children {
            self.restore_node(tree, key, child)?;
        }
        Ok(())
    }

    fn restore_meta(
        &self,
        tree: &mut SceneTree,
        key: InstanceId,
        meta: BTreeMap<String, Value>,
    ) -> Result<(), StoreError> {
        for (meta_key, value) in meta {
            if meta_key == NODE_ID_META_KEY {
                let raw = value.as_str().unwrap_or_default().to_owned();
                let id = NodeId::new(raw.clone()).map_err(|source| StoreError::InvalidId {
                    path: self.path.clone(),
                    value: raw,
                    source,
                })?;
                tree.attach_id(key, id).map_err(|source| self.invalid(source))?;
            } else {
                tree.set_metadata(key, &meta_key, value)
                    .map_err(|source| self.invalid(source))?;
            }
        }
        Ok(())
    }

    /// Writes the owned part of `tree` atomically.
    pub fn save(&self, tree: &SceneTree) -> Result<(), StoreError> {
        let document = SceneDocument {
            format: SCENE_FORMAT,
            root: stored_node(tree, tree.root()),
        };
        let mut contents =
            serde_json::to_vec_pretty(&document).map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            })?;
        contents.push(b'\n');
        write_atomic(&self.path, &contents, self.durability)?;
        tracing::debug!(path = %self.path.display(), bytes = contents.len(), "scene saved");
        Ok(())
    }
}

fn stored_node(tree: &SceneTree, key: InstanceId) -> StoredNode {
    let node = tree.node(key).expect("stored_node walks existing nodes");
    let root = tree.root();
    let children = node
        .children()
        .iter()
        .copied()
        .filter(|child| tree.node(*child).and_then(|n| n.owner()) == Some(root))
        .map(|child| stored_node(tree, child))
        .collect();

    StoredNode {
        name: node.name().to_owned(),
        type_name: node.type_name().to_owned(),
        properties: node.properties().clone(),
        meta: node.metadata().clone(),
        children,
    }
}

fn rename_overwrite(from: &Path, to: &Path) -> io::Result<()> {
    #[cfg(windows)]
    {
        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::AlreadyExists | io::ErrorKind::PermissionDenied
                ) =>
            {
                let _ = fs::remove_file(to);
                fs::rename(from, to)
            }
            Err(err) => Err(err),
        }
    }

    #[cfg(not(windows))]
    {
        fs::rename(from, to)
    }
}

fn write_atomic(
    path: &Path,
    contents: &[u8],
    durability: WriteDurability,
) -> Result<(), StoreError> {
    let io_err = |path: &Path, source: io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    match fs::symlink_metadata(path) {
        Ok(md) if md.file_type().is_symlink() => {
            return Err(StoreError::SymlinkRefused {
                path: path.to_path_buf(),
            });
        }
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(io_err(path, source)),
    }

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|source| io_err(parent, source))?;

    let Some(file_name) = path.file_name() else {
        return Err(io_err(
            path,
            io::Error::new(io::ErrorKind::Other, "path has no file name"),
        ));
    };

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let tmp_path = parent.join(format!(
        ".scenepatch.tmp.{}.{}",
        file_name.to_string_lossy(),
        nanos
    ));

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp_path)
        .map_err(|source| io_err(&tmp_path, source))?;
    file.write_all(contents)
        .map_err(|source| io_err(&tmp_path, source))?;
    if durability == WriteDurability::Durable {
        file.sync_all()
            .map_err(|source| io_err(&tmp_path, source))?;
    }
    drop(file);

    if let Err(source) = rename_overwrite(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(io_err(path, source));
    }

    if durability == WriteDurability::Durable {
        #[cfg(unix)]
        {
            let dir = fs::File::open(parent).map_err(|source| io_err(parent, source))?;
            dir.sync_all().map_err(|source| io_err(parent, source))?;
        }
    }

    Ok(())
}
