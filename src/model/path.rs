// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;
use smol_str::SmolStr;

/// Characters that may never appear in a node name (they are path or id syntax).
pub const FORBIDDEN_NAME_CHARS: &[char] = &['/', ':', '@', '.', '%', '"'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    Empty,
    ForbiddenChar { ch: char },
    SurroundingWhitespace,
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("node name must not be empty"),
            Self::ForbiddenChar { ch } => write!(f, "node name must not contain '{ch}'"),
            Self::SurroundingWhitespace => {
                f.write_str("node name must not start or end with whitespace")
            }
        }
    }
}

impl std::error::Error for NameError {}

pub fn validate_node_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if let Some(ch) = name.chars().find(|ch| FORBIDDEN_NAME_CHARS.contains(ch)) {
        return Err(NameError::ForbiddenChar { ch });
    }
    if name.trim() != name {
        return Err(NameError::SurroundingWhitespace);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    EmptyAbsolute,
    EmptySegment { position: usize },
    InvalidSegment { segment: String, reason: NameError },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyAbsolute => f.write_str("absolute path must name the root node"),
            Self::EmptySegment { position } => {
                write!(f, "path has an empty segment at position {position}")
            }
            Self::InvalidSegment { segment, reason } => {
                write!(f, "invalid path segment '{segment}': {reason}")
            }
        }
    }
}

impl std::error::Error for PathError {}

/// Address of a node by walking names from the root.
///
/// A path is only valid at the instant it was computed; any rename or reparent may invalidate
/// it. Absolute paths start with the root's name (`/root/UI/Hero`), relative paths start below
/// the root (`UI/Hero`, `.` for the root itself).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath {
    absolute: bool,
    segments: SmallVec<[SmolStr; 6]>,
}

impl NodePath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "." {
            return Ok(Self::relative_root());
        }

        let (absolute, body) = match trimmed.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix("./").unwrap_or(trimmed)),
        };
        if absolute && body.is_empty() {
            return Err(PathError::EmptyAbsolute);
        }

        let mut segments = SmallVec::new();
        for (position, segment) in body.split('/').enumerate() {
            if segment.is_empty() {
                return Err(PathError::EmptySegment { position });
            }
            validate_node_name(segment).map_err(|reason| PathError::InvalidSegment {
                segment: segment.to_owned(),
                reason,
            })?;
            segments.push(SmolStr::new(segment));
        }

        Ok(Self { absolute, segments })
    }

    /// The root, addressed relatively (`.`).
    pub fn relative_root() -> Self {
        Self {
            absolute: false,
            segments: SmallVec::new(),
        }
    }

    pub fn from_segments<I, S>(absolute: bool, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        Self {
            absolute,
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn segments(&self) -> &[SmolStr] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, i.e. the addressed node's name.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(SmolStr::as_str)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() || (self.absolute && self.segments.len() == 1) {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self {
            absolute: self.absolute,
            segments,
        })
    }

    pub fn join(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(SmolStr::new(name));
        Self {
            absolute: self.absolute,
            segments,
        }
    }

    pub fn with_name(&self, name: &str) -> Self {
        match self.parent() {
            Some(parent) => parent.join(name),
            None if self.absolute => Self::from_segments(true, [name]),
            None => self.clone(),
        }
    }

    /// Normalizes to the absolute form given the current root name.
    pub fn to_absolute(&self, root_name: &str) -> Self {
        if self.absolute {
            return self.clone();
        }
        let mut segments = SmallVec::with_capacity(self.segments.len() + 1);
        segments.push(SmolStr::new(root_name));
        segments.extend(self.segments.iter().cloned());
        Self {
            absolute: true,
            segments,
        }
    }

    /// `true` when `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &NodePath) -> bool {
        self.absolute == prefix.absolute
            && self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    pub fn is_strict_descendant_of(&self, ancestor: &NodePath) -> bool {
        self.segments.len() > ancestor.segments.len() && self.starts_with(ancestor)
    }

    /// Rewrites `old` (or an ancestor of this path equal to `old`) to `new`.
    pub fn replace_prefix(&self, old: &NodePath, new: &NodePath) -> Option<Self> {
        if !self.starts_with(old) {
            return None;
        }
        let mut segments = new.segments.clone();
        segments.extend(self.segments[old.segments.len()..].iter().cloned());
        Some(Self {
            absolute: new.absolute,
            segments,
        })
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str(if self.absolute { "/" } else { "." });
        }
        for (idx, segment) in self.segments.iter().enumerate() {
            if self.absolute || idx > 0 {
                f.write_str("/")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_node_name, NameError, NodePath, PathError};

    fn path(raw: &str) -> NodePath {
        NodePath::parse(raw).expect("path")
    }

    #[test]
    fn parses_absolute_and_relative_forms() {
        let abs = path("/root/UI/Hero");
        assert!(abs.is_absolute());
        assert_eq!(abs.segments(), ["root", "UI", "Hero"]);
        assert_eq!(abs.to_string(), "/root/UI/Hero");

        let rel = path("UI/Hero");
        assert!(!rel.is_absolute());
        assert_eq!(rel.to_string(), "UI/Hero");
        assert_eq!(rel.to_absolute("root"), abs);

        assert_eq!(path("."), NodePath::relative_root());
        assert_eq!(path(""), NodePath::relative_root());
        assert_eq!(path("./UI"), path("UI"));
        assert_eq!(NodePath::relative_root().to_absolute("root"), path("/root"));
    }

    #[test]
    fn rejects_malformed_paths() {
        assert_eq!(NodePath::parse("/"), Err(PathError::EmptyAbsolute));
        assert_eq!(
            NodePath::parse("/root//UI"),
            Err(PathError::EmptySegment { position: 1 })
        );
        assert!(matches!(
            NodePath::parse("/root/a:b"),
            Err(PathError::InvalidSegment { .. })
        ));
    }

    #[test]
    fn parent_stops_at_root() {
        assert_eq!(path("/root/UI").parent(), Some(path("/root")));
        assert_eq!(path("/root").parent(), None);
        assert_eq!(path("UI").parent(), Some(NodePath::relative_root()));
    }

    #[test]
    fn replace_prefix_rewrites_descendants_only() {
        let old = path("/root/Player");
        let new = path("/root/UI/Hero");
        assert_eq!(
            path("/root/Player/Sprite").replace_prefix(&old, &new),
            Some(path("/root/UI/Hero/Sprite"))
        );
        assert_eq!(path("/root/Player").replace_prefix(&old, &new), Some(new.clone()));
        assert_eq!(path("/root/Players").replace_prefix(&old, &new), None);
        assert!(path("/root/Player/Sprite").is_strict_descendant_of(&old));
        assert!(!old.is_strict_descendant_of(&old));
    }

    #[test]
    fn node_names_reject_path_syntax() {
        assert_eq!(validate_node_name(""), Err(NameError::Empty));
        assert_eq!(
            validate_node_name("a.b"),
            Err(NameError::ForbiddenChar { ch: '.' })
        );
        assert_eq!(
            validate_node_name(" Hero"),
            Err(NameError::SurroundingWhitespace)
        );
        assert!(validate_node_name("Hero 2").is_ok());
    }
}
