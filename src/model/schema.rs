// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Declared per-type property schemas.
//!
//! Validation asks the registry whether a node type declares a property (walking the `base`
//! chain) instead of probing live objects.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;

/// Type used for desired nodes that do not name one.
pub const DEFAULT_NODE_TYPE: &str = "Node";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Bool,
    Int,
    Float,
    String,
    Vector2,
    Vector3,
    Color,
    Array,
    Dictionary,
    Variant,
}

impl PropertyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Vector2 => "vector2",
            Self::Vector3 => "vector3",
            Self::Color => "color",
            Self::Array => "array",
            Self::Dictionary => "dictionary",
            Self::Variant => "variant",
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Bool => value.is_boolean(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::String => value.is_string(),
            Self::Vector2 => is_numeric_tuple(value, &["x", "y"]),
            Self::Vector3 => is_numeric_tuple(value, &["x", "y", "z"]),
            Self::Color => is_color(value),
            Self::Array => value.is_array(),
            Self::Dictionary => value.is_object(),
            Self::Variant => true,
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_numeric_tuple(value: &Value, axes: &[&str]) -> bool {
    match value {
        Value::Array(items) => items.len() == axes.len() && items.iter().all(Value::is_number),
        Value::Object(map) => {
            map.len() == axes.len()
                && axes
                    .iter()
                    .all(|axis| map.get(*axis).is_some_and(Value::is_number))
        }
        _ => false,
    }
}

fn is_color(value: &Value) -> bool {
    match value {
        Value::String(raw) => {
            let Some(hex) = raw.strip_prefix('#') else {
                return false;
            };
            matches!(hex.len(), 6 | 8) && hex.chars().all(|ch| ch.is_ascii_hexdigit())
        }
        Value::Array(items) => {
            matches!(items.len(), 3 | 4) && items.iter().all(Value::is_number)
        }
        Value::Object(map) => {
            ["r", "g", "b"]
                .iter()
                .all(|channel| map.get(*channel).is_some_and(Value::is_number))
                && map.get("a").map_or(true, Value::is_number)
                && map.keys().all(|key| matches!(key.as_str(), "r" | "g" | "b" | "a"))
        }
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<SmolStr>,
    #[serde(default = "default_instantiable")]
    pub instantiable: bool,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyKind>,
}

fn default_instantiable() -> bool {
    true
}

impl TypeSchema {
    fn new(base: Option<&str>, instantiable: bool, properties: &[(&str, PropertyKind)]) -> Self {
        Self {
            base: base.map(SmolStr::new),
            instantiable,
            properties: properties
                .iter()
                .map(|(name, kind)| ((*name).to_owned(), *kind))
                .collect(),
        }
    }
}

#[derive(Debug)]
pub enum SchemaError {
    Json(serde_json::Error),
    UnknownBase { type_name: SmolStr, base: SmolStr },
    BaseCycle { type_name: SmolStr },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid type registry json: {err}"),
            Self::UnknownBase { type_name, base } => {
                write!(f, "type {type_name} extends unknown base type {base}")
            }
            Self::BaseCycle { type_name } => {
                write!(f, "type {type_name} has a cyclic base chain")
            }
        }
    }
}

impl std::error::Error for SchemaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    types: BTreeMap<SmolStr, TypeSchema>,
}

/// Mapping from node type name to its declared schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeRegistry {
    types: BTreeMap<SmolStr, TypeSchema>,
}

impl TypeRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The stock node classes the server knows without configuration.
    pub fn builtin() -> Self {
        use PropertyKind::*;

        let mut registry = Self::empty();
        let mut add = |name: &str, schema: TypeSchema| {
            registry.types.insert(SmolStr::new(name), schema);
        };

        add(
            "Node",
            TypeSchema::new(
                None,
                true,
                &[("process_mode", Int), ("editor_description", String), ("groups", Array)],
            ),
        );
        add(
            "CanvasItem",
            TypeSchema::new(
                Some("Node"),
                false,
                &[("visible", Bool), ("modulate", Color), ("z_index", Int)],
            ),
        );
        add(
            "Node2D",
            TypeSchema::new(
                Some("CanvasItem"),
                true,
                &[("position", Vector2), ("rotation", Float), ("scale", Vector2)],
            ),
        );
        add(
            "Sprite2D",
            TypeSchema::new(
                Some("Node2D"),
                true,
                &[("texture", String), ("centered", Bool), ("flip_h", Bool), ("frame", Int)],
            ),
        );
        add(
            "Camera2D",
            TypeSchema::new(Some("Node2D"), true, &[("zoom", Vector2), ("enabled", Bool)]),
        );
        add(
            "CharacterBody2D",
            TypeSchema::new(Some("Node2D"), true, &[("velocity", Vector2)]),
        );
        add(
            "Control",
            TypeSchema::new(
                Some("CanvasItem"),
                true,
                &[
                    ("position", Vector2),
                    ("size", Vector2),
                    ("anchors_preset", Int),
                    ("theme_type_variation", String),
                ],
            ),
        );
        add(
            "Label",
            TypeSchema::new(
                Some("Control"),
                true,
                &[("text", String), ("horizontal_alignment", Int), ("autowrap_mode", Int)],
            ),
        );
        add(
            "Button",
            TypeSchema::new(
                Some("Control"),
                true,
                &[("text", String), ("disabled", Bool), ("toggle_mode", Bool)],
            ),
        );
        add("Panel", TypeSchema::new(Some("Control"), true, &[]));
        add(
            "CanvasLayer",
            TypeSchema::new(
                Some("Node"),
                true,
                &[("layer", Int), ("visible", Bool), ("offset", Vector2)],
            ),
        );
        add(
            "Node3D",
            TypeSchema::new(
                Some("Node"),
                true,
                &[
                    ("position", Vector3),
                    ("rotation", Vector3),
                    ("scale", Vector3),
                    ("visible", Bool),
                ],
            ),
        );
        add(
            "MeshInstance3D",
            TypeSchema::new(Some("Node3D"), true, &[("mesh", String), ("cast_shadow", Int)]),
        );
        add(
            "Timer",
            TypeSchema::new(
                Some("Node"),
                true,
                &[("wait_time", Float), ("one_shot", Bool), ("autostart", Bool)],
            ),
        );

        registry
    }

    /// Parses `{"types": {"Enemy": {"base": "CharacterBody2D", "properties": {...}}}}`.
    pub fn from_json_str(input: &str) -> Result<Self, SchemaError> {
        let file: RegistryFile = serde_json::from_str(input).map_err(SchemaError::Json)?;
        let registry = Self { types: file.types };
        Ok(registry)
    }

    /// Adds or replaces the types of `other`, then checks every base chain.
    pub fn merge(mut self, other: TypeRegistry) -> Result<Self, SchemaError> {
        self.types.extend(other.types);
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        for type_name in self.types.keys() {
            let mut seen = HashSet::new();
            let mut current = type_name;
            loop {
                if !seen.insert(current) {
                    return Err(SchemaError::BaseCycle {
                        type_name: type_name.clone(),
                    });
                }
                let Some(base) = self.types.get(current).and_then(|s| s.base.as_ref()) else {
                    break;
                };
                if !self.types.contains_key(base) {
                    return Err(SchemaError::UnknownBase {
                        type_name: current.clone(),
                        base: base.clone(),
                    });
                }
                current = base;
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, type_name: impl Into<SmolStr>, schema: TypeSchema) {
        self.types.insert(type_name.into(), schema);
    }

    pub fn get(&self, type_name: &str) -> Option<&TypeSchema> {
        self.types.get(type_name)
    }

    pub fn types(&self) -> &BTreeMap<SmolStr, TypeSchema> {
        &self.types
    }

    pub fn is_known(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn is_instantiable(&self, type_name: &str) -> bool {
        self.get(type_name).is_some_and(|schema| schema.instantiable)
    }

    /// Walks `type_name` and its bases, most derived first.
    pub fn lineage<'a>(
        &'a self,
        type_name: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a TypeSchema)> + 'a {
        let mut next = Some(type_name);
        let mut guard = 0usize;
        std::iter::from_fn(move || {
            let name = next.take()?;
            guard += 1;
            if guard > self.types.len() {
                return None;
            }
            let (key, schema) = self.types.get_key_value(name)?;
            next = schema.base.as_deref();
            Some((key.as_str(), schema))
        })
    }

    pub fn property_kind(&self, type_name: &str, property: &str) -> Option<PropertyKind> {
        self.lineage(type_name)
            .find_map(|(_, schema)| schema.properties.get(property).copied())
    }

    pub fn declares(&self, type_name: &str, property: &str) -> bool {
        self.property_kind(type_name, property).is_some()
    }

    pub fn property_names<'a>(&'a self, type_name: &'a str) -> BTreeSet<&'a str> {
        self.lineage(type_name)
            .flat_map(|(_, schema)| schema.properties.keys().map(String::as_str))
            .collect()
    }
}
