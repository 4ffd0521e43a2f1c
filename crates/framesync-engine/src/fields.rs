//! The collaborator contract: what the host declares about unit types.
//!
//! The host supplies, per unit type, the set of field names and their
//! editability class, plus which unit types may be nested as children. The
//! bridge never infers editability from markup: an undeclared field is
//! [`FieldKind::Unknown`] and is not assumed safe to edit.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Single-line plain text.
    Plain,
    /// Multi-line plain text.
    Multiline,
    /// Structured rich text (tree-valued; structural commands apply).
    RichText,
    /// Not declared by the host. Never editable.
    Unknown,
}

impl FieldKind {
    pub fn is_editable(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UnitTypeSchema {
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    /// Unit types allowed as direct children. `None` means unconstrained.
    #[serde(default)]
    pub allowed_children: Option<BTreeSet<String>>,
}

/// Host-declared schemas keyed by unit type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaRegistry {
    types: HashMap<String, UnitTypeSchema>,
}

impl SchemaRegistry {
    pub fn new(types: HashMap<String, UnitTypeSchema>) -> Self {
        Self { types }
    }

    pub fn insert(&mut self, unit_type: impl Into<String>, schema: UnitTypeSchema) {
        self.types.insert(unit_type.into(), schema);
    }

    pub fn field_kind(&self, unit_type: &str, field: &str) -> FieldKind {
        self.types
            .get(unit_type)
            .and_then(|s| s.fields.iter().find(|f| f.name == field))
            .map_or(FieldKind::Unknown, |f| f.kind)
    }

    /// The declared field inventory for a unit type; empty for undeclared
    /// types (everything in them reads as `Unknown`).
    pub fn fields_of(&self, unit_type: &str) -> Vec<FieldDescriptor> {
        self.types
            .get(unit_type)
            .map(|s| s.fields.clone())
            .unwrap_or_default()
    }

    /// Whether `parent_type` accepts `child_type` as a direct child. The
    /// document root (`None`) accepts everything; an undeclared parent type
    /// accepts nothing, consistent with "unknown means unsafe".
    pub fn allows_child(&self, parent_type: Option<&str>, child_type: &str) -> bool {
        match parent_type {
            None => true,
            Some(parent) => match self.types.get(parent) {
                None => false,
                Some(schema) => match &schema.allowed_children {
                    None => true,
                    Some(allowed) => allowed.contains(child_type),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::default();
        registry.insert(
            "hero",
            UnitTypeSchema {
                fields: vec![
                    FieldDescriptor {
                        name: "title".to_string(),
                        kind: FieldKind::Plain,
                    },
                    FieldDescriptor {
                        name: "body".to_string(),
                        kind: FieldKind::RichText,
                    },
                ],
                allowed_children: None,
            },
        );
        registry.insert(
            "carousel",
            UnitTypeSchema {
                fields: vec![],
                allowed_children: Some(["slide".to_string()].into()),
            },
        );
        registry
    }

    #[test]
    fn undeclared_fields_are_unknown_and_not_editable() {
        let registry = registry();
        assert_eq!(registry.field_kind("hero", "title"), FieldKind::Plain);
        assert_eq!(registry.field_kind("hero", "subtitle"), FieldKind::Unknown);
        assert_eq!(registry.field_kind("mystery", "title"), FieldKind::Unknown);
        assert!(!FieldKind::Unknown.is_editable());
    }

    #[test]
    fn child_constraints_consult_the_declared_set() {
        let registry = registry();
        assert!(registry.allows_child(Some("carousel"), "slide"));
        assert!(!registry.allows_child(Some("carousel"), "hero"));
        // unconstrained parent accepts anything
        assert!(registry.allows_child(Some("hero"), "carousel"));
        // the document root accepts anything
        assert!(registry.allows_child(None, "hero"));
        // undeclared parents accept nothing
        assert!(!registry.allows_child(Some("mystery"), "hero"));
    }
}
