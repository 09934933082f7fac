//! Entity schema declarations.
//!
//! # Responsibility
//! - Describe an entity type: persisted attributes, ignored (computed)
//!   attributes and relationship declarations.
//! - Check declarations for consistency before a store touches them.
//!
//! # Invariants
//! - Schemas are static for the process lifetime.
//! - Every inverse declaration has a matching owning declaration on the
//!   related type, keyed by the same foreign-key attribute.
//! - Building a schema never evaluates related schemas; self-referential and
//!   cyclic declarations are resolved lazily through `fn` pointers.

use crate::model::value::AttrKind;
use convert_case::{Case, Casing};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use thiserror::Error;

/// Columns every entity table carries in addition to declared attributes.
pub const RESERVED_COLUMNS: [&str; 4] = ["seq", "uid", "created_at", "updated_at"];

const FOREIGN_KEY_SUFFIX: &str = "_id";
const TABLE_PREFIX: &str = "rec_";

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Conventional foreign-key attribute name for references to `type_name`.
///
/// ```
/// assert_eq!(activestore_core::foreign_key_for("BlogPost"), "blog_post_id");
/// ```
pub fn foreign_key_for(type_name: &str) -> String {
    format!("{}{FOREIGN_KEY_SUFFIX}", type_name.to_case(Case::Snake))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("{entity}: `{name}` is not a valid identifier")]
    InvalidIdentifier { entity: &'static str, name: String },
    #[error("{entity}: attribute `{name}` is declared twice")]
    DuplicateAttribute { entity: &'static str, name: String },
    #[error("{entity}: attribute `{name}` collides with a reserved column")]
    ReservedAttribute { entity: &'static str, name: String },
    #[error("{entity}: relationship `{name}` is declared twice")]
    DuplicateRelationship { entity: &'static str, name: String },
    #[error("{entity}: relationship `{name}` is not declared")]
    UndeclaredRelationship { entity: &'static str, name: String },
    #[error("{entity}: owning relationship `{name}` must have cardinality one")]
    OwningMany { entity: &'static str, name: String },
    #[error("{entity}: relationship `{relationship}` needs text attribute `{foreign_key}` on {holder}")]
    ForeignKey {
        entity: &'static str,
        relationship: String,
        foreign_key: String,
        holder: &'static str,
    },
    #[error("{entity}: inverse relationship `{relationship}` has no owning side on {related} keyed by `{foreign_key}`")]
    MissingOwningSide {
        entity: &'static str,
        relationship: String,
        related: &'static str,
        foreign_key: String,
    },
    #[error("{entity}: table `{table}` is already used by {existing}")]
    TableConflict {
        entity: &'static str,
        table: String,
        existing: String,
    },
}

/// A persisted scalar attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDecl {
    pub name: &'static str,
    pub kind: AttrKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// Which side stores the foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// This entity holds the foreign key.
    Owning,
    /// The related entity holds a foreign key pointing back here. Dependents
    /// reached through inverse declarations are removed by cascade deletes.
    Inverse,
}

/// A named association to another entity type.
#[derive(Clone, Copy)]
pub struct RelationshipDecl {
    name: &'static str,
    cardinality: Cardinality,
    direction: Direction,
    related: fn() -> &'static EntitySchema,
    foreign_key: Option<&'static str>,
    owner: &'static str,
}

impl std::fmt::Debug for RelationshipDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationshipDecl")
            .field("name", &self.name)
            .field("cardinality", &self.cardinality)
            .field("direction", &self.direction)
            .field("foreign_key", &self.foreign_key)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl RelationshipDecl {
    pub fn new(
        name: &'static str,
        cardinality: Cardinality,
        direction: Direction,
        related: fn() -> &'static EntitySchema,
    ) -> Self {
        Self {
            name,
            cardinality,
            direction,
            related,
            foreign_key: None,
            owner: "",
        }
    }

    /// Overrides the conventional foreign-key attribute name.
    pub fn with_foreign_key(mut self, foreign_key: &'static str) -> Self {
        self.foreign_key = Some(foreign_key);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn related(&self) -> &'static EntitySchema {
        (self.related)()
    }

    /// Foreign-key attribute name. Owning keys live on the declaring type and
    /// default to the related type's name; inverse keys live on the related
    /// type and default to the declaring type's name.
    pub fn foreign_key(&self) -> String {
        match (self.foreign_key, self.direction) {
            (Some(explicit), _) => explicit.to_string(),
            (None, Direction::Owning) => foreign_key_for(self.related().type_name()),
            (None, Direction::Inverse) => foreign_key_for(self.owner),
        }
    }
}

/// Static description of one entity type.
#[derive(Debug)]
pub struct EntitySchema {
    type_name: &'static str,
    table_name: String,
    attributes: Vec<AttributeDecl>,
    ignored: Vec<&'static str>,
    relationships: Vec<RelationshipDecl>,
}

impl EntitySchema {
    pub fn builder(type_name: &'static str) -> EntitySchemaBuilder {
        EntitySchemaBuilder {
            schema: EntitySchema {
                type_name,
                table_name: format!("{TABLE_PREFIX}{}", type_name.to_case(Case::Snake)),
                attributes: Vec::new(),
                ignored: Vec::new(),
                relationships: Vec::new(),
            },
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn attributes(&self) -> &[AttributeDecl] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDecl> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    /// Names of computed attributes that are never persisted.
    pub fn ignored(&self) -> &[&'static str] {
        &self.ignored
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored.contains(&name)
    }

    pub fn relationships(&self) -> &[RelationshipDecl] {
        &self.relationships
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipDecl> {
        self.relationships.iter().find(|decl| decl.name == name)
    }

    /// Kind of a queryable column: a declared attribute, `uid` or a timestamp.
    pub fn column_kind(&self, name: &str) -> Option<AttrKind> {
        match name {
            "uid" => Some(AttrKind::Text),
            "created_at" | "updated_at" => Some(AttrKind::Integer),
            _ => self.attribute(name).map(|attr| attr.kind),
        }
    }

    /// Checks names and relationship wiring.
    ///
    /// Related schemas are evaluated here, so this must not be called while
    /// any participating schema is still being built.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let entity = self.type_name;
        if !IDENTIFIER_RE.is_match(entity) {
            return Err(SchemaError::InvalidIdentifier {
                entity,
                name: entity.to_string(),
            });
        }

        let mut seen = HashSet::new();
        for name in self.attributes.iter().map(|attr| attr.name).chain(self.ignored.iter().copied()) {
            if !IDENTIFIER_RE.is_match(name) {
                return Err(SchemaError::InvalidIdentifier {
                    entity,
                    name: name.to_string(),
                });
            }
            if RESERVED_COLUMNS.contains(&name) {
                return Err(SchemaError::ReservedAttribute {
                    entity,
                    name: name.to_string(),
                });
            }
            if !seen.insert(name) {
                return Err(SchemaError::DuplicateAttribute {
                    entity,
                    name: name.to_string(),
                });
            }
        }

        let mut relationship_names = HashSet::new();
        for decl in &self.relationships {
            if !relationship_names.insert(decl.name) {
                return Err(SchemaError::DuplicateRelationship {
                    entity,
                    name: decl.name.to_string(),
                });
            }
            self.validate_relationship(decl)?;
        }

        Ok(())
    }

    fn validate_relationship(&self, decl: &RelationshipDecl) -> Result<(), SchemaError> {
        let entity = self.type_name;
        let foreign_key = decl.foreign_key();
        let related = decl.related();

        let holder = match decl.direction {
            Direction::Owning => {
                if decl.cardinality == Cardinality::Many {
                    return Err(SchemaError::OwningMany {
                        entity,
                        name: decl.name.to_string(),
                    });
                }
                self
            }
            Direction::Inverse => related,
        };
        if holder.attribute(&foreign_key).map(|attr| attr.kind) != Some(AttrKind::Text) {
            return Err(SchemaError::ForeignKey {
                entity,
                relationship: decl.name.to_string(),
                foreign_key,
                holder: holder.type_name,
            });
        }

        if decl.direction == Direction::Inverse {
            let has_owning_side = related.relationships.iter().any(|back| {
                back.direction == Direction::Owning
                    && back.related().type_name == entity
                    && back.foreign_key() == foreign_key
            });
            if !has_owning_side {
                return Err(SchemaError::MissingOwningSide {
                    entity,
                    relationship: decl.name.to_string(),
                    related: related.type_name,
                    foreign_key,
                });
            }
        }

        Ok(())
    }
}

/// Incremental [`EntitySchema`] construction.
#[derive(Debug)]
pub struct EntitySchemaBuilder {
    schema: EntitySchema,
}

impl EntitySchemaBuilder {
    pub fn attribute(mut self, name: &'static str, kind: AttrKind) -> Self {
        self.schema.attributes.push(AttributeDecl { name, kind });
        self
    }

    /// Declares a computed attribute that is available to serialization but
    /// never persisted.
    pub fn ignored(mut self, name: &'static str) -> Self {
        self.schema.ignored.push(name);
        self
    }

    pub fn relationship(mut self, decl: RelationshipDecl) -> Self {
        self.schema.relationships.push(RelationshipDecl {
            owner: self.schema.type_name,
            ..decl
        });
        self
    }

    pub fn build(self) -> EntitySchema {
        self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::{foreign_key_for, Cardinality, Direction, EntitySchema, RelationshipDecl, SchemaError};
    use crate::model::value::AttrKind;
    use once_cell::sync::Lazy;

    static PARENT: Lazy<EntitySchema> = Lazy::new(|| {
        EntitySchema::builder("ParentNode")
            .attribute("label", AttrKind::Text)
            .relationship(RelationshipDecl::new(
                "children",
                Cardinality::Many,
                Direction::Inverse,
                || &*CHILD,
            ))
            .build()
    });

    static CHILD: Lazy<EntitySchema> = Lazy::new(|| {
        EntitySchema::builder("ChildNode")
            .attribute("parent_node_id", AttrKind::Text)
            .relationship(RelationshipDecl::new(
                "parent",
                Cardinality::One,
                Direction::Owning,
                || &*PARENT,
            ))
            .build()
    });

    static ORPHAN_INVERSE: Lazy<EntitySchema> = Lazy::new(|| {
        EntitySchema::builder("Lonely")
            .relationship(RelationshipDecl::new(
                "children",
                Cardinality::Many,
                Direction::Inverse,
                || &*CHILD,
            ).with_foreign_key("parent_node_id"))
            .build()
    });

    #[test]
    fn foreign_keys_follow_naming_convention() {
        assert_eq!(foreign_key_for("Author"), "author_id");
        assert_eq!(foreign_key_for("UserSettings"), "user_settings_id");
        assert_eq!(PARENT.relationship("children").unwrap().foreign_key(), "parent_node_id");
        assert_eq!(CHILD.relationship("parent").unwrap().foreign_key(), "parent_node_id");
        assert_eq!(PARENT.table_name(), "rec_parent_node");
    }

    #[test]
    fn paired_declarations_validate() {
        PARENT.validate().unwrap();
        CHILD.validate().unwrap();
    }

    #[test]
    fn inverse_without_owning_side_is_rejected() {
        let error = ORPHAN_INVERSE.validate().unwrap_err();
        assert!(matches!(error, SchemaError::MissingOwningSide { .. }));
    }

    #[test]
    fn reserved_and_duplicate_attributes_are_rejected() {
        let reserved = EntitySchema::builder("Bad")
            .attribute("uid", AttrKind::Text)
            .build();
        assert!(matches!(
            reserved.validate(),
            Err(SchemaError::ReservedAttribute { .. })
        ));

        let duplicate = EntitySchema::builder("Bad")
            .attribute("name", AttrKind::Text)
            .ignored("name")
            .build();
        assert!(matches!(
            duplicate.validate(),
            Err(SchemaError::DuplicateAttribute { .. })
        ));

        let invalid = EntitySchema::builder("Bad")
            .attribute("drop table", AttrKind::Text)
            .build();
        assert!(matches!(
            invalid.validate(),
            Err(SchemaError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn owning_foreign_key_must_be_declared_text() {
        let schema = EntitySchema::builder("Stray")
            .attribute("parent_node_id", AttrKind::Integer)
            .relationship(RelationshipDecl::new(
                "parent",
                Cardinality::One,
                Direction::Owning,
                || &*PARENT,
            ))
            .build();
        assert!(matches!(schema.validate(), Err(SchemaError::ForeignKey { .. })));
    }
}
