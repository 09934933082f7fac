//! The contract every persisted entity type implements.
//!
//! # Responsibility
//! - Bind a Rust type to its static [`EntitySchema`].
//! - Validate candidate state before any store mutation.
//! - Convert between the typed entity and its declared attribute mapping.
//!
//! # Invariants
//! - Only declared attributes are persisted; other fields keep their
//!   `Default` value when a record is materialized.
//! - Lifecycle callbacks never observe a half-written row.

use crate::model::schema::EntitySchema;
use crate::model::value::{Attributes, Value};
use crate::repo::error::{RecordError, RecordResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Rejection reported by [`Entity::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{attribute} {message}")]
pub struct ValidationError {
    pub attribute: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    /// Convenience for the common "must be present" rule.
    pub fn required(attribute: impl Into<String>) -> Self {
        Self::new(attribute, "must be present")
    }
}

/// A persistable entity type.
///
/// Field names of the serde representation must match the declared
/// attribute names. Callbacks run in this order on save: `validate`,
/// `before_save`, `before_create`/`before_update`, `validate` again, the write,
/// `after_create`/`after_update`, `after_save`.
pub trait Entity: Serialize + DeserializeOwned + Default + Send + 'static {
    fn schema() -> &'static EntitySchema;

    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Value of a computed attribute listed in [`EntitySchema::ignored`].
    fn ignored_value(&self, _name: &str) -> Option<Value> {
        None
    }

    fn before_save(&mut self) {}
    fn before_create(&mut self) {}
    fn before_update(&mut self) {}
    fn after_create(&mut self) {}
    fn after_update(&mut self) {}
    fn after_save(&mut self) {}
    fn before_destroy(&mut self) {}
    fn after_destroy(&mut self) {}
}

/// Declared attributes of `entity`, in declaration order.
pub(crate) fn encode_entity<E: Entity>(entity: &E) -> RecordResult<Attributes> {
    let schema = E::schema();
    let object = to_object::<E>(entity)?;
    let mut attributes = Attributes::with_capacity(schema.attributes().len());
    for decl in schema.attributes() {
        let raw = object.get(decl.name).unwrap_or(&serde_json::Value::Null);
        let value = Value::from_json(raw, decl.kind).map_err(|err| RecordError::InvalidData {
            entity: schema.type_name(),
            message: format!("{}: {err}", decl.name),
        })?;
        attributes.insert(decl.name.to_string(), value);
    }
    Ok(attributes)
}

/// Current value of one declared attribute.
pub(crate) fn read_attribute<E: Entity>(entity: &E, name: &str) -> RecordResult<Value> {
    let schema = E::schema();
    let decl = schema
        .attribute(name)
        .ok_or_else(|| RecordError::UnknownAttribute {
            entity: schema.type_name(),
            attribute: name.to_string(),
        })?;
    let object = to_object::<E>(entity)?;
    let raw = object.get(name).unwrap_or(&serde_json::Value::Null);
    Value::from_json(raw, decl.kind).map_err(|err| RecordError::InvalidData {
        entity: schema.type_name(),
        message: format!("{name}: {err}"),
    })
}

/// Copy of `entity` with `attributes` assigned on top.
///
/// Values are coerced to the declared kinds; naming an undeclared attribute
/// is an error.
pub(crate) fn overlay_entity<E: Entity>(entity: &E, attributes: &Attributes) -> RecordResult<E> {
    let schema = E::schema();
    let mut object = to_object::<E>(entity)?;
    for (name, value) in attributes {
        let decl = schema
            .attribute(name)
            .ok_or_else(|| RecordError::UnknownAttribute {
                entity: schema.type_name(),
                attribute: name.clone(),
            })?;
        let value = value
            .clone()
            .coerce(decl.kind)
            .map_err(|err| RecordError::InvalidData {
                entity: schema.type_name(),
                message: format!("{name}: {err}"),
            })?;
        object.insert(name.clone(), value.to_json());
    }
    serde_json::from_value(serde_json::Value::Object(object)).map_err(|err| {
        RecordError::InvalidData {
            entity: schema.type_name(),
            message: err.to_string(),
        }
    })
}

/// `E::default()` with `attributes` assigned.
pub(crate) fn entity_from_attributes<E: Entity>(attributes: &Attributes) -> RecordResult<E> {
    overlay_entity(&E::default(), attributes)
}

fn to_object<E: Entity>(entity: &E) -> RecordResult<serde_json::Map<String, serde_json::Value>> {
    match serde_json::to_value(entity)? {
        serde_json::Value::Object(object) => Ok(object),
        _ => Err(RecordError::InvalidData {
            entity: E::schema().type_name(),
            message: "entity must serialize as a map".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{encode_entity, entity_from_attributes, overlay_entity, read_attribute, Entity};
    use crate::model::schema::EntitySchema;
    use crate::model::value::{AttrKind, Value};
    use crate::repo::error::RecordError;
    use once_cell::sync::Lazy;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Gadget {
        name: String,
        weight: Option<f64>,
        active: bool,
    }

    static GADGET: Lazy<EntitySchema> = Lazy::new(|| {
        EntitySchema::builder("Gadget")
            .attribute("name", AttrKind::Text)
            .attribute("weight", AttrKind::Real)
            .attribute("active", AttrKind::Bool)
            .build()
    });

    impl Entity for Gadget {
        fn schema() -> &'static EntitySchema {
            &GADGET
        }
    }

    #[test]
    fn encode_follows_declaration_order() {
        let gadget = Gadget {
            name: "lamp".to_string(),
            weight: None,
            active: true,
        };
        let attrs = encode_entity(&gadget).unwrap();
        let keys: Vec<&str> = attrs.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "weight", "active"]);
        assert_eq!(attrs["weight"], Value::Null);
        assert_eq!(read_attribute(&gadget, "active").unwrap(), Value::Bool(true));
    }

    #[test]
    fn partial_attributes_are_coerced_onto_defaults() {
        let gadget: Gadget =
            entity_from_attributes(&crate::attributes! { "weight" => 3, "active" => 1 }).unwrap();
        assert_eq!(gadget.weight, Some(3.0));
        assert!(gadget.active);
        assert_eq!(gadget.name, "");
    }

    #[test]
    fn overlay_rejects_unknown_attribute() {
        let error = overlay_entity(&Gadget::default(), &crate::attributes! { "colour" => "red" })
            .unwrap_err();
        assert!(matches!(error, RecordError::UnknownAttribute { .. }));
    }
}
