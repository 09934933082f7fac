//! Dictionary and JSON projection of records.
//!
//! # Responsibility
//! - Select record attributes (default set, explicit inclusion or
//!   exclusion), optionally rewrite them, and merge computed values.
//! - Encode the projection as a JSON string or bytes.
//!
//! # Invariants
//! - Inclusion and exclusion are mutually exclusive by construction.
//! - Computed values are inserted after the attribute set; on a key
//!   collision the computed value wins.
//! - Ignored attributes are only emitted when named explicitly.

use crate::model::entity::Entity;
use crate::model::record::Record;
use crate::model::value::{Attributes, Value};
use crate::repo::error::{RecordError, RecordResult};

/// Which attributes a projection starts from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// `uid`, every declared attribute, `created_at`, `updated_at`.
    #[default]
    Default,
    /// Exactly these names, in this order. May name ignored attributes.
    Included(Vec<String>),
    /// The default set minus these names.
    Excepted(Vec<String>),
}

impl Selection {
    pub fn included<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Included(names.into_iter().map(Into::into).collect())
    }

    pub fn excepted<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Excepted(names.into_iter().map(Into::into).collect())
    }
}

/// A named computation a receiver can run for the serializer.
pub enum Computation<'a, E: Entity> {
    Nullary(Box<dyn Fn() -> Value + 'a>),
    WithRecord(Box<dyn Fn(&Record<E>) -> Value + 'a>),
}

/// Source of computed values merged into a projection.
pub trait ComputationReceiver<E: Entity> {
    fn computation(&self, name: &str) -> Option<Computation<'_, E>>;
}

type Transform<'a> = &'a dyn Fn(&str, Value) -> Value;

/// Projection builder for one record.
pub struct Serializer<'a, E: Entity> {
    record: &'a Record<E>,
    selection: Selection,
    transform: Option<Transform<'a>>,
    receiver: Option<&'a dyn ComputationReceiver<E>>,
    computed: Vec<(String, String)>,
}

impl<'a, E: Entity> Serializer<'a, E> {
    pub fn new(record: &'a Record<E>) -> Self {
        Self {
            record,
            selection: Selection::Default,
            transform: None,
            receiver: None,
            computed: Vec::new(),
        }
    }

    pub fn selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// Rewrites every selected attribute value.
    pub fn transform(mut self, transform: Transform<'a>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Merges `output key => computation name` entries evaluated on
    /// `receiver`.
    pub fn computed<I, K, N>(mut self, receiver: &'a dyn ComputationReceiver<E>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, N)>,
        K: Into<String>,
        N: Into<String>,
    {
        self.receiver = Some(receiver);
        self.computed = entries
            .into_iter()
            .map(|(key, name)| (key.into(), name.into()))
            .collect();
        self
    }

    pub fn as_dictionary(&self) -> RecordResult<Attributes> {
        let mut output = Attributes::new();
        for name in self.selected_names()? {
            let value = self.value_of(&name)?;
            let value = match self.transform {
                Some(transform) => transform(&name, value),
                None => value,
            };
            output.insert(name, value);
        }

        if let Some(receiver) = self.receiver {
            for (key, name) in &self.computed {
                let value = match receiver.computation(name) {
                    Some(Computation::Nullary(compute)) => compute(),
                    Some(Computation::WithRecord(compute)) => compute(self.record),
                    None => {
                        return Err(RecordError::UnknownComputation {
                            entity: E::schema().type_name(),
                            name: name.clone(),
                        })
                    }
                };
                output.insert(key.clone(), value);
            }
        }
        Ok(output)
    }

    pub fn as_json_string(&self) -> RecordResult<String> {
        Ok(serde_json::to_string(&self.as_dictionary()?)?)
    }

    pub fn as_json_bytes(&self) -> RecordResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self.as_dictionary()?)?)
    }

    fn selected_names(&self) -> RecordResult<Vec<String>> {
        match &self.selection {
            Selection::Default => Ok(default_names::<E>()),
            Selection::Included(names) => {
                let schema = E::schema();
                for name in names {
                    if schema.column_kind(name).is_none() && !schema.is_ignored(name) {
                        return Err(RecordError::UnknownAttribute {
                            entity: schema.type_name(),
                            attribute: name.clone(),
                        });
                    }
                }
                Ok(names.clone())
            }
            Selection::Excepted(names) => Ok(default_names::<E>()
                .into_iter()
                .filter(|name| !names.contains(name))
                .collect()),
        }
    }

    fn value_of(&self, name: &str) -> RecordResult<Value> {
        if E::schema().is_ignored(name) {
            return Ok(self.record.entity().ignored_value(name).unwrap_or_default());
        }
        self.record.get(name)
    }
}

fn default_names<E: Entity>() -> Vec<String> {
    let schema = E::schema();
    let mut names = Vec::with_capacity(schema.attributes().len() + 3);
    names.push("uid".to_string());
    names.extend(schema.attributes().iter().map(|decl| decl.name.to_string()));
    names.push("created_at".to_string());
    names.push("updated_at".to_string());
    names
}

impl<E: Entity> Record<E> {
    pub fn serializer(&self) -> Serializer<'_, E> {
        Serializer::new(self)
    }

    /// Default projection.
    pub fn as_dictionary(&self) -> RecordResult<Attributes> {
        self.serializer().as_dictionary()
    }

    pub fn as_json_string(&self) -> RecordResult<String> {
        self.serializer().as_json_string()
    }
}
