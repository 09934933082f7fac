//! Equality/range predicates and orderings over entity columns.
//!
//! # Responsibility
//! - Describe selections as a conjunction of `column <op> value` terms.
//! - Render terms and orderings into parameterized SQL fragments.
//!
//! # Invariants
//! - Column names are checked against the entity schema before rendering;
//!   user text never reaches SQL outside bound parameters.
//! - Ties are always broken by creation order (`seq`).

use super::{DbError, DbResult};
use crate::model::schema::EntitySchema;
use crate::model::value::{Attributes, Value};

/// Comparison operator of a predicate term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// One `attribute <op> value` term.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub attribute: String,
    pub comparison: Comparison,
    pub value: Value,
}

/// Conjunction of terms. The empty predicate matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    terms: Vec<Term>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality over every `name => value` pair.
    pub fn from_attributes(attributes: &Attributes) -> Self {
        attributes
            .iter()
            .fold(Self::new(), |predicate, (name, value)| {
                predicate.eq(name.as_str(), value.clone())
            })
    }

    pub fn term(mut self, attribute: impl Into<String>, comparison: Comparison, value: impl Into<Value>) -> Self {
        self.terms.push(Term {
            attribute: attribute.into(),
            comparison,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.term(attribute, Comparison::Eq, value)
    }

    pub fn ne(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.term(attribute, Comparison::Ne, value)
    }

    pub fn lt(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.term(attribute, Comparison::Lt, value)
    }

    pub fn le(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.term(attribute, Comparison::Le, value)
    }

    pub fn gt(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.term(attribute, Comparison::Gt, value)
    }

    pub fn ge(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.term(attribute, Comparison::Ge, value)
    }

    /// Conjunction of both predicates.
    pub fn and(mut self, other: Predicate) -> Self {
        self.terms.extend(other.terms);
        self
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Renders a `WHERE` clause (or an empty string) plus its parameters.
    pub(crate) fn render(&self, schema: &EntitySchema) -> DbResult<(String, Vec<Value>)> {
        if self.terms.is_empty() {
            return Ok((String::new(), Vec::new()));
        }

        let mut clauses = Vec::with_capacity(self.terms.len());
        let mut params = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            let column = checked_column(schema, &term.attribute)?;
            match (term.comparison, &term.value) {
                (Comparison::Eq, Value::Null) => clauses.push(format!("\"{column}\" IS NULL")),
                (Comparison::Ne, Value::Null) => {
                    clauses.push(format!("\"{column}\" IS NOT NULL"))
                }
                (comparison, value) => {
                    params.push(value.clone());
                    clauses.push(format!("\"{column}\" {} ?{}", comparison.sql(), params.len()));
                }
            }
        }

        Ok((format!(" WHERE {}", clauses.join(" AND ")), params))
    }
}

impl From<Attributes> for Predicate {
    fn from(attributes: Attributes) -> Self {
        Self::from_attributes(&attributes)
    }
}

impl From<&Attributes> for Predicate {
    fn from(attributes: &Attributes) -> Self {
        Self::from_attributes(attributes)
    }
}

/// Ordering on one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub attribute: String,
    pub ascending: bool,
}

impl SortOrder {
    pub fn new(attribute: impl Into<String>, ascending: bool) -> Self {
        Self {
            attribute: attribute.into(),
            ascending,
        }
    }

    pub fn ascending(attribute: impl Into<String>) -> Self {
        Self::new(attribute, true)
    }

    pub fn descending(attribute: impl Into<String>) -> Self {
        Self::new(attribute, false)
    }

    /// Renders an `ORDER BY` clause. `reversed` flips every key, including
    /// the creation-order tie-break, so a head window over the reversed order
    /// is the tail of the forward order.
    pub(crate) fn render(
        order: Option<&SortOrder>,
        schema: &EntitySchema,
        reversed: bool,
    ) -> DbResult<String> {
        let direction = |ascending: bool| if ascending != reversed { "ASC" } else { "DESC" };
        match order {
            None => Ok(format!(" ORDER BY seq {}", direction(true))),
            Some(order) => {
                let column = checked_column(schema, &order.attribute)?;
                Ok(format!(
                    " ORDER BY \"{column}\" {}, seq {}",
                    direction(order.ascending),
                    direction(true)
                ))
            }
        }
    }
}

fn checked_column<'a>(schema: &EntitySchema, name: &'a str) -> DbResult<&'a str> {
    if schema.column_kind(name).is_none() {
        return Err(DbError::UnknownColumn {
            entity: schema.type_name(),
            column: name.to_string(),
        });
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::{Predicate, SortOrder};
    use crate::model::schema::EntitySchema;
    use crate::model::value::{AttrKind, Value};

    fn schema() -> EntitySchema {
        EntitySchema::builder("Person")
            .attribute("name", AttrKind::Text)
            .attribute("age", AttrKind::Integer)
            .build()
    }

    #[test]
    fn empty_predicate_renders_nothing() {
        let (sql, params) = Predicate::new().render(&schema()).unwrap();
        assert!(sql.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn terms_render_in_order_with_null_checks() {
        let predicate = Predicate::new().eq("name", Value::Null).ge("age", 18).ne("uid", "x");
        let (sql, params) = predicate.render(&schema()).unwrap();
        assert_eq!(
            sql,
            " WHERE \"name\" IS NULL AND \"age\" >= ?1 AND \"uid\" <> ?2"
        );
        assert_eq!(params, vec![Value::Integer(18), Value::from("x")]);
    }

    #[test]
    fn unknown_column_is_rejected() {
        let error = Predicate::new().eq("missing", 1).render(&schema()).unwrap_err();
        assert!(error.to_string().contains("missing"));
    }

    #[test]
    fn reversed_order_flips_tie_break() {
        let order = SortOrder::descending("age");
        let forward = SortOrder::render(Some(&order), &schema(), false).unwrap();
        let reversed = SortOrder::render(Some(&order), &schema(), true).unwrap();
        assert_eq!(forward, " ORDER BY \"age\" DESC, seq ASC");
        assert_eq!(reversed, " ORDER BY \"age\" ASC, seq DESC");
        assert_eq!(
            SortOrder::render(None, &schema(), false).unwrap(),
            " ORDER BY seq ASC"
        );
    }
}
