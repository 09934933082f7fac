//! Fluent query builder.
//!
//! # Responsibility
//! - Describe a selection (predicate, optional closure filter, ordering,
//!   head/tail limit) without touching the store.
//! - Execute terminals through the gateway, pushing predicate, ordering and
//!   limits down to the store whenever no closure filter is involved.
//!
//! # Invariants
//! - Builder methods never mutate the receiver; each returns a new query.
//! - Ordering is stable: ties keep creation order.
//! - A limit takes rows from the requested end of the ordered match set and
//!   keeps the ordering direction.

use crate::db::predicate::{Comparison, Predicate, SortOrder};
use crate::db::rows::Window;
use crate::db::Store;
use crate::model::entity::Entity;
use crate::model::record::Record;
use crate::model::value::{Attributes, Value};
use crate::repo::error::{RecordError, RecordResult};
use crate::repo::gateway::Gateway;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

type RecordFilter<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Result-count cap anchored at one end of the ordered match set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    First(usize),
    Last(usize),
}

impl Limit {
    fn window(limit: Option<Limit>) -> Window {
        match limit {
            None => Window::All,
            Some(Self::First(count)) => Window::Head(count),
            Some(Self::Last(count)) => Window::Tail(count),
        }
    }

    fn apply<T>(limit: Option<Limit>, mut items: Vec<T>) -> Vec<T> {
        match limit {
            None => items,
            Some(Self::First(count)) => {
                items.truncate(count);
                items
            }
            Some(Self::Last(count)) => items.split_off(items.len().saturating_sub(count)),
        }
    }
}

/// Immutable description of a selection over `E`.
pub struct Query<E: Entity> {
    predicate: Predicate,
    filter: Option<RecordFilter<E>>,
    order: Option<SortOrder>,
    limit: Option<Limit>,
}

impl<E: Entity> Clone for Query<E> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
            filter: self.filter.clone(),
            order: self.order.clone(),
            limit: self.limit,
        }
    }
}

impl<E: Entity> Default for Query<E> {
    fn default() -> Self {
        Self {
            predicate: Predicate::new(),
            filter: None,
            order: None,
            limit: None,
        }
    }
}

impl<E: Entity> Debug for Query<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("entity", &E::schema().type_name())
            .field("predicate", &self.predicate)
            .field("has_filter", &self.filter.is_some())
            .field("order", &self.order)
            .field("limit", &self.limit)
            .finish()
    }
}

impl<E: Entity> Query<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `predicate` to the conjunction.
    pub fn filter(&self, predicate: impl Into<Predicate>) -> Self {
        let mut next = self.clone();
        next.predicate = next.predicate.and(predicate.into());
        next
    }

    pub fn filter_eq(&self, attribute: &str, value: impl Into<Value>) -> Self {
        self.filter_cmp(attribute, Comparison::Eq, value)
    }

    pub fn filter_cmp(
        &self,
        attribute: &str,
        comparison: Comparison,
        value: impl Into<Value>,
    ) -> Self {
        self.filter(Predicate::new().term(attribute, comparison, value))
    }

    /// Adds a caller-supplied condition evaluated on materialized records.
    /// Queries with such a filter cannot push limits down to the store.
    pub fn filter_with(&self, condition: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        let combined: RecordFilter<E> = match self.filter.clone() {
            Some(previous) => Arc::new(move |entity: &E| previous(entity) && condition(entity)),
            None => Arc::new(condition),
        };
        let mut next = self.clone();
        next.filter = Some(combined);
        next
    }

    /// Replaces the ordering.
    pub fn order(&self, attribute: &str, ascending: bool) -> Self {
        let mut next = self.clone();
        next.order = Some(SortOrder::new(attribute, ascending));
        next
    }

    /// Keeps the first `count` matches of the ordered set.
    pub fn first(&self, count: usize) -> Self {
        let mut next = self.clone();
        next.limit = Some(Limit::First(count));
        next
    }

    /// Keeps the last `count` matches of the ordered set, in order.
    ///
    /// The tail is taken from the ordering as given, so
    /// `order("score", true).last(2)` yields the two highest scores in
    /// ascending order. Flip the ordering and use [`Query::first`] for the
    /// two lowest.
    pub fn last(&self, count: usize) -> Self {
        let mut next = self.clone();
        next.limit = Some(Limit::Last(count));
        next
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn limit(&self) -> Option<Limit> {
        self.limit
    }

    /// Materializes every selected record.
    pub fn records(&self, store: &Store) -> RecordResult<Vec<Record<E>>> {
        let gateway = Gateway::new(store);
        match &self.filter {
            None => gateway.scan(&self.predicate, self.order.as_ref(), Limit::window(self.limit)),
            Some(condition) => {
                let matched = gateway
                    .scan::<E>(&self.predicate, self.order.as_ref(), Window::All)?
                    .into_iter()
                    .filter(|record| condition(record.entity()))
                    .collect();
                Ok(Limit::apply(self.limit, matched))
            }
        }
    }

    pub fn count(&self, store: &Store) -> RecordResult<u64> {
        if self.filter.is_some() {
            return Ok(self.records(store)?.len() as u64);
        }
        let total = Gateway::new(store).count::<E>(&self.predicate)?;
        Ok(match self.limit {
            None => total,
            Some(Limit::First(count) | Limit::Last(count)) => total.min(count as u64),
        })
    }

    /// Record at `index` of the selection.
    pub fn at(&self, store: &Store, index: usize) -> RecordResult<Option<Record<E>>> {
        if self.filter.is_none() && self.limit.is_none() {
            let found =
                Gateway::new(store).scan(&self.predicate, self.order.as_ref(), Window::Nth(index))?;
            return Ok(found.into_iter().next());
        }
        Ok(self.records(store)?.into_iter().nth(index))
    }

    pub fn first_record(&self, store: &Store) -> RecordResult<Option<Record<E>>> {
        self.at(store, 0)
    }

    pub fn last_record(&self, store: &Store) -> RecordResult<Option<Record<E>>> {
        if self.filter.is_none() && self.limit.is_none() {
            let found =
                Gateway::new(store).scan(&self.predicate, self.order.as_ref(), Window::Tail(1))?;
            return Ok(found.into_iter().next());
        }
        Ok(self.records(store)?.pop())
    }

    /// Projects `attributes` of every selected record, keyed in the given
    /// order. `uid` and the timestamps may be named too.
    pub fn pluck(&self, store: &Store, attributes: &[&str]) -> RecordResult<Vec<Attributes>> {
        let schema = E::schema();
        let columns: Vec<String> = attributes.iter().map(|name| name.to_string()).collect();
        if let Some(unknown) = columns.iter().find(|name| schema.column_kind(name).is_none()) {
            return Err(RecordError::UnknownAttribute {
                entity: schema.type_name(),
                attribute: unknown.clone(),
            });
        }

        if self.filter.is_none() {
            return Gateway::new(store).pluck_rows::<E>(
                &columns,
                &self.predicate,
                self.order.as_ref(),
                Limit::window(self.limit),
            );
        }

        self.records(store)?
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|name| Ok::<_, RecordError>((name.clone(), record.get(name)?)))
                    .collect::<RecordResult<Attributes>>()
            })
            .collect()
    }
}
