//! Thread-confinement proxy.
//!
//! Records are bound to the store that produced them and cannot leave its
//! thread. A [`RecordRef`] carries only the type and `uid`, crosses threads
//! freely, and is resolved against the store of the receiving context.

use crate::db::Store;
use crate::model::entity::Entity;
use crate::model::record::Record;
use crate::repo::error::RecordResult;
use crate::repo::gateway::Gateway;
use log::info;
use std::fmt::{Debug, Display, Formatter};
use std::marker::PhantomData;
use uuid::Uuid;

/// Transportable reference to a persisted record of type `E`.
pub struct RecordRef<E> {
    uid: Uuid,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> RecordRef<E> {
    pub fn new(uid: Uuid) -> Self {
        Self {
            uid,
            _entity: PhantomData,
        }
    }

    pub fn uid(&self) -> Uuid {
        self.uid
    }

    /// Fetches the current state of the record from `store`.
    pub fn resolve(&self, store: &Store) -> RecordResult<Option<Record<E>>> {
        Gateway::new(store).find(self.uid)
    }
}

impl<E> Clone for RecordRef<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for RecordRef<E> {}

impl<E> PartialEq for RecordRef<E> {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl<E> Eq for RecordRef<E> {}

impl<E: Entity> Debug for RecordRef<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordRef")
            .field("entity", &E::schema().type_name())
            .field("uid", &self.uid)
            .finish()
    }
}

impl<E: Entity> Display for RecordRef<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", E::schema().type_name(), self.uid)
    }
}

impl<E: Entity> Record<E> {
    /// Transportable reference to this record.
    ///
    /// # Errors
    /// - [`crate::RecordError::UnsavedRecord`] when the record has no `uid`.
    pub fn reference(&self) -> RecordResult<RecordRef<E>> {
        Ok(RecordRef::new(self.require_uid()?))
    }
}

/// Re-fetches `record` through `target`, the store of another context.
/// Returns `None` when the row no longer exists there.
///
/// # Errors
/// - [`crate::RecordError::UnsavedRecord`] when the record has no `uid`.
pub fn handoff<E: Entity>(record: &Record<E>, target: &Store) -> RecordResult<Option<Record<E>>> {
    let reference = record.reference()?;
    let found = reference.resolve(target)?;
    info!(
        "event=record_handoff module=service status=ok entity={} uid={} from={} to={} found={}",
        E::schema().type_name(),
        reference.uid(),
        record
            .context()
            .map_or_else(|| "none".to_string(), |id| id.to_string()),
        target.id(),
        found.is_some()
    );
    Ok(found)
}
