//! Thread-confined store handle.
//!
//! # Responsibility
//! - Own one connection and the per-connection registry of entity tables.
//! - Provide scoped write transactions and consistent read snapshots.
//! - Identify the execution context records were fetched in.
//!
//! # Invariants
//! - `Store` is neither `Send` nor `Sync`; each thread opens its own.
//! - Every `Store` gets a process-unique [`StoreId`], never reused.
//! - A write transaction commits only when its closure returns `Ok`; every
//!   other exit path rolls back.
//! - The deletion epoch increases on every committed row deletion.

use super::open::open_connection;
use super::rows;
use super::schema_sync::sync_entity_table;
use super::{DbError, DbResult};
use crate::config::{default_config, StoreConfig};
use crate::model::schema::EntitySchema;
use log::debug;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one opened store, i.e. of one execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreId(u64);

impl StoreId {
    fn next() -> Self {
        Self(NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl Display for StoreId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "store#{}", self.0)
    }
}

/// A connection bound to the thread that opened it.
pub struct Store {
    id: StoreId,
    config: StoreConfig,
    conn: Connection,
    registered: RefCell<HashSet<&'static str>>,
    deletion_epoch: Cell<u64>,
    _thread_bound: PhantomData<*const ()>,
}

impl Store {
    /// Opens a new store context for `config`.
    pub fn open(config: StoreConfig) -> DbResult<Self> {
        let conn = open_connection(&config)?;
        let store = Self {
            id: StoreId::next(),
            config,
            conn,
            registered: RefCell::new(HashSet::new()),
            deletion_epoch: Cell::new(0),
            _thread_bound: PhantomData,
        };
        debug!(
            "event=store_open module=db status=ok store={} location={}",
            store.id, store.config.location
        );
        Ok(store)
    }

    /// Opens a new store context for the process default configuration.
    pub fn open_default() -> DbResult<Self> {
        let config = default_config().ok_or(DbError::DefaultStoreNotConfigured)?;
        Self::open(config.clone())
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Makes `schema` (and every schema reachable through its relationships)
    /// usable on this store: validates declarations and synchronizes tables.
    ///
    /// Registration of an already registered type is a no-op. Register types
    /// before opening a [`Store::snapshot`]; synchronization needs a write
    /// transaction of its own.
    pub fn register(&self, schema: &'static EntitySchema) -> DbResult<()> {
        if self.registered.borrow().contains(schema.type_name()) {
            return Ok(());
        }
        schema.validate()?;
        sync_entity_table(&self.conn, schema)?;
        self.registered.borrow_mut().insert(schema.type_name());

        for decl in schema.relationships() {
            self.register(decl.related())?;
        }
        Ok(())
    }

    /// Registered type names, sorted.
    pub fn registered_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.registered.borrow().iter().copied().collect();
        names.sort_unstable();
        names
    }

    /// Runs `f` inside an IMMEDIATE write transaction.
    ///
    /// Blocks (up to the configured busy timeout) while another context
    /// holds the write lock. Commits when `f` returns `Ok`; rolls back
    /// otherwise, including on panic.
    pub fn write<T, E>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Runs `f` against one consistent read snapshot.
    ///
    /// Writes committed by other contexts after the snapshot's first read are
    /// not visible inside `f`; any read issued after `f` returns sees them.
    /// `f` must not write.
    pub fn snapshot<T, E>(&self, f: impl FnOnce(&Store) -> Result<T, E>) -> Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Deferred)?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }

    /// Number of row deletions committed through this store.
    pub fn deletion_epoch(&self) -> u64 {
        self.deletion_epoch.get()
    }

    /// Deletes one row in its own write transaction.
    pub(crate) fn delete_row(&self, schema: &EntitySchema, uid: Uuid) -> DbResult<bool> {
        let removed = self.write(|tx| rows::delete_row(tx, schema, uid))?;
        if removed {
            self.deletion_epoch.set(self.deletion_epoch.get() + 1);
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.id)
            .field("location", &self.config.location)
            .field("deletion_epoch", &self.deletion_epoch.get())
            .finish_non_exhaustive()
    }
}
