//! Per-thread default store.
//!
//! Convenience wrapper for call sites that do not thread a [`Store`] through
//! explicitly. Each thread lazily opens its own store from the process
//! default configuration on first use.

use super::store::Store;
use super::DbError;
use std::cell::RefCell;

thread_local! {
    static DEFAULT_STORE: RefCell<Option<Store>> = const { RefCell::new(None) };
}

/// Runs `f` with this thread's default store, opening it on first use.
///
/// # Errors
/// - [`DbError::DefaultStoreNotConfigured`] when no default configuration
///   was set through [`crate::config::set_default_config`].
/// - [`DbError::DefaultStoreInUse`] for re-entrant calls from inside `f`;
///   pass the provided store down instead.
/// - Any error returned by `f`.
pub fn with_default_store<T, E>(f: impl FnOnce(&Store) -> Result<T, E>) -> Result<T, E>
where
    E: From<DbError>,
{
    DEFAULT_STORE.with(|cell| {
        let mut slot = cell
            .try_borrow_mut()
            .map_err(|_| DbError::DefaultStoreInUse)?;
        let store = match slot.take() {
            Some(store) => store,
            None => Store::open_default()?,
        };
        f(slot.insert(store))
    })
}

/// Closes this thread's default store, if open. The next
/// [`with_default_store`] call opens a fresh one.
///
/// # Errors
/// - [`DbError::DefaultStoreInUse`] when called from inside
///   [`with_default_store`].
pub fn close_default_store() -> Result<(), DbError> {
    DEFAULT_STORE.with(|cell| {
        cell.try_borrow_mut()
            .map_err(|_| DbError::DefaultStoreInUse)?
            .take();
        Ok(())
    })
}
