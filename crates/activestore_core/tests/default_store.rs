mod common;

use activestore_core::{
    close_default_store, default_config, set_default_config, with_default_store, ActiveRecord,
    ConfigError, DbError, Record, RecordError, StoreConfig,
};
use common::Author;
use once_cell::sync::Lazy;
use std::thread;
use tempfile::TempDir;

static STORE_DIR: Lazy<TempDir> = Lazy::new(|| tempfile::tempdir().unwrap());

fn shared_config() -> StoreConfig {
    StoreConfig::file(STORE_DIR.path().join("default.sqlite3"))
}

#[test]
fn default_config_is_set_once() {
    set_default_config(shared_config()).unwrap();
    set_default_config(shared_config()).unwrap();
    assert_eq!(default_config(), Some(&shared_config()));

    let err = set_default_config(StoreConfig::named_memory("another")).unwrap_err();
    assert!(matches!(err, ConfigError::AlreadyConfigured { .. }));
}

#[test]
fn each_thread_gets_its_own_default_store() {
    set_default_config(shared_config()).unwrap();

    let main_id = with_default_store(|store| Ok::<_, RecordError>(store.id())).unwrap();
    let again = with_default_store(|store| Ok::<_, RecordError>(store.id())).unwrap();
    assert_eq!(main_id, again);

    let other_id = thread::spawn(|| {
        with_default_store(|store| Ok::<_, RecordError>(store.id())).unwrap()
    })
    .join()
    .unwrap();
    assert_ne!(main_id, other_id);
}

#[test]
fn closing_the_default_store_opens_a_fresh_context() {
    set_default_config(shared_config()).unwrap();

    let (first_id, uid) = with_default_store(|store| {
        let mut author = Record::new(Author::new("Defaulted", 33));
        author.save(store)?;
        Ok::<_, RecordError>((store.id(), author.uid()))
    })
    .unwrap();

    close_default_store().unwrap();

    let (second_id, found) = with_default_store(|store| {
        Ok::<_, RecordError>((store.id(), Author::find(store, uid.unwrap())?))
    })
    .unwrap();
    assert_ne!(first_id, second_id);
    assert_eq!(found.map(|record| record.name.clone()), Some("Defaulted".to_string()));
}

#[test]
fn nested_default_store_calls_are_rejected() {
    set_default_config(shared_config()).unwrap();

    let (inner, close) = with_default_store(|_| {
        let inner = with_default_store(|store| Ok::<_, DbError>(store.id()));
        Ok::<_, DbError>((inner, close_default_store()))
    })
    .unwrap();
    assert!(matches!(inner, Err(DbError::DefaultStoreInUse)));
    assert!(matches!(close, Err(DbError::DefaultStoreInUse)));

    assert!(with_default_store(|store| Ok::<_, DbError>(store.id())).is_ok());
}
