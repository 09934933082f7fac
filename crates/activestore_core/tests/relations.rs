mod common;

use activestore_core::{attributes, ActiveRecord, Gateway, Record, RecordError, SchemaError, Store};
use common::{
    memory_store, Article, Author, Employee, UserSettings, ARTICLE_AUTHOR, AUTHOR_ARTICLES,
    AUTHOR_SETTINGS, EMPLOYEE_MANAGER, EMPLOYEE_REPORTS, SETTINGS_OWNER,
};

fn author_with_articles(store: &Store) -> Record<Author> {
    let mut author = Record::new(Author::new("Alice", 28));
    author.save(store).unwrap();
    for (title, score) in [("first", 1), ("second", 2)] {
        let mut article = Record::new(Article::new(title, "body", score));
        article.associate(&ARTICLE_AUTHOR, Some(&author)).unwrap();
        article.save(store).unwrap();
    }
    author
}

#[test]
fn inverse_many_resolves_in_creation_order() {
    let store = memory_store();
    let mut author = author_with_articles(&store);

    let articles = author.has_many(&store, &AUTHOR_ARTICLES).unwrap();
    let titles: Vec<_> = articles.iter().map(|article| article.title.clone()).collect();
    assert_eq!(titles, vec![Some("first".to_string()), Some("second".to_string())]);
}

#[test]
fn owning_side_resolves_to_the_referenced_record() {
    let store = memory_store();
    let author = author_with_articles(&store);
    let mut article = Article::find_by(&store, attributes! { "title" => "first" })
        .unwrap()
        .unwrap();

    let owner = article.belongs_to(&store, &ARTICLE_AUTHOR).unwrap().unwrap();
    assert!(owner.is_same_entity(&author));
    assert_eq!(owner.name, "Alice");
}

#[test]
fn cached_values_are_reused_until_the_key_changes() {
    let store = memory_store();
    let mut author = author_with_articles(&store);
    assert_eq!(author.has_many(&store, &AUTHOR_ARTICLES).unwrap().len(), 2);

    let mut late = Record::new(Article::new("late", "body", 3));
    late.associate(&ARTICLE_AUTHOR, Some(&author)).unwrap();
    late.save(&store).unwrap();
    assert_eq!(author.has_many(&store, &AUTHOR_ARTICLES).unwrap().len(), 2);

    author.invalidate_relations();
    assert_eq!(author.has_many(&store, &AUTHOR_ARTICLES).unwrap().len(), 3);
}

#[test]
fn deletions_invalidate_cached_relationships() {
    let store = memory_store();
    let mut author = author_with_articles(&store);
    assert_eq!(author.has_many(&store, &AUTHOR_ARTICLES).unwrap().len(), 2);

    let mut first = Article::find_by(&store, attributes! { "title" => "first" })
        .unwrap()
        .unwrap();
    Gateway::new(&store).delete(&mut first).unwrap();

    assert_eq!(author.has_many(&store, &AUTHOR_ARTICLES).unwrap().len(), 1);
}

#[test]
fn reassigning_the_foreign_key_invalidates_the_owner() {
    let store = memory_store();
    let mut alice = Record::new(Author::new("Alice", 28));
    let mut bob = Record::new(Author::new("Bob", 55));
    alice.save(&store).unwrap();
    bob.save(&store).unwrap();

    let mut article = Record::new(Article::new("moved", "body", 1));
    article.associate(&ARTICLE_AUTHOR, Some(&alice)).unwrap();
    assert_eq!(article.belongs_to(&store, &ARTICLE_AUTHOR).unwrap().unwrap().name, "Alice");

    article.associate(&ARTICLE_AUTHOR, Some(&bob)).unwrap();
    assert_eq!(article.belongs_to(&store, &ARTICLE_AUTHOR).unwrap().unwrap().name, "Bob");

    article.author_id = alice.uid().map(|uid| uid.to_string());
    assert_eq!(article.belongs_to(&store, &ARTICLE_AUTHOR).unwrap().unwrap().name, "Alice");

    article.associate(&ARTICLE_AUTHOR, None).unwrap();
    assert!(article.belongs_to(&store, &ARTICLE_AUTHOR).unwrap().is_none());
}

#[test]
fn dangling_foreign_key_resolves_to_nothing() {
    let store = memory_store();
    let mut article = Record::new(Article::new("stray", "body", 1));
    article.author_id = Some(uuid::Uuid::new_v4().to_string());
    article.save(&store).unwrap();
    assert!(article.belongs_to(&store, &ARTICLE_AUTHOR).unwrap().is_none());

    article.author_id = Some("not-a-uid".to_string());
    assert!(article.belongs_to(&store, &ARTICLE_AUTHOR).unwrap().is_none());
}

#[test]
fn inverse_one_returns_first_match() {
    let store = memory_store();
    let mut author = Record::new(Author::new("Alice", 28));
    author.save(&store).unwrap();
    assert!(author.has_one(&store, &AUTHOR_SETTINGS).unwrap().is_none());

    for theme in ["dark", "light"] {
        let mut settings = Record::new(UserSettings {
            theme: theme.to_string(),
            author_id: None,
        });
        settings.associate(&SETTINGS_OWNER, Some(&author)).unwrap();
        settings.save(&store).unwrap();
    }

    author.invalidate_relations();
    let settings = author.has_one(&store, &AUTHOR_SETTINGS).unwrap().unwrap();
    assert_eq!(settings.theme, "dark");

    settings.theme = "solarized".to_string();
    settings.save(&store).unwrap();
    let reloaded = UserSettings::find_by(&store, attributes! { "theme" => "solarized" }).unwrap();
    assert!(reloaded.is_some());
}

#[test]
fn inverse_resolution_needs_a_saved_record() {
    let store = memory_store();
    let mut author = Record::new(Author::new("Unsaved", 1));
    assert!(matches!(
        author.has_many(&store, &AUTHOR_ARTICLES),
        Err(RecordError::UnsavedRecord { entity: "Author" })
    ));

    let mut article = Record::new(Article::new("t", "b", 1));
    assert!(matches!(
        article.associate(&ARTICLE_AUTHOR, Some(&author)),
        Err(RecordError::UnsavedRecord { .. })
    ));
}

#[test]
fn self_referential_relationships_resolve_one_hop() {
    let store = memory_store();
    let mut boss = Record::new(Employee {
        name: "Boss".to_string(),
        manager_id: None,
    });
    boss.save(&store).unwrap();
    boss.manager_id = boss.uid().map(|uid| uid.to_string());
    boss.save(&store).unwrap();

    let mut worker = Record::new(Employee {
        name: "Worker".to_string(),
        manager_id: None,
    });
    worker.associate(&EMPLOYEE_MANAGER, Some(&boss)).unwrap();
    worker.save(&store).unwrap();

    let manager = boss.belongs_to(&store, &EMPLOYEE_MANAGER).unwrap().unwrap();
    assert_eq!(manager.name, "Boss");

    let reports: Vec<String> = boss
        .has_many(&store, &EMPLOYEE_REPORTS)
        .unwrap()
        .iter()
        .map(|employee| employee.name.clone())
        .collect();
    assert_eq!(reports, vec!["Boss", "Worker"]);
}

#[test]
fn related_query_allows_custom_ordering() {
    let store = memory_store();
    let author = author_with_articles(&store);
    let newest_first = author
        .related_query(&AUTHOR_ARTICLES)
        .unwrap()
        .order("score", false)
        .records(&store)
        .unwrap();
    let titles: Vec<_> = newest_first
        .iter()
        .map(|article| article.title.clone().unwrap_or_default())
        .collect();
    assert_eq!(titles, vec!["second", "first"]);
}

#[test]
fn relationships_missing_from_the_schema_are_rejected() {
    use activestore_core::HasMany;
    const UNDECLARED: HasMany<Author, Article> = HasMany::new("drafts");

    let store = memory_store();
    let mut author = Record::new(Author::new("Alice", 28));
    author.save(&store).unwrap();
    assert!(matches!(
        author.has_many(&store, &UNDECLARED),
        Err(RecordError::Schema(SchemaError::UndeclaredRelationship { .. }))
    ));
}
