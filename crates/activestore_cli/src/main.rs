//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `activestore_core` linkage.
//! - Run one deterministic author/article/tag round (save, query, serialize,
//!   cascade destroy) on an in-memory store.
//!
//! Set `ACTIVESTORE_LOG_DIR` to also write the core's rolling log files.

use activestore_core::{
    default_log_level, init_logging, ActiveRecord, AttrKind, BelongsTo, DestroyOptions, Entity,
    EntitySchema, HasMany, Record, RecordResult, Selection, Store, StoreConfig, ValidationError,
};
use log::warn;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Author {
    name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Article {
    title: String,
    score: i64,
    author_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Tag {
    name: String,
    article_id: Option<String>,
}

const AUTHOR_ARTICLES: HasMany<Author, Article> = HasMany::new("articles");
const ARTICLE_AUTHOR: BelongsTo<Article, Author> = BelongsTo::new("author");
const ARTICLE_TAGS: HasMany<Article, Tag> = HasMany::new("tags");
const TAG_ARTICLE: BelongsTo<Tag, Article> = BelongsTo::new("article");

static AUTHOR_SCHEMA: Lazy<EntitySchema> = Lazy::new(|| {
    EntitySchema::builder("Author")
        .attribute("name", AttrKind::Text)
        .relationship(AUTHOR_ARTICLES.declaration())
        .build()
});

static ARTICLE_SCHEMA: Lazy<EntitySchema> = Lazy::new(|| {
    EntitySchema::builder("Article")
        .attribute("title", AttrKind::Text)
        .attribute("score", AttrKind::Integer)
        .attribute("author_id", AttrKind::Text)
        .relationship(ARTICLE_AUTHOR.declaration())
        .relationship(ARTICLE_TAGS.declaration())
        .build()
});

static TAG_SCHEMA: Lazy<EntitySchema> = Lazy::new(|| {
    EntitySchema::builder("Tag")
        .attribute("name", AttrKind::Text)
        .attribute("article_id", AttrKind::Text)
        .relationship(TAG_ARTICLE.declaration())
        .build()
});

impl Entity for Author {
    fn schema() -> &'static EntitySchema {
        &AUTHOR_SCHEMA
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::required("name"));
        }
        Ok(())
    }
}

impl Entity for Article {
    fn schema() -> &'static EntitySchema {
        &ARTICLE_SCHEMA
    }
}

impl Entity for Tag {
    fn schema() -> &'static EntitySchema {
        &TAG_SCHEMA
    }
}

fn demo(store: &Store) -> RecordResult<()> {
    let mut author = Record::new(Author {
        name: "Alice".to_string(),
    });
    author.save(store)?;

    for (title, score) in [("Drafts", 12), ("Notes", 40), ("Essays", 27)] {
        let mut article = Record::new(Article {
            title: title.to_string(),
            score,
            author_id: None,
        });
        article.associate(&ARTICLE_AUTHOR, Some(&author))?;
        article.save(store)?;

        for name in ["rust", "notes"] {
            let mut tag = Record::new(Tag {
                name: name.to_string(),
                article_id: None,
            });
            tag.associate(&TAG_ARTICLE, Some(&article))?;
            tag.save(store)?;
        }
    }

    let top = Article::query().order("score", false).first(2).records(store)?;
    for article in &top {
        println!(
            "top_article={}",
            article
                .serializer()
                .selection(Selection::included(["title", "score"]))
                .as_json_string()?
        );
    }

    let owned = author.has_many(store, &AUTHOR_ARTICLES)?.len();
    println!("author={} articles={owned}", author.as_json_string()?);

    author.destroy_with(store, DestroyOptions::default())?;
    println!(
        "after_destroy articles={} tags={}",
        Article::count(store)?,
        Tag::count(store)?
    );
    Ok(())
}

fn main() {
    if let Ok(dir) = std::env::var("ACTIVESTORE_LOG_DIR") {
        if let Err(err) = init_logging(default_log_level(), &dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    println!("activestore_core version={}", activestore_core::core_version());

    let result = Store::open(StoreConfig::in_memory())
        .map_err(Into::into)
        .and_then(|store| demo(&store));
    if let Err(err) = result {
        warn!("event=cli_demo module=cli status=error error={err}");
        eprintln!("demo failed: {err}");
        std::process::exit(1);
    }
}
