#![allow(dead_code)]

use activestore_core::{
    AttrKind, BelongsTo, Entity, EntitySchema, HasMany, HasOne, Store, StoreConfig,
    ValidationError, Value,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub fn memory_store() -> Store {
    Store::open(StoreConfig::in_memory()).unwrap()
}

// Author -> Article -> Tag, Author -> UserSettings

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Author {
    pub name: String,
    pub age: i64,
    #[serde(skip)]
    pub callbacks: Vec<String>,
}

pub const AUTHOR_ARTICLES: HasMany<Author, Article> = HasMany::new("articles");
pub const AUTHOR_SETTINGS: HasOne<Author, UserSettings> = HasOne::new("settings");

static AUTHOR_SCHEMA: Lazy<EntitySchema> = Lazy::new(|| {
    EntitySchema::builder("Author")
        .attribute("name", AttrKind::Text)
        .attribute("age", AttrKind::Integer)
        .ignored("display_name")
        .relationship(AUTHOR_ARTICLES.declaration())
        .relationship(AUTHOR_SETTINGS.declaration())
        .build()
});

impl Author {
    pub fn new(name: &str, age: i64) -> Self {
        Self {
            name: name.to_string(),
            age,
            callbacks: Vec::new(),
        }
    }
}

impl Entity for Author {
    fn schema() -> &'static EntitySchema {
        &AUTHOR_SCHEMA
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::required("name"));
        }
        Ok(())
    }

    fn ignored_value(&self, name: &str) -> Option<Value> {
        (name == "display_name").then(|| Value::from(format!("{} ({})", self.name, self.age)))
    }

    fn before_save(&mut self) {
        self.name = self.name.trim().to_string();
        self.callbacks.push("before_save".to_string());
    }

    fn before_create(&mut self) {
        self.callbacks.push("before_create".to_string());
    }

    fn before_update(&mut self) {
        self.callbacks.push("before_update".to_string());
    }

    fn after_create(&mut self) {
        self.callbacks.push("after_create".to_string());
    }

    fn after_update(&mut self) {
        self.callbacks.push("after_update".to_string());
    }

    fn after_save(&mut self) {
        self.callbacks.push("after_save".to_string());
    }

    fn before_destroy(&mut self) {
        self.callbacks.push("before_destroy".to_string());
    }

    fn after_destroy(&mut self) {
        self.callbacks.push("after_destroy".to_string());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Article {
    pub title: Option<String>,
    pub text: Option<String>,
    pub score: i64,
    pub author_id: Option<String>,
}

pub const ARTICLE_AUTHOR: BelongsTo<Article, Author> = BelongsTo::new("author");
pub const ARTICLE_TAGS: HasMany<Article, Tag> = HasMany::new("tags");

static ARTICLE_SCHEMA: Lazy<EntitySchema> = Lazy::new(|| {
    EntitySchema::builder("Article")
        .attribute("title", AttrKind::Text)
        .attribute("text", AttrKind::Text)
        .attribute("score", AttrKind::Integer)
        .attribute("author_id", AttrKind::Text)
        .relationship(ARTICLE_AUTHOR.declaration())
        .relationship(ARTICLE_TAGS.declaration())
        .build()
});

impl Article {
    pub fn new(title: &str, text: &str, score: i64) -> Self {
        Self {
            title: Some(title.to_string()),
            text: Some(text.to_string()),
            score,
            author_id: None,
        }
    }
}

impl Entity for Article {
    fn schema() -> &'static EntitySchema {
        &ARTICLE_SCHEMA
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.title.as_deref().map_or(true, str::is_empty) {
            return Err(ValidationError::required("title"));
        }
        if self.text.as_deref().map_or(true, str::is_empty) {
            return Err(ValidationError::required("text"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tag {
    pub name: String,
    pub article_id: Option<String>,
}

pub const TAG_ARTICLE: BelongsTo<Tag, Article> = BelongsTo::new("article");

static TAG_SCHEMA: Lazy<EntitySchema> = Lazy::new(|| {
    EntitySchema::builder("Tag")
        .attribute("name", AttrKind::Text)
        .attribute("article_id", AttrKind::Text)
        .relationship(TAG_ARTICLE.declaration())
        .build()
});

impl Entity for Tag {
    fn schema() -> &'static EntitySchema {
        &TAG_SCHEMA
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub theme: String,
    pub author_id: Option<String>,
}

pub const SETTINGS_OWNER: BelongsTo<UserSettings, Author> = BelongsTo::new("owner");

static USER_SETTINGS_SCHEMA: Lazy<EntitySchema> = Lazy::new(|| {
    EntitySchema::builder("UserSettings")
        .attribute("theme", AttrKind::Text)
        .attribute("author_id", AttrKind::Text)
        .relationship(SETTINGS_OWNER.declaration())
        .build()
});

impl Entity for UserSettings {
    fn schema() -> &'static EntitySchema {
        &USER_SETTINGS_SCHEMA
    }
}

// Ping and Pong own each other: each holds a key to the other and each has
// the other as a dependent.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ping {
    pub label: String,
    pub pong_id: Option<String>,
}

pub const PING_PARTNER: BelongsTo<Ping, Pong> = BelongsTo::new("partner");
pub const PING_DEPENDENT: HasOne<Ping, Pong> = HasOne::new("dependent");

static PING_SCHEMA: Lazy<EntitySchema> = Lazy::new(|| {
    EntitySchema::builder("Ping")
        .attribute("label", AttrKind::Text)
        .attribute("pong_id", AttrKind::Text)
        .relationship(PING_PARTNER.declaration())
        .relationship(PING_DEPENDENT.declaration())
        .build()
});

impl Entity for Ping {
    fn schema() -> &'static EntitySchema {
        &PING_SCHEMA
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pong {
    pub label: String,
    pub ping_id: Option<String>,
}

pub const PONG_PARTNER: BelongsTo<Pong, Ping> = BelongsTo::new("partner");
pub const PONG_DEPENDENT: HasOne<Pong, Ping> = HasOne::new("dependent");

static PONG_SCHEMA: Lazy<EntitySchema> = Lazy::new(|| {
    EntitySchema::builder("Pong")
        .attribute("label", AttrKind::Text)
        .attribute("ping_id", AttrKind::Text)
        .relationship(PONG_PARTNER.declaration())
        .relationship(PONG_DEPENDENT.declaration())
        .build()
});

impl Entity for Pong {
    fn schema() -> &'static EntitySchema {
        &PONG_SCHEMA
    }
}

// Self-referential hierarchy.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Employee {
    pub name: String,
    pub manager_id: Option<String>,
}

pub const EMPLOYEE_MANAGER: BelongsTo<Employee, Employee> =
    BelongsTo::with_foreign_key("manager", "manager_id");
pub const EMPLOYEE_REPORTS: HasMany<Employee, Employee> =
    HasMany::with_foreign_key("reports", "manager_id");

static EMPLOYEE_SCHEMA: Lazy<EntitySchema> = Lazy::new(|| {
    EntitySchema::builder("Employee")
        .attribute("name", AttrKind::Text)
        .attribute("manager_id", AttrKind::Text)
        .relationship(EMPLOYEE_MANAGER.declaration())
        .relationship(EMPLOYEE_REPORTS.declaration())
        .build()
});

impl Entity for Employee {
    fn schema() -> &'static EntitySchema {
        &EMPLOYEE_SCHEMA
    }
}
