//! Persistence for book records.
//!
//! [`BookStore`] is the seam between the catalog and its document database.
//! MongoDB backs production; the in-memory store serves local runs and tests.

use std::sync::Arc;

use async_trait::async_trait;
use bookserver_kernel::settings::{DatabaseSettings, StorageBackend};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime as BsonDateTime},
    Collection, Database,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::models::{Book, NewBook};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),

    #[error("backend returned a non-ObjectId identifier: {0}")]
    UnexpectedId(String),

    #[error("stored timestamp out of range: {0} ms")]
    Timestamp(i64),
}

/// Document database holding the book collection.
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Insert one record and return the identifier the backend assigned.
    async fn insert_one(&self, book: NewBook) -> Result<String, StoreError>;

    /// Every record, in insertion order.
    async fn find_all(&self) -> Result<Vec<Book>, StoreError>;
}

/// Open the backend selected by `database.backend`.
pub async fn open(settings: &DatabaseSettings) -> anyhow::Result<Arc<dyn BookStore>> {
    match settings.backend {
        StorageBackend::Mongo => {
            let database = bookserver_db::connect(settings).await?;
            Ok(Arc::new(MongoBookStore::new(&database, &settings.collection)))
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory book store; records are lost on exit");
            Ok(Arc::new(MemoryBookStore::default()))
        }
    }
}

/// Book as laid out in MongoDB.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    name: String,
    quantity: u32,
    author: String,
    category: String,
    description: String,
    rating: f64,
    image_url: Option<String>,
    created_at: BsonDateTime,
}

impl From<NewBook> for BookDocument {
    fn from(book: NewBook) -> Self {
        let millis = book.created_at.unix_timestamp_nanos() / 1_000_000;
        Self {
            id: None,
            name: book.name,
            quantity: book.quantity,
            author: book.author,
            category: book.category,
            description: book.description,
            rating: book.rating,
            image_url: book.image_url,
            created_at: BsonDateTime::from_millis(millis as i64),
        }
    }
}

impl TryFrom<BookDocument> for Book {
    type Error = StoreError;

    fn try_from(document: BookDocument) -> Result<Self, Self::Error> {
        let millis = document.created_at.timestamp_millis();
        let created_at = OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
            .map_err(|_| StoreError::Timestamp(millis))?;

        Ok(Book {
            id: document.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: document.name,
            quantity: document.quantity,
            author: document.author,
            category: document.category,
            description: document.description,
            rating: document.rating,
            image_url: document.image_url,
            created_at,
        })
    }
}

pub struct MongoBookStore {
    collection: Collection<BookDocument>,
}

impl MongoBookStore {
    pub fn new(database: &Database, collection: &str) -> Self {
        Self {
            collection: database.collection(collection),
        }
    }
}

#[async_trait]
impl BookStore for MongoBookStore {
    async fn insert_one(&self, book: NewBook) -> Result<String, StoreError> {
        let result = self.collection.insert_one(BookDocument::from(book)).await?;
        result
            .inserted_id
            .as_object_id()
            .map(|id| id.to_hex())
            .ok_or_else(|| StoreError::UnexpectedId(result.inserted_id.to_string()))
    }

    async fn find_all(&self) -> Result<Vec<Book>, StoreError> {
        let cursor = self.collection.find(doc! {}).await?;
        let documents: Vec<BookDocument> = cursor.try_collect().await?;
        documents.into_iter().map(Book::try_from).collect()
    }
}

/// Process-local store; identifiers are ObjectIds so responses look the same
/// as with MongoDB.
#[derive(Default)]
pub struct MemoryBookStore {
    books: RwLock<Vec<Book>>,
}

#[async_trait]
impl BookStore for MemoryBookStore {
    async fn insert_one(&self, book: NewBook) -> Result<String, StoreError> {
        let id = ObjectId::new().to_hex();
        self.books.write().await.push(book.with_id(id.clone()));
        Ok(id)
    }

    async fn find_all(&self) -> Result<Vec<Book>, StoreError> {
        Ok(self.books.read().await.clone())
    }
}
