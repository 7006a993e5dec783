//! Repository layer over a document store
//!
//! Records live in four collections (users, items, requests, turf bookings).
//! A [`Store`] backend persists them as JSON documents; [`Collection`] gives
//! each record type its typed CRUD and subscription surface, and [`Batch`]
//! groups conditional writes across collections into one atomic commit.

pub mod collection;
pub mod feed;
pub mod memory;
pub mod postgres;

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{item::Item, request::ExchangeRequest, turf::TurfBooking, user::User},
};

pub use collection::{Batch, Collection, Filter, Precondition, Record};
pub use feed::{ChangeFeed, Subscription};
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// The record collections known to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionName {
    Users,
    Items,
    Requests,
    TurfBookings,
}

impl CollectionName {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionName::Users => "users",
            CollectionName::Items => "items",
            CollectionName::Requests => "requests",
            CollectionName::TurfBookings => "turf_bookings",
        }
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub body: Value,
    /// Uniqueness claim; no two documents of a collection hold the same one
    pub claim: Option<String>,
}

/// Read-modify-write step applied to the current version of a document
pub type Transform = Box<dyn FnOnce(Document) -> AppResult<Document> + Send>;

/// One staged write of a [`Store::commit`] unit
pub struct DocumentWrite {
    pub collection: CollectionName,
    pub id: Uuid,
    pub transform: Transform,
    /// Drop the write instead of failing when the document no longer exists
    pub skip_missing: bool,
}

/// Document storage backend.
///
/// `insert` and `commit` must reject a claim already held by another document
/// of the same collection with `AppError::Conflict`. `commit` is atomic: every
/// transform sees the current document, and if any write fails none of the
/// unit becomes visible.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert(&self, collection: CollectionName, document: Document) -> AppResult<()>;

    async fn fetch(&self, collection: CollectionName, id: Uuid) -> AppResult<Document>;

    async fn fetch_all(&self, collection: CollectionName) -> AppResult<Vec<Document>>;

    async fn remove(&self, collection: CollectionName, id: Uuid) -> AppResult<()>;

    async fn commit(&self, writes: Vec<DocumentWrite>) -> AppResult<()>;
}

/// Main repository holding one typed collection per record type
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn Store>,
    feed: ChangeFeed,
    pub users: Collection<User>,
    pub items: Collection<Item>,
    pub requests: Collection<ExchangeRequest>,
    pub bookings: Collection<TurfBooking>,
}

impl Repository {
    /// Create a new repository over the given store
    pub fn new(store: Arc<dyn Store>) -> Self {
        let feed = ChangeFeed::new();
        Self {
            users: Collection::new(store.clone(), feed.clone()),
            items: Collection::new(store.clone(), feed.clone()),
            requests: Collection::new(store.clone(), feed.clone()),
            bookings: Collection::new(store.clone(), feed.clone()),
            store,
            feed,
        }
    }

    /// Repository backed by a fresh in-process store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::default()))
    }

    /// Atomically apply every write of the batch, or none of them
    pub async fn commit(&self, batch: Batch) -> AppResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let touched = batch.collections();
        self.store.commit(batch.into_writes()).await?;
        for collection in touched {
            self.feed.notify(collection);
        }
        Ok(())
    }
}
