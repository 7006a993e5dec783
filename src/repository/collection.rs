//! Typed collections and cross-collection write batches

use std::{
    marker::PhantomData,
    sync::{Arc, Mutex},
};

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use super::{feed::Subscription, ChangeFeed, CollectionName, Document, DocumentWrite, Store};
use crate::error::{AppError, AppResult};

/// A record type stored in its own collection
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: CollectionName;

    /// Partial update understood by the record
    type Patch: Clone + Send + Sync + 'static;

    fn id(&self) -> Uuid;

    fn apply(&mut self, patch: Self::Patch);

    /// Uniqueness claim held by the record in its current state
    fn claim(&self) -> Option<String> {
        None
    }
}

/// Condition the current record must satisfy for an update to commit
pub type Precondition<R> = Box<dyn Fn(&R) -> bool + Send + Sync>;

/// Predicate selecting the records of a listing or subscription
pub type Filter<R> = Arc<dyn Fn(&R) -> bool + Send + Sync>;

fn encode<R: Record>(record: &R) -> AppResult<Document> {
    Ok(Document {
        id: record.id(),
        body: serde_json::to_value(record)?,
        claim: record.claim(),
    })
}

fn decode<R: Record>(document: Document) -> AppResult<R> {
    Ok(serde_json::from_value(document.body)?)
}

/// Build the conditional read-modify-write of one record.
/// `observe` receives the record as committed.
fn stage<R: Record>(
    id: Uuid,
    patch: R::Patch,
    precondition: Option<Precondition<R>>,
    skip_missing: bool,
    observe: Option<Arc<Mutex<Option<R>>>>,
) -> DocumentWrite {
    DocumentWrite {
        collection: R::COLLECTION,
        id,
        skip_missing,
        transform: Box::new(move |current: Document| {
            let mut record: R = decode(current)?;
            if let Some(check) = &precondition {
                if !check(&record) {
                    return Err(AppError::Conflict(format!(
                        "{} {} was modified concurrently",
                        R::COLLECTION,
                        id
                    )));
                }
            }
            record.apply(patch);
            let document = encode(&record)?;
            if let Some(slot) = observe {
                if let Ok(mut slot) = slot.lock() {
                    *slot = Some(record);
                }
            }
            Ok(document)
        }),
    }
}

/// Typed view of one collection
pub struct Collection<R> {
    store: Arc<dyn Store>,
    feed: ChangeFeed,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for Collection<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            feed: self.feed.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: Record> Collection<R> {
    pub fn new(store: Arc<dyn Store>, feed: ChangeFeed) -> Self {
        Self {
            store,
            feed,
            _record: PhantomData,
        }
    }

    /// Insert a new record, returning its id
    pub async fn create(&self, record: R) -> AppResult<Uuid> {
        let document = encode(&record)?;
        let id = document.id;
        self.store.insert(R::COLLECTION, document).await?;
        self.feed.notify(R::COLLECTION);
        Ok(id)
    }

    /// Get a record by id
    pub async fn get(&self, id: Uuid) -> AppResult<R> {
        decode(self.store.fetch(R::COLLECTION, id).await?)
    }

    /// Apply a patch, provided the current record satisfies `precondition`.
    /// Fails with `Conflict` when it does not.
    pub async fn update(
        &self,
        id: Uuid,
        patch: R::Patch,
        precondition: Option<Precondition<R>>,
    ) -> AppResult<R> {
        let committed = Arc::new(Mutex::new(None));
        let write = stage(id, patch, precondition, false, Some(committed.clone()));
        self.store.commit(vec![write]).await?;
        self.feed.notify(R::COLLECTION);

        let record = committed
            .lock()
            .map_err(|_| AppError::Internal("update result lock poisoned".to_string()))?
            .take();
        record.ok_or_else(|| AppError::Internal(format!("{} {} not observed", R::COLLECTION, id)))
    }

    /// Delete a record by id
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.store.remove(R::COLLECTION, id).await?;
        self.feed.notify(R::COLLECTION);
        Ok(())
    }

    /// All records matching the filter, in no particular order
    pub async fn list(&self, filter: Filter<R>) -> AppResult<Vec<R>> {
        let documents = self.store.fetch_all(R::COLLECTION).await?;
        let mut records = Vec::with_capacity(documents.len());
        for document in documents {
            let record: R = decode(document)?;
            if filter(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Live view of the records matching `filter`.
    ///
    /// The first snapshot is delivered immediately; a new full snapshot
    /// follows every committed change to this collection.
    pub fn subscribe(&self, filter: Filter<R>) -> Subscription<R> {
        let mut changes = self.feed.listen();
        let (sender, receiver) = mpsc::channel(16);
        let collection = self.clone();

        let task = tokio::spawn(async move {
            loop {
                match collection.list(filter.clone()).await {
                    Ok(snapshot) => {
                        if sender.send(snapshot).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => tracing::warn!("Snapshot of {} failed: {}", R::COLLECTION, e),
                }

                loop {
                    match changes.recv().await {
                        Ok(changed) if changed == R::COLLECTION => break,
                        Ok(_) => continue,
                        // Missed notifications collapse into one refresh
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!("Subscription to {} lagged by {}", R::COLLECTION, skipped);
                            break;
                        }
                        Err(RecvError::Closed) => return,
                    }
                }
            }
        });

        Subscription::new(ReceiverStream::new(receiver), task)
    }
}

/// Conditional writes across collections, committed as one unit
#[derive(Default)]
pub struct Batch {
    writes: Vec<DocumentWrite>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a conditional update of a record
    pub fn update<R: Record>(
        &mut self,
        id: Uuid,
        patch: R::Patch,
        precondition: Option<Precondition<R>>,
    ) -> &mut Self {
        self.writes.push(stage(id, patch, precondition, false, None));
        self
    }

    /// Stage an update that is silently dropped if the record was deleted
    pub fn update_if_exists<R: Record>(
        &mut self,
        id: Uuid,
        patch: R::Patch,
        precondition: Option<Precondition<R>>,
    ) -> &mut Self {
        self.writes.push(stage(id, patch, precondition, true, None));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub(crate) fn collections(&self) -> Vec<CollectionName> {
        let mut names: Vec<CollectionName> = Vec::new();
        for write in &self.writes {
            if !names.contains(&write.collection) {
                names.push(write.collection);
            }
        }
        names
    }

    pub(crate) fn into_writes(self) -> Vec<DocumentWrite> {
        self.writes
    }
}
