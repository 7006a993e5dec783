//! In-process document store

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CollectionName, Document, DocumentWrite, Store};
use crate::error::{AppError, AppResult};

#[derive(Default)]
struct Shelf {
    documents: HashMap<Uuid, Document>,
    claims: HashMap<String, Uuid>,
}

impl Shelf {
    fn claim_holder(&self, claim: &str) -> Option<Uuid> {
        self.claims.get(claim).copied()
    }

    fn put(&mut self, document: Document) {
        if let Some(previous) = self.documents.get(&document.id) {
            if let Some(old_claim) = &previous.claim {
                if self.claims.get(old_claim) == Some(&document.id) {
                    self.claims.remove(old_claim);
                }
            }
        }
        if let Some(claim) = &document.claim {
            self.claims.insert(claim.clone(), document.id);
        }
        self.documents.insert(document.id, document);
    }
}

/// Store keeping every collection behind a single lock
#[derive(Default)]
pub struct MemoryStore {
    shelves: Mutex<HashMap<CollectionName, Shelf>>,
}

fn not_found(collection: CollectionName, id: Uuid) -> AppError {
    AppError::NotFound(format!("{} {} not found", collection, id))
}

fn claim_taken(collection: CollectionName, claim: &str) -> AppError {
    AppError::Conflict(format!("{} claim '{}' is already held", collection, claim))
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert(&self, collection: CollectionName, document: Document) -> AppResult<()> {
        let mut shelves = self.shelves.lock().await;
        let shelf = shelves.entry(collection).or_default();

        if shelf.documents.contains_key(&document.id) {
            return Err(AppError::Conflict(format!(
                "{} {} already exists",
                collection, document.id
            )));
        }
        if let Some(claim) = &document.claim {
            if shelf.claim_holder(claim).is_some() {
                return Err(claim_taken(collection, claim));
            }
        }
        shelf.put(document);
        Ok(())
    }

    async fn fetch(&self, collection: CollectionName, id: Uuid) -> AppResult<Document> {
        let shelves = self.shelves.lock().await;
        shelves
            .get(&collection)
            .and_then(|shelf| shelf.documents.get(&id))
            .cloned()
            .ok_or_else(|| not_found(collection, id))
    }

    async fn fetch_all(&self, collection: CollectionName) -> AppResult<Vec<Document>> {
        let shelves = self.shelves.lock().await;
        Ok(shelves
            .get(&collection)
            .map(|shelf| shelf.documents.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn remove(&self, collection: CollectionName, id: Uuid) -> AppResult<()> {
        let mut shelves = self.shelves.lock().await;
        let shelf = shelves
            .get_mut(&collection)
            .ok_or_else(|| not_found(collection, id))?;
        let document = shelf
            .documents
            .remove(&id)
            .ok_or_else(|| not_found(collection, id))?;
        if let Some(claim) = document.claim {
            if shelf.claims.get(&claim) == Some(&id) {
                shelf.claims.remove(&claim);
            }
        }
        Ok(())
    }

    async fn commit(&self, writes: Vec<DocumentWrite>) -> AppResult<()> {
        let mut shelves = self.shelves.lock().await;

        // Stage every write against the latest version, committed or staged
        let mut staged: Vec<(CollectionName, Document)> = Vec::with_capacity(writes.len());
        for write in writes {
            let current = staged
                .iter()
                .rev()
                .find(|(collection, doc)| *collection == write.collection && doc.id == write.id)
                .map(|(_, doc)| doc.clone())
                .or_else(|| {
                    shelves
                        .get(&write.collection)
                        .and_then(|shelf| shelf.documents.get(&write.id))
                        .cloned()
                });

            let Some(current) = current else {
                if write.skip_missing {
                    continue;
                }
                return Err(not_found(write.collection, write.id));
            };

            let next = (write.transform)(current)?;
            staged.push((write.collection, next));
        }

        for (collection, document) in &staged {
            let Some(claim) = &document.claim else { continue };
            let held_elsewhere = shelves
                .get(collection)
                .and_then(|shelf| shelf.claim_holder(claim))
                .is_some_and(|holder| holder != document.id);
            if held_elsewhere {
                return Err(claim_taken(*collection, claim));
            }
        }

        for (collection, document) in staged {
            shelves.entry(collection).or_default().put(document);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: Uuid, claim: Option<&str>) -> Document {
        Document {
            id,
            body: json!({ "id": id }),
            claim: claim.map(String::from),
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_claim() {
        let store = MemoryStore::default();
        store
            .insert(CollectionName::TurfBookings, doc(Uuid::new_v4(), Some("k")))
            .await
            .unwrap();

        let err = store
            .insert(CollectionName::TurfBookings, doc(Uuid::new_v4(), Some("k")))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        // Same claim in another collection is independent
        store
            .insert(CollectionName::Items, doc(Uuid::new_v4(), Some("k")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn released_claim_can_be_taken_again() {
        let store = MemoryStore::default();
        let id = Uuid::new_v4();
        store
            .insert(CollectionName::TurfBookings, doc(id, Some("k")))
            .await
            .unwrap();

        store
            .commit(vec![DocumentWrite {
                collection: CollectionName::TurfBookings,
                id,
                skip_missing: false,
                transform: Box::new(|mut d: Document| {
                    d.claim = None;
                    Ok(d)
                }),
            }])
            .await
            .unwrap();

        store
            .insert(CollectionName::TurfBookings, doc(Uuid::new_v4(), Some("k")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failed_write_discards_whole_commit() {
        let store = MemoryStore::default();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        store.insert(CollectionName::Items, doc(first, None)).await.unwrap();
        store.insert(CollectionName::Requests, doc(second, None)).await.unwrap();

        let result = store
            .commit(vec![
                DocumentWrite {
                    collection: CollectionName::Items,
                    id: first,
                    skip_missing: false,
                    transform: Box::new(|mut d: Document| {
                        d.body = json!({ "touched": true });
                        Ok(d)
                    }),
                },
                DocumentWrite {
                    collection: CollectionName::Requests,
                    id: second,
                    skip_missing: false,
                    transform: Box::new(|_: Document| Err(AppError::Conflict("stale".to_string()))),
                },
            ])
            .await;

        assert!(result.unwrap_err().is_conflict());
        let untouched = store.fetch(CollectionName::Items, first).await.unwrap();
        assert_eq!(untouched.body, json!({ "id": first }));
    }

    #[tokio::test]
    async fn missing_document_is_skipped_only_when_allowed() {
        let store = MemoryStore::default();
        let write = |skip_missing| DocumentWrite {
            collection: CollectionName::Items,
            id: Uuid::new_v4(),
            skip_missing,
            transform: Box::new(|d: Document| Ok(d)),
        };

        store.commit(vec![write(true)]).await.unwrap();
        let err = store.commit(vec![write(false)]).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
