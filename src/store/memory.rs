//! In-process document store

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{Document, DocumentStore, Fields, StoreError};

type Key = (String, String);

/// `HashMap`-backed store keyed by (collection, id)
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<Key, Fields>>,
}

impl MemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document, replacing any previous content
    pub fn insert(&self, collection: &str, id: &str, fields: Fields) {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key(collection, id), fields);
    }

    /// Current fields of a document
    #[must_use]
    pub fn snapshot(&self, collection: &str, id: &str) -> Option<Fields> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key(collection, id))
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn key(collection: &str, id: &str) -> Key {
    (collection.to_string(), id.to_string())
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self.snapshot(collection, id).map(|fields| Document {
            id: id.to_string(),
            fields,
        }))
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let mut documents = self
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let existing = documents
            .get_mut(&key(collection, id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        existing.extend(fields);
        Ok(())
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        merge: bool,
    ) -> Result<(), StoreError> {
        let mut documents = self
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = documents.entry(key(collection, id)).or_default();
        if merge {
            entry.extend(fields);
        } else {
            *entry = fields;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FieldValue;

    fn fields(pairs: &[(&str, FieldValue)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_get_missing_document_is_none() {
        let store = MemoryDocumentStore::new();
        assert!(store.get_document("jobs", "x").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_update_keeps_untouched_fields() {
        let store = MemoryDocumentStore::new();
        store.insert("jobs", "x", fields(&[("title", "Driver".into())]));

        store
            .update_document("jobs", "x", fields(&[("featured", true.into())]))
            .await
            .unwrap();

        let doc = store.get_document("jobs", "x").await.unwrap().unwrap();
        assert_eq!(doc.get_str("title"), Some("Driver"));
        assert_eq!(doc.get("featured"), Some(&FieldValue::Bool(true)));
    }

    #[tokio::test]
    async fn test_update_of_missing_document_fails_without_creating_it() {
        let store = MemoryDocumentStore::new();
        let err = store
            .update_document("jobs", "ghost", fields(&[("featured", true.into())]))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_set_with_and_without_merge() {
        let store = MemoryDocumentStore::new();
        store.insert(
            "chats",
            "a_b",
            fields(&[("participants", vec!["a", "b"].into()), ("unread", 2_i64.into())]),
        );

        store
            .set_document("chats", "a_b", fields(&[("unread", 0_i64.into())]), true)
            .await
            .unwrap();
        let merged = store.snapshot("chats", "a_b").unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get("unread"), Some(&FieldValue::Integer(0)));

        store
            .set_document("chats", "a_b", fields(&[("unread", 1_i64.into())]), false)
            .await
            .unwrap();
        assert_eq!(store.snapshot("chats", "a_b").unwrap().len(), 1);
    }
}
