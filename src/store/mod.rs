//! Document store capability
//!
//! The marketplace keeps its listings, jobs, payments and chats in an
//! external document database. Handlers only see the [`DocumentStore`] trait;
//! [`memory`] backs tests and local development, [`firestore`] talks to the
//! Firestore REST API.

pub mod firestore;
pub mod memory;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::settings::{BillboardSettings, StoreBackend};

pub use firestore::FirestoreStore;
pub use memory::MemoryDocumentStore;

/// A typed document field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Array(Vec<FieldValue>),
    Map(Fields),
}

pub type Fields = BTreeMap<String, FieldValue>;

impl FieldValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(values: Vec<T>) -> Self {
        Self::Array(values.into_iter().map(Into::into).collect())
    }
}

/// A stored document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document {collection}/{id} does not exist")]
    NotFound { collection: String, id: String },
    #[error("document store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("document store returned {status}: {message}")]
    Backend { status: u16, message: String },
    #[error("could not decode stored document: {0}")]
    Decode(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document, `None` when it does not exist
    async fn get_document(&self, collection: &str, id: &str)
        -> Result<Option<Document>, StoreError>;

    /// Overwrite the given fields of an existing document, leaving the rest untouched
    ///
    /// Fails with [`StoreError::NotFound`] when the document does not exist.
    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError>;

    /// Create or replace a document; with `merge` only the given fields are written
    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        merge: bool,
    ) -> Result<(), StoreError>;
}

/// Build the configured store backend
#[must_use]
pub fn store_from_settings(settings: &BillboardSettings) -> Arc<dyn DocumentStore> {
    match settings.store.backend {
        StoreBackend::Memory => {
            log::warn!("Using the in-memory document store; data is lost on restart");
            Arc::new(MemoryDocumentStore::new())
        }
        StoreBackend::Firestore => Arc::new(FirestoreStore::from_settings(&settings.store)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_conversions() {
        assert_eq!(FieldValue::from("x"), FieldValue::String("x".into()));
        assert_eq!(FieldValue::from(true).as_bool(), Some(true));
        assert_eq!(
            FieldValue::from(vec!["a", "b"]),
            FieldValue::Array(vec!["a".into(), "b".into()])
        );
        assert_eq!(FieldValue::from(3_i64).as_str(), None);
    }

    #[test]
    fn test_document_accessors() {
        let mut fields = Fields::new();
        fields.insert("status".into(), "completed".into());
        fields.insert("amount".into(), 1500_i64.into());
        let doc = Document {
            id: "pay-1".into(),
            fields,
        };

        assert_eq!(doc.get_str("status"), Some("completed"));
        assert_eq!(doc.get_str("amount"), None);
        assert!(doc.get("missing").is_none());
    }
}
