//! In-memory document store for local development and tests.

use crate::db::Write;
use crate::error::AppError;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

type Key = (String, String);

/// Documents held as JSON values, keyed by (collection, id).
#[derive(Clone, Default)]
pub struct MemoryStore {
    docs: Arc<DashMap<Key, serde_json::Value>>,
}

fn key(collection: &str, id: &str) -> Key {
    (collection.to_string(), id.to_string())
}

fn to_value<T: Serialize>(doc: &T) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(doc).map_err(|e| AppError::Internal(e.into()))
}

fn from_value<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, AppError> {
    serde_json::from_value(value).map_err(|e| AppError::Database(e.to_string()))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError> {
        let value = self.docs.get(&key(collection, id)).map(|v| v.value().clone());
        value.map(from_value).transpose()
    }

    pub fn set<T: Serialize>(&self, collection: &str, id: &str, doc: &T) -> Result<(), AppError> {
        self.docs.insert(key(collection, id), to_value(doc)?);
        Ok(())
    }

    pub fn create<T: Serialize>(&self, collection: &str, id: &str, doc: &T) -> Result<bool, AppError> {
        let value = to_value(doc)?;
        match self.docs.entry(key(collection, id)) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(true)
            }
        }
    }

    pub fn delete(&self, collection: &str, id: &str) {
        self.docs.remove(&key(collection, id));
    }

    pub fn query_eq<T: DeserializeOwned>(
        &self,
        collection: &str,
        filters: &[(&str, &str)],
    ) -> Result<Vec<T>, AppError> {
        let matches: Vec<serde_json::Value> = self
            .docs
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .filter(|entry| {
                filters
                    .iter()
                    .all(|(field, expected)| entry.value().get(*field).and_then(|v| v.as_str()) == Some(*expected))
            })
            .map(|entry| entry.value().clone())
            .collect();

        matches.into_iter().map(from_value).collect()
    }

    pub fn commit(&self, writes: Vec<Write>) {
        for write in writes {
            match write {
                Write::Set { collection, id, doc } => {
                    self.docs.insert(key(collection, &id), doc);
                }
                Write::Delete { collection, id } => {
                    self.docs.remove(&key(collection, &id));
                }
            }
        }
    }
}
