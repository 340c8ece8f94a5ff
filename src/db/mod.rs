//! Document store.
//!
//! Production runs on Firestore; local development and tests use the
//! in-memory backend. Both expose the same primitives: point reads, upserts,
//! create-if-absent, equality queries and atomic multi-document commits.

pub mod firestore;
pub mod memory;

use crate::error::AppError;
use crate::models::User;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub use self::firestore::FirestoreStore;
pub use memory::MemoryStore;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const BOOKINGS: &str = "bookings";
    /// Teacher calendar claims, keyed by `{teacher}_{day}_{slot}`
    pub const BOOKING_SLOTS: &str = "booking_slots";
    /// Keyed by `{booking}_{role}`
    pub const BOOKING_ATTENDANCE: &str = "booking_attendance";
    /// Keyed by user id
    pub const CREDIT_BALANCES: &str = "credit_balances";
    pub const CREDIT_TRANSACTIONS: &str = "credit_transactions";
    /// Keyed by user id
    pub const USER_POINTS: &str = "user_points";
    pub const REWARD_TRANSACTIONS: &str = "reward_transactions";
    /// Keyed by user id
    pub const USER_STREAKS: &str = "user_streaks";
    pub const EXAMS: &str = "exams";
    pub const EXAM_ATTEMPTS: &str = "exam_attempts";
}

/// One document write inside an atomic [`Db::commit`].
#[derive(Debug, Clone)]
pub enum Write {
    Set {
        collection: &'static str,
        id: String,
        doc: serde_json::Value,
    },
    Delete {
        collection: &'static str,
        id: String,
    },
}

impl Write {
    pub fn set<T: Serialize>(collection: &'static str, id: impl Into<String>, doc: &T) -> Result<Self, AppError> {
        let doc = serde_json::to_value(doc).map_err(|e| AppError::Internal(e.into()))?;
        Ok(Write::Set {
            collection,
            id: id.into(),
            doc,
        })
    }

    pub fn delete(collection: &'static str, id: impl Into<String>) -> Self {
        Write::Delete {
            collection,
            id: id.into(),
        }
    }
}

#[derive(Clone)]
enum Backend {
    Firestore(FirestoreStore),
    Memory(MemoryStore),
}

/// Shared store handle.
///
/// Cloning is cheap; clones share the backend and the per-key locks.
#[derive(Clone)]
pub struct Db {
    backend: Backend,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl Db {
    /// Connect to Firestore.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn firestore(project_id: &str) -> Result<Self, AppError> {
        Ok(Self::with_backend(Backend::Firestore(
            FirestoreStore::new(project_id).await?,
        )))
    }

    /// Empty in-memory store.
    pub fn in_memory() -> Self {
        Self::with_backend(Backend::Memory(MemoryStore::new()))
    }

    fn with_backend(backend: Backend) -> Self {
        Self {
            backend,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Serialize read-modify-write sequences on one document within this
    /// process. Hold the guard until the write is committed.
    pub async fn lock(&self, collection: &str, id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(format!("{}/{}", collection, id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    pub async fn get<T>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        match &self.backend {
            Backend::Firestore(store) => store.get(collection, id).await,
            Backend::Memory(store) => store.get(collection, id),
        }
    }

    /// Create or replace a document.
    pub async fn set<T>(&self, collection: &str, id: &str, doc: &T) -> Result<(), AppError>
    where
        T: Serialize + Sync + Send,
    {
        match &self.backend {
            Backend::Firestore(store) => store.set(collection, id, doc).await,
            Backend::Memory(store) => store.set(collection, id, doc),
        }
    }

    /// Create a document only if its id is unused.
    ///
    /// Returns `false` when the document already exists.
    pub async fn create<T>(&self, collection: &str, id: &str, doc: &T) -> Result<bool, AppError>
    where
        T: Serialize + Sync + Send,
    {
        match &self.backend {
            Backend::Firestore(store) => store.create(collection, id, doc).await,
            Backend::Memory(store) => store.create(collection, id, doc),
        }
    }

    pub async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(store) => store.delete(collection, id).await,
            Backend::Memory(store) => {
                store.delete(collection, id);
                Ok(())
            }
        }
    }

    /// All documents whose string fields equal the given values.
    pub async fn query_eq<T>(
        &self,
        collection: &str,
        filters: &[(&str, &str)],
    ) -> Result<Vec<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        match &self.backend {
            Backend::Firestore(store) => store.query_eq(collection, filters).await,
            Backend::Memory(store) => store.query_eq(collection, filters),
        }
    }

    /// Apply all writes atomically.
    pub async fn commit(&self, writes: Vec<Write>) -> Result<(), AppError> {
        if writes.is_empty() {
            return Ok(());
        }
        match &self.backend {
            Backend::Firestore(store) => store.commit(writes).await,
            Backend::Memory(store) => {
                store.commit(writes);
                Ok(())
            }
        }
    }

    // ─── User Operations ─────────────────────────────────────────

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get(collections::USERS, user_id).await
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let users: Vec<User> = self
            .query_eq(collections::USERS, &[("email", email)])
            .await?;
        Ok(users.into_iter().next())
    }

    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.set(collections::USERS, &user.id, user).await
    }
}

/// Insert conflicts surface differently across Firestore client versions;
/// match on the rendered error.
pub(crate) fn is_already_exists(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("already exists") || lower.contains("alreadyexists") || lower.contains("conflict")
}
