use async_trait::async_trait;
use thiserror::Error;

use crate::accounts::repo_types::{Account, NewAccount};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account not found")]
    NotFound,
    #[error("email already taken")]
    Conflict,
    #[error("could not acquire a database connection: {0}")]
    Unavailable(#[source] sqlx::Error),
    #[error("database query failed: {0}")]
    Query(#[source] sqlx::Error),
}

impl StoreError {
    /// Classifies an error raised by a statement (not by pool acquisition).
    pub fn from_query(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Conflict,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(e)
            }
            other => StoreError::Query(other),
        }
    }
}

/// Persistence contract for accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Inserts the account and returns it with its generated id.
    /// A taken email is `StoreError::Conflict`.
    async fn create(&self, account: NewAccount) -> Result<Account, StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<Account, StoreError>;

    async fn get_by_email(&self, email: &str) -> Result<Account, StoreError>;

    /// Overwrites email, password hash and role of the row with `account.id`.
    async fn update(&self, account: &Account) -> Result<(), StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    /// Newest first. A window past the last row is an empty vec.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Account>, StoreError>;
}

#[cfg(test)]
pub mod memory {
    use std::collections::BTreeMap;

    use tokio::sync::RwLock;

    use super::*;

    #[derive(Default)]
    struct Inner {
        next_id: i64,
        rows: BTreeMap<i64, Account>,
    }

    /// In-memory store with the same uniqueness and not-found rules as the
    /// `users` table.
    #[derive(Default)]
    pub struct MemoryStore {
        inner: RwLock<Inner>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl AccountStore for MemoryStore {
        async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
            let mut inner = self.inner.write().await;
            if inner.rows.values().any(|a| a.email == account.email) {
                return Err(StoreError::Conflict);
            }
            inner.next_id += 1;
            let created = account.with_id(inner.next_id);
            inner.rows.insert(created.id, created.clone());
            Ok(created)
        }

        async fn get_by_id(&self, id: i64) -> Result<Account, StoreError> {
            let inner = self.inner.read().await;
            inner.rows.get(&id).cloned().ok_or(StoreError::NotFound)
        }

        async fn get_by_email(&self, email: &str) -> Result<Account, StoreError> {
            let inner = self.inner.read().await;
            inner
                .rows
                .values()
                .find(|a| a.email == email)
                .cloned()
                .ok_or(StoreError::NotFound)
        }

        async fn update(&self, account: &Account) -> Result<(), StoreError> {
            let mut inner = self.inner.write().await;
            if inner
                .rows
                .values()
                .any(|a| a.id != account.id && a.email == account.email)
            {
                return Err(StoreError::Conflict);
            }
            let row = inner.rows.get_mut(&account.id).ok_or(StoreError::NotFound)?;
            row.email = account.email.clone();
            row.password_hash = account.password_hash.clone();
            row.role = account.role;
            Ok(())
        }

        async fn delete(&self, id: i64) -> Result<(), StoreError> {
            let mut inner = self.inner.write().await;
            inner.rows.remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
        }

        async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Account>, StoreError> {
            let inner = self.inner.read().await;
            let mut all: Vec<Account> = inner.rows.values().cloned().collect();
            all.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
            Ok(all
                .into_iter()
                .skip(offset.max(0) as usize)
                .take(limit.max(0) as usize)
                .collect())
        }
    }
}
