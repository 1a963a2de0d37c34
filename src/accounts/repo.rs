use async_trait::async_trait;
use sqlx::{pool::PoolConnection, PgPool, Postgres};
use tracing::{debug, warn};

use crate::accounts::{
    repo_types::{Account, AccountRow, NewAccount},
    store::{AccountStore, StoreError},
};

/// `AccountStore` over the `users` table.
///
/// Each call checks out its own pooled connection and holds it only for
/// that one statement. The connection goes back to the pool when the guard
/// drops, which also covers errors and a cancelled request future.
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<PoolConnection<Postgres>, StoreError> {
        self.pool.acquire().await.map_err(|e| {
            warn!(error = %e, "failed to acquire connection");
            StoreError::Unavailable(e)
        })
    }
}

fn decode(row: AccountRow) -> Result<Account, StoreError> {
    Account::try_from(row).map_err(|e| StoreError::Query(sqlx::Error::Decode(Box::new(e))))
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut conn = self.conn().await?;
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (email, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .bind(account.created_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(StoreError::from_query)?;
        debug!(account_id = id, "account row inserted");
        Ok(account.with_id(id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Account, StoreError> {
        let mut conn = self.conn().await?;
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, email, password_hash, role, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(StoreError::from_query)?
        .ok_or(StoreError::NotFound)?;
        decode(row)
    }

    async fn get_by_email(&self, email: &str) -> Result<Account, StoreError> {
        let mut conn = self.conn().await?;
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, email, password_hash, role, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&mut *conn)
        .await
        .map_err(StoreError::from_query)?
        .ok_or(StoreError::NotFound)?;
        decode(row)
    }

    async fn update(&self, account: &Account) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $1, password_hash = $2, role = $3
            WHERE id = $4
            "#,
        )
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .bind(account.id)
        .execute(&mut *conn)
        .await
        .map_err(StoreError::from_query)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(StoreError::from_query)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Account>, StoreError> {
        let mut conn = self.conn().await?;
        let rows = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, email, password_hash, role, created_at
            FROM users
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await
        .map_err(StoreError::from_query)?;
        rows.into_iter().map(decode).collect()
    }
}

/// These run against a throwaway database per test created by `sqlx::test`
/// from `DATABASE_URL`; run them with `cargo test -- --ignored`.
#[cfg(test)]
mod tests {
    use time::{Duration, OffsetDateTime};

    use super::*;
    use crate::accounts::repo_types::Role;

    fn new_account(email: &str, created_at: OffsetDateTime) -> NewAccount {
        NewAccount {
            email: email.into(),
            password_hash: "$argon2id$stub".into(),
            role: Role::Customer,
            created_at,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn create_then_fetch(pool: PgPool) {
        let store = PgAccountStore::new(pool);
        let now = OffsetDateTime::now_utc();
        let created = store.create(new_account("a@x.com", now)).await.unwrap();
        assert!(created.id > 0);

        let by_id = store.get_by_id(created.id).await.unwrap();
        assert_eq!(by_id.email, "a@x.com");
        assert_eq!(by_id.role, Role::Customer);
        let by_email = store.get_by_email("a@x.com").await.unwrap();
        assert_eq!(by_email.id, created.id);

        assert!(matches!(store.get_by_id(created.id + 1).await, Err(StoreError::NotFound)));
        assert!(matches!(store.get_by_email("b@x.com").await, Err(StoreError::NotFound)));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn duplicate_email_is_a_conflict(pool: PgPool) {
        let store = PgAccountStore::new(pool);
        let now = OffsetDateTime::now_utc();
        store.create(new_account("a@x.com", now)).await.unwrap();
        let err = store.create(new_account("a@x.com", now)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict), "got {err:?}");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn update_and_delete_check_row_counts(pool: PgPool) {
        let store = PgAccountStore::new(pool);
        let mut account = store
            .create(new_account("a@x.com", OffsetDateTime::now_utc()))
            .await
            .unwrap();

        account.role = Role::Admin;
        store.update(&account).await.unwrap();
        assert_eq!(store.get_by_id(account.id).await.unwrap().role, Role::Admin);

        let mut ghost = account.clone();
        ghost.id += 1000;
        ghost.email = "ghost@x.com".into();
        assert!(matches!(store.update(&ghost).await, Err(StoreError::NotFound)));
        assert!(matches!(store.delete(ghost.id).await, Err(StoreError::NotFound)));

        store.delete(account.id).await.unwrap();
        assert!(matches!(store.delete(account.id).await, Err(StoreError::NotFound)));
        assert!(matches!(store.get_by_id(account.id).await, Err(StoreError::NotFound)));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn update_onto_taken_email_is_a_conflict(pool: PgPool) {
        let store = PgAccountStore::new(pool);
        let now = OffsetDateTime::now_utc();
        store.create(new_account("a@x.com", now)).await.unwrap();
        let mut b = store.create(new_account("b@x.com", now)).await.unwrap();

        b.email = "a@x.com".into();
        assert!(matches!(store.update(&b).await, Err(StoreError::Conflict)));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn list_is_newest_first_and_windowed(pool: PgPool) {
        let store = PgAccountStore::new(pool);
        let base = OffsetDateTime::now_utc() - Duration::hours(1);
        store.create(new_account("old@x.com", base)).await.unwrap();
        store
            .create(new_account("mid@x.com", base + Duration::minutes(10)))
            .await
            .unwrap();
        // Same timestamp: the later id sorts first.
        let tie = base + Duration::minutes(20);
        store.create(new_account("tie1@x.com", tie)).await.unwrap();
        store.create(new_account("tie2@x.com", tie)).await.unwrap();

        let emails = |rows: Vec<Account>| rows.into_iter().map(|a| a.email).collect::<Vec<_>>();

        let all = store.list(20, 0).await.unwrap();
        assert_eq!(emails(all), ["tie2@x.com", "tie1@x.com", "mid@x.com", "old@x.com"]);

        let window = store.list(2, 1).await.unwrap();
        assert_eq!(emails(window), ["tie1@x.com", "mid@x.com"]);

        assert!(store.list(20, 100).await.unwrap().is_empty());
    }
}
