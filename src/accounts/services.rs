use std::sync::Arc;

use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    accounts::{
        dto::AccountView,
        password::{CredentialHasher, MAX_PASSWORD_BYTES},
        repo_types::{NewAccount, Role},
        store::{AccountStore, StoreError},
    },
    error::AppError,
    pagination::Pagination,
};

pub const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Business rules for accounts. Cheap to clone; holds no per-request state.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn AccountStore>,
    hasher: Arc<CredentialHasher>,
}

impl AccountService {
    pub fn new(store: Arc<dyn AccountStore>, hasher: Arc<CredentialHasher>) -> Self {
        Self { store, hasher }
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<AccountView, AppError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AppError::validation("invalid email"));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::validation("password too short"));
        }
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AppError::validation("password too long"));
        }

        // Best-effort pre-check; the unique index is what actually guarantees it.
        match self.store.get_by_email(&email).await {
            Ok(_) => {
                warn!(email = %email, "email already registered");
                return Err(AppError::DuplicateEmail);
            }
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let password_hash = self.hasher.hash(password).context("hash password")?;

        let account = self
            .store
            .create(NewAccount {
                email,
                password_hash,
                role,
                created_at: OffsetDateTime::now_utc(),
            })
            .await?;

        info!(account_id = account.id, role = %account.role, "account registered");
        Ok(account.into())
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<AccountView, AppError> {
        let email = normalize_email(email);
        let account = match self.store.get_by_email(&email).await {
            Ok(a) => a,
            Err(StoreError::NotFound) => {
                self.hasher.verify_decoy(password);
                warn!("login for unknown email");
                return Err(AppError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        if !self.hasher.verify(&account.password_hash, password) {
            warn!(account_id = account.id, "login with invalid password");
            return Err(AppError::InvalidCredentials);
        }

        info!(account_id = account.id, "account authenticated");
        Ok(account.into())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<AccountView, AppError> {
        Ok(self.store.get_by_id(id).await?.into())
    }

    pub async fn update_role(&self, id: i64, role: Role) -> Result<AccountView, AppError> {
        let mut account = self.store.get_by_id(id).await?;
        account.role = role;
        self.store.update(&account).await?;
        info!(account_id = id, role = %role, "account role updated");
        Ok(account.into())
    }

    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        self.store.delete(id).await?;
        info!(account_id = id, "account deleted");
        Ok(())
    }

    pub async fn list(&self, page: Pagination) -> Result<Vec<AccountView>, AppError> {
        let accounts = self.store.list(page.limit, page.offset).await?;
        Ok(accounts.into_iter().map(AccountView::from).collect())
    }
}
