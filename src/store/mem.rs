//! In-memory credential store used by the flow tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::sec::authn::attempt::Attempt;
use crate::user::User;

use super::{CredentialStore, StoreError};

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    attempts: Vec<Attempt>,
}

/// Mutex-backed store. The single lock makes `claim_code` trivially atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.inner.lock().unwrap().users.len()
    }

    pub fn attempt_count(&self) -> usize {
        self.inner.lock().unwrap().attempts.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().unwrap();

        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().unwrap();

        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }

        inner.users.push(user.clone());

        Ok(user)
    }

    async fn replace_user(&self, user: &mut User) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();

        user.updated = Utc::now();

        let Some(existing) = inner.users.iter_mut().find(|u| u.id == user.id) else {
            return Err(StoreError::UpdateFailed);
        };

        *existing = user.clone();

        Ok(())
    }

    async fn user_exists(&self, email: &str) -> Result<bool, StoreError> {
        let inner = self.inner.lock().unwrap();

        Ok(inner.users.iter().any(|u| u.email == email))
    }

    async fn append_attempt(&self, mut attempt: Attempt) -> Result<Attempt, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        if attempt.created.is_none() {
            attempt.created = Some(Utc::now());
        }

        inner.attempts.push(attempt.clone());

        Ok(attempt)
    }

    async fn count_failed_since(
        &self,
        user_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let inner = self.inner.lock().unwrap();

        let count = inner.attempts.iter()
            .filter(|a| {
                a.user_id == user_id
                    && !a.validated
                    && a.created.is_some_and(|c| c >= cutoff)
            })
            .count();

        Ok(count as i64)
    }

    async fn find_code_use(
        &self,
        user_id: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Attempt>, StoreError> {
        let inner = self.inner.lock().unwrap();

        Ok(inner.attempts.iter()
            .filter(|a| {
                a.user_id == user_id
                    && a.code == code
                    && a.validated
                    && a.code_expires > now
            })
            .max_by_key(|a| a.code_expires)
            .cloned())
    }

    async fn claim_code(
        &self,
        user_id: &str,
        code: &str,
        code_expires: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        let now = Utc::now();
        let already_used = inner.attempts.iter().any(|a| {
            a.user_id == user_id
                && a.code == code
                && a.validated
                && a.code_expires > now
        });

        if already_used {
            return Ok(false);
        }

        inner.attempts.push(Attempt {
            id: nanoid::nanoid!(),
            user_id: user_id.to_owned(),
            code: code.to_owned(),
            code_expires,
            validated: true,
            created: Some(now),
        });

        Ok(true)
    }
}
