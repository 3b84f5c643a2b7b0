use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::sec::authn::attempt::Attempt;
use crate::user::User;

pub mod pg;

#[cfg(test)]
pub mod mem;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email is already registered")]
    DuplicateEmail,

    #[error("user record was not updated")]
    UpdateFailed,

    #[error(transparent)]
    Pg(#[from] tokio_postgres::Error),

    #[error(transparent)]
    Pool(#[from] deadpool_postgres::PoolError),
}

/// Query contract the orchestrator runs against.
///
/// The user table and attempt ledger behind this trait are the only durable
/// state in the system. `claim_code` is the one operation with an atomicity
/// requirement: for a given `(user_id, code)` pair, concurrent callers must
/// observe at most one `true` while an unexpired consumed entry exists.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    async fn insert_user(&self, user: User) -> Result<User, StoreError>;

    /// Persists the record and stamps `updated`.
    async fn replace_user(&self, user: &mut User) -> Result<(), StoreError>;

    async fn user_exists(&self, email: &str) -> Result<bool, StoreError>;

    /// Appends a ledger entry, stamping `created` if unset.
    async fn append_attempt(&self, attempt: Attempt) -> Result<Attempt, StoreError>;

    /// Unvalidated entries created at or after the cutoff; the lockout
    /// counter.
    async fn count_failed_since(
        &self,
        user_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    /// Latest unexpired consumed entry for the code, if any. The replay
    /// probe.
    async fn find_code_use(
        &self,
        user_id: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Attempt>, StoreError>;

    /// Records the code as consumed unless an unexpired consumed entry for it
    /// already exists. Returns whether this caller won the claim.
    async fn claim_code(
        &self,
        user_id: &str,
        code: &str,
        code_expires: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}
