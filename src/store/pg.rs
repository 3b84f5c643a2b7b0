use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::error::SqlState;
use tokio_postgres::Row;

use crate::sec::authn::attempt::Attempt;
use crate::user::User;

use super::{CredentialStore, StoreError};

/// Credential store over a postgres pool. See `schema.sql` for the backing
/// tables and indexes.
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        PgStore { pool }
    }
}

fn user_from_row(row: Row) -> User {
    User {
        id: row.get(0),
        name: row.get(1),
        email: row.get(2),
        password_hash: row.get(3),
        mfa_secret: row.get(4),
        mfa_enabled: row.get(5),
        created: row.get(6),
        updated: row.get(7),
    }
}

fn attempt_from_row(row: Row) -> Attempt {
    Attempt {
        id: row.get(0),
        user_id: row.get(1),
        code: row.get(2),
        code_expires: row.get(3),
        validated: row.get(4),
        created: Some(row.get(5)),
    }
}

const USER_FIELDS: &str = "\
    users.id, \
    users.name, \
    users.email, \
    users.password_hash, \
    users.mfa_secret, \
    users.mfa_enabled, \
    users.created, \
    users.updated";

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let conn = self.pool.get().await?;

        let maybe = conn.query_opt(
            &format!("select {USER_FIELDS} from users where users.email = $1"),
            &[&email]
        ).await?;

        Ok(maybe.map(user_from_row))
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let conn = self.pool.get().await?;

        let maybe = conn.query_opt(
            &format!("select {USER_FIELDS} from users where users.id = $1"),
            &[&id]
        ).await?;

        Ok(maybe.map(user_from_row))
    }

    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        let conn = self.pool.get().await?;

        let result = conn.execute(
            "\
            insert into users (\
                id, name, email, password_hash, mfa_secret, mfa_enabled, created, updated\
            ) values \
            ($1, $2, $3, $4, $5, $6, $7, $8)",
            &[
                &user.id,
                &user.name,
                &user.email,
                &user.password_hash,
                &user.mfa_secret,
                &user.mfa_enabled,
                &user.created,
                &user.updated,
            ]
        ).await;

        match result {
            Ok(_) => Ok(user),
            Err(err) => {
                if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    Err(StoreError::DuplicateEmail)
                } else {
                    Err(err.into())
                }
            }
        }
    }

    async fn replace_user(&self, user: &mut User) -> Result<(), StoreError> {
        let conn = self.pool.get().await?;

        user.updated = Utc::now();

        let count = conn.execute(
            "\
            update users \
            set name = $2, \
                email = $3, \
                password_hash = $4, \
                mfa_secret = $5, \
                mfa_enabled = $6, \
                updated = $7 \
            where id = $1",
            &[
                &user.id,
                &user.name,
                &user.email,
                &user.password_hash,
                &user.mfa_secret,
                &user.mfa_enabled,
                &user.updated,
            ]
        ).await?;

        if count != 1 {
            return Err(StoreError::UpdateFailed);
        }

        Ok(())
    }

    async fn user_exists(&self, email: &str) -> Result<bool, StoreError> {
        let conn = self.pool.get().await?;

        let row = conn.query_one(
            "select exists(select 1 from users where users.email = $1)",
            &[&email]
        ).await?;

        Ok(row.get(0))
    }

    async fn append_attempt(&self, mut attempt: Attempt) -> Result<Attempt, StoreError> {
        let conn = self.pool.get().await?;

        let created = attempt.created.unwrap_or_else(Utc::now);

        conn.execute(
            "\
            insert into auth_attempt (id, user_id, code, code_expires, validated, created) \
            values ($1, $2, $3, $4, $5, $6)",
            &[
                &attempt.id,
                &attempt.user_id,
                &attempt.code,
                &attempt.code_expires,
                &attempt.validated,
                &created,
            ]
        ).await?;

        attempt.created = Some(created);

        Ok(attempt)
    }

    async fn count_failed_since(
        &self,
        user_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let conn = self.pool.get().await?;

        let row = conn.query_one(
            "\
            select count(*) from auth_attempt \
            where auth_attempt.user_id = $1 and \
                  auth_attempt.created >= $2 and \
                  not auth_attempt.validated",
            &[&user_id, &cutoff]
        ).await?;

        Ok(row.get(0))
    }

    async fn find_code_use(
        &self,
        user_id: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Attempt>, StoreError> {
        let conn = self.pool.get().await?;

        let maybe = conn.query_opt(
            "\
            select id, user_id, code, code_expires, validated, created \
            from auth_attempt \
            where auth_attempt.user_id = $1 and \
                  auth_attempt.code = $2 and \
                  auth_attempt.validated and \
                  auth_attempt.code_expires > $3 \
            order by auth_attempt.code_expires desc \
            limit 1",
            &[&user_id, &code, &now]
        ).await?;

        Ok(maybe.map(attempt_from_row))
    }

    async fn claim_code(
        &self,
        user_id: &str,
        code: &str,
        code_expires: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;

        let transaction = conn.transaction().await?;

        // serialize concurrent claims for the same (user, code) pair
        let lock_key = format!("{user_id}:{code}");

        transaction.execute(
            "select pg_advisory_xact_lock(hashtextextended($1, 0))",
            &[&lock_key]
        ).await?;

        let now = Utc::now();
        let existing = transaction.query_opt(
            "\
            select id from auth_attempt \
            where auth_attempt.user_id = $1 and \
                  auth_attempt.code = $2 and \
                  auth_attempt.validated and \
                  auth_attempt.code_expires > $3 \
            limit 1",
            &[&user_id, &code, &now]
        ).await?;

        if existing.is_some() {
            transaction.commit().await?;

            return Ok(false);
        }

        let id = nanoid::nanoid!();

        transaction.execute(
            "\
            insert into auth_attempt (id, user_id, code, code_expires, validated, created) \
            values ($1, $2, $3, $4, true, $5)",
            &[&id, &user_id, &code, &code_expires, &now]
        ).await?;

        transaction.commit().await?;

        Ok(true)
    }
}
