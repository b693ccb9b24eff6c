use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{auth::repo_types::User, db::with_deadline, error::StoreError};

/// Credential store: login -> password hash, login unique across all rows.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// `Conflict` when the login is taken, soft-deleted rows included.
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<User, StoreError>;
    async fn get_by_login(&self, login: &str) -> Result<User, StoreError>;
    async fn get_by_id(&self, id: i64) -> Result<User, StoreError>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
    timeout: Duration,
}

impl PgUserRepo {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<User, StoreError> {
        with_deadline(
            self.timeout,
            sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (login, password_hash)
                VALUES ($1, $2)
                RETURNING id, login, password_hash, created_at, updated_at, deleted_at
                "#,
            )
            .bind(login)
            .bind(password_hash)
            .fetch_one(&self.db),
        )
        .await
    }

    async fn get_by_login(&self, login: &str) -> Result<User, StoreError> {
        with_deadline(
            self.timeout,
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, login, password_hash, created_at, updated_at, deleted_at
                FROM users
                WHERE login = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(login)
            .fetch_one(&self.db),
        )
        .await
    }

    async fn get_by_id(&self, id: i64) -> Result<User, StoreError> {
        with_deadline(
            self.timeout,
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, login, password_hash, created_at, updated_at, deleted_at
                FROM users
                WHERE id = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(id)
            .fetch_one(&self.db),
        )
        .await
    }
}
